//! plugdex: a terminal client for the Vim plugin catalog.
//!
//! The core of the crate is the request-lifecycle machinery that keeps a
//! fast-changing local state (keystrokes, page flips, cursor movement) in
//! agreement with a slow, unordered, cancelable remote API:
//!
//! - [`scheduler`]: debounce/throttle dispatch with in-flight cancellation
//! - [`controller`]: query/page state, merge-or-discard of responses
//! - [`mutation`]: per-plugin FIFO queue for category/tag writes
//! - [`selection`]: keyboard selection cursor over the visible result set
//!
//! The [`tui`] module is the ratatui shell that wires these together.

pub mod controller;
pub mod mutation;
pub mod prefs;
pub mod scheduler;
pub mod selection;
pub mod transport;
pub mod tui;
