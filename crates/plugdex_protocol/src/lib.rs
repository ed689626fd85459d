//! Wire types for the plugin catalog API.
//!
//! Shared between the plugdex client and anything else that talks to the
//! catalog service. All types use serde for JSON serialization and mirror
//! the catalog's response shapes field-for-field.

pub mod error;
pub mod types;

// Re-export the common surface for convenience
pub use error::{TransportError, ValidationError};
pub use types::{
    dedup_tags, CategoryInfo, MutationPayload, PluginDetail, PluginSummary, PluginsPage, Query,
    SubmitForm, SubmitOutcome,
};
