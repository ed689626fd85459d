//! Listing state: the current query intent, the page on screen, and the
//! merge-or-discard rule for responses.
//!
//! The user's intent (search text + page number) moves faster than the
//! network. Responses are tagged with the query that produced them; a
//! response is applied only if that query still matches the intent at the
//! moment it arrives, otherwise it is dropped on the floor. The previous
//! page stays visible while a newer request is loading.

use std::sync::Arc;
use std::time::Instant;

use plugdex_protocol::{PluginsPage, PluginSummary, Query, TransportError};
use tracing::{debug, warn};

use crate::scheduler::{RequestClass, RequestScheduler};
use crate::selection::Selection;
use crate::transport::CatalogTransport;

/// Owns the listing request lifecycle and the visible result set.
pub struct ResultController {
    scheduler: RequestScheduler,
    /// What the user currently wants on screen.
    query: Query,
    /// The query whose results are currently displayed.
    applied: Option<Query>,
    page: Option<PluginsPage>,
    error: Option<TransportError>,
    is_loading: bool,
    stale_discards: u64,
    selection: Selection,
}

impl ResultController {
    pub fn new(transport: Arc<dyn CatalogTransport>) -> Self {
        Self {
            scheduler: RequestScheduler::new(transport),
            query: Query::default(),
            applied: None,
            page: None,
            error: None,
            is_loading: false,
            stale_discards: 0,
            selection: Selection::new(),
        }
    }

    /// Fetch the current query right away, skipping debounce. Initial load
    /// and manual refresh.
    pub fn refresh(&mut self, now: Instant) {
        self.is_loading = true;
        self.scheduler
            .force(RequestClass::Search, self.query.clone(), now);
    }

    /// The search text changed. Resets to page 1 and goes through the
    /// debounced search class.
    pub fn set_query_text(&mut self, text: impl Into<String>, now: Instant) {
        self.query = Query::with_text(text);
        self.is_loading = true;
        self.scheduler
            .schedule(RequestClass::Search, self.query.clone(), now);
    }

    /// Jump to a page of the current search. Clamped to the known page range;
    /// a no-op if already there.
    pub fn set_page(&mut self, page: u32, now: Instant) {
        let page = match self.total_pages() {
            Some(total) if total > 0 => page.clamp(1, total),
            _ => page.max(1),
        };
        if page == self.query.page {
            return;
        }
        self.query = self.query.at_page(page);
        self.is_loading = true;
        self.scheduler
            .schedule(RequestClass::Page, self.query.clone(), now);
    }

    pub fn next_page(&mut self, now: Instant) {
        self.set_page(self.query.page.saturating_add(1), now);
    }

    pub fn prev_page(&mut self, now: Instant) {
        self.set_page(self.query.page.saturating_sub(1), now);
    }

    /// Drive timers and absorb completions. Returns true if the visible
    /// result set was replaced.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut results_changed = false;
        for completion in self.scheduler.tick(now) {
            if completion.query != self.query {
                self.stale_discards += 1;
                debug!(
                    stale = ?completion.query,
                    current = ?self.query,
                    "discarding superseded response"
                );
                continue;
            }
            match completion.result {
                Ok(page) => {
                    self.selection.on_results_replaced(page.plugins.len());
                    self.page = Some(page);
                    self.applied = Some(completion.query);
                    self.error = None;
                    self.is_loading = false;
                    results_changed = true;
                }
                Err(TransportError::Cancelled) => {
                    self.stale_discards += 1;
                }
                Err(err) => {
                    warn!(error = %err, "listing fetch failed");
                    self.error = Some(err);
                    self.is_loading = false;
                }
            }
        }
        results_changed
    }

    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// The query whose results are on screen, once anything has loaded.
    pub fn applied_query(&self) -> Option<&Query> {
        self.applied.as_ref()
    }

    pub fn page(&self) -> Option<&PluginsPage> {
        self.page.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&TransportError> {
        self.error.as_ref()
    }

    pub fn stale_discards(&self) -> u64 {
        self.stale_discards
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.page.as_ref().map(|p| p.total_pages)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    /// The plugin under the cursor, if any.
    pub fn selected_plugin(&self) -> Option<&PluginSummary> {
        let index = self.selection.index()?;
        self.page.as_ref()?.plugins.get(index)
    }
}
