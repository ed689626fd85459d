//! Transport boundary for the catalog service.
//!
//! The controller depends only on [`CatalogTransport`], not on any specific
//! wire protocol. The production implementation is a blocking reqwest client;
//! callers run it on worker threads and collect results over channels.
//! Cancellation is best-effort: a [`CancelToken`] tells the worker to stop
//! caring, but correctness never depends on the abort landing in time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use plugdex_protocol::{
    CategoryInfo, PluginDetail, PluginsPage, Query, SubmitForm, SubmitOutcome, TransportError,
};

/// Request timeout for catalog calls. A hung call would otherwise pin the
/// UI in its loading state forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared cancellation flag for one in-flight request.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Blocking request/response primitive against the catalog API.
///
/// Implementations must be shareable across the worker threads that carry
/// individual calls.
pub trait CatalogTransport: Send + Sync + 'static {
    fn fetch_plugins(
        &self,
        query: &Query,
        cancel: &CancelToken,
    ) -> Result<PluginsPage, TransportError>;

    fn fetch_plugin(
        &self,
        slug: &str,
        cancel: &CancelToken,
    ) -> Result<PluginDetail, TransportError>;

    fn fetch_categories(&self, cancel: &CancelToken)
        -> Result<Vec<CategoryInfo>, TransportError>;

    fn set_category(&self, slug: &str, category_id: &str) -> Result<(), TransportError>;

    fn set_tags(&self, slug: &str, tags: &[String]) -> Result<(), TransportError>;

    fn submit_plugin(&self, form: &SubmitForm) -> Result<SubmitOutcome, TransportError>;
}

/// HTTP client for the catalog's JSON API.
pub struct HttpCatalogClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
        Err(TransportError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        cancel: &CancelToken,
    ) -> Result<T, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let response = self
            .client
            .get(self.url(path))
            .query(params)
            .send()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let response = Self::check_status(response)?;
        // The caller may have moved on while the request was on the wire.
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        response
            .json()
            .map_err(|err| TransportError::Decode(err.to_string()))
    }
}

impl CatalogTransport for HttpCatalogClient {
    fn fetch_plugins(
        &self,
        query: &Query,
        cancel: &CancelToken,
    ) -> Result<PluginsPage, TransportError> {
        let params = [
            ("query", query.text.clone()),
            ("page", query.page.to_string()),
        ];
        self.get_json("/api/plugins", &params, cancel)
    }

    fn fetch_plugin(
        &self,
        slug: &str,
        cancel: &CancelToken,
    ) -> Result<PluginDetail, TransportError> {
        self.get_json(&format!("/api/plugins/{}", slug), &[], cancel)
    }

    fn fetch_categories(
        &self,
        cancel: &CancelToken,
    ) -> Result<Vec<CategoryInfo>, TransportError> {
        self.get_json("/api/categories", &[], cancel)
    }

    fn set_category(&self, slug: &str, category_id: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .put(self.url(&format!("/api/plugins/{}/category/{}", slug, category_id)))
            .send()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Self::check_status(response).map(|_| ())
    }

    fn set_tags(&self, slug: &str, tags: &[String]) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.url(&format!("/api/plugins/{}/tags", slug)))
            .json(&serde_json::json!({ "tags": tags }))
            .send()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Self::check_status(response).map(|_| ())
    }

    fn submit_plugin(&self, form: &SubmitForm) -> Result<SubmitOutcome, TransportError> {
        let response = self
            .client
            .post(self.url("/api/submit"))
            .json(form)
            .send()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Self::check_status(response)?
            .json()
            .map_err(|err| TransportError::Decode(err.to_string()))
    }
}

/// Test doubles for the transport boundary, shared by unit and integration
/// tests.
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::mpsc;
    use std::sync::Mutex;

    /// One observed transport call, in issue order.
    #[derive(Debug, Clone, PartialEq)]
    pub enum CallRecord {
        FetchPlugins(Query),
        FetchPlugin(String),
        FetchCategories,
        SetCategory { slug: String, id: String },
        SetTags { slug: String, tags: Vec<String> },
        Submit(SubmitForm),
    }

    /// Scriptable in-memory transport. Records every call; listing and
    /// mutation outcomes can be queued ahead of time, and mutation calls can
    /// be gated so a test controls exactly when each one completes.
    #[derive(Default)]
    pub struct ScriptedTransport {
        calls: Mutex<Vec<CallRecord>>,
        listing_responses: Mutex<VecDeque<Result<PluginsPage, TransportError>>>,
        mutation_results: Mutex<VecDeque<Result<(), TransportError>>>,
        mutation_gate: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue the outcome of the next listing fetch. Without a queued
        /// outcome, a synthetic page is derived from the query.
        pub fn push_listing(&self, result: Result<PluginsPage, TransportError>) {
            self.listing_responses.lock().unwrap().push_back(result);
        }

        /// Queue the outcome of the next mutation call (default `Ok`).
        pub fn push_mutation_result(&self, result: Result<(), TransportError>) {
            self.mutation_results.lock().unwrap().push_back(result);
        }

        /// Block every subsequent mutation call until one `()` is sent on
        /// the returned channel. Calls are still recorded before blocking.
        pub fn hold_mutations(&self) -> mpsc::Sender<()> {
            let (tx, rx) = mpsc::channel();
            *self.mutation_gate.lock().unwrap() = Some(rx);
            tx
        }

        pub fn calls(&self) -> Vec<CallRecord> {
            self.calls.lock().unwrap().clone()
        }

        /// Just the listing fetches, in issue order.
        pub fn listing_calls(&self) -> Vec<Query> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    CallRecord::FetchPlugins(query) => Some(query),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: CallRecord) {
            self.calls.lock().unwrap().push(call);
        }

        fn wait_mutation_gate(&self) {
            let gate = self.mutation_gate.lock().unwrap();
            if let Some(rx) = gate.as_ref() {
                // Sender dropped means the test no longer cares; proceed.
                let _ = rx.recv();
            }
        }

        fn next_mutation_result(&self) -> Result<(), TransportError> {
            self.mutation_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }

        /// Synthetic page: three plugins, page echoed back, fixed totals.
        pub fn default_page(query: &Query) -> PluginsPage {
            let plugins = ["alpha", "beta", "gamma"]
                .iter()
                .map(|name| plugdex_protocol::PluginSummary {
                    slug: format!("{}-{}", name, query.page),
                    name: (*name).to_string(),
                    short_desc: None,
                    category: None,
                    tags: Vec::new(),
                    github_stars: None,
                    plugin_manager_users: None,
                })
                .collect();
            PluginsPage {
                plugins,
                current_page: query.page,
                total_pages: 3,
                total_results: 120,
                results_per_page: 50,
            }
        }
    }

    impl CatalogTransport for ScriptedTransport {
        fn fetch_plugins(
            &self,
            query: &Query,
            _cancel: &CancelToken,
        ) -> Result<PluginsPage, TransportError> {
            self.record(CallRecord::FetchPlugins(query.clone()));
            self.listing_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Self::default_page(query)))
        }

        fn fetch_plugin(
            &self,
            slug: &str,
            _cancel: &CancelToken,
        ) -> Result<PluginDetail, TransportError> {
            self.record(CallRecord::FetchPlugin(slug.to_string()));
            Ok(PluginDetail {
                slug: slug.to_string(),
                name: slug.to_string(),
                category: None,
                tags: Vec::new(),
                github_url: None,
                github_readme: None,
                github_readme_filename: None,
                vimorg_id: None,
                vimorg_long_desc: None,
                vimorg_install_details: None,
                created_at: None,
                updated_at: None,
            })
        }

        fn fetch_categories(
            &self,
            _cancel: &CancelToken,
        ) -> Result<Vec<CategoryInfo>, TransportError> {
            self.record(CallRecord::FetchCategories);
            Ok(vec![
                CategoryInfo {
                    id: "language".into(),
                    name: "Language".into(),
                },
                CategoryInfo {
                    id: "other".into(),
                    name: "Other".into(),
                },
            ])
        }

        fn set_category(&self, slug: &str, category_id: &str) -> Result<(), TransportError> {
            self.record(CallRecord::SetCategory {
                slug: slug.to_string(),
                id: category_id.to_string(),
            });
            self.wait_mutation_gate();
            self.next_mutation_result()
        }

        fn set_tags(&self, slug: &str, tags: &[String]) -> Result<(), TransportError> {
            self.record(CallRecord::SetTags {
                slug: slug.to_string(),
                tags: tags.to_vec(),
            });
            self.wait_mutation_gate();
            self.next_mutation_result()
        }

        fn submit_plugin(&self, form: &SubmitForm) -> Result<SubmitOutcome, TransportError> {
            self.record(CallRecord::Submit(form.clone()));
            Ok(SubmitOutcome {
                status: true,
                message: None,
                redirect: Some("/thanks-for-submitting".into()),
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn cancel_token_flips_once() {
            let token = CancelToken::new();
            assert!(!token.is_cancelled());
            let clone = token.clone();
            clone.cancel();
            assert!(token.is_cancelled());
        }

        #[test]
        fn scripted_transport_records_calls_in_order() {
            let transport = ScriptedTransport::new();
            let cancel = CancelToken::new();
            let q = Query::with_text("git");
            transport.fetch_plugins(&q, &cancel).unwrap();
            transport.set_tags("p1", &["a".into()]).unwrap();
            let calls = transport.calls();
            assert_eq!(calls.len(), 2);
            assert_eq!(calls[0], CallRecord::FetchPlugins(q));
        }
    }
}
