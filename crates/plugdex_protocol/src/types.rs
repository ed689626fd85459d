//! Catalog API types.
//!
//! Field names on the wire follow the catalog service's JSON exactly
//! (`current_page`, `total_pages`, `total_results`, `results_per_page`).

use chrono::serde::ts_seconds_option;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A listing request: free-text search plus a 1-based page number.
///
/// Immutable value; a new `Query` supersedes the previous one. Equality is
/// structural and is what the client uses to decide whether a response is
/// still relevant when it arrives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub page: u32,
}

impl Query {
    pub fn new(text: impl Into<String>, page: u32) -> Self {
        Self {
            text: text.into(),
            page: page.max(1),
        }
    }

    /// A fresh query on page 1 with the given text.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(text, 1)
    }

    /// Same text, different page.
    pub fn at_page(&self, page: u32) -> Self {
        Self::new(self.text.clone(), page)
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new("", 1)
    }
}

/// One plugin row in a listing response. The client treats everything but
/// `slug` as opaque display data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSummary {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub short_desc: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub github_stars: Option<u64>,
    #[serde(default)]
    pub plugin_manager_users: Option<u64>,
}

/// A successful response from `GET /api/plugins`.
///
/// Never partially constructed: either the whole page decoded or the request
/// failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginsPage {
    pub plugins: Vec<PluginSummary>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_results: u64,
    pub results_per_page: u32,
}

impl PluginsPage {
    /// 1-based index of the first result on this page, for the
    /// "Plugins 21-40 of 120" readout.
    pub fn first_result_index(&self) -> u64 {
        u64::from(self.current_page.saturating_sub(1)) * u64::from(self.results_per_page) + 1
    }
}

/// Full payload from `GET /api/plugins/{slug}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDetail {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default)]
    pub github_readme: Option<String>,
    #[serde(default)]
    pub github_readme_filename: Option<String>,
    #[serde(default)]
    pub vimorg_id: Option<String>,
    #[serde(default)]
    pub vimorg_long_desc: Option<String>,
    #[serde(default)]
    pub vimorg_install_details: Option<String>,
    #[serde(default, with = "ts_seconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "ts_seconds_option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PluginDetail {
    /// The long description shown on the detail view, preferring the GitHub
    /// readme over the vim.org description.
    pub fn long_description(&self) -> Option<&str> {
        self.github_readme
            .as_deref()
            .or(self.vimorg_long_desc.as_deref())
    }

    /// Repository path suitable for plugin-manager one-liners, e.g.
    /// `tpope/vim-fugitive` from a full GitHub URL.
    pub fn short_github_path(&self) -> Option<String> {
        let url = self.github_url.as_deref()?;
        let path = url
            .strip_prefix("https://github.com/")
            .or_else(|| url.strip_prefix("http://github.com/"))?;
        Some(path.trim_start_matches("vim-scripts/").to_string())
    }
}

/// One entry from `GET /api/categories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub id: String,
    pub name: String,
}

/// A write against a single plugin, applied via the mutation queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationPayload {
    /// `PUT /api/plugins/{slug}/category/{id}`
    Category { id: String },
    /// `POST /api/plugins/{slug}/tags`
    Tags { tags: Vec<String> },
}

/// Body for `POST /api/submit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitForm {
    pub name: String,
    pub github_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SubmitForm {
    /// Client-side validation. Required fields must be non-blank and tags
    /// non-empty strings; nothing is sent over the wire until this passes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "name" });
        }
        if self.github_url.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "github_url" });
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(ValidationError::EmptyTag);
        }
        Ok(())
    }
}

/// Response from `POST /api/submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub status: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub redirect: Option<String>,
}

/// Remove duplicate tags while preserving first-seen order. Tag edits are
/// de-duplicated before they are queued.
pub fn dedup_tags(tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.iter()
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}
