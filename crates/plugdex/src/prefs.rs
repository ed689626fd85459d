//! Small on-disk preference store under the plugdex home directory.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("failed to read preferences: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to write preferences: {0}")]
    Write(#[source] std::io::Error),
    #[error("preferences file is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Which plugin manager the install instructions are rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallTab {
    #[default]
    Vundle,
    NeoBundle,
    VimPlug,
    Pathogen,
}

impl InstallTab {
    pub const ALL: [InstallTab; 4] = [
        InstallTab::Vundle,
        InstallTab::NeoBundle,
        InstallTab::VimPlug,
        InstallTab::Pathogen,
    ];

    pub fn label(self) -> &'static str {
        match self {
            InstallTab::Vundle => "Vundle",
            InstallTab::NeoBundle => "NeoBundle",
            InstallTab::VimPlug => "vim-plug",
            InstallTab::Pathogen => "Pathogen",
        }
    }

    /// 1-based position, matching the number keys that switch tabs.
    pub fn from_position(position: u8) -> Option<Self> {
        Self::ALL.get(position.checked_sub(1)? as usize).copied()
    }
}

/// User preferences, persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prefs {
    #[serde(default)]
    pub install_tab: InstallTab,
    /// Slugs whose detail page the user has opened.
    #[serde(default)]
    pub visited: BTreeSet<String>,
}

impl Prefs {
    pub fn mark_visited(&mut self, slug: impl Into<String>) -> bool {
        self.visited.insert(slug.into())
    }

    pub fn is_visited(&self, slug: &str) -> bool {
        self.visited.contains(slug)
    }
}

/// Loads and saves [`Prefs`] at a fixed path.
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    /// The default store at `<plugdex home>/prefs.json`.
    pub fn default_location() -> Self {
        Self::at(plugdex_logging::plugdex_home().join("prefs.json"))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means fresh defaults; a corrupt file is reported but
    /// also falls back to defaults so the app still starts.
    pub fn load(&self) -> Prefs {
        match self.try_load() {
            Ok(prefs) => prefs,
            Err(PrefsError::Read(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Prefs::default()
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring unreadable preferences");
                Prefs::default()
            }
        }
    }

    fn try_load(&self) -> Result<Prefs, PrefsError> {
        let raw = fs::read_to_string(&self.path).map_err(PrefsError::Read)?;
        serde_json::from_str(&raw).map_err(PrefsError::Decode)
    }

    pub fn save(&self, prefs: &Prefs) -> Result<(), PrefsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(PrefsError::Write)?;
        }
        let raw = serde_json::to_string_pretty(prefs).map_err(PrefsError::Decode)?;
        fs::write(&self.path, raw).map_err(PrefsError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_tab_positions_match_number_keys() {
        assert_eq!(InstallTab::from_position(1), Some(InstallTab::Vundle));
        assert_eq!(InstallTab::from_position(4), Some(InstallTab::Pathogen));
        assert_eq!(InstallTab::from_position(0), None);
        assert_eq!(InstallTab::from_position(5), None);
    }

    #[test]
    fn prefs_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = PrefsStore::at(dir.path().join("prefs.json"));

        let mut prefs = store.load();
        assert_eq!(prefs, Prefs::default());

        prefs.install_tab = InstallTab::VimPlug;
        assert!(prefs.mark_visited("fugitive"));
        assert!(!prefs.mark_visited("fugitive"));
        store.save(&prefs).unwrap();

        let reloaded = store.load();
        assert_eq!(reloaded.install_tab, InstallTab::VimPlug);
        assert!(reloaded.is_visited("fugitive"));
        assert!(!reloaded.is_visited("nerdtree"));
    }

    #[test]
    fn corrupt_prefs_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{not json").unwrap();
        let store = PrefsStore::at(&path);
        assert_eq!(store.load(), Prefs::default());
    }
}
