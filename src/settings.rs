//! Tracked-disk settings store.
//!
//! The disk poller reads its volume list from the same JSON settings file
//! the (separate) settings editor writes. This module only ever reads it.
//! The poller takes an owned snapshot of the list at the top of each tick,
//! so an edit landing mid-poll cannot corrupt an in-flight pass.

use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// On-disk settings document. Unknown fields (shortcuts, window bounds)
/// belong to the editor and are ignored here.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    /// Stored camelCase for compatibility with the settings editor.
    #[serde(default, rename = "trackedDisks")]
    pub tracked_disks: Vec<String>,
}

impl Settings {
    fn parse(content: &str) -> Option<Settings> {
        serde_json::from_str(content).ok()
    }
}

/// Process-scoped store of the tracked volume list.
pub struct SettingsStore {
    tracked: RwLock<Vec<String>>,
}

impl SettingsStore {
    /// Load the tracked-disk list.
    ///
    /// CLI overrides win outright; otherwise the settings file is read, and
    /// an unreadable, unparsable or empty list falls back to the platform
    /// root volume.
    pub fn load(settings_file: &Path, overrides: &[String]) -> Self {
        let tracked = if !overrides.is_empty() {
            overrides.to_vec()
        } else {
            Self::from_file(settings_file)
        };
        Self {
            tracked: RwLock::new(tracked),
        }
    }

    fn from_file(path: &Path) -> Vec<String> {
        let tracked = match std::fs::read_to_string(path) {
            Ok(content) => match Settings::parse(&content) {
                Some(settings) => settings.tracked_disks,
                None => {
                    warn!("settings file {} is not valid JSON, using defaults", path.display());
                    Vec::new()
                }
            },
            Err(err) => {
                warn!("could not read settings file {}: {err}", path.display());
                Vec::new()
            }
        };
        if tracked.is_empty() {
            vec![default_root_volume()]
        } else {
            tracked
        }
    }

    /// Owned snapshot of the tracked paths, in configured order.
    pub fn tracked_disk_paths(&self) -> Vec<String> {
        match self.tracked.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Root volume token used when nothing is configured.
fn default_root_volume() -> String {
    if cfg!(windows) {
        "C:".to_string()
    } else {
        "/".to_string()
    }
}
