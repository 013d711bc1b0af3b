//! Plugin flags - which plugins are auto-loaded by discovery

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use plume_plugin_api::PluginId;

use crate::error::ConfigError;

/// Enable/disable flags keyed by module path or plugin id
///
/// Stored as a JSON object in `<plugin dir>/Plugins.json`:
///
/// ```json
/// {
///   "/srv/Plugins/Audit/Plugin.so": false,
///   "a93d168a-c410-48c3-92e8-86375503dbd3": true
/// }
/// ```
///
/// A key with no entry is enabled.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginFlags {
    entries: BTreeMap<String, bool>,
}

impl PluginFlags {
    /// Load flags from a JSON file
    ///
    /// Returns empty flags if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load flags, treating an unreadable file as "everything enabled"
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(flags) => flags,
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %e,
                    "Flag file unreadable, treating all plugins as enabled"
                );
                Self::default()
            }
        }
    }

    /// Save flags to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Explicit flag for a key, if any
    pub fn get(&self, key: &str) -> Option<bool> {
        self.entries.get(key).copied()
    }

    /// Explicit flag for a plugin id, whatever UUID spelling the key uses
    pub fn get_id(&self, id: PluginId) -> Option<bool> {
        self.entries
            .iter()
            .find(|(key, _)| PluginId::parse(key).is_ok_and(|parsed| parsed == id))
            .map(|(_, enabled)| *enabled)
    }

    /// Check if a module path (or other key) is enabled
    pub fn is_enabled(&self, key: &str) -> bool {
        self.get(key).unwrap_or(true)
    }

    /// Check if a plugin id is enabled
    pub fn is_id_enabled(&self, id: PluginId) -> bool {
        self.get_id(id).unwrap_or(true)
    }

    /// Set the flag for a key
    pub fn set(&mut self, key: impl Into<String>, enabled: bool) {
        self.entries.insert(key.into(), enabled);
    }

    /// Set the flag for a plugin id, replacing any other spelling of it
    pub fn set_id(&mut self, id: PluginId, enabled: bool) {
        self.entries
            .retain(|key, _| PluginId::parse(key).map_or(true, |parsed| parsed != id));
        self.entries.insert(id.to_string(), enabled);
    }

    /// Iterate over all explicit flags
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
