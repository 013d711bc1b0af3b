//! PluginHost configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::metadata::AmbiguityPolicy;

/// Configuration for [`PluginHost`](crate::PluginHost)
///
/// Stored as TOML; every field is optional.
///
/// ```toml
/// plugin_dir = "/srv/app/Plugins"
/// ambiguity = "reject"
/// slow_hook_threshold_ms = 2000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginHostConfig {
    /// Root plugin directory (one subdirectory per plugin)
    pub plugin_dir: PathBuf,
    /// Enable/disable flag file, defaults to `<plugin_dir>/Plugins.json`
    pub flags_file: Option<PathBuf>,
    /// How to resolve modules declaring more than one plugin type
    pub ambiguity: AmbiguityPolicy,
    /// Hooks running longer than this are reported
    pub slow_hook_threshold_ms: u64,
}

impl Default for PluginHostConfig {
    fn default() -> Self {
        Self {
            plugin_dir: plume_paths::plugins_dir(),
            flags_file: None,
            ambiguity: AmbiguityPolicy::default(),
            slow_hook_threshold_ms: 5_000,
        }
    }
}

impl PluginHostConfig {
    /// Default configuration rooted at `plugin_dir`
    pub fn for_dir(plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    ///
    /// Returns the defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Flag file used by `set_enabled` and by discovery of `plugin_dir`
    pub fn flags_path(&self) -> PathBuf {
        self.flags_path_for(&self.plugin_dir)
    }

    /// Flag file consulted when discovering plugins under `root`
    pub fn flags_path_for(&self, root: &Path) -> PathBuf {
        self.flags_file
            .clone()
            .unwrap_or_else(|| plume_paths::flags_file(root))
    }

    pub fn slow_hook_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_hook_threshold_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_plugin_host_config_default() {
        let config = PluginHostConfig::default();
        assert!(config.plugin_dir.ends_with("Plugins"));
        assert_eq!(config.ambiguity, AmbiguityPolicy::First);
        assert_eq!(config.slow_hook_threshold(), Duration::from_secs(5));
    }

    #[test]
    fn test_flags_path_defaults_inside_plugin_dir() {
        let config = PluginHostConfig::for_dir("/srv/Plugins");
        assert_eq!(config.flags_path(), PathBuf::from("/srv/Plugins/Plugins.json"));
        assert_eq!(
            config.flags_path_for(Path::new("/other")),
            PathBuf::from("/other/Plugins.json")
        );
    }

    #[test]
    fn test_explicit_flags_file_wins() {
        let config = PluginHostConfig {
            flags_file: Some(PathBuf::from("/etc/plume/flags.json")),
            ..PluginHostConfig::for_dir("/srv/Plugins")
        };
        assert_eq!(
            config.flags_path_for(Path::new("/other")),
            PathBuf::from("/etc/plume/flags.json")
        );
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let config = PluginHostConfig::load(Path::new("/nonexistent/plume.toml")).unwrap();
        assert_eq!(config.slow_hook_threshold_ms, 5_000);
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "plugin_dir = \"/srv/Plugins\"\nambiguity = \"reject\"\n",
        )
        .unwrap();

        let config = PluginHostConfig::load(&path).unwrap();
        assert_eq!(config.plugin_dir, PathBuf::from("/srv/Plugins"));
        assert_eq!(config.ambiguity, AmbiguityPolicy::Reject);
        assert_eq!(config.slow_hook_threshold_ms, 5_000);
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "plugin_dir = [").unwrap();

        let err = PluginHostConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }
}
