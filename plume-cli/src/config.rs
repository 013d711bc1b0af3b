//! Host configuration resolution for the CLI

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use plume_core::PluginHostConfig;

/// Build the host config from `--config` / the default config file and `--plugin-dir`
///
/// An explicit config file must exist; the default one is optional.
pub fn resolve(explicit: Option<&Path>, plugin_dir: Option<PathBuf>) -> Result<PluginHostConfig> {
    let mut config = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            PluginHostConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => {
            let path = plume_paths::config_file();
            PluginHostConfig::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
    };

    if let Some(dir) = plugin_dir {
        config.plugin_dir = dir;
    }

    tracing::debug!(
        plugin_dir = %config.plugin_dir.display(),
        flags = %config.flags_path().display(),
        "Host configuration resolved"
    );
    Ok(config)
}
