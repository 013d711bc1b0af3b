//! Default directory resolution for plume.
//!
//! Plugins live next to the process by default (`./Plugins`), while host
//! configuration follows the XDG layout so it is shared across working
//! directories.

use std::path::PathBuf;

/// Name of the default plugin root directory.
pub const PLUGINS_DIR_NAME: &str = "Plugins";

/// Name of the enable/disable flag file kept inside the plugin root.
pub const FLAGS_FILE_NAME: &str = "Plugins.json";

/// Get the default plugin root.
///
/// Returns `<current dir>/Plugins`, falling back to a relative `Plugins`
/// when the current directory cannot be read.
///
/// # Examples
///
/// ```
/// use plume_paths::plugins_dir;
///
/// let root = plugins_dir();
/// assert!(root.ends_with("Plugins"));
/// ```
pub fn plugins_dir() -> PathBuf {
    std::env::current_dir()
        .map(|cwd| cwd.join(PLUGINS_DIR_NAME))
        .unwrap_or_else(|_| PathBuf::from(PLUGINS_DIR_NAME))
}

/// Get the flag file path for a plugin root.
pub fn flags_file(plugin_dir: &std::path::Path) -> PathBuf {
    plugin_dir.join(FLAGS_FILE_NAME)
}

/// Get the plume config directory.
///
/// Returns `$XDG_CONFIG_HOME/plume` if set, otherwise `~/.config/plume`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("plume")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/plume")
    } else {
        PathBuf::from(".config/plume")
    }
}

/// Get the default host config file (`<config dir>/config.toml`).
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
