//! Plugin discovery on disk
//!
//! Layout under the plugin root:
//!
//! ```text
//! Plugins/
//! ├── Plugins.json          enable/disable flags
//! ├── Audit/
//! │   ├── Plugin.so         module (or Audit.so)
//! │   └── libaudit_dep.so   co-loaded sibling
//! └── Greeter/
//!     └── Greeter.so
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Conventional module stem shared by every plugin directory
pub const MODULE_STEM: &str = "Plugin";

/// A plugin directory with its module file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPlugin {
    /// Subdirectory name
    pub name: String,
    /// The plugin's own directory
    pub dir: PathBuf,
    /// Module file to load
    pub module: PathBuf,
}

/// Whether a path has the platform dynamic-library extension
pub fn is_module_file(path: &Path) -> bool {
    path.extension() == Some(OsStr::new(std::env::consts::DLL_EXTENSION))
}

/// Find the module file inside a plugin directory
///
/// Tries `Plugin.<ext>`, then `<name>.<ext>`, then the `lib`-prefixed forms.
pub fn find_module(dir: &Path, name: &str) -> Option<PathBuf> {
    let ext = std::env::consts::DLL_EXTENSION;
    [
        format!("{}.{}", MODULE_STEM, ext),
        format!("{}.{}", name, ext),
        format!("lib{}.{}", MODULE_STEM, ext),
        format!("lib{}.{}", name, ext),
    ]
    .into_iter()
    .map(|file| dir.join(file))
    .find(|path| path.is_file())
}

/// Discover plugin directories under `root`, sorted by name
///
/// Directories without a module file are skipped.
pub fn discover(root: &Path) -> std::io::Result<Vec<DiscoveredPlugin>> {
    if !root.exists() {
        tracing::debug!(dir = %root.display(), "Plugin directory does not exist");
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let dir = entry?.path();
        if !dir.is_dir() {
            continue;
        }
        let Some(name) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };

        match find_module(&dir, &name) {
            Some(module) => found.push(DiscoveredPlugin { name, dir, module }),
            None => tracing::debug!(dir = %dir.display(), "No module file in plugin directory"),
        }
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

/// Regular files directly inside `dir`, sorted by path
pub fn files_in(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
