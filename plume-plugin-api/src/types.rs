//! Plugin identity types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// Globally unique plugin identifier.
///
/// Parses every textual UUID form, so `{A93D168A-C410-48C3-92E8-86375503DBD3}`
/// and `a93d168a-c410-48c3-92e8-86375503dbd3` name the same plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(Uuid);

impl PluginId {
    /// Parse an id from any UUID text form
    pub fn parse(text: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(text.trim()).map(Self)
    }

    /// Wrap an existing UUID
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for PluginId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Declarative identity a plugin type carries.
///
/// Declared as an associated const on [`crate::DeclaredPlugin`]. The strings
/// live in the plugin library, so the host copies them into
/// [`PluginMetadata`] as soon as the module is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginDescriptor {
    /// Plugin name (used for lookups)
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Version string
    pub version: &'static str,
    /// Unique id, any UUID text form
    pub id: &'static str,
    /// Plugin author
    pub author: &'static str,
    /// Icon reference (path or resource name), empty if none
    pub icon: &'static str,
}

/// Resolved, owned identity of a loaded plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Plugin name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Version string
    pub version: String,
    /// Unique id
    pub id: PluginId,
    /// Plugin author
    pub author: String,
    /// Icon reference
    pub icon: String,
    /// Path of the module the plugin was loaded from
    pub path: PathBuf,
}

impl PluginMetadata {
    /// Build metadata from a descriptor whose id has already been parsed
    pub fn from_descriptor(descriptor: &PluginDescriptor, id: PluginId, path: &Path) -> Self {
        Self {
            name: descriptor.name.to_string(),
            description: descriptor.description.to_string(),
            version: descriptor.version.to_string(),
            id,
            author: descriptor.author.to_string(),
            icon: descriptor.icon.to_string(),
            path: path.to_path_buf(),
        }
    }

    /// Directory the plugin module was loaded from
    pub fn plugin_dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }
}
