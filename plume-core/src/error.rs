//! Error types for plume-core

use std::fmt;
use std::path::PathBuf;

use plume_plugin_api::{PluginError, PluginId};
use thiserror::Error;

/// Errors that abort loading a single module
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file is missing, is not a loadable library, or lacks the entry points
    #[error("Invalid module {path}: {reason}")]
    InvalidModule { path: PathBuf, reason: String },

    /// API version mismatch between host and module
    #[error("API version mismatch in {path}: host expects {expected}, module has {found}")]
    ApiVersionMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    /// No usable plugin declaration in the module
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// The plugin or one of its listeners could not be constructed
    #[error("Failed to activate '{name}': {reason}")]
    ActivationFailed { name: String, reason: String },

    /// A plugin with the same id is already loaded
    #[error("Plugin id {id} is already loaded as '{existing}'")]
    DuplicatePlugin { id: PluginId, existing: String },

    /// A previous context for this path has not been released yet
    #[error("Module {path} is still being unloaded (generation {generation})")]
    PathRetiring { path: PathBuf, generation: u64 },

    /// The plugin's load hook failed
    #[error(transparent)]
    HookFailed(#[from] HookFailure),

    /// A listener failed while the load event was dispatched
    #[error("Load event dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Errors from resolving a module's plugin declaration
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The module declares no plugin type
    #[error("No plugin declaration found in {path}")]
    NotFound { path: PathBuf },

    /// The module declares several plugin types and the policy rejects that
    #[error("{count} plugin declarations found in {path}")]
    Ambiguous { path: PathBuf, count: usize },

    /// The declared id is not a UUID
    #[error("Invalid plugin id '{id}' in {path}")]
    InvalidId {
        path: PathBuf,
        id: String,
        #[source]
        source: uuid::Error,
    },
}

/// Errors from unloading a plugin
#[derive(Error, Debug)]
pub enum UnloadError {
    /// The context was retired but something still references it.
    ///
    /// Advisory: the libraries close once the last reference is released.
    #[error("Load context for {path} (generation {generation}) still has {references} live reference(s)")]
    ContextStillLive {
        path: PathBuf,
        generation: u64,
        references: usize,
    },

    /// The plugin's unload hook failed
    #[error(transparent)]
    HookFailed(#[from] HookFailure),

    /// A listener failed while the unload event was dispatched
    #[error("Unload event dispatch for '{plugin}' failed: {source}")]
    Dispatch {
        plugin: String,
        #[source]
        source: DispatchError,
    },
}

/// Errors from reading or writing configuration files
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The flag file is not a JSON object of booleans
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The host config file is not valid TOML
    #[error("Failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that abort an event dispatch
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A handler returned an error
    #[error("Handler of plugin '{plugin}' for '{kind}' failed: {source}")]
    HandlerFailed {
        plugin: String,
        kind: String,
        #[source]
        source: PluginError,
    },

    /// A handler panicked
    #[error("Handler of plugin '{plugin}' for '{kind}' panicked")]
    HandlerPanicked { plugin: String, kind: String },
}

/// Lifecycle hook names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Load,
    Enable,
    Disable,
    Unload,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::Load => "on_load",
            Hook::Enable => "on_enable",
            Hook::Disable => "on_disable",
            Hook::Unload => "on_unload",
        };
        f.write_str(name)
    }
}

/// Why a hook failed
#[derive(Debug)]
pub enum HookCause {
    /// The hook returned an error
    Error(PluginError),
    /// The hook panicked
    Panicked,
}

impl fmt::Display for HookCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookCause::Error(e) => write!(f, "{}", e),
            HookCause::Panicked => f.write_str("panicked"),
        }
    }
}

/// A failed hook invocation on one plugin
#[derive(Error, Debug)]
#[error("Plugin '{plugin}' {hook} failed: {cause}")]
pub struct HookFailure {
    pub plugin: String,
    pub id: PluginId,
    pub hook: Hook,
    pub cause: HookCause,
}
