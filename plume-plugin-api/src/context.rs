//! PluginContext - what the host hands a plugin when it loads

use std::path::Path;

use crate::types::PluginMetadata;

/// Plugin's view of itself at load time.
///
/// Passed to [`Plugin::on_load`](crate::Plugin::on_load). Provides:
/// - The plugin's resolved metadata
/// - The plugin directory for storing data
/// - Logging utilities
pub struct PluginContext {
    metadata: PluginMetadata,
}

impl PluginContext {
    /// Create a new plugin context
    pub fn new(metadata: PluginMetadata) -> Self {
        Self { metadata }
    }

    /// Get the plugin's resolved metadata
    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    /// Get the plugin's name
    pub fn plugin_name(&self) -> &str {
        &self.metadata.name
    }

    /// Get the plugin's directory (where its module and data files live)
    pub fn plugin_dir(&self) -> &Path {
        self.metadata.plugin_dir()
    }

    // ─── Logging ─────────────────────────────────────────────────────

    /// Log an info message (automatically prefixed with plugin name)
    pub fn log_info(&self, message: &str) {
        tracing::info!(plugin = %self.metadata.name, "{}", message);
    }

    /// Log a warning message
    pub fn log_warn(&self, message: &str) {
        tracing::warn!(plugin = %self.metadata.name, "{}", message);
    }

    /// Log an error message
    pub fn log_error(&self, message: &str) {
        tracing::error!(plugin = %self.metadata.name, "{}", message);
    }

    /// Log a debug message
    pub fn log_debug(&self, message: &str) {
        tracing::debug!(plugin = %self.metadata.name, "{}", message);
    }
}
