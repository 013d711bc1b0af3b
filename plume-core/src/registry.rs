//! Plugin registry - the table of loaded plugin instances

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use plume_plugin_api::{Plugin, PluginId, PluginMetadata};

use crate::context::LoadContext;
use crate::error::LoadError;

/// Reference to a loaded plugin.
///
/// A plain value: holding a handle keeps no plugin code alive. Handles from
/// an earlier load of the same plugin stop matching once it is reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PluginHandle {
    id: PluginId,
    generation: u64,
}

impl PluginHandle {
    pub fn id(&self) -> PluginId {
        self.id
    }

    /// Generation of the load context the plugin came from
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.generation)
    }
}

/// Last lifecycle state a hook moved the plugin into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    /// Loaded, no enable or disable pass yet
    Loaded,
    /// `on_enable` returned true
    Enabled,
    /// `on_enable` returned false
    Declined,
    /// `on_disable` completed
    Disabled,
}

/// Information about a loaded plugin
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub handle: PluginHandle,
    pub metadata: PluginMetadata,
    pub state: PluginState,
    /// Number of listener handlers the plugin registered
    pub handlers: usize,
}

/// A registered plugin: its instance, metadata and the context that produced it
pub(crate) struct RegistryEntry {
    // Plugin code lives in `context`; the instance must drop first.
    instance: Mutex<Box<dyn Plugin>>,
    state: Mutex<PluginState>,
    metadata: PluginMetadata,
    context: Arc<LoadContext>,
}

impl RegistryEntry {
    pub(crate) fn new(
        instance: Box<dyn Plugin>,
        metadata: PluginMetadata,
        context: Arc<LoadContext>,
    ) -> Self {
        Self {
            instance: Mutex::new(instance),
            state: Mutex::new(PluginState::Loaded),
            metadata,
            context,
        }
    }

    pub(crate) fn handle(&self) -> PluginHandle {
        PluginHandle {
            id: self.metadata.id,
            generation: self.context.generation(),
        }
    }

    pub(crate) fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    pub(crate) fn context(&self) -> &Arc<LoadContext> {
        &self.context
    }

    pub(crate) fn instance(&self) -> MutexGuard<'_, Box<dyn Plugin>> {
        self.instance.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> PluginState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_state(&self, state: PluginState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

/// Loaded plugins in load order
#[derive(Default)]
pub struct PluginRegistry {
    entries: Vec<Arc<RegistryEntry>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; its metadata id must not already be registered
    pub(crate) fn insert(&mut self, entry: Arc<RegistryEntry>) -> Result<PluginHandle, LoadError> {
        let id = entry.metadata.id;
        if let Some(existing) = self.entries.iter().find(|e| e.metadata.id == id) {
            return Err(LoadError::DuplicatePlugin {
                id,
                existing: existing.metadata.name.clone(),
            });
        }
        let handle = entry.handle();
        self.entries.push(entry);
        Ok(handle)
    }

    /// Remove the entry a handle refers to
    pub(crate) fn remove(&mut self, handle: &PluginHandle) -> Option<Arc<RegistryEntry>> {
        let index = self.entries.iter().position(|e| e.handle() == *handle)?;
        Some(self.entries.remove(index))
    }

    /// Entry a handle refers to, if still registered
    pub(crate) fn get(&self, handle: &PluginHandle) -> Option<Arc<RegistryEntry>> {
        self.entries.iter().find(|e| e.handle() == *handle).cloned()
    }

    /// Entries in load order
    pub(crate) fn snapshot(&self) -> Vec<Arc<RegistryEntry>> {
        self.entries.clone()
    }

    /// First plugin (in load order) with the given name
    pub fn find(&self, name: &str) -> Option<PluginHandle> {
        self.entries
            .iter()
            .find(|e| e.metadata.name == name)
            .map(|e| e.handle())
    }

    /// Currently registered plugin with the given id
    pub fn find_by_id(&self, id: PluginId) -> Option<PluginHandle> {
        self.entries
            .iter()
            .find(|e| e.metadata.id == id)
            .map(|e| e.handle())
    }

    /// Handles of all plugins in load order
    pub fn list(&self) -> Vec<PluginHandle> {
        self.entries.iter().map(|e| e.handle()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
