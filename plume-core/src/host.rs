//! PluginHost - manages plugin lifecycle and event dispatch

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use plume_plugin_api::module::PluginFactory;
use plume_plugin_api::{
    Event, HandlerRegistration, Plugin, PluginContext, PluginError, PluginId, PluginLoadEvent,
    PluginMetadata, PluginUnloadEvent,
};

use crate::bus::{self, EventBus};
use crate::config::PluginHostConfig;
use crate::context::{LoadContext, ModuleLoader, NativeLoader};
use crate::discovery;
use crate::error::{
    ConfigError, DispatchError, Hook, HookCause, HookFailure, LoadError, UnloadError,
};
use crate::flags::PluginFlags;
use crate::metadata;
use crate::registry::{PluginHandle, PluginInfo, PluginRegistry, PluginState, RegistryEntry};

/// Outcome of an enable or disable pass
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Plugins whose hook completed
    pub completed: Vec<PluginHandle>,
    /// Plugins whose `on_enable` returned false
    pub declined: Vec<PluginHandle>,
    /// Hooks that returned an error or panicked
    pub failures: Vec<HookFailure>,
}

impl BatchReport {
    /// True when no hook failed. Declining is not a failure.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of loading a directory of plugins
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<PluginHandle>,
    pub failed: Vec<(PathBuf, LoadError)>,
    /// Disabled by flag, or not a module file
    pub skipped: Vec<PathBuf>,
}

/// Plugin selector for [`PluginHost::set_enabled`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagTarget {
    Id(PluginId),
    Handle(PluginHandle),
}

impl From<PluginId> for FlagTarget {
    fn from(id: PluginId) -> Self {
        FlagTarget::Id(id)
    }
}

impl From<PluginHandle> for FlagTarget {
    fn from(handle: PluginHandle) -> Self {
        FlagTarget::Handle(handle)
    }
}

/// A context whose unload is waiting on outstanding references
struct RetiringContext {
    path: PathBuf,
    generation: u64,
    context: Weak<LoadContext>,
}

/// Everything guarded by the host lock
#[derive(Default)]
struct HostState {
    registry: PluginRegistry,
    bus: EventBus,
    retiring: Vec<RetiringContext>,
}

/// How far an activation got before it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Reached {
    /// In the registry, nothing announced yet
    Registered,
    /// `PluginLoadEvent` delivered
    Announced,
    /// `on_load` succeeded
    Loaded,
}

/// A module opened and resolved, not yet activated
struct Prepared {
    metadata: PluginMetadata,
    create: PluginFactory,
    context: Arc<LoadContext>,
}

/// The plugin host loads modules, drives plugins through their lifecycle and
/// dispatches events to the listeners they declare.
///
/// All operations take `&self`. Plugin hooks and event handlers never run
/// while the host lock is held, so they may call back into the host.
pub struct PluginHost {
    config: PluginHostConfig,
    loader: Box<dyn ModuleLoader>,
    state: Mutex<HostState>,
    generations: AtomicU64,
}

impl PluginHost {
    /// Create a host that loads modules from dynamic libraries
    pub fn new(config: PluginHostConfig) -> Self {
        Self::with_loader(config, NativeLoader)
    }

    /// Create a host with a custom module loader
    pub fn with_loader(config: PluginHostConfig, loader: impl ModuleLoader + 'static) -> Self {
        Self {
            config,
            loader: Box::new(loader),
            state: Mutex::new(HostState::default()),
            generations: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &PluginHostConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the module at `path` and bring its plugin up
    pub fn load(&self, path: impl AsRef<Path>) -> Result<PluginHandle, LoadError> {
        let prepared = self.prepare(path.as_ref())?;
        self.activate(prepared)
    }

    /// Load `path` only if `admit` accepts the resolved metadata.
    ///
    /// A refused module is released before any hook runs.
    fn load_admitted(
        &self,
        path: &Path,
        admit: impl Fn(&PluginMetadata) -> bool,
    ) -> Result<Option<PluginHandle>, LoadError> {
        let prepared = self.prepare(path)?;
        if !admit(&prepared.metadata) {
            tracing::debug!(
                plugin = %prepared.metadata.name,
                id = %prepared.metadata.id,
                "Plugin disabled, skipping"
            );
            self.release(prepared.context);
            return Ok(None);
        }
        self.activate(prepared).map(Some)
    }

    /// Open a load context for `path` and resolve its metadata
    fn prepare(&self, path: &Path) -> Result<Prepared, LoadError> {
        self.check_retiring(path)?;

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let context = Arc::new(self.loader.load(path, generation)?);

        let resolved = metadata::resolve(context.declaration(), path, self.config.ambiguity)
            .map(|(declaration, metadata)| (declaration.create, metadata));
        match resolved {
            Ok((create, metadata)) => Ok(Prepared {
                metadata,
                create,
                context,
            }),
            Err(e) => {
                self.release(context);
                Err(e.into())
            }
        }
    }

    fn check_retiring(&self, path: &Path) -> Result<(), LoadError> {
        let mut state = self.lock();
        state
            .retiring
            .retain(|retiring| retiring.context.strong_count() > 0);
        match state.retiring.iter().find(|retiring| retiring.path == path) {
            Some(retiring) => Err(LoadError::PathRetiring {
                path: path.to_path_buf(),
                generation: retiring.generation,
            }),
            None => Ok(()),
        }
    }

    fn activate(&self, prepared: Prepared) -> Result<PluginHandle, LoadError> {
        let Prepared {
            metadata,
            create,
            context,
        } = prepared;

        // 1. Instantiate
        let instance = match std::panic::catch_unwind(create) {
            Ok(Ok(instance)) => instance,
            Ok(Err(e)) => {
                self.release(context);
                return Err(LoadError::ActivationFailed {
                    name: metadata.name,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                self.release(context);
                return Err(LoadError::ActivationFailed {
                    name: metadata.name,
                    reason: "plugin constructor panicked".to_string(),
                });
            }
        };

        // 2. Register
        let entry = Arc::new(RegistryEntry::new(
            instance,
            metadata.clone(),
            Arc::clone(&context),
        ));
        let inserted = self.lock().registry.insert(Arc::clone(&entry));
        let handle = match inserted {
            Ok(handle) => handle,
            Err(e) => {
                drop(entry);
                self.release(context);
                return Err(e);
            }
        };
        drop(context);

        // 3. Announce, then run the load hook
        let mut event = PluginLoadEvent::new(metadata.clone());
        if let Err(e) = self.publish(&mut event) {
            self.roll_back(entry, Reached::Registered);
            return Err(e.into());
        }

        let plugin_context = PluginContext::new(metadata.clone());
        if let Err(failure) = self.call_hook(&entry, Hook::Load, |plugin| plugin.on_load(&plugin_context)) {
            self.roll_back(entry, Reached::Announced);
            return Err(failure.into());
        }

        // 4. Bind the module's listeners
        let registrations = match instantiate_listeners(&entry) {
            Ok(registrations) => registrations,
            Err(e) => {
                self.roll_back(entry, Reached::Loaded);
                return Err(e);
            }
        };
        let handlers = self
            .lock()
            .bus
            .register(&metadata, entry.context(), registrations);

        tracing::info!(
            plugin = %metadata.name,
            version = %metadata.version,
            id = %metadata.id,
            generation = handle.generation(),
            handlers,
            "Plugin loaded"
        );
        Ok(handle)
    }

    /// Undo a partially completed activation.
    ///
    /// Listeners that saw the load announcement also see a matching unload
    /// announcement; `on_unload` only runs after a successful `on_load`.
    fn roll_back(&self, entry: Arc<RegistryEntry>, reached: Reached) {
        let handle = entry.handle();
        tracing::debug!(plugin = %entry.metadata().name, ?reached, "Rolling back plugin load");

        if reached >= Reached::Announced {
            let mut event = PluginUnloadEvent::new(entry.metadata().clone());
            if let Err(e) = self.publish(&mut event) {
                tracing::warn!(plugin = %entry.metadata().name, error = %e, "Unload event failed during rollback");
            }
        }
        if reached == Reached::Loaded {
            if let Err(failure) = self.call_hook(&entry, Hook::Unload, |plugin| plugin.on_unload()) {
                tracing::warn!(error = %failure, "Unload hook failed during rollback");
            }
        }

        let removed = {
            let mut state = self.lock();
            state.bus.unregister(handle.id());
            state.registry.remove(&handle)
        };
        drop(removed);

        let context = Arc::clone(entry.context());
        drop(entry);
        self.release(context);
    }

    /// Drop the caller's reference to a context and record it if it outlives us
    fn release(&self, context: Arc<LoadContext>) {
        let path = context.path().to_path_buf();
        let generation = context.generation();
        let weak = Arc::downgrade(&context);

        if let Err(e) = context.unload() {
            tracing::warn!(error = %e, "Load context not released yet");
            self.lock().retiring.push(RetiringContext {
                path,
                generation,
                context: weak,
            });
        }
    }

    /// Unload a plugin. Unloading a plugin that is not loaded does nothing.
    pub fn unload(&self, handle: &PluginHandle) -> Result<(), UnloadError> {
        let Some(entry) = self.lock().registry.get(handle) else {
            tracing::debug!(handle = %handle, "Plugin not loaded, nothing to unload");
            return Ok(());
        };
        let metadata = entry.metadata().clone();

        // 1. Announce
        let mut event = PluginUnloadEvent::new(metadata.clone());
        self.publish(&mut event)
            .map_err(|source| UnloadError::Dispatch {
                plugin: metadata.name.clone(),
                source,
            })?;

        // 2. Listeners go before the hook runs
        let removed = self.lock().bus.unregister(metadata.id);
        tracing::debug!(plugin = %metadata.name, handlers = removed, "Removed plugin handlers");

        // 3. Hook
        self.call_hook(&entry, Hook::Unload, |plugin| plugin.on_unload())?;

        // 4. Retire the context, then drop the registry's hold on it
        entry.context().retire();
        let removed = self.lock().registry.remove(handle);
        drop(removed);

        let context = Arc::clone(entry.context());
        drop(entry);
        self.release(context);

        tracing::info!(plugin = %metadata.name, id = %metadata.id, "Plugin unloaded");
        Ok(())
    }

    /// Unload every plugin, most recently loaded first
    pub fn unload_all(&self) -> Vec<UnloadError> {
        let handles = self.list_all();
        let mut errors = Vec::new();

        for handle in handles.iter().rev() {
            if let Err(e) = self.unload(handle) {
                tracing::error!(handle = %handle, error = %e, "Failed to unload plugin");
                errors.push(e);
            }
        }
        errors
    }

    /// Run `on_enable` on every loaded plugin
    pub fn enable_all(&self) -> BatchReport {
        let mut report = BatchReport::default();

        for entry in self.entries() {
            let handle = entry.handle();
            match self.call_hook(&entry, Hook::Enable, |plugin| plugin.on_enable()) {
                Ok(true) => {
                    entry.set_state(PluginState::Enabled);
                    tracing::info!(plugin = %entry.metadata().name, "Plugin enabled");
                    report.completed.push(handle);
                }
                Ok(false) => {
                    entry.set_state(PluginState::Declined);
                    tracing::info!(plugin = %entry.metadata().name, "Plugin declined to enable");
                    report.declined.push(handle);
                }
                Err(failure) => {
                    tracing::error!(error = %failure, "Failed to enable plugin");
                    report.failures.push(failure);
                }
            }
        }
        report
    }

    /// Run `on_disable` on every loaded plugin
    pub fn disable_all(&self) -> BatchReport {
        let mut report = BatchReport::default();

        for entry in self.entries() {
            let handle = entry.handle();
            match self.call_hook(&entry, Hook::Disable, |plugin| plugin.on_disable()) {
                Ok(()) => {
                    entry.set_state(PluginState::Disabled);
                    tracing::info!(plugin = %entry.metadata().name, "Plugin disabled");
                    report.completed.push(handle);
                }
                Err(failure) => {
                    tracing::error!(error = %failure, "Failed to disable plugin");
                    report.failures.push(failure);
                }
            }
        }
        report
    }

    /// Live entries in load order
    fn entries(&self) -> Vec<Arc<RegistryEntry>> {
        self.lock()
            .registry
            .snapshot()
            .into_iter()
            .filter(|entry| entry.context().is_live())
            .collect()
    }

    /// Record whether a plugin is auto-loaded by discovery.
    ///
    /// Writes the plugin id and, for a loaded plugin, its module path. Takes
    /// effect on the next discovery pass.
    pub fn set_enabled(&self, target: impl Into<FlagTarget>, enabled: bool) -> Result<(), ConfigError> {
        let id = match target.into() {
            FlagTarget::Id(id) => id,
            FlagTarget::Handle(handle) => handle.id(),
        };
        let module_path = {
            let state = self.lock();
            state
                .registry
                .find_by_id(id)
                .and_then(|handle| state.registry.get(&handle))
                .map(|entry| entry.metadata().path.clone())
        };

        let flags_path = self.config.flags_path();
        let mut flags = PluginFlags::load(&flags_path)?;
        flags.set_id(id, enabled);
        if let Some(module_path) = module_path {
            flags.set(module_path.display().to_string(), enabled);
        }
        flags.save(&flags_path)?;

        tracing::info!(id = %id, enabled, file = %flags_path.display(), "Plugin flag updated");
        Ok(())
    }

    /// Load every module file directly inside `root`, ignoring flags
    pub fn load_all_from_directory(&self, root: impl AsRef<Path>) -> std::io::Result<LoadReport> {
        let mut report = LoadReport::default();
        for path in discovery::files_in(root.as_ref())? {
            if !discovery::is_module_file(&path) {
                tracing::debug!(path = %path.display(), "Not a module file, skipping");
                report.skipped.push(path);
                continue;
            }
            match self.load(&path) {
                Ok(handle) => report.loaded.push(handle),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to load plugin");
                    report.failed.push((path, e));
                }
            }
        }
        Ok(report)
    }

    /// Discover plugin directories under `root` and load the enabled ones
    ///
    /// A plugin is skipped when its module path, its directory name or its
    /// id is flagged false. Missing or unreadable flags mean enabled.
    pub fn load_all_enabled(&self, root: impl AsRef<Path>) -> std::io::Result<LoadReport> {
        let root = root.as_ref();
        let flags = PluginFlags::load_or_default(&self.config.flags_path_for(root));
        let mut report = LoadReport::default();

        for plugin in discovery::discover(root)? {
            let key = plugin.module.display().to_string();
            let enabled = flags
                .get(&key)
                .or_else(|| flags.get(&plugin.name))
                .unwrap_or(true);
            if !enabled {
                tracing::debug!(plugin = %plugin.name, "Plugin disabled, skipping");
                report.skipped.push(plugin.module);
                continue;
            }

            match self.load_admitted(&plugin.module, |metadata| flags.is_id_enabled(metadata.id)) {
                Ok(Some(handle)) => report.loaded.push(handle),
                Ok(None) => report.skipped.push(plugin.module),
                Err(e) => {
                    tracing::error!(plugin = %plugin.name, error = %e, "Failed to load plugin");
                    report.failed.push((plugin.module, e));
                }
            }
        }
        Ok(report)
    }

    /// Load the enabled plugins of the configured plugin directory
    pub fn load_all(&self) -> std::io::Result<LoadReport> {
        let root = self.config.plugin_dir.clone();
        self.load_all_enabled(root)
    }

    /// First loaded plugin with the given name
    pub fn find_by_name(&self, name: &str) -> Option<PluginHandle> {
        self.lock().registry.find(name)
    }

    pub fn find_by_id(&self, id: PluginId) -> Option<PluginHandle> {
        self.lock().registry.find_by_id(id)
    }

    /// Handles of all loaded plugins in load order
    pub fn list_all(&self) -> Vec<PluginHandle> {
        self.lock().registry.list()
    }

    pub fn metadata(&self, handle: &PluginHandle) -> Option<PluginMetadata> {
        self.lock()
            .registry
            .get(handle)
            .map(|entry| entry.metadata().clone())
    }

    pub fn plugin_info(&self, handle: &PluginHandle) -> Option<PluginInfo> {
        let state = self.lock();
        let entry = state.registry.get(handle)?;
        Some(PluginInfo {
            handle: *handle,
            metadata: entry.metadata().clone(),
            state: entry.state(),
            handlers: state.bus.handler_count(handle.id()),
        })
    }

    pub fn plugin_count(&self) -> usize {
        self.lock().registry.len()
    }

    /// Number of registered event handlers across all plugins
    pub fn listener_count(&self) -> usize {
        self.lock().bus.len()
    }

    /// Dispatch an event to every handler registered for its kind.
    ///
    /// Returns whether the event ended up cancelled. A handler that fails or
    /// panics stops the dispatch and its error is returned. Handlers may call
    /// back into the host; a listener that is already running further up the
    /// calling thread's stack is skipped for the nested event.
    pub fn publish(&self, event: &mut dyn Event) -> Result<bool, DispatchError> {
        let snapshot = self.lock().bus.snapshot(event.name());
        bus::dispatch(&snapshot, event)
    }

    /// Invoke a lifecycle hook with panic isolation and timing
    fn call_hook<T>(
        &self,
        entry: &RegistryEntry,
        hook: Hook,
        f: impl FnOnce(&mut Box<dyn Plugin>) -> Result<T, PluginError>,
    ) -> Result<T, HookFailure> {
        let metadata = entry.metadata();
        let started = Instant::now();
        let result = {
            let mut instance = entry.instance();
            std::panic::catch_unwind(AssertUnwindSafe(|| f(&mut instance)))
        };

        let elapsed = started.elapsed();
        if elapsed > self.config.slow_hook_threshold() {
            tracing::warn!(
                plugin = %metadata.name,
                hook = %hook,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow plugin hook"
            );
        }

        let cause = match result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => HookCause::Error(e),
            Err(_) => HookCause::Panicked,
        };
        tracing::warn!(plugin = %metadata.name, hook = %hook, error = %cause, "Plugin hook failed");
        Err(HookFailure {
            plugin: metadata.name.clone(),
            id: metadata.id,
            hook,
            cause,
        })
    }

    /// Drop every remaining plugin without running hooks
    fn force_clear(&self) {
        let (registry, bus) = {
            let mut state = self.lock();
            (
                std::mem::take(&mut state.registry),
                std::mem::take(&mut state.bus),
            )
        };
        if !registry.is_empty() {
            tracing::warn!(plugins = registry.len(), "Dropping plugins that failed to unload");
        }
        drop(bus);
        drop(registry);
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        let errors = self.unload_all();
        if !errors.is_empty() {
            tracing::warn!(errors = errors.len(), "Errors while unloading plugins at shutdown");
        }
        self.force_clear();
    }
}

/// Create every listener the entry's module declares, in declaration order
fn instantiate_listeners(entry: &RegistryEntry) -> Result<Vec<HandlerRegistration>, LoadError> {
    let mut registrations = Vec::new();
    for listener in &entry.context().declaration().listeners {
        match std::panic::catch_unwind(listener.instantiate) {
            Ok(handlers) => registrations.extend(handlers),
            Err(_) => {
                return Err(LoadError::ActivationFailed {
                    name: entry.metadata().name.clone(),
                    reason: format!("listener {} panicked on creation", listener.type_name),
                });
            }
        }
    }
    Ok(registrations)
}
