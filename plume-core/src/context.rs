//! Load contexts - the isolation unit a module is loaded into
//!
//! A [`LoadContext`] owns the libraries of one module together with the
//! declaration they exported. Everything the module produces (the plugin
//! instance, listener handlers) holds an `Arc` to its context, so the
//! libraries stay mapped until the last of them is dropped. Unloading marks
//! the context retired and releases the registry's reference; the libraries
//! close when the reference count reaches zero.

use libloading::Library;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use plume_plugin_api::module::{API_VERSION_SYMBOL, DECLARE_SYMBOL};
use plume_plugin_api::{API_VERSION, ModuleDeclaration};

use crate::discovery::{files_in, is_module_file};
use crate::error::{LoadError, UnloadError};

/// Loads a module into a fresh [`LoadContext`]
pub trait ModuleLoader: Send + Sync {
    /// Load the module at `path`, stamping the context with `generation`
    fn load(&self, path: &Path, generation: u64) -> Result<LoadContext, LoadError>;
}

/// A loaded module and the libraries backing it
pub struct LoadContext {
    path: PathBuf,
    generation: u64,
    live: AtomicBool,
    // Holds function pointers into `libraries`; must drop first.
    declaration: ModuleDeclaration,
    libraries: Libraries,
}

enum Libraries {
    /// Dynamically opened main module and its co-loaded siblings
    Native(NativeLibraries),
    /// Code linked into the host binary
    Linked,
}

struct NativeLibraries {
    main: Option<Library>,
    siblings: Vec<Library>,
}

impl Drop for NativeLibraries {
    fn drop(&mut self) {
        // Close in reverse load order: main module, then siblings last to first
        drop(self.main.take());
        while let Some(library) = self.siblings.pop() {
            drop(library);
        }
    }
}

impl LoadContext {
    fn new(path: &Path, generation: u64, declaration: ModuleDeclaration, libraries: Libraries) -> Self {
        Self {
            path: path.to_path_buf(),
            generation,
            live: AtomicBool::new(true),
            declaration,
            libraries,
        }
    }

    /// Path of the main module
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// What the module exported
    pub fn declaration(&self) -> &ModuleDeclaration {
        &self.declaration
    }

    /// Whether the context has not been retired
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Whether the module was opened from a dynamic library
    pub fn is_native(&self) -> bool {
        matches!(self.libraries, Libraries::Native(_))
    }

    /// Number of co-loaded sibling libraries
    pub fn sibling_count(&self) -> usize {
        match &self.libraries {
            Libraries::Native(native) => native.siblings.len(),
            Libraries::Linked => 0,
        }
    }

    /// Mark the context retired. Returns `false` if it already was.
    pub fn retire(&self) -> bool {
        self.live.swap(false, Ordering::AcqRel)
    }

    /// Retire the context and release this reference to it.
    ///
    /// Succeeds when this was the last reference and the libraries were
    /// closed. Otherwise reports [`UnloadError::ContextStillLive`]; the
    /// libraries close when the remaining references drop.
    pub fn unload(self: Arc<Self>) -> Result<(), UnloadError> {
        self.retire();
        match Arc::try_unwrap(self) {
            Ok(context) => {
                tracing::debug!(
                    path = %context.path.display(),
                    generation = context.generation,
                    "Load context released"
                );
                drop(context);
                Ok(())
            }
            Err(shared) => Err(UnloadError::ContextStillLive {
                path: shared.path.clone(),
                generation: shared.generation,
                references: Arc::strong_count(&shared) - 1,
            }),
        }
    }
}

impl std::fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadContext")
            .field("path", &self.path)
            .field("generation", &self.generation)
            .field("live", &self.is_live())
            .field("native", &self.is_native())
            .finish_non_exhaustive()
    }
}

fn check_api_version(path: &Path, found: u32) -> Result<(), LoadError> {
    if found != API_VERSION {
        return Err(LoadError::ApiVersionMismatch {
            path: path.to_path_buf(),
            expected: API_VERSION,
            found,
        });
    }
    Ok(())
}

/// Loads modules from dynamic libraries
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

impl NativeLoader {
    /// Libraries next to `path` (excluding `path`), sorted by name
    fn sibling_paths(path: &Path) -> Vec<PathBuf> {
        let Some(dir) = path.parent() else {
            return Vec::new();
        };
        match files_in(dir) {
            Ok(files) => files
                .into_iter()
                .filter(|p| is_module_file(p) && p.file_name() != path.file_name())
                .collect(),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Cannot list plugin directory");
                Vec::new()
            }
        }
    }

    /// Load every sibling library of `path` in name order.
    ///
    /// Siblings that fail to load are skipped.
    fn load_siblings(path: &Path) -> Vec<Library> {
        Self::sibling_paths(path)
            .into_iter()
            .filter_map(|sibling| {
                // SAFETY: siblings are part of the plugin package the user installed.
                match unsafe { Library::new(&sibling) } {
                    Ok(library) => {
                        tracing::debug!(path = %sibling.display(), "Loaded sibling library");
                        Some(library)
                    }
                    Err(e) => {
                        tracing::warn!(path = %sibling.display(), error = %e, "Skipping sibling library");
                        None
                    }
                }
            })
            .collect()
    }
}

impl ModuleLoader for NativeLoader {
    fn load(&self, path: &Path, generation: u64) -> Result<LoadContext, LoadError> {
        let invalid = |reason: String| LoadError::InvalidModule {
            path: path.to_path_buf(),
            reason,
        };

        if !path.is_file() {
            return Err(invalid("file not found".to_string()));
        }

        // 1. Dependencies inside the plugin package resolve before the module itself
        let siblings = Self::load_siblings(path);

        // 2. Load the main module
        // SAFETY: We're loading a plugin module that the user installed.
        // The module is expected to follow the export_module! contract.
        let main = unsafe { Library::new(path) }.map_err(|e| invalid(e.to_string()))?;

        // 3. Check API version, then take the declaration
        let declaration = {
            // SAFETY: the symbols are generated by export_module! with these signatures.
            let api_version_fn: libloading::Symbol<extern "C" fn() -> u32> =
                unsafe { main.get(API_VERSION_SYMBOL) }.map_err(|e| invalid(e.to_string()))?;
            check_api_version(path, api_version_fn())?;

            let declare_fn: libloading::Symbol<extern "C" fn() -> *mut ModuleDeclaration> =
                unsafe { main.get(DECLARE_SYMBOL) }.map_err(|e| invalid(e.to_string()))?;
            let raw = declare_fn();
            if raw.is_null() {
                return Err(invalid("module returned no declaration".to_string()));
            }
            // SAFETY: export_module! hands over a Box it leaked with into_raw.
            *unsafe { Box::from_raw(raw) }
        };

        tracing::debug!(
            path = %path.display(),
            generation,
            siblings = siblings.len(),
            "Module loaded"
        );

        Ok(LoadContext::new(
            path,
            generation,
            declaration,
            Libraries::Native(NativeLibraries {
                main: Some(main),
                siblings,
            }),
        ))
    }
}

/// Entry point of a module linked into the host
pub type LinkedModule = fn() -> ModuleDeclaration;

/// Loads modules that are linked into the host binary, keyed by path.
///
/// Used by embedders that ship plugins statically and by tests. The path
/// only names the module; nothing is read from disk.
#[derive(Debug, Default, Clone)]
pub struct StaticLoader {
    modules: HashMap<PathBuf, LinkedModule>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under `path`
    pub fn register(&mut self, path: impl Into<PathBuf>, module: LinkedModule) {
        self.modules.insert(path.into(), module);
    }

    /// Builder: register a module under `path`
    pub fn with_module(mut self, path: impl Into<PathBuf>, module: LinkedModule) -> Self {
        self.register(path, module);
        self
    }
}

impl ModuleLoader for StaticLoader {
    fn load(&self, path: &Path, generation: u64) -> Result<LoadContext, LoadError> {
        let module = self
            .modules
            .get(path)
            .ok_or_else(|| LoadError::InvalidModule {
                path: path.to_path_buf(),
                reason: "no linked module registered for this path".to_string(),
            })?;

        let declaration = module();
        check_api_version(path, declaration.api_version)?;

        Ok(LoadContext::new(path, generation, declaration, Libraries::Linked))
    }
}
