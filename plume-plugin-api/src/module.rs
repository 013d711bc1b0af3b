//! Module declarations: what a plugin library exports to the host.
//!
//! Every plugin library exports two C symbols, generated by
//! [`export_module!`](crate::export_module):
//!
//! - `_plume_module_api_version()`: the [`API_VERSION`](crate::API_VERSION) it was built against
//! - `_plume_module_declare()`: a boxed [`ModuleDeclaration`] listing its plugin
//!   types and listener types in declaration order

use crate::error::PluginError;
use crate::listener::{self, HandlerRegistration, Listener};
use crate::types::PluginDescriptor;
use crate::{DeclaredPlugin, Plugin};

/// Symbol exporting the API version
pub const API_VERSION_SYMBOL: &[u8] = b"_plume_module_api_version";

/// Symbol exporting the module declaration
pub const DECLARE_SYMBOL: &[u8] = b"_plume_module_declare";

/// Constructor for a plugin instance
pub type PluginFactory = fn() -> Result<Box<dyn Plugin>, PluginError>;

/// Constructor for a listener's bound handlers
pub type ListenerFactory = fn() -> Vec<HandlerRegistration>;

/// A plugin type exported by a module
#[derive(Clone)]
pub struct PluginDeclaration {
    /// Declared identity
    pub descriptor: PluginDescriptor,
    /// Rust type name, for diagnostics
    pub type_name: &'static str,
    /// Instance constructor
    pub create: PluginFactory,
}

impl PluginDeclaration {
    /// Declaration for a type carrying its descriptor as an associated const
    pub fn of<P: DeclaredPlugin>() -> Self {
        Self {
            descriptor: P::DESCRIPTOR,
            type_name: std::any::type_name::<P>(),
            create: create_default::<P>,
        }
    }
}

impl std::fmt::Debug for PluginDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDeclaration")
            .field("descriptor", &self.descriptor)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

fn create_default<P: DeclaredPlugin>() -> Result<Box<dyn Plugin>, PluginError> {
    Ok(Box::new(P::default()))
}

/// A listener type exported by a module
#[derive(Debug, Clone)]
pub struct ListenerDeclaration {
    /// Rust type name, for diagnostics
    pub type_name: &'static str,
    /// Creates the listener and binds its handlers
    pub instantiate: ListenerFactory,
}

impl ListenerDeclaration {
    pub fn of<L: Listener>() -> Self {
        Self {
            type_name: std::any::type_name::<L>(),
            instantiate: listener::instantiate::<L>,
        }
    }
}

/// Everything a module exports
#[derive(Debug, Clone)]
pub struct ModuleDeclaration {
    /// API version the module was built against
    pub api_version: u32,
    /// Plugin types in declaration order
    pub plugins: Vec<PluginDeclaration>,
    /// Listener types in declaration order
    pub listeners: Vec<ListenerDeclaration>,
}

impl ModuleDeclaration {
    pub fn new() -> Self {
        Self {
            api_version: crate::API_VERSION,
            plugins: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Builder: append a plugin type
    pub fn plugin<P: DeclaredPlugin>(mut self) -> Self {
        self.plugins.push(PluginDeclaration::of::<P>());
        self
    }

    /// Builder: append a plugin declaration with a custom constructor
    pub fn plugin_declaration(mut self, declaration: PluginDeclaration) -> Self {
        self.plugins.push(declaration);
        self
    }

    /// Builder: append a listener type
    pub fn listener<L: Listener>(mut self) -> Self {
        self.listeners.push(ListenerDeclaration::of::<L>());
        self
    }
}

impl Default for ModuleDeclaration {
    fn default() -> Self {
        Self::new()
    }
}

/// Export a module's plugin and listener types for dynamic loading.
///
/// # Usage
///
/// ```ignore
/// plume_plugin_api::export_module! {
///     plugins: [TestPlugin],
///     listeners: [Audit, PingResponder],
/// }
/// ```
///
/// # Generated Functions
///
/// - `_plume_module_api_version()`: Returns the API version
/// - `_plume_module_declare()`: Returns a boxed [`ModuleDeclaration`]; the host takes ownership
#[macro_export]
macro_rules! export_module {
    (
        plugins: [$($plugin:ty),* $(,)?]
        $(, listeners: [$($listener:ty),* $(,)?])?
        $(,)?
    ) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn _plume_module_api_version() -> u32 {
            $crate::API_VERSION
        }

        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn _plume_module_declare() -> *mut $crate::ModuleDeclaration {
            let declaration = $crate::ModuleDeclaration::new()
                $(.plugin::<$plugin>())*
                $($(.listener::<$listener>())*)?;
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(declaration))
        }
    };
}
