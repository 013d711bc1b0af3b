//! plume-plugin-api - Plugin API for the plume plugin host
//!
//! This crate provides the traits and types needed to write plugins for plume.
//! Plugins are native Rust dynamic libraries. Each library declares its plugin
//! type and any number of listener types, and the host discovers them through
//! the entry points generated by [`export_module!`].
//!
//! # Example
//!
//! ```ignore
//! use plume_plugin_api::{
//!     DeclaredPlugin, HandlerSpec, Listener, Plugin, PluginContext, PluginDescriptor,
//!     PluginError, PluginLoadEvent, export_module,
//! };
//!
//! #[derive(Default)]
//! pub struct MyPlugin;
//!
//! impl Plugin for MyPlugin {
//!     fn on_load(&mut self, ctx: &PluginContext) -> Result<(), PluginError> {
//!         ctx.log_info("Plugin loaded!");
//!         Ok(())
//!     }
//!
//!     fn on_unload(&mut self) -> Result<(), PluginError> {
//!         Ok(())
//!     }
//! }
//!
//! impl DeclaredPlugin for MyPlugin {
//!     const DESCRIPTOR: PluginDescriptor = PluginDescriptor {
//!         name: "my-plugin",
//!         description: "My custom plugin",
//!         version: "0.1.0",
//!         id: "{A93D168A-C410-48C3-92E8-86375503DBD3}",
//!         author: "me",
//!         icon: "",
//!     };
//! }
//!
//! #[derive(Default)]
//! pub struct LoadWatcher;
//!
//! impl LoadWatcher {
//!     fn on_plugin_load(&mut self, event: &mut PluginLoadEvent) -> Result<(), PluginError> {
//!         println!("loaded {}", event.metadata.name);
//!         Ok(())
//!     }
//! }
//!
//! impl Listener for LoadWatcher {
//!     fn handlers() -> Vec<HandlerSpec<Self>> {
//!         vec![HandlerSpec::on(Self::on_plugin_load)]
//!     }
//! }
//!
//! export_module! {
//!     plugins: [MyPlugin],
//!     listeners: [LoadWatcher],
//! }
//! ```

pub mod context;
pub mod error;
pub mod event;
pub mod listener;
pub mod module;
pub mod types;

pub use context::PluginContext;
pub use error::PluginError;
pub use event::{Event, EventKind, PluginLoadEvent, PluginUnloadEvent};
pub use listener::{EventHandler, HandlerRegistration, HandlerSpec, Listener, ListenerInstance};
pub use module::{ListenerDeclaration, ModuleDeclaration, PluginDeclaration};
pub use types::{PluginDescriptor, PluginId, PluginMetadata};

/// Current plugin API version. Modules must match this exactly.
/// This is checked when loading modules to ensure compatibility.
pub const API_VERSION: u32 = 1;

/// The core plugin trait - implement this to create a plume plugin.
///
/// The host calls these hooks as it moves the plugin through its lifecycle:
/// `on_load` once after loading, `on_enable`/`on_disable` on every enable or
/// disable pass, and `on_unload` once before the module is released.
pub trait Plugin: Send {
    /// Called once after the plugin is registered and its load event published.
    fn on_load(&mut self, ctx: &PluginContext) -> Result<(), PluginError>;

    /// Called on every enable pass. Return `false` to decline.
    fn on_enable(&mut self) -> Result<bool, PluginError> {
        Ok(true)
    }

    /// Called on every disable pass.
    fn on_disable(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called once before the module is unloaded. Use this to clean up resources.
    fn on_unload(&mut self) -> Result<(), PluginError>;
}

/// A plugin type that carries its declarative identity.
///
/// The host builds the instance through `Default`.
pub trait DeclaredPlugin: Plugin + Default + 'static {
    /// The plugin's declared identity
    const DESCRIPTOR: PluginDescriptor;
}
