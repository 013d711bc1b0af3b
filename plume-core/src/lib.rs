//! plume-core: the plume plugin host
//!
//! This crate loads plugin modules, drives them through their lifecycle and
//! dispatches events to the listeners they declare:
//!
//! - **Lifecycle** - [`PluginHost`] loads, enables, disables and unloads plugins
//! - **Load contexts** - [`LoadContext`] owns a module's libraries; [`ModuleLoader`]
//!   opens them ([`NativeLoader`] for dynamic libraries, [`StaticLoader`] for linked code)
//! - **Registry** - [`PluginRegistry`] maps [`PluginHandle`]s to live instances
//! - **Event bus** - [`EventBus`] runs handlers in registration order with cancellation
//! - **Discovery and flags** - [`discovery`] walks the plugin root, [`PluginFlags`]
//!   persists `Plugins.json`
//!
//! # Quick Start
//!
//! ```no_run
//! use plume_core::{PluginHost, PluginHostConfig};
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let host = PluginHost::new(PluginHostConfig::for_dir("Plugins"));
//!     let report = host.load_all()?;
//!     println!("{} plugin(s) loaded", report.loaded.len());
//!
//!     let enabled = host.enable_all();
//!     for failure in &enabled.failures {
//!         eprintln!("{}", failure);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                   PluginHost                     │
//! │  ┌────────────────┐        ┌──────────────────┐  │
//! │  │ PluginRegistry │        │     EventBus     │  │
//! │  │  entry ──┐     │        │  registration ─┐ │  │
//! │  └──────────┼─────┘        └────────────────┼─┘  │
//! │             ▼                               ▼    │
//! │        ┌──────────────────────────────────────┐  │
//! │        │ LoadContext (libraries, declaration) │  │
//! │        └──────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod bus;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod flags;
pub mod host;
pub mod metadata;
pub mod registry;

// Re-export key types for convenience
pub use bus::EventBus;
pub use config::PluginHostConfig;
pub use context::{LinkedModule, LoadContext, ModuleLoader, NativeLoader, StaticLoader};
pub use discovery::DiscoveredPlugin;
pub use error::{
    ConfigError, DispatchError, Hook, HookCause, HookFailure, LoadError, MetadataError, UnloadError,
};
pub use flags::PluginFlags;
pub use host::{BatchReport, FlagTarget, LoadReport, PluginHost};
pub use metadata::AmbiguityPolicy;
pub use registry::{PluginHandle, PluginInfo, PluginRegistry, PluginState};
