//! Ping Plugin - A simple example plugin for plume
//!
//! This plugin demonstrates:
//! - Declaring a plugin with `DeclaredPlugin` and exporting it with `export_module!`
//! - Implementing the lifecycle hooks (`on_load`, `on_enable`, `on_disable`, `on_unload`)
//! - Listeners for the built-in load/unload events and for a plugin-defined `Ping` event
//!
//! ## Building
//!
//! ```bash
//! cargo build --release
//! ```
//!
//! ## Installing
//!
//! ```bash
//! mkdir -p Plugins/Ping
//! cp target/release/libping_plugin.so Plugins/Ping/Plugin.so
//! plume enable Ping
//! ```

use plume_plugin_api::{
    DeclaredPlugin, HandlerSpec, Listener, Plugin, PluginContext, PluginDescriptor, PluginError,
    PluginLoadEvent, PluginUnloadEvent, export_module, impl_event,
};

/// Event answered by [`PingResponder`]
#[derive(Debug, Default)]
pub struct Ping {
    /// Incremented by every responder
    pub hops: u32,
    cancelled: bool,
}

impl_event!(Ping, "Ping");

/// A plugin that counts how often it was enabled.
#[derive(Default)]
pub struct PingPlugin {
    enabled_passes: u32,
}

impl Plugin for PingPlugin {
    fn on_load(&mut self, ctx: &PluginContext) -> Result<(), PluginError> {
        ctx.log_info(&format!("Ping plugin loaded from {}", ctx.plugin_dir().display()));
        Ok(())
    }

    fn on_enable(&mut self) -> Result<bool, PluginError> {
        self.enabled_passes += 1;
        Ok(true)
    }

    fn on_disable(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    fn on_unload(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}

impl DeclaredPlugin for PingPlugin {
    const DESCRIPTOR: PluginDescriptor = PluginDescriptor {
        name: "Ping",
        description: "Answers Ping events and watches other plugins come and go",
        version: "0.1.0",
        id: "{3C1F7B52-9A4E-4D0B-8F6A-2E5D1C9B7A40}",
        author: "plume",
        icon: "ping.png",
    };
}

/// Watches every plugin load and unload, even cancelled ones.
#[derive(Default)]
pub struct LifecycleAudit {
    seen: u32,
}

impl LifecycleAudit {
    fn on_load(&mut self, event: &mut PluginLoadEvent) -> Result<(), PluginError> {
        self.seen += 1;
        println!("[ping] loaded {} v{}", event.metadata.name, event.metadata.version);
        Ok(())
    }

    fn on_unload(&mut self, event: &mut PluginUnloadEvent) -> Result<(), PluginError> {
        println!("[ping] unloading {}", event.metadata.name);
        Ok(())
    }
}

impl Listener for LifecycleAudit {
    fn handlers() -> Vec<HandlerSpec<Self>> {
        vec![
            HandlerSpec::on(Self::on_load).ignore_cancelled(),
            HandlerSpec::on(Self::on_unload).ignore_cancelled(),
        ]
    }
}

#[derive(Default)]
pub struct PingResponder;

impl PingResponder {
    fn on_ping(&mut self, ping: &mut Ping) -> Result<(), PluginError> {
        ping.hops += 1;
        Ok(())
    }
}

impl Listener for PingResponder {
    fn handlers() -> Vec<HandlerSpec<Self>> {
        vec![HandlerSpec::on(Self::on_ping)]
    }
}

// This macro generates the C ABI entry points for dynamic loading
export_module! {
    plugins: [PingPlugin],
    listeners: [LifecycleAudit, PingResponder],
}
