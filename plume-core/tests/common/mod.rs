//! Shared fixtures for host integration tests
//!
//! Plugins and listeners here are linked into the test binary and served
//! through `StaticLoader`. Hooks and handlers append to a per-thread journal
//! so a test can assert the exact order in which the host called them.
#![allow(dead_code)]

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::{Arc, Barrier, LazyLock, Weak};

use plume_core::{PluginHandle, PluginHost, PluginHostConfig, StaticLoader};
use plume_plugin_api::{
    DeclaredPlugin, Event, HandlerSpec, Listener, ModuleDeclaration, Plugin, PluginContext,
    PluginDescriptor, PluginError, PluginLoadEvent, PluginUnloadEvent, impl_event,
};

pub const G1: &str = "{6F1E4C2A-0B1D-4E5F-8A9B-000000000001}";
pub const G2: &str = "{6F1E4C2A-0B1D-4E5F-8A9B-000000000002}";

// ─── Journal ─────────────────────────────────────────────────────────

thread_local! {
    static JOURNAL: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

pub fn record(entry: impl Into<String>) {
    JOURNAL.with(|journal| journal.borrow_mut().push(entry.into()));
}

/// Drain the journal of the current thread
pub fn take_journal() -> Vec<String> {
    JOURNAL.with(|journal| std::mem::take(&mut *journal.borrow_mut()))
}

// ─── Host slot ───────────────────────────────────────────────────────

thread_local! {
    static CURRENT_HOST: RefCell<Weak<PluginHost>> = const { RefCell::new(Weak::new()) };
}

/// Make `host` reachable from hooks and handlers running on this thread
pub fn set_current_host(host: &Arc<PluginHost>) {
    CURRENT_HOST.with(|slot| *slot.borrow_mut() = Arc::downgrade(host));
}

fn current_host() -> Result<Arc<PluginHost>, PluginError> {
    CURRENT_HOST
        .with(|slot| slot.borrow().upgrade())
        .ok_or_else(|| PluginError::custom("no host bound to this thread"))
}

// ─── Events ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Ping {
    pub trail: Vec<String>,
    cancelled: bool,
}
impl_event!(Ping, "Ping");

/// Event whose handler blocks on [`HOLD_GATE`]
#[derive(Debug, Default)]
pub struct Hold {
    cancelled: bool,
}
impl_event!(Hold, "Hold");

/// Asks [`RelayListener`] to load and/or unload a plugin from inside its handler
#[derive(Debug, Default)]
pub struct Relay {
    pub load: Option<PathBuf>,
    pub unload: Option<PluginHandle>,
    cancelled: bool,
}
impl_event!(Relay, "Relay");

impl Relay {
    pub fn loading(path: PathBuf) -> Self {
        Self {
            load: Some(path),
            ..Self::default()
        }
    }

    pub fn unloading(handle: PluginHandle) -> Self {
        Self {
            unload: Some(handle),
            ..Self::default()
        }
    }
}

// ─── Plugins ─────────────────────────────────────────────────────────

macro_rules! journaled_plugin {
    ($ty:ident, $name:literal, $id:expr) => {
        #[derive(Default)]
        pub struct $ty;

        impl Plugin for $ty {
            fn on_load(&mut self, ctx: &PluginContext) -> Result<(), PluginError> {
                record(format!("{}:on_load", ctx.plugin_name()));
                Ok(())
            }

            fn on_enable(&mut self) -> Result<bool, PluginError> {
                record(concat!($name, ":on_enable"));
                Ok(true)
            }

            fn on_disable(&mut self) -> Result<(), PluginError> {
                record(concat!($name, ":on_disable"));
                Ok(())
            }

            fn on_unload(&mut self) -> Result<(), PluginError> {
                record(concat!($name, ":on_unload"));
                Ok(())
            }
        }

        impl DeclaredPlugin for $ty {
            const DESCRIPTOR: PluginDescriptor = descriptor($name, $id);
        }
    };
}

pub const fn descriptor(name: &'static str, id: &'static str) -> PluginDescriptor {
    PluginDescriptor {
        name,
        description: "integration fixture",
        version: "1.0.0",
        id,
        author: "plume tests",
        icon: "",
    }
}

journaled_plugin!(PluginA, "A", G1);
journaled_plugin!(PluginB, "B", G2);
journaled_plugin!(Observer, "Observer", "{6F1E4C2A-0B1D-4E5F-8A9B-000000000003}");
journaled_plugin!(Canceller, "Canceller", "{6F1E4C2A-0B1D-4E5F-8A9B-000000000004}");
journaled_plugin!(Late, "Late", "{6F1E4C2A-0B1D-4E5F-8A9B-000000000005}");
journaled_plugin!(Holder, "Holder", "{6F1E4C2A-0B1D-4E5F-8A9B-000000000006}");
journaled_plugin!(Impostor, "Impostor", G1);
journaled_plugin!(RelayPlugin, "Relay", "{6F1E4C2A-0B1D-4E5F-8A9B-00000000000B}");
journaled_plugin!(Broken, "Broken", "{6F1E4C2A-0B1D-4E5F-8A9B-00000000000C}");

#[derive(Default)]
pub struct FailingLoad;

impl Plugin for FailingLoad {
    fn on_load(&mut self, _ctx: &PluginContext) -> Result<(), PluginError> {
        record("FailingLoad:on_load");
        Err(PluginError::custom("refusing to start"))
    }

    fn on_unload(&mut self) -> Result<(), PluginError> {
        record("FailingLoad:on_unload");
        Ok(())
    }
}

impl DeclaredPlugin for FailingLoad {
    const DESCRIPTOR: PluginDescriptor =
        descriptor("FailingLoad", "{6F1E4C2A-0B1D-4E5F-8A9B-000000000007}");
}

#[derive(Default)]
pub struct PanicsOnEnable;

impl Plugin for PanicsOnEnable {
    fn on_load(&mut self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    fn on_enable(&mut self) -> Result<bool, PluginError> {
        panic!("enable bug");
    }

    fn on_unload(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}

impl DeclaredPlugin for PanicsOnEnable {
    const DESCRIPTOR: PluginDescriptor =
        descriptor("PanicsOnEnable", "{6F1E4C2A-0B1D-4E5F-8A9B-000000000008}");
}

#[derive(Default)]
pub struct Decliner;

impl Plugin for Decliner {
    fn on_load(&mut self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    fn on_enable(&mut self) -> Result<bool, PluginError> {
        record("Decliner:on_enable");
        Ok(false)
    }

    fn on_unload(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}

impl DeclaredPlugin for Decliner {
    const DESCRIPTOR: PluginDescriptor =
        descriptor("Decliner", "{6F1E4C2A-0B1D-4E5F-8A9B-000000000009}");
}

#[derive(Default)]
pub struct StubbornUnload;

impl Plugin for StubbornUnload {
    fn on_load(&mut self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    fn on_unload(&mut self) -> Result<(), PluginError> {
        Err(PluginError::custom("still busy"))
    }
}

impl DeclaredPlugin for StubbornUnload {
    const DESCRIPTOR: PluginDescriptor =
        descriptor("StubbornUnload", "{6F1E4C2A-0B1D-4E5F-8A9B-00000000000A}");
}

/// Publishes a `Ping` from its unload hook and journals who answered
#[derive(Default)]
pub struct EchoOnUnload;

impl Plugin for EchoOnUnload {
    fn on_load(&mut self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    fn on_unload(&mut self) -> Result<(), PluginError> {
        let host = current_host()?;
        let mut ping = Ping::default();
        host.publish(&mut ping)
            .map_err(|e| PluginError::custom(e.to_string()))?;
        record(format!("Echo:on_unload:{}", ping.trail.join(",")));
        Ok(())
    }
}

impl DeclaredPlugin for EchoOnUnload {
    const DESCRIPTOR: PluginDescriptor =
        descriptor("Echo", "{6F1E4C2A-0B1D-4E5F-8A9B-00000000000D}");
}

// ─── Listeners ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct PingLogA;

impl PingLogA {
    fn on_ping(&mut self, ping: &mut Ping) -> Result<(), PluginError> {
        ping.trail.push("A".to_string());
        Ok(())
    }

    fn on_unload(&mut self, event: &mut PluginUnloadEvent) -> Result<(), PluginError> {
        record(format!("A:saw-unload:{}", event.metadata.name));
        Ok(())
    }
}

impl Listener for PingLogA {
    fn handlers() -> Vec<HandlerSpec<Self>> {
        vec![
            HandlerSpec::on(Self::on_ping),
            HandlerSpec::on(Self::on_unload),
        ]
    }
}

#[derive(Default)]
pub struct PingLogB;

impl PingLogB {
    fn on_ping(&mut self, ping: &mut Ping) -> Result<(), PluginError> {
        ping.trail.push("B".to_string());
        Ok(())
    }
}

impl Listener for PingLogB {
    fn handlers() -> Vec<HandlerSpec<Self>> {
        vec![HandlerSpec::on(Self::on_ping)]
    }
}

/// Records every load and unload announcement
#[derive(Default)]
pub struct LifecycleWatcher;

impl LifecycleWatcher {
    fn on_load(&mut self, event: &mut PluginLoadEvent) -> Result<(), PluginError> {
        record(format!("Observer:load-event:{}", event.metadata.name));
        Ok(())
    }

    fn on_unload(&mut self, event: &mut PluginUnloadEvent) -> Result<(), PluginError> {
        record(format!("Observer:unload-event:{}", event.metadata.name));
        Ok(())
    }
}

impl Listener for LifecycleWatcher {
    fn handlers() -> Vec<HandlerSpec<Self>> {
        vec![
            HandlerSpec::on(Self::on_load),
            HandlerSpec::on(Self::on_unload),
        ]
    }
}

#[derive(Default)]
pub struct PingCanceller;

impl PingCanceller {
    fn on_ping(&mut self, ping: &mut Ping) -> Result<(), PluginError> {
        ping.trail.push("cancel".to_string());
        ping.cancel();
        Ok(())
    }
}

impl Listener for PingCanceller {
    fn handlers() -> Vec<HandlerSpec<Self>> {
        vec![HandlerSpec::on(Self::on_ping)]
    }
}

#[derive(Default)]
pub struct LateListener;

impl LateListener {
    fn on_ping(&mut self, ping: &mut Ping) -> Result<(), PluginError> {
        ping.trail.push("late".to_string());
        Ok(())
    }

    fn on_ping_always(&mut self, ping: &mut Ping) -> Result<(), PluginError> {
        ping.trail.push("always".to_string());
        Ok(())
    }
}

impl Listener for LateListener {
    fn handlers() -> Vec<HandlerSpec<Self>> {
        vec![
            HandlerSpec::on(Self::on_ping),
            HandlerSpec::on(Self::on_ping_always).ignore_cancelled(),
        ]
    }
}

/// Rendezvous for [`HoldListener`]: once when the handler starts, once to let it finish
pub static HOLD_GATE: LazyLock<Barrier> = LazyLock::new(|| Barrier::new(2));

#[derive(Default)]
pub struct HoldListener;

impl HoldListener {
    fn on_hold(&mut self, _event: &mut Hold) -> Result<(), PluginError> {
        HOLD_GATE.wait();
        HOLD_GATE.wait();
        Ok(())
    }
}

impl Listener for HoldListener {
    fn handlers() -> Vec<HandlerSpec<Self>> {
        vec![HandlerSpec::on(Self::on_hold)]
    }
}

#[derive(Default)]
pub struct FailingListener;

impl FailingListener {
    fn on_ping(&mut self, _ping: &mut Ping) -> Result<(), PluginError> {
        Err(PluginError::custom("ping rejected"))
    }
}

impl Listener for FailingListener {
    fn handlers() -> Vec<HandlerSpec<Self>> {
        vec![HandlerSpec::on(Self::on_ping)]
    }
}

/// Loads and unloads plugins from inside a handler, and watches lifecycle events
#[derive(Default)]
pub struct RelayListener;

impl RelayListener {
    fn on_relay(&mut self, relay: &mut Relay) -> Result<(), PluginError> {
        let host = current_host()?;
        if let Some(path) = relay.load.take() {
            host.load(&path)
                .map_err(|e| PluginError::custom(e.to_string()))?;
            record("Relay:loaded");
        }
        if let Some(handle) = relay.unload.take() {
            host.unload(&handle)
                .map_err(|e| PluginError::custom(e.to_string()))?;
            record("Relay:unloaded");
        }
        Ok(())
    }

    fn on_load(&mut self, event: &mut PluginLoadEvent) -> Result<(), PluginError> {
        record(format!("Relay:saw-load:{}", event.metadata.name));
        Ok(())
    }

    fn on_unload(&mut self, event: &mut PluginUnloadEvent) -> Result<(), PluginError> {
        record(format!("Relay:saw-unload:{}", event.metadata.name));
        Ok(())
    }
}

impl Listener for RelayListener {
    fn handlers() -> Vec<HandlerSpec<Self>> {
        vec![
            HandlerSpec::on(Self::on_relay),
            HandlerSpec::on(Self::on_load),
            HandlerSpec::on(Self::on_unload),
        ]
    }
}

#[derive(Default)]
pub struct PingEcho;

impl PingEcho {
    fn on_ping(&mut self, ping: &mut Ping) -> Result<(), PluginError> {
        ping.trail.push("Echo".to_string());
        Ok(())
    }
}

impl Listener for PingEcho {
    fn handlers() -> Vec<HandlerSpec<Self>> {
        vec![HandlerSpec::on(Self::on_ping)]
    }
}

/// A listener whose construction panics
pub struct BrokenListener;

impl Default for BrokenListener {
    fn default() -> Self {
        panic!("listener cannot start");
    }
}

impl Listener for BrokenListener {
    fn handlers() -> Vec<HandlerSpec<Self>> {
        Vec::new()
    }
}

// ─── Modules ─────────────────────────────────────────────────────────

pub fn module_a() -> ModuleDeclaration {
    ModuleDeclaration::new().plugin::<PluginA>().listener::<PingLogA>()
}

pub fn module_b() -> ModuleDeclaration {
    ModuleDeclaration::new().plugin::<PluginB>().listener::<PingLogB>()
}

pub fn module_observer() -> ModuleDeclaration {
    ModuleDeclaration::new()
        .plugin::<Observer>()
        .listener::<LifecycleWatcher>()
}

pub fn module_canceller() -> ModuleDeclaration {
    ModuleDeclaration::new()
        .plugin::<Canceller>()
        .listener::<PingCanceller>()
}

pub fn module_late() -> ModuleDeclaration {
    ModuleDeclaration::new().plugin::<Late>().listener::<LateListener>()
}

pub fn module_holder() -> ModuleDeclaration {
    ModuleDeclaration::new().plugin::<Holder>().listener::<HoldListener>()
}

pub fn module_impostor() -> ModuleDeclaration {
    ModuleDeclaration::new().plugin::<Impostor>()
}

pub fn module_failing_load() -> ModuleDeclaration {
    ModuleDeclaration::new()
        .plugin::<FailingLoad>()
        .listener::<PingLogA>()
}

pub fn module_panics_on_enable() -> ModuleDeclaration {
    ModuleDeclaration::new().plugin::<PanicsOnEnable>()
}

pub fn module_decliner() -> ModuleDeclaration {
    ModuleDeclaration::new().plugin::<Decliner>()
}

pub fn module_stubborn() -> ModuleDeclaration {
    ModuleDeclaration::new().plugin::<StubbornUnload>()
}

pub fn module_failing_listener() -> ModuleDeclaration {
    ModuleDeclaration::new()
        .plugin::<Late>()
        .listener::<FailingListener>()
}

pub fn module_two_plugins() -> ModuleDeclaration {
    ModuleDeclaration::new().plugin::<PluginB>().plugin::<PluginA>()
}

pub fn module_relay() -> ModuleDeclaration {
    ModuleDeclaration::new()
        .plugin::<RelayPlugin>()
        .listener::<RelayListener>()
}

pub fn module_echo() -> ModuleDeclaration {
    ModuleDeclaration::new()
        .plugin::<EchoOnUnload>()
        .listener::<PingEcho>()
}

pub fn module_broken_listener() -> ModuleDeclaration {
    ModuleDeclaration::new()
        .plugin::<Broken>()
        .listener::<BrokenListener>()
}

pub fn module_empty() -> ModuleDeclaration {
    ModuleDeclaration::new()
}

// ─── Hosts ───────────────────────────────────────────────────────────

/// Module path for a plugin directory under `/plugins`
pub fn module_path(name: &str) -> PathBuf {
    PathBuf::from(format!(
        "/plugins/{}/Plugin.{}",
        name,
        std::env::consts::DLL_EXTENSION
    ))
}

/// Loader serving every fixture module at [`module_path`]
pub fn fixture_loader() -> StaticLoader {
    StaticLoader::new()
        .with_module(module_path("A"), module_a)
        .with_module(module_path("B"), module_b)
        .with_module(module_path("Observer"), module_observer)
        .with_module(module_path("Canceller"), module_canceller)
        .with_module(module_path("Late"), module_late)
        .with_module(module_path("Holder"), module_holder)
        .with_module(module_path("Impostor"), module_impostor)
        .with_module(module_path("FailingLoad"), module_failing_load)
        .with_module(module_path("PanicsOnEnable"), module_panics_on_enable)
        .with_module(module_path("Decliner"), module_decliner)
        .with_module(module_path("Stubborn"), module_stubborn)
        .with_module(module_path("FailingListener"), module_failing_listener)
        .with_module(module_path("Pair"), module_two_plugins)
        .with_module(module_path("Relay"), module_relay)
        .with_module(module_path("Echo"), module_echo)
        .with_module(module_path("Broken"), module_broken_listener)
        .with_module(module_path("Empty"), module_empty)
}

pub fn fixture_host() -> PluginHost {
    PluginHost::with_loader(PluginHostConfig::for_dir("/plugins"), fixture_loader())
}
