//! Events dispatched through the host event bus.
//!
//! Events are routed by kind name rather than `TypeId`, so a kind declared in
//! one library can be published from another. Handlers get the concrete type
//! back through a checked downcast.

use std::any::Any;

use crate::types::PluginMetadata;

/// A named payload with a mutable cancellation flag
pub trait Event: Any + Send {
    /// Kind name used to route the event to handlers
    fn name(&self) -> &str;

    /// Whether a handler has cancelled the event
    fn is_cancelled(&self) -> bool;

    /// Set or clear the cancellation flag
    fn set_cancelled(&mut self, cancelled: bool);

    /// Access the concrete event for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Cancel the event
    fn cancel(&mut self) {
        self.set_cancelled(true);
    }
}

/// An event type with a fixed kind name.
///
/// Implemented through [`impl_event!`](crate::impl_event).
pub trait EventKind: Event + Sized {
    /// Kind name shared by every instance of the type
    const NAME: &'static str;
}

/// Implement [`Event`] and [`EventKind`] for a struct with a `cancelled: bool` field.
///
/// # Usage
///
/// ```ignore
/// #[derive(Debug, Default)]
/// pub struct Ping {
///     pub hops: u32,
///     cancelled: bool,
/// }
///
/// plume_plugin_api::impl_event!(Ping, "Ping");
/// ```
#[macro_export]
macro_rules! impl_event {
    ($event:ty, $name:expr) => {
        impl $crate::EventKind for $event {
            const NAME: &'static str = $name;
        }

        impl $crate::Event for $event {
            fn name(&self) -> &str {
                <$event as $crate::EventKind>::NAME
            }

            fn is_cancelled(&self) -> bool {
                self.cancelled
            }

            fn set_cancelled(&mut self, cancelled: bool) {
                self.cancelled = cancelled;
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };
}

/// Published after a plugin is registered and before its `on_load` hook runs
#[derive(Debug, Clone)]
pub struct PluginLoadEvent {
    /// Metadata of the plugin being loaded
    pub metadata: PluginMetadata,
    cancelled: bool,
}

impl PluginLoadEvent {
    pub fn new(metadata: PluginMetadata) -> Self {
        Self {
            metadata,
            cancelled: false,
        }
    }
}

impl_event!(PluginLoadEvent, "PluginLoadEvent");

/// Published before a plugin's listeners are removed and its `on_unload` hook runs
#[derive(Debug, Clone)]
pub struct PluginUnloadEvent {
    /// Metadata of the plugin being unloaded
    pub metadata: PluginMetadata,
    cancelled: bool,
}

impl PluginUnloadEvent {
    pub fn new(metadata: PluginMetadata) -> Self {
        Self {
            metadata,
            cancelled: false,
        }
    }
}

impl_event!(PluginUnloadEvent, "PluginUnloadEvent");
