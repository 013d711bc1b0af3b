//! Event bus - listener table and dispatch
//!
//! Registrations are kept in one list in registration order, which is plugin
//! load order and then declaration order within a module. Dispatch works on
//! a snapshot of the matching registrations so handlers run without any host
//! lock held.
//!
//! A handler may publish, load or unload from inside its body. If that
//! reaches a listener which is already running further up the same thread's
//! stack, the listener is skipped instead of waiting on itself.

use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use plume_plugin_api::{
    Event, EventHandler, HandlerRegistration, ListenerInstance, PluginId, PluginMetadata,
};

use crate::context::LoadContext;
use crate::error::DispatchError;

/// A handler registered by a plugin for one event kind
pub(crate) struct ListenerRegistration {
    // Handler code lives in `context`; the handler must drop first.
    handler: Mutex<EventHandler>,
    plugin_id: PluginId,
    plugin_name: String,
    kind: String,
    ignore_cancelled: bool,
    instance: Option<ListenerInstance>,
    active: AtomicBool,
    context: Arc<LoadContext>,
}

impl ListenerRegistration {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && self.context.is_live()
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// What this handler locks while it runs
    fn holder(&self) -> Holder {
        match self.instance {
            Some(instance) => Holder::Listener(instance),
            None => Holder::Handler(self as *const Self),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Holder {
    Listener(ListenerInstance),
    Handler(*const ListenerRegistration),
}

thread_local! {
    static RUNNING: RefCell<Vec<Holder>> = const { RefCell::new(Vec::new()) };
}

/// Marks a listener as running on the current thread until dropped
struct Running(Holder);

impl Running {
    /// `None` when the listener is already running on this thread
    fn enter(holder: Holder) -> Option<Self> {
        RUNNING.with(|running| {
            let mut running = running.borrow_mut();
            if running.contains(&holder) {
                return None;
            }
            running.push(holder);
            Some(Running(holder))
        })
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        RUNNING.with(|running| {
            let mut running = running.borrow_mut();
            if let Some(at) = running.iter().rposition(|holder| *holder == self.0) {
                running.remove(at);
            }
        });
    }
}

/// Table of listener registrations
#[derive(Default)]
pub struct EventBus {
    registrations: Vec<Arc<ListenerRegistration>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin's handlers, preserving their order
    pub(crate) fn register(
        &mut self,
        owner: &PluginMetadata,
        context: &Arc<LoadContext>,
        handlers: Vec<HandlerRegistration>,
    ) -> usize {
        let count = handlers.len();
        for registration in handlers {
            tracing::trace!(
                plugin = %owner.name,
                kind = %registration.kind,
                ignore_cancelled = registration.ignore_cancelled,
                "Registered handler"
            );
            self.registrations.push(Arc::new(ListenerRegistration {
                handler: Mutex::new(registration.handler),
                plugin_id: owner.id,
                plugin_name: owner.name.clone(),
                kind: registration.kind,
                ignore_cancelled: registration.ignore_cancelled,
                instance: registration.instance,
                active: AtomicBool::new(true),
                context: Arc::clone(context),
            }));
        }
        count
    }

    /// Remove every registration owned by a plugin. Returns how many were removed.
    pub fn unregister(&mut self, plugin_id: PluginId) -> usize {
        let before = self.registrations.len();
        self.registrations.retain(|registration| {
            if registration.plugin_id == plugin_id {
                registration.deactivate();
                false
            } else {
                true
            }
        });
        before - self.registrations.len()
    }

    /// Registrations for an event kind, in dispatch order
    pub(crate) fn snapshot(&self, kind: &str) -> Vec<Arc<ListenerRegistration>> {
        self.registrations
            .iter()
            .filter(|registration| registration.kind == kind)
            .cloned()
            .collect()
    }

    /// Number of handlers a plugin has registered
    pub fn handler_count(&self, plugin_id: PluginId) -> usize {
        self.registrations
            .iter()
            .filter(|registration| registration.plugin_id == plugin_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

/// Run `event` through `registrations` in order. Returns the final cancelled state.
///
/// A handler is skipped when the event is already cancelled unless it opted
/// into cancelled events, and when its listener is already running on this
/// thread. The first handler that fails or panics stops the dispatch; later
/// handlers do not run.
pub(crate) fn dispatch(
    registrations: &[Arc<ListenerRegistration>],
    event: &mut dyn Event,
) -> Result<bool, DispatchError> {
    for registration in registrations {
        if !registration.is_active() {
            continue;
        }
        if event.is_cancelled() && !registration.ignore_cancelled {
            tracing::trace!(
                plugin = %registration.plugin_name,
                kind = %registration.kind,
                "Skipping handler for cancelled event"
            );
            continue;
        }
        let Some(_running) = Running::enter(registration.holder()) else {
            tracing::warn!(
                plugin = %registration.plugin_name,
                kind = %registration.kind,
                "Listener is already handling an event on this thread, skipping"
            );
            continue;
        };

        let mut handler = registration
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| (*handler)(&mut *event)));

        match result {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                tracing::error!(
                    plugin = %registration.plugin_name,
                    kind = %registration.kind,
                    error = %source,
                    "Event handler failed, aborting dispatch"
                );
                return Err(DispatchError::HandlerFailed {
                    plugin: registration.plugin_name.clone(),
                    kind: registration.kind.clone(),
                    source,
                });
            }
            Err(_) => {
                tracing::error!(
                    plugin = %registration.plugin_name,
                    kind = %registration.kind,
                    "Event handler panicked, aborting dispatch"
                );
                return Err(DispatchError::HandlerPanicked {
                    plugin: registration.plugin_name.clone(),
                    kind: registration.kind.clone(),
                });
            }
        }
    }

    Ok(event.is_cancelled())
}
