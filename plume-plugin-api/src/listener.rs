//! Listener declarations.
//!
//! A listener is a type whose methods handle events. Instead of marking
//! methods with an attribute, the type lists them in [`Listener::handlers`]:
//!
//! ```ignore
//! #[derive(Default)]
//! pub struct Audit {
//!     seen: u32,
//! }
//!
//! impl Audit {
//!     fn on_ping(&mut self, ping: &mut Ping) -> Result<(), PluginError> {
//!         self.seen += 1;
//!         Ok(())
//!     }
//!
//!     fn on_load(&mut self, event: &mut PluginLoadEvent) -> Result<(), PluginError> {
//!         tracing::info!(plugin = %event.metadata.name, "saw load");
//!         Ok(())
//!     }
//! }
//!
//! impl Listener for Audit {
//!     fn handlers() -> Vec<HandlerSpec<Self>> {
//!         vec![
//!             HandlerSpec::on(Self::on_ping),
//!             HandlerSpec::on(Self::on_load).ignore_cancelled(),
//!         ]
//!     }
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::PluginError;
use crate::event::{Event, EventKind};

/// Type-erased event handler as stored by the host
pub type EventHandler = Box<dyn FnMut(&mut dyn Event) -> Result<(), PluginError> + Send>;

type ErasedMethod<L> = Box<dyn Fn(&mut L, &mut dyn Event) -> Result<(), PluginError> + Send + Sync>;

/// One handler method of a listener, bound to the event kind it accepts
pub struct HandlerSpec<L> {
    kind: &'static str,
    ignore_cancelled: bool,
    method: ErasedMethod<L>,
}

impl<L: 'static> HandlerSpec<L> {
    /// Declare `method` as the handler for events of kind `E`
    pub fn on<E: EventKind>(method: fn(&mut L, &mut E) -> Result<(), PluginError>) -> Self {
        Self {
            kind: E::NAME,
            ignore_cancelled: false,
            method: Box::new(move |listener: &mut L, event: &mut dyn Event| {
                match event.as_any_mut().downcast_mut::<E>() {
                    Some(event) => method(listener, event),
                    None => Err(PluginError::EventMismatch {
                        expected: E::NAME.to_string(),
                    }),
                }
            }),
        }
    }

    /// Run this handler even when an earlier handler cancelled the event
    pub fn ignore_cancelled(mut self) -> Self {
        self.ignore_cancelled = true;
        self
    }

    /// Kind name this handler accepts
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Whether this handler runs on cancelled events
    pub fn ignores_cancelled(&self) -> bool {
        self.ignore_cancelled
    }
}

/// A type whose methods handle events.
///
/// The host creates one instance per loaded module through `Default` and
/// shares it between the listed handlers. Handlers of the same listener are
/// serialized. While one of them runs, an event this listener handles that is
/// published again on the same thread (directly, or by loading or unloading a
/// plugin) skips the listener.
pub trait Listener: Default + Send + 'static {
    /// Handler methods in declaration order
    fn handlers() -> Vec<HandlerSpec<Self>>;
}

/// Identity of a listener instance, shared by all handlers bound to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerInstance(usize);

impl ListenerInstance {
    fn of<T>(instance: &Arc<T>) -> Self {
        Self(Arc::as_ptr(instance) as usize)
    }
}

/// A handler ready to be added to the host's listener table
pub struct HandlerRegistration {
    /// Kind name this handler accepts
    pub kind: String,
    /// Whether this handler runs on cancelled events
    pub ignore_cancelled: bool,
    /// The bound handler
    pub handler: EventHandler,
    /// Listener instance the handler belongs to; `None` for a standalone handler
    pub instance: Option<ListenerInstance>,
}

impl HandlerRegistration {
    /// A handler that is not bound to a listener instance
    pub fn new(kind: impl Into<String>, ignore_cancelled: bool, handler: EventHandler) -> Self {
        Self {
            kind: kind.into(),
            ignore_cancelled,
            handler,
            instance: None,
        }
    }
}

impl std::fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("kind", &self.kind)
            .field("ignore_cancelled", &self.ignore_cancelled)
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

/// Create a listener instance and bind each of its handler methods to it
pub fn instantiate<L: Listener>() -> Vec<HandlerRegistration> {
    let listener = Arc::new(Mutex::new(L::default()));
    let instance = ListenerInstance::of(&listener);

    L::handlers()
        .into_iter()
        .map(|spec| {
            let listener = Arc::clone(&listener);
            let method = spec.method;
            HandlerRegistration {
                kind: spec.kind.to_string(),
                ignore_cancelled: spec.ignore_cancelled,
                handler: Box::new(move |event: &mut dyn Event| {
                    let mut guard = listener.lock().unwrap_or_else(PoisonError::into_inner);
                    method(&mut *guard, event)
                }),
                instance: Some(instance),
            }
        })
        .collect()
}
