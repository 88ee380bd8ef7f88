//! Event plumbing for resilience patterns.
//!
//! A pattern collects callbacks in [`Listeners`] while it is being configured,
//! then binds them to its instance name with [`Listeners::bind`]. The resulting
//! [`EventBus`] stamps every event with that name and the emission time, so
//! the pattern only describes *what* happened.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// Something a resilience pattern reports.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Short machine-friendly kind, e.g. `"state_transition"`.
    fn event_type(&self) -> &'static str;
}

/// An event as listeners see it.
#[derive(Debug)]
pub struct Emitted<'a, E> {
    /// Name of the instance that produced the event (e.g. `"categoryServiceCB"`).
    pub source: &'a str,
    /// When the bus accepted the event.
    pub at: Instant,
    pub event: E,
}

type Callback<E> = Arc<dyn Fn(&Emitted<'_, E>) + Send + Sync>;

/// Callbacks gathered before the emitting instance is named.
pub struct Listeners<E> {
    callbacks: Vec<Callback<E>>,
}

impl<E: ResilienceEvent> Listeners<E> {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// Registers a callback. Callbacks run in registration order.
    pub fn on<F>(&mut self, f: F)
    where
        F: Fn(&Emitted<'_, E>) + Send + Sync + 'static,
    {
        self.callbacks.push(Arc::new(f));
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Fixes the source name every emitted event will carry.
    pub fn bind(self, source: impl Into<Arc<str>>) -> EventBus<E> {
        EventBus {
            source: source.into(),
            callbacks: self.callbacks.into(),
        }
    }
}

impl<E: ResilienceEvent> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.callbacks.len())
            .finish()
    }
}

/// Delivers one named instance's events to its callbacks.
///
/// Cloning is cheap; clones share the callbacks.
pub struct EventBus<E> {
    source: Arc<str>,
    callbacks: Arc<[Callback<E>]>,
}

impl<E: ResilienceEvent> EventBus<E> {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Stamps `event` and hands it to every callback.
    ///
    /// A panicking callback is isolated; the rest still run.
    pub fn emit(&self, event: E) {
        if self.callbacks.is_empty() {
            return;
        }
        let emitted = Emitted {
            source: &self.source,
            at: Instant::now(),
            event,
        };
        for callback in self.callbacks.iter() {
            let _ = catch_unwind(AssertUnwindSafe(|| callback(&emitted)));
        }
    }
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            callbacks: Arc::clone(&self.callbacks),
        }
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("source", &self.source)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
