//! Shared infrastructure for the catalog resilience patterns.
//!
//! Every pattern crate in this workspace reports what it is doing through the
//! same small event bus, so operators can hook logging or counters onto a
//! breaker without the breaker knowing about any of them.

pub mod events;

pub use events::{Emitted, EventBus, Listeners, ResilienceEvent};
