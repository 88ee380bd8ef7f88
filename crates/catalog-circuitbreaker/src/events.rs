use crate::CircuitState;
use catalog_resilience_core::ResilienceEvent;
use std::time::Duration;

/// Events emitted by a circuit breaker.
///
/// The circuit name and emission time travel alongside, on
/// [`Emitted`](catalog_resilience_core::Emitted).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitBreakerEvent {
    /// The circuit moved from one state to another.
    StateTransition {
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was let through to the inner service. `probe` is set for
    /// half-open trial calls.
    CallPermitted { state: CircuitState, probe: bool },
    /// A call was short-circuited.
    CallRejected { state: CircuitState },
    /// A permitted call completed successfully.
    SuccessRecorded {
        state: CircuitState,
        duration: Duration,
    },
    /// A permitted call failed or timed out.
    FailureRecorded {
        state: CircuitState,
        duration: Duration,
    },
    /// The fallback produced the response. `short_circuited` is false when the
    /// fallback answered a call that was attempted and failed.
    FallbackApplied { short_circuited: bool },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
            CircuitBreakerEvent::FallbackApplied { .. } => "fallback_applied",
        }
    }
}
