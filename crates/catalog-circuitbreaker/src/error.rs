use std::time::Duration;
use thiserror::Error;

/// Errors returned by the [`CircuitBreaker`](crate::CircuitBreaker) service.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open (or half-open with no probe slot free); the inner
    /// service was not called.
    #[error("circuit is open; call not permitted")]
    OpenCircuit,

    /// The inner call did not finish within the configured call timeout.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// An error returned by the inner service.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the call was short-circuited.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit)
    }

    /// Returns true if the call hit the call timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CircuitBreakerError::Timeout(_))
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<E> for CircuitBreakerError<E> {
    fn from(err: E) -> Self {
        CircuitBreakerError::Inner(err)
    }
}

/// Rejected circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("failure_rate_threshold must be in (0, 1], got {0}")]
    FailureRateThreshold(f64),

    #[error("sliding_window_size must be at least 1")]
    EmptyWindow,

    #[error("minimum_number_of_calls must be in 1..={window}, got {got}")]
    MinimumCalls { got: usize, window: usize },

    #[error("permitted_calls_in_half_open must be at least 1")]
    NoProbes,

    #[error("call_timeout must be non-zero")]
    ZeroTimeout,
}
