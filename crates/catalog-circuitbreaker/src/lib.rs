//! Circuit breaker for protecting cross-service calls.
//!
//! The breaker watches the outcomes of calls to a dependency and, once too
//! many of the recent ones fail, stops calling it for a while so callers get
//! an immediate answer instead of piling onto a sick service.
//!
//! ## States
//! - **Closed**: calls pass through; outcomes feed a rolling window of the last
//!   `sliding_window_size` calls. When at least `minimum_number_of_calls` are
//!   in the window and the failure rate reaches `failure_rate_threshold`, the
//!   circuit opens.
//! - **Open**: calls are short-circuited without touching the inner service.
//!   The first call after `wait_duration_in_open` moves the circuit to
//!   half-open.
//! - **Half-Open**: one probe at a time is let through, up to
//!   `permitted_calls_in_half_open`. Every other call is short-circuited
//!   without waiting for the probe. All probes succeed: closed. Any probe
//!   fails: open again with a fresh cool-down.
//!
//! A call that exceeds `call_timeout` is abandoned and counts as a failure.
//!
//! ## Usage
//!
//! ```rust
//! use catalog_circuitbreaker::{CircuitBreakerError, CircuitBreakerLayer};
//! use tower::{Service, ServiceBuilder, ServiceExt, service_fn};
//!
//! # async fn example() {
//! let mut service = ServiceBuilder::new()
//!     .layer(CircuitBreakerLayer::builder().name("inventory").build())
//!     .service(service_fn(|sku: u32| async move { Ok::<_, std::io::Error>(sku * 2) }));
//!
//! match service.ready().await.unwrap().call(21).await {
//!     Ok(n) => assert_eq!(n, 42),
//!     Err(CircuitBreakerError::OpenCircuit) => eprintln!("inventory unavailable"),
//!     Err(err) => eprintln!("inventory failed: {err}"),
//! }
//! # }
//! ```
//!
//! ## With a fallback
//!
//! [`CircuitBreaker::with_fallback`] turns every failure, timeout, and
//! short-circuit into a substitute response, so the resulting service can
//! never fail. The fallback receives the cause, or `None` when the call was
//! short-circuited.
//!
//! ```rust
//! use catalog_circuitbreaker::CircuitBreakerLayer;
//! use tower::{ServiceExt, service_fn};
//!
//! # async fn example() {
//! let svc = service_fn(|_: ()| async { Err::<Vec<String>, _>("connection refused") });
//! let names = CircuitBreakerLayer::builder()
//!     .build()
//!     .layer_fn(svc)
//!     .with_fallback(|_cause| vec!["unavailable".to_string()]);
//!
//! let Ok(result) = names.oneshot(()).await;
//! assert_eq!(result, vec!["unavailable".to_string()]);
//! # }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: call, transition, timeout and fallback counters, a state gauge
//!   and a latency histogram via the `metrics` crate
//! - `tracing`: transition and admission logs via `tracing`
//! - `serde`: `Serialize` for [`CircuitState`] and [`CircuitMetrics`]

use crate::circuit::{Admission, Circuit, Ticket};
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::time::Instant;
use tower::{Service, ServiceExt};

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::{CircuitBreakerError, ConfigError};
pub use catalog_resilience_core::Emitted;
pub use events::CircuitBreakerEvent;
pub use layer::CircuitBreakerLayer;

mod circuit;
mod config;
mod error;
mod events;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

#[cfg(feature = "metrics")]
fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "circuitbreaker_calls_total",
            "Calls seen by the circuit breaker, by outcome"
        );
        describe_counter!(
            "circuitbreaker_transitions_total",
            "Circuit breaker state transitions"
        );
        describe_counter!(
            "circuitbreaker_timeouts_total",
            "Permitted calls abandoned at the call timeout"
        );
        describe_counter!(
            "circuitbreaker_fallbacks_total",
            "Responses produced by the fallback"
        );
        describe_gauge!(
            "circuitbreaker_state",
            "Current state: 0 closed, 1 open, 2 half-open"
        );
        describe_histogram!(
            "circuitbreaker_call_duration_seconds",
            "Duration of permitted calls"
        );
    });
}

/// Circuit state and configuration shared by every clone of a breaker.
struct Breaker {
    circuit: Mutex<Circuit>,
    state_atomic: Arc<AtomicU8>,
    config: Arc<CircuitBreakerConfig>,
}

impl Breaker {
    fn new(config: Arc<CircuitBreakerConfig>) -> Arc<Self> {
        #[cfg(feature = "metrics")]
        describe_metrics();

        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Arc::new(Self {
            circuit: Mutex::new(Circuit::new(Arc::clone(&state_atomic))),
            state_atomic,
            config,
        })
    }

    // Critical sections never await and never run user code other than event
    // listeners, so a poisoned lock still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(self: &Arc<Self>) -> Option<Permit> {
        let admission = self.lock().try_acquire(&self.config);
        match admission {
            Admission::Permitted(ticket) => Some(Permit {
                breaker: Arc::clone(self),
                ticket,
                settled: false,
            }),
            Admission::Rejected => None,
        }
    }

    fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }
}

/// Admission to call the inner service. Dropping an unsettled permit (the
/// caller abandoned the call) hands a half-open probe slot back.
struct Permit {
    breaker: Arc<Breaker>,
    ticket: Ticket,
    settled: bool,
}

impl Permit {
    fn succeeded(mut self, duration: std::time::Duration) {
        self.settled = true;
        self.breaker
            .lock()
            .record_success(&self.breaker.config, self.ticket, duration);
    }

    fn failed(mut self, duration: std::time::Duration) {
        self.settled = true;
        self.breaker
            .lock()
            .record_failure(&self.breaker.config, self.ticket, duration);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.lock().release(self.ticket);
        }
    }
}

/// Runs one protected call: admission, readiness and call under the timeout,
/// then outcome accounting.
async fn protected_call<S, Req>(
    breaker: Arc<Breaker>,
    inner: S,
    req: Req,
) -> Result<S::Response, CircuitBreakerError<S::Error>>
where
    S: Service<Req>,
{
    let Some(permit) = breaker.acquire() else {
        #[cfg(feature = "tracing")]
        tracing::debug!(breaker = %breaker.config.name, "call short-circuited");
        return Err(CircuitBreakerError::OpenCircuit);
    };

    #[cfg(feature = "tracing")]
    tracing::trace!(
        breaker = %breaker.config.name,
        probe = permit.ticket.probe,
        "call permitted"
    );

    let start = Instant::now();
    let call = inner.oneshot(req);
    let result = match breaker.config.call_timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome.map_err(CircuitBreakerError::Inner),
            Err(_) => {
                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_timeouts_total", "circuitbreaker" => breaker.config.name.clone()).increment(1);

                Err(CircuitBreakerError::Timeout(limit))
            }
        },
        None => call.await.map_err(CircuitBreakerError::Inner),
    };
    let duration = start.elapsed();

    match &result {
        Ok(_) => permit.succeeded(duration),
        Err(_) => permit.failed(duration),
    }

    result
}

/// Cheap, cloneable view onto a breaker's circuit for health checks and
/// manual control. Obtained from [`CircuitBreaker::handle`] or
/// [`CircuitBreakerWithFallback::handle`].
#[derive(Clone)]
pub struct CircuitHandle {
    breaker: Arc<Breaker>,
}

impl CircuitHandle {
    /// Name of the circuit.
    pub fn name(&self) -> &str {
        &self.breaker.config.name
    }

    /// Current state, read without locking.
    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Returns whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns a snapshot of the circuit's counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.breaker.lock().metrics()
    }

    /// Forces the circuit open, restarting the cool-down.
    pub fn force_open(&self) {
        self.breaker.lock().force_open(&self.breaker.config);
    }

    /// Forces the circuit closed.
    pub fn force_closed(&self) {
        self.breaker.lock().force_closed(&self.breaker.config);
    }

    /// Closes the circuit and clears every counter.
    pub fn reset(&self) {
        self.breaker.lock().reset(&self.breaker.config);
    }

    /// HTTP status for readiness probes: 503 while open, 200 otherwise.
    pub fn http_status(&self) -> u16 {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => 200,
            CircuitState::Open => 503,
        }
    }

    /// `"healthy"`, `"degraded"` (half-open) or `"unhealthy"` (open).
    pub fn health_status(&self) -> &'static str {
        match self.state() {
            CircuitState::Closed => "healthy",
            CircuitState::HalfOpen => "degraded",
            CircuitState::Open => "unhealthy",
        }
    }
}

impl std::fmt::Debug for CircuitHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitHandle")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

/// A Tower service that applies circuit breaker logic to an inner service.
///
/// Clones share one circuit.
pub struct CircuitBreaker<S> {
    inner: S,
    breaker: Arc<Breaker>,
}

impl<S> CircuitBreaker<S> {
    pub(crate) fn new(inner: S, config: Arc<CircuitBreakerConfig>) -> Self {
        Self {
            inner,
            breaker: Breaker::new(config),
        }
    }

    /// Substitutes `fallback`'s answer for every failed, timed out, or
    /// short-circuited call.
    ///
    /// `fallback` receives the failure, or `None` when the circuit
    /// short-circuited the call. The returned service's error type is
    /// [`Infallible`].
    pub fn with_fallback<F>(self, fallback: F) -> CircuitBreakerWithFallback<S, F> {
        CircuitBreakerWithFallback {
            inner: self.inner,
            breaker: self.breaker,
            fallback: Arc::new(fallback),
        }
    }

    /// Returns a handle onto this breaker's circuit.
    pub fn handle(&self) -> CircuitHandle {
        CircuitHandle {
            breaker: Arc::clone(&self.breaker),
        }
    }

    /// Current state, read without locking.
    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Returns a snapshot of the circuit's counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.breaker.lock().metrics()
    }
}

impl<S: Clone> Clone for CircuitBreaker<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            breaker: Arc::clone(&self.breaker),
        }
    }
}

impl<S, Req> Service<Req> for CircuitBreaker<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let breaker = Arc::clone(&self.breaker);

        Box::pin(protected_call(breaker, inner, req))
    }
}

/// A circuit breaker whose failures are answered by a fallback.
///
/// Returned by [`CircuitBreaker::with_fallback`].
pub struct CircuitBreakerWithFallback<S, F> {
    inner: S,
    breaker: Arc<Breaker>,
    fallback: Arc<F>,
}

impl<S, F> CircuitBreakerWithFallback<S, F> {
    /// Returns a handle onto this breaker's circuit.
    pub fn handle(&self) -> CircuitHandle {
        CircuitHandle {
            breaker: Arc::clone(&self.breaker),
        }
    }

    /// Current state, read without locking.
    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Returns a snapshot of the circuit's counters.
    pub fn metrics(&self) -> CircuitMetrics {
        self.breaker.lock().metrics()
    }
}

impl<S: Clone, F> Clone for CircuitBreakerWithFallback<S, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            breaker: Arc::clone(&self.breaker),
            fallback: Arc::clone(&self.fallback),
        }
    }
}

impl<S, F, Req> Service<Req> for CircuitBreakerWithFallback<S, F>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
    F: Fn(Option<CircuitBreakerError<S::Error>>) -> S::Response + Send + Sync + 'static,
{
    type Response = S::Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<S::Response, Infallible>>;

    // Readiness of the inner service is awaited inside the protected call so a
    // sick dependency is accounted for (and answered by the fallback) like any
    // other failure.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let inner = self.inner.clone();
        let breaker = Arc::clone(&self.breaker);
        let fallback = Arc::clone(&self.fallback);

        Box::pin(async move {
            let config = Arc::clone(&breaker.config);
            match protected_call(breaker, inner, req).await {
                Ok(response) => Ok(response),
                Err(err) => {
                    let cause = match err {
                        CircuitBreakerError::OpenCircuit => None,
                        other => Some(other),
                    };

                    config.events.emit(CircuitBreakerEvent::FallbackApplied {
                        short_circuited: cause.is_none(),
                    });

                    #[cfg(feature = "metrics")]
                    counter!("circuitbreaker_fallbacks_total", "circuitbreaker" => config.name.clone()).increment(1);

                    Ok(fallback(cause))
                }
            }
        })
    }
}

impl CircuitBreakerLayer {
    /// Wraps `service` and returns the concrete [`CircuitBreaker`], for
    /// access to [`CircuitBreaker::with_fallback`] and inspection methods.
    pub fn layer_fn<S>(&self, service: S) -> CircuitBreaker<S> {
        tower::Layer::layer(self, service)
    }
}
