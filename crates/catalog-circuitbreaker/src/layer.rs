use crate::config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
use crate::CircuitBreaker;
use std::sync::Arc;
use std::time::Duration;
use tower::Layer;

/// A Tower layer that wraps a service in a [`CircuitBreaker`].
///
/// Every call to [`Layer::layer`] creates a fresh circuit. Build the wrapped
/// service once at startup and clone it wherever it is needed: clones share
/// the same circuit.
///
/// ```rust
/// use catalog_circuitbreaker::CircuitBreakerLayer;
/// use std::time::Duration;
/// use tower::{service_fn, ServiceBuilder};
///
/// let layer = CircuitBreakerLayer::builder()
///     .name("categoryServiceCB")
///     .failure_rate_threshold(0.5)
///     .sliding_window_size(10)
///     .wait_duration_in_open(Duration::from_secs(10))
///     .call_timeout(Duration::from_secs(2))
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
/// ```
#[derive(Clone, Debug)]
pub struct CircuitBreakerLayer {
    config: Arc<CircuitBreakerConfig>,
}

impl CircuitBreakerLayer {
    pub(crate) fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Creates a new builder with default settings.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// The validated configuration this layer applies.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn config_arc(&self) -> Arc<CircuitBreakerConfig> {
        Arc::clone(&self.config)
    }

    /// Preset: balanced defaults.
    ///
    /// - 50% failure rate over the last 100 calls
    /// - 30 second cool-down
    /// - 3 probes to close
    pub fn standard() -> CircuitBreakerConfigBuilder {
        Self::builder()
            .failure_rate_threshold(0.5)
            .sliding_window_size(100)
            .wait_duration_in_open(Duration::from_secs(30))
            .permitted_calls_in_half_open(3)
    }

    /// Preset: trips early and recovers quickly, for latency-sensitive page
    /// renders that would rather degrade than wait.
    ///
    /// - 25% failure rate over the last 20 calls
    /// - 10 second cool-down
    /// - 1 probe to close
    pub fn fast_fail() -> CircuitBreakerConfigBuilder {
        Self::builder()
            .failure_rate_threshold(0.25)
            .sliding_window_size(20)
            .wait_duration_in_open(Duration::from_secs(10))
            .permitted_calls_in_half_open(1)
    }

    /// Preset: tolerates flaky dependencies.
    ///
    /// - 75% failure rate over the last 200 calls
    /// - 60 second cool-down
    /// - 5 probes to close
    pub fn tolerant() -> CircuitBreakerConfigBuilder {
        Self::builder()
            .failure_rate_threshold(0.75)
            .sliding_window_size(200)
            .wait_duration_in_open(Duration::from_secs(60))
            .permitted_calls_in_half_open(5)
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreaker<S>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreaker::new(service, Arc::clone(&self.config))
    }
}
