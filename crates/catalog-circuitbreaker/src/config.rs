use crate::error::ConfigError;
use crate::events::CircuitBreakerEvent;
use crate::CircuitState;
use catalog_resilience_core::{Emitted, EventBus, Listeners};
use std::time::Duration;

/// Configuration for one named circuit.
pub struct CircuitBreakerConfig {
    pub(crate) failure_rate_threshold: f64,
    pub(crate) sliding_window_size: usize,
    pub(crate) minimum_number_of_calls: usize,
    pub(crate) wait_duration_in_open: Duration,
    pub(crate) permitted_calls_in_half_open: usize,
    pub(crate) call_timeout: Option<Duration>,
    pub(crate) events: EventBus<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Name of the circuit, used in events, logs and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Failure rate (0.0 to 1.0) at or above which the circuit opens.
    pub fn failure_rate_threshold(&self) -> f64 {
        self.failure_rate_threshold
    }

    /// Number of most recent calls the failure rate is computed over.
    pub fn sliding_window_size(&self) -> usize {
        self.sliding_window_size
    }

    /// Calls that must be in the window before the rate is evaluated.
    pub fn minimum_number_of_calls(&self) -> usize {
        self.minimum_number_of_calls
    }

    /// Cool-down between opening and admitting the first probe.
    pub fn wait_duration_in_open(&self) -> Duration {
        self.wait_duration_in_open
    }

    /// Number of probes that must succeed before the circuit closes.
    pub fn permitted_calls_in_half_open(&self) -> usize {
        self.permitted_calls_in_half_open
    }

    /// Deadline applied to each permitted call, if any.
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }
}

impl std::fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("name", &self.name)
            .field("failure_rate_threshold", &self.failure_rate_threshold)
            .field("sliding_window_size", &self.sliding_window_size)
            .field("minimum_number_of_calls", &self.minimum_number_of_calls)
            .field("wait_duration_in_open", &self.wait_duration_in_open)
            .field(
                "permitted_calls_in_half_open",
                &self.permitted_calls_in_half_open,
            )
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CircuitBreakerConfig`] that produces a
/// [`CircuitBreakerLayer`](crate::CircuitBreakerLayer).
pub struct CircuitBreakerConfigBuilder {
    failure_rate_threshold: f64,
    sliding_window_size: usize,
    minimum_number_of_calls: Option<usize>,
    wait_duration_in_open: Duration,
    permitted_calls_in_half_open: usize,
    call_timeout: Option<Duration>,
    listeners: Listeners<CircuitBreakerEvent>,
    name: String,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            sliding_window_size: 100,
            minimum_number_of_calls: None,
            wait_duration_in_open: Duration::from_secs(30),
            permitted_calls_in_half_open: 1,
            call_timeout: None,
            listeners: Listeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the failure rate at which the circuit opens.
    ///
    /// The circuit opens when `failures / calls >= rate` over the window.
    ///
    /// Default: 0.5 (50%)
    pub fn failure_rate_threshold(mut self, rate: f64) -> Self {
        self.failure_rate_threshold = rate;
        self
    }

    /// Sets how many of the most recent calls make up the observation window.
    ///
    /// Default: 100
    pub fn sliding_window_size(mut self, size: usize) -> Self {
        self.sliding_window_size = size;
        self
    }

    /// Sets how many calls must be in the window before the failure rate is
    /// evaluated.
    ///
    /// Default: same as `sliding_window_size`
    pub fn minimum_number_of_calls(mut self, n: usize) -> Self {
        self.minimum_number_of_calls = Some(n);
        self
    }

    /// Sets how long the circuit stays open before admitting a probe.
    ///
    /// Default: 30 seconds
    pub fn wait_duration_in_open(mut self, duration: Duration) -> Self {
        self.wait_duration_in_open = duration;
        self
    }

    /// Sets how many probes are admitted (one at a time) while half-open.
    /// All of them must succeed for the circuit to close.
    ///
    /// Default: 1
    pub fn permitted_calls_in_half_open(mut self, n: usize) -> Self {
        self.permitted_calls_in_half_open = n;
        self
    }

    /// Bounds each permitted call. A call that exceeds it is abandoned and
    /// counted as a failure.
    ///
    /// Default: none
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Names the circuit for events, logs and metrics.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Registers a callback for every event, stamped with the circuit name and
    /// emission time.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&Emitted<'_, CircuitBreakerEvent>) + Send + Sync + 'static,
    {
        self.listeners.on(f);
        self
    }

    /// Registers a callback invoked with `(from, to)` on every state change.
    ///
    /// ```rust
    /// use catalog_circuitbreaker::{CircuitBreakerLayer, CircuitState};
    ///
    /// let layer = CircuitBreakerLayer::builder()
    ///     .name("categoryServiceCB")
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("category lookups degraded ({from:?} -> {to:?})");
    ///         }
    ///     })
    ///     .build();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.listeners.on(move |emitted: &Emitted<'_, CircuitBreakerEvent>| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = &emitted.event
            {
                f(*from_state, *to_state);
            }
        });
        self
    }

    /// Registers a callback invoked when a call is let through. The flag is
    /// true for half-open probes.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, bool) + Send + Sync + 'static,
    {
        self.listeners.on(move |emitted: &Emitted<'_, CircuitBreakerEvent>| {
            if let CircuitBreakerEvent::CallPermitted { state, probe, .. } = &emitted.event {
                f(*state, *probe);
            }
        });
        self
    }

    /// Registers a callback invoked when a call is short-circuited.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.listeners.on(move |emitted: &Emitted<'_, CircuitBreakerEvent>| {
            if let CircuitBreakerEvent::CallRejected { state, .. } = &emitted.event {
                f(*state);
            }
        });
        self
    }

    /// Registers a callback invoked when a permitted call succeeds.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.listeners.on(move |emitted: &Emitted<'_, CircuitBreakerEvent>| {
            if let CircuitBreakerEvent::SuccessRecorded { state, .. } = &emitted.event {
                f(*state);
            }
        });
        self
    }

    /// Registers a callback invoked when a permitted call fails or times out.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.listeners.on(move |emitted: &Emitted<'_, CircuitBreakerEvent>| {
            if let CircuitBreakerEvent::FailureRecorded { state, .. } = &emitted.event {
                f(*state);
            }
        });
        self
    }

    /// Registers a callback invoked when a fallback answers a call. The flag
    /// is true when the call was short-circuited rather than attempted.
    pub fn on_fallback<F>(mut self, f: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.listeners.on(move |emitted: &Emitted<'_, CircuitBreakerEvent>| {
            if let CircuitBreakerEvent::FallbackApplied {
                short_circuited, ..
            } = &emitted.event
            {
                f(*short_circuited);
            }
        });
        self
    }

    /// Validates the settings and returns a layer.
    pub fn try_build(self) -> Result<crate::layer::CircuitBreakerLayer, ConfigError> {
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 1.0) {
            return Err(ConfigError::FailureRateThreshold(
                self.failure_rate_threshold,
            ));
        }
        if self.sliding_window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        let minimum_number_of_calls = self
            .minimum_number_of_calls
            .unwrap_or(self.sliding_window_size);
        if minimum_number_of_calls == 0 || minimum_number_of_calls > self.sliding_window_size {
            return Err(ConfigError::MinimumCalls {
                got: minimum_number_of_calls,
                window: self.sliding_window_size,
            });
        }
        if self.permitted_calls_in_half_open == 0 {
            return Err(ConfigError::NoProbes);
        }
        if self.call_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }

        let config = CircuitBreakerConfig {
            failure_rate_threshold: self.failure_rate_threshold,
            sliding_window_size: self.sliding_window_size,
            minimum_number_of_calls,
            wait_duration_in_open: self.wait_duration_in_open,
            permitted_calls_in_half_open: self.permitted_calls_in_half_open,
            call_timeout: self.call_timeout,
            events: self.listeners.bind(self.name.as_str()),
            name: self.name,
        };

        Ok(crate::layer::CircuitBreakerLayer::new(config))
    }

    /// Builds the layer.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid; use [`try_build`](Self::try_build)
    /// for settings that come from user input.
    pub fn build(self) -> crate::layer::CircuitBreakerLayer {
        match self.try_build() {
            Ok(layer) => layer,
            Err(err) => panic!("invalid circuit breaker configuration: {err}"),
        }
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
