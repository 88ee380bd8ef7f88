use crate::fallback::CATEGORY_CIRCUIT;
use catalog_circuitbreaker::{CircuitBreakerLayer, CircuitState, ConfigError};
use clap::{Args, Parser};
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Command-line and environment settings for the product service.
#[derive(Debug, Clone, Parser)]
#[command(name = "product-service", about = "Product catalog with resilient category lookups")]
pub struct Settings {
    /// Address to listen on
    #[arg(long, env = "PRODUCT_SERVICE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Base URL of a category service instance; repeat for round-robin
    #[arg(
        long = "category-endpoint",
        env = "CATEGORY_SERVICE_ENDPOINTS",
        value_delimiter = ',',
        default_value = "http://127.0.0.1:8081"
    )]
    pub category_endpoints: Vec<Url>,

    #[command(flatten)]
    pub breaker: BreakerSettings,
}

/// Tuning for the category circuit.
#[derive(Debug, Clone, Args)]
pub struct BreakerSettings {
    /// Failure rate (0, 1] at which the circuit opens
    #[arg(long = "cb-failure-rate", env = "CATEGORY_CB_FAILURE_RATE", default_value_t = 0.5)]
    pub failure_rate_threshold: f64,

    /// Number of recent calls the failure rate is computed over
    #[arg(long = "cb-window", env = "CATEGORY_CB_WINDOW", default_value_t = 10)]
    pub sliding_window_size: usize,

    /// Calls required before the failure rate is evaluated [default: window size]
    #[arg(long = "cb-minimum-calls", env = "CATEGORY_CB_MINIMUM_CALLS")]
    pub minimum_number_of_calls: Option<usize>,

    /// How long the circuit stays open before probing, in milliseconds
    #[arg(long = "cb-open-ms", env = "CATEGORY_CB_OPEN_MS", default_value_t = 30_000)]
    pub wait_duration_in_open_ms: u64,

    /// Probe calls that must succeed to close the circuit again
    #[arg(long = "cb-probes", env = "CATEGORY_CB_PROBES", default_value_t = 1)]
    pub permitted_calls_in_half_open: usize,

    /// Timeout for a single category lookup, in milliseconds
    #[arg(long = "cb-timeout-ms", env = "CATEGORY_CB_TIMEOUT_MS", default_value_t = 2_000)]
    pub call_timeout_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            sliding_window_size: 10,
            minimum_number_of_calls: None,
            wait_duration_in_open_ms: 30_000,
            permitted_calls_in_half_open: 1,
            call_timeout_ms: 2_000,
        }
    }
}

impl BreakerSettings {
    /// Builds the layer for the category circuit.
    pub fn layer(&self) -> Result<CircuitBreakerLayer, ConfigError> {
        CircuitBreakerLayer::builder()
            .name(CATEGORY_CIRCUIT)
            .failure_rate_threshold(self.failure_rate_threshold)
            .sliding_window_size(self.sliding_window_size)
            .minimum_number_of_calls(
                self.minimum_number_of_calls
                    .unwrap_or(self.sliding_window_size),
            )
            .wait_duration_in_open(Duration::from_millis(self.wait_duration_in_open_ms))
            .permitted_calls_in_half_open(self.permitted_calls_in_half_open)
            .call_timeout(Duration::from_millis(self.call_timeout_ms))
            .on_state_transition(|from, to| match to {
                CircuitState::Open => {
                    tracing::warn!(circuit = CATEGORY_CIRCUIT, ?from, ?to, "circuit opened")
                }
                _ => tracing::info!(circuit = CATEGORY_CIRCUIT, ?from, ?to, "circuit transition"),
            })
            .try_build()
    }
}
