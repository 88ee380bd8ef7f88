use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls pass through and outcomes are recorded.
    Closed = 0,
    /// Calls are short-circuited until the cool-down elapses.
    Open = 1,
    /// Probe calls are admitted one at a time to test recovery.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

/// Point-in-time view of a circuit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CircuitMetrics {
    /// Current state.
    pub state: CircuitState,
    /// Calls currently in the observation window (closed state only).
    pub total_calls: usize,
    /// Failed calls in the window.
    pub failure_count: usize,
    /// Successful calls in the window.
    pub success_count: usize,
    /// `failure_count / total_calls`, or 0.0 for an empty window.
    pub failure_rate: f64,
    /// Time since the last state transition.
    pub time_since_state_change: Duration,
    /// Whether a half-open probe is currently running.
    pub probe_in_flight: bool,
}

/// Outcome of asking the circuit for permission to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Permitted(Ticket),
    Rejected,
}

/// Identifies the circuit epoch a call was admitted in. Outcomes from a
/// previous epoch (the circuit transitioned while the call ran) are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub(crate) generation: u64,
    pub(crate) probe: bool,
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    generation: u64,
    // Closed: rolling window of the last N outcomes, `true` = failure
    window: VecDeque<bool>,
    window_failures: usize,
    // HalfOpen bookkeeping
    probes_admitted: usize,
    probe_successes: usize,
    probe_in_flight: bool,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            last_state_change: Instant::now(),
            generation: 0,
            window: VecDeque::new(),
            window_failures: 0,
            probes_admitted: 0,
            probe_successes: 0,
            probe_in_flight: false,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn metrics(&self) -> CircuitMetrics {
        let total_calls = self.window.len();
        let failure_rate = if total_calls > 0 {
            self.window_failures as f64 / total_calls as f64
        } else {
            0.0
        };

        CircuitMetrics {
            state: self.state,
            total_calls,
            failure_count: self.window_failures,
            success_count: total_calls - self.window_failures,
            failure_rate,
            time_since_state_change: self.last_state_change.elapsed(),
            probe_in_flight: self.probe_in_flight,
        }
    }

    /// Decides whether a call may reach the inner service.
    ///
    /// Open circuits whose cool-down has elapsed move to half-open here, so the
    /// caller that observes the expiry is the one offered the probe slot.
    pub(crate) fn try_acquire(&mut self, config: &CircuitBreakerConfig) -> Admission {
        if self.state == CircuitState::Open
            && self.last_state_change.elapsed() >= config.wait_duration_in_open
        {
            self.transition_to(CircuitState::HalfOpen, config);
        }

        let admission = match self.state {
            CircuitState::Closed => Admission::Permitted(Ticket {
                generation: self.generation,
                probe: false,
            }),
            CircuitState::Open => Admission::Rejected,
            CircuitState::HalfOpen => {
                if !self.probe_in_flight
                    && self.probes_admitted < config.permitted_calls_in_half_open
                {
                    self.probe_in_flight = true;
                    self.probes_admitted += 1;
                    Admission::Permitted(Ticket {
                        generation: self.generation,
                        probe: true,
                    })
                } else {
                    Admission::Rejected
                }
            }
        };

        match admission {
            Admission::Permitted(ticket) => {
                config.events.emit(CircuitBreakerEvent::CallPermitted {
                    state: self.state,
                    probe: ticket.probe,
                });
            }
            Admission::Rejected => {
                config
                    .events
                    .emit(CircuitBreakerEvent::CallRejected { state: self.state });

                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);
            }
        }

        admission
    }

    pub(crate) fn record_success(
        &mut self,
        config: &CircuitBreakerConfig,
        ticket: Ticket,
        duration: Duration,
    ) {
        config.events.emit(CircuitBreakerEvent::SuccessRecorded {
            state: self.state,
            duration,
        });

        #[cfg(feature = "metrics")]
        {
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "success").increment(1);
            histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => config.name.clone())
                .record(duration.as_secs_f64());
        }

        if ticket.generation != self.generation {
            return;
        }

        match self.state {
            CircuitState::Closed => {
                self.push_outcome(false, config);
                self.evaluate_window(config);
            }
            CircuitState::HalfOpen if ticket.probe => {
                self.probe_in_flight = false;
                self.probe_successes += 1;
                if self.probe_successes >= config.permitted_calls_in_half_open {
                    self.transition_to(CircuitState::Closed, config);
                }
            }
            _ => {}
        }
    }

    pub(crate) fn record_failure(
        &mut self,
        config: &CircuitBreakerConfig,
        ticket: Ticket,
        duration: Duration,
    ) {
        config.events.emit(CircuitBreakerEvent::FailureRecorded {
            state: self.state,
            duration,
        });

        #[cfg(feature = "metrics")]
        {
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure").increment(1);
            histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => config.name.clone())
                .record(duration.as_secs_f64());
        }

        if ticket.generation != self.generation {
            return;
        }

        match self.state {
            CircuitState::Closed => {
                self.push_outcome(true, config);
                self.evaluate_window(config);
            }
            CircuitState::HalfOpen if ticket.probe => {
                self.probe_in_flight = false;
                self.transition_to(CircuitState::Open, config);
            }
            _ => {}
        }
    }

    /// Gives back a probe slot whose call never reported an outcome.
    pub(crate) fn release(&mut self, ticket: Ticket) {
        if ticket.probe
            && ticket.generation == self.generation
            && self.state == CircuitState::HalfOpen
            && self.probe_in_flight
        {
            self.probe_in_flight = false;
            self.probes_admitted -= 1;
        }
    }

    pub(crate) fn force_open(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Open, config);
    }

    pub(crate) fn force_closed(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Closed, config);
    }

    /// Closes the circuit and clears all counters, even if already closed.
    pub(crate) fn reset(&mut self, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Closed, config);
        self.clear();
    }

    fn push_outcome(&mut self, failed: bool, config: &CircuitBreakerConfig) {
        self.window.push_back(failed);
        if failed {
            self.window_failures += 1;
        }
        while self.window.len() > config.sliding_window_size {
            if let Some(true) = self.window.pop_front() {
                self.window_failures -= 1;
            }
        }
    }

    fn evaluate_window(&mut self, config: &CircuitBreakerConfig) {
        let total = self.window.len();
        if total < config.minimum_number_of_calls {
            return;
        }

        let failure_rate = self.window_failures as f64 / total as f64;
        if failure_rate >= config.failure_rate_threshold {
            self.transition_to(CircuitState::Open, config);
        }
    }

    fn clear(&mut self) {
        self.window.clear();
        self.window_failures = 0;
        self.probes_admitted = 0;
        self.probe_successes = 0;
        self.probe_in_flight = false;
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        config.events.emit(CircuitBreakerEvent::StateTransition {
            from_state,
            to_state: state,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %config.name,
            from = from_state.as_str(),
            to = state.as_str(),
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);

            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(state as u8 as f64);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.generation += 1;
        self.clear();
    }
}
