//! Property tests for the circuit breaker.

use catalog_circuitbreaker::{CircuitBreakerLayer, CircuitState};
use proptest::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tower::{Service, ServiceExt};

/// Replays `outcomes` (`true` = failure) one per call.
fn scripted(
    outcomes: Arc<Vec<bool>>,
    calls: Arc<AtomicUsize>,
) -> impl Service<(), Response = (), Error = &'static str, Future = impl Send> + Clone + Send + 'static
{
    tower::service_fn(move |_: ()| {
        let index = calls.fetch_add(1, Ordering::SeqCst);
        let fail = outcomes.get(index).copied().unwrap_or(false);
        async move {
            if fail {
                Err("scripted failure")
            } else {
                Ok(())
            }
        }
    })
}

/// Number of calls after which a closed circuit with these settings opens.
fn expected_trip(outcomes: &[bool], threshold: f64, window: usize, minimum: usize) -> Option<usize> {
    let mut recent = VecDeque::new();
    for (i, &failed) in outcomes.iter().enumerate() {
        recent.push_back(failed);
        if recent.len() > window {
            recent.pop_front();
        }
        let failures = recent.iter().filter(|&&f| f).count();
        if recent.len() >= minimum && failures as f64 / recent.len() as f64 >= threshold {
            return Some(i + 1);
        }
    }
    None
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: the circuit opens on exactly the call that makes the window
    /// reach the threshold, and is never reached afterwards.
    #[test]
    fn opens_exactly_at_threshold(
        outcomes in prop::collection::vec(any::<bool>(), 1..60),
        threshold in 0.05f64..=1.0,
        window in 1usize..=12,
        minimum_seed in 1usize..=12,
    ) {
        let minimum = minimum_seed.min(window);
        let expected = expected_trip(&outcomes, threshold, window, minimum);

        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let outcomes = Arc::new(outcomes);
            let mut cb = CircuitBreakerLayer::builder()
                .failure_rate_threshold(threshold)
                .sliding_window_size(window)
                .minimum_number_of_calls(minimum)
                .wait_duration_in_open(Duration::from_secs(3600))
                .build()
                .layer_fn(scripted(Arc::clone(&outcomes), Arc::clone(&calls)));

            for _ in 0..outcomes.len() {
                let _ = cb.ready().await.unwrap().call(()).await;
            }

            let made = calls.load(Ordering::SeqCst);
            match expected {
                Some(trip) => {
                    prop_assert_eq!(cb.state(), CircuitState::Open);
                    prop_assert_eq!(made, trip);
                }
                None => {
                    prop_assert_eq!(cb.state(), CircuitState::Closed);
                    prop_assert_eq!(made, outcomes.len());
                }
            }
            Ok(())
        })?;
    }

    /// Property: an open circuit rejects every call without reaching the
    /// wrapped service.
    #[test]
    fn open_circuit_is_never_reached(attempts in 1usize..50) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let mut cb = CircuitBreakerLayer::builder()
                .wait_duration_in_open(Duration::from_secs(3600))
                .build()
                .layer_fn(scripted(Arc::new(Vec::new()), Arc::clone(&calls)));
            cb.handle().force_open();

            for _ in 0..attempts {
                let err = cb.ready().await.unwrap().call(()).await.unwrap_err();
                prop_assert!(err.is_circuit_open());
            }
            prop_assert_eq!(calls.load(Ordering::SeqCst), 0);
            Ok(())
        })?;
    }
}
