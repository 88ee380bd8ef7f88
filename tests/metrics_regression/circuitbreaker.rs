//! Circuit breaker metrics regression tests

use super::helpers::*;
use catalog_circuitbreaker::{CircuitBreakerError, CircuitBreakerLayer};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{Service, ServiceExt};

#[tokio::test]
#[serial]
async fn circuitbreaker_metrics_exist() {
    init_recorder();

    let layer = CircuitBreakerLayer::builder()
        .name("test_cb")
        .failure_rate_threshold(0.5)
        .sliding_window_size(4)
        .minimum_number_of_calls(2)
        .wait_duration_in_open(Duration::from_secs(60))
        .build();

    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let service = tower::service_fn(move |_: u64| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n % 2 == 0 {
                Ok::<_, &'static str>("success")
            } else {
                Err("failure")
            }
        }
    });

    let mut service = layer.layer_fn(service);
    for i in 0..6 {
        let _ = service.ready().await.unwrap().call(i).await;
    }

    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "test_cb");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "success");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "failure");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");

    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label("circuitbreaker_transitions_total", "circuitbreaker", "test_cb");
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "Closed");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "Open");

    assert_gauge_exists("circuitbreaker_state");
    assert_metric_has_label("circuitbreaker_state", "circuitbreaker", "test_cb");

    assert_histogram_exists("circuitbreaker_call_duration_seconds");
    assert_metric_has_label(
        "circuitbreaker_call_duration_seconds",
        "circuitbreaker",
        "test_cb",
    );
}

#[tokio::test(start_paused = true)]
#[serial]
async fn circuitbreaker_timeout_and_fallback_metrics() {
    init_recorder();

    let service = tower::service_fn(|_: ()| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, &'static str>(1)
    });

    let fallback = CircuitBreakerLayer::builder()
        .name("slow_cb")
        .call_timeout(Duration::from_millis(100))
        .build()
        .layer_fn(service)
        .with_fallback(|_: Option<CircuitBreakerError<&'static str>>| 0);

    let Ok(answer) = fallback.oneshot(()).await;
    assert_eq!(answer, 0);

    assert_counter_exists("circuitbreaker_timeouts_total");
    assert_metric_has_label("circuitbreaker_timeouts_total", "circuitbreaker", "slow_cb");
    assert_counter_exists("circuitbreaker_fallbacks_total");
    assert_metric_has_label("circuitbreaker_fallbacks_total", "circuitbreaker", "slow_cb");
}
