use super::support::Dependency;
use catalog_circuitbreaker::{CircuitBreakerError, CircuitBreakerLayer, CircuitState};
use std::time::Duration;
use tower::{Service, ServiceExt};

fn layer(threshold: f64, window: usize, minimum: usize) -> CircuitBreakerLayer {
    CircuitBreakerLayer::builder()
        .name("thresholds")
        .failure_rate_threshold(threshold)
        .sliding_window_size(window)
        .minimum_number_of_calls(minimum)
        .wait_duration_in_open(Duration::from_secs(60))
        .build()
}

#[tokio::test]
async fn opens_when_rate_reaches_threshold_exactly() {
    let dependency = Dependency::healthy();
    let mut cb = layer(0.5, 4, 4).layer_fn(dependency.clone());

    for _ in 0..2 {
        cb.ready().await.unwrap().call(()).await.unwrap();
    }
    dependency.set_failing(true);
    let _ = cb.ready().await.unwrap().call(()).await;
    assert_eq!(cb.state(), CircuitState::Closed);

    let _ = cb.ready().await.unwrap().call(()).await;
    assert_eq!(cb.state(), CircuitState::Open);
}

#[tokio::test]
async fn failures_below_minimum_calls_keep_circuit_closed() {
    let dependency = Dependency::failing();
    let mut cb = layer(0.5, 10, 5).layer_fn(dependency.clone());

    for _ in 0..4 {
        let err = cb.ready().await.unwrap().call(()).await.unwrap_err();
        assert!(matches!(err, CircuitBreakerError::Inner("dependency down")));
    }
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.metrics().failure_count, 4);

    let _ = cb.ready().await.unwrap().call(()).await;
    assert_eq!(cb.state(), CircuitState::Open);
}

#[tokio::test]
async fn window_only_remembers_recent_calls() {
    let dependency = Dependency::healthy();
    let mut cb = layer(0.6, 4, 4).layer_fn(dependency.clone());

    // F F S S S F F: the window never holds more than two failures
    for failing in [true, true, false, false, false, true, true] {
        dependency.set_failing(failing);
        let _ = cb.ready().await.unwrap().call(()).await;
    }
    let metrics = cb.metrics();
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(metrics.total_calls, 4);
    assert_eq!(metrics.failure_count, 2);
    assert_eq!(metrics.failure_rate, 0.5);

    // window becomes S F F F
    let _ = cb.ready().await.unwrap().call(()).await;
    assert_eq!(cb.state(), CircuitState::Open);
}

#[tokio::test]
async fn open_circuit_does_not_reach_dependency() {
    let dependency = Dependency::failing();
    let mut cb = layer(0.5, 2, 2).layer_fn(dependency.clone());

    for _ in 0..2 {
        let _ = cb.ready().await.unwrap().call(()).await;
    }
    assert_eq!(cb.state(), CircuitState::Open);

    for _ in 0..5 {
        let err = cb.ready().await.unwrap().call(()).await.unwrap_err();
        assert!(err.is_circuit_open());
    }
    assert_eq!(dependency.calls(), 2);
}

#[tokio::test]
async fn successes_never_open_the_circuit() {
    let dependency = Dependency::healthy();
    let mut cb = layer(0.01, 5, 1).layer_fn(dependency.clone());

    for _ in 0..50 {
        cb.ready().await.unwrap().call(()).await.unwrap();
    }
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.metrics().total_calls, 5);
}
