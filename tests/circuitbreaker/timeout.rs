use catalog_circuitbreaker::{CircuitBreakerError, CircuitBreakerLayer, CircuitState};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{Service, ServiceExt};

const LIMIT: Duration = Duration::from_secs(2);

/// Answers after `delay_ms`, counting calls.
fn delayed(
    delay_ms: Arc<AtomicU64>,
    calls: Arc<AtomicUsize>,
) -> impl Service<(), Response = u64, Error = &'static str, Future = impl Send> + Clone + Send + 'static
{
    tower::service_fn(move |_: ()| {
        calls.fetch_add(1, Ordering::SeqCst);
        let delay = delay_ms.load(Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<u64, &'static str>(delay)
        }
    })
}

fn layer() -> CircuitBreakerLayer {
    CircuitBreakerLayer::builder()
        .name("timeouts")
        .sliding_window_size(3)
        .wait_duration_in_open(Duration::from_secs(60))
        .call_timeout(LIMIT)
        .build()
}

#[tokio::test(start_paused = true)]
async fn slow_call_times_out_and_counts_as_failure() {
    let delay = Arc::new(AtomicU64::new(5_000));
    let calls = Arc::new(AtomicUsize::new(0));
    let mut cb = layer().layer_fn(delayed(Arc::clone(&delay), Arc::clone(&calls)));

    let started = tokio::time::Instant::now();
    let err = cb.ready().await.unwrap().call(()).await.unwrap_err();
    assert!(matches!(err, CircuitBreakerError::Timeout(limit) if limit == LIMIT));
    assert_eq!(started.elapsed(), LIMIT);
    assert_eq!(cb.metrics().failure_count, 1);
}

#[tokio::test(start_paused = true)]
async fn call_within_limit_succeeds() {
    let delay = Arc::new(AtomicU64::new(1_999));
    let calls = Arc::new(AtomicUsize::new(0));
    let mut cb = layer().layer_fn(delayed(delay, calls));

    assert_eq!(cb.ready().await.unwrap().call(()).await.unwrap(), 1_999);
    assert_eq!(cb.metrics().success_count, 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_timeouts_open_the_circuit() {
    let delay = Arc::new(AtomicU64::new(10_000));
    let calls = Arc::new(AtomicUsize::new(0));
    let mut cb = layer().layer_fn(delayed(Arc::clone(&delay), Arc::clone(&calls)));

    for _ in 0..3 {
        let err = cb.ready().await.unwrap().call(()).await.unwrap_err();
        assert!(err.is_timeout());
    }
    assert_eq!(cb.state(), CircuitState::Open);

    // short-circuited calls return at once
    let started = tokio::time::Instant::now();
    let err = cb.ready().await.unwrap().call(()).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
