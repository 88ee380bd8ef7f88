use super::support::{
    category_service, category_service_under, dead_endpoint, handler, store_with, Behaviour,
    ScriptedCategories, CALL_TIMEOUT, COOL_DOWN,
};
use axum::http::StatusCode;
use catalog_circuitbreaker::CircuitState;
use product_service::{CategoryList, UNKNOWN_CATEGORY};
use std::time::Duration;

#[tokio::test]
async fn products_are_named_after_their_category() {
    let endpoint = category_service(&["Books"]).await;
    let (handler, circuit) = handler(endpoint, store_with(&[("Dune", 1), ("Kettle", 2)]));

    let listing = handler.list_products().await.unwrap();
    assert!(listing.categories_available);
    assert_eq!(listing.products.len(), 2);
    assert_eq!(listing.category_name(1), "Books");
    assert_eq!(listing.category_name(2), UNKNOWN_CATEGORY);
    assert_eq!(circuit.state(), CircuitState::Closed);
}

#[tokio::test]
async fn endpoint_base_path_is_kept() {
    let endpoint = category_service_under("/category", &["Books"]).await;
    assert_eq!(endpoint.path(), "/category/");
    let (handler, circuit) = handler(endpoint, store_with(&[("Dune", 1)]));

    let listing = handler.list_products().await.unwrap();
    assert!(listing.categories_available);
    assert_eq!(listing.category_name(1), "Books");
    assert_eq!(circuit.metrics().failure_count, 0);
}

#[tokio::test]
async fn slow_category_service_trips_the_circuit() {
    let (scripted, endpoint) =
        ScriptedCategories::start(Behaviour::Slow(CALL_TIMEOUT * 10)).await;
    let (handler, circuit) = handler(endpoint, store_with(&[("Dune", 1)]));

    for _ in 0..10 {
        let listing = handler.list_products().await.unwrap();
        assert!(!listing.categories_available);
        assert_eq!(listing.products.len(), 1);
    }
    assert_eq!(circuit.state(), CircuitState::Open);
    assert_eq!(scripted.hits(), 10);

    // the eleventh listing is answered without touching the category service
    let started = std::time::Instant::now();
    let listing = handler.list_products().await.unwrap();
    assert!(started.elapsed() < CALL_TIMEOUT);
    assert!(!listing.categories_available);
    assert_eq!(listing.category_name(1), UNKNOWN_CATEGORY);
    assert_eq!(listing.products[0].name, "Dune");
    assert_eq!(scripted.hits(), 10);
}

#[tokio::test]
async fn circuit_recovers_after_cool_down() {
    let (scripted, endpoint) =
        ScriptedCategories::start(Behaviour::Status(StatusCode::INTERNAL_SERVER_ERROR)).await;
    let (handler, circuit) = handler(endpoint, store_with(&[("Dune", 1)]));

    for _ in 0..10 {
        handler.list_products().await.unwrap();
    }
    assert_eq!(circuit.state(), CircuitState::Open);

    scripted.set(Behaviour::Body(r#"[{"id":1,"name":"Books"}]"#));
    let listing = handler.list_products().await.unwrap();
    assert!(!listing.categories_available, "still cooling down");

    tokio::time::sleep(COOL_DOWN + Duration::from_millis(50)).await;
    let listing = handler.list_products().await.unwrap();
    assert!(listing.categories_available);
    assert_eq!(listing.category_name(1), "Books");
    assert_eq!(circuit.state(), CircuitState::Closed);
    assert_eq!(scripted.hits(), 11);
}

#[tokio::test]
async fn null_and_empty_bodies_mean_no_categories() {
    for body in ["null", "", "[]"] {
        let (_scripted, endpoint) = ScriptedCategories::start(Behaviour::Body(body)).await;
        let (handler, circuit) = handler(endpoint, store_with(&[("Dune", 1)]));

        assert_eq!(handler.add_form().await, CategoryList::Records(Vec::new()));
        let listing = handler.list_products().await.unwrap();
        assert!(listing.categories_available, "body {body:?} is not a failure");
        assert!(listing.category_names.is_empty());
        assert_eq!(circuit.metrics().failure_count, 0);
    }
}

#[tokio::test]
async fn malformed_body_degrades() {
    let (_scripted, endpoint) =
        ScriptedCategories::start(Behaviour::Body(r#"{"unexpected":true}"#)).await;
    let (handler, circuit) = handler(endpoint, store_with(&[]));

    assert!(handler.add_form().await.is_degraded());
    assert_eq!(circuit.metrics().failure_count, 1);
}

#[tokio::test]
async fn unreachable_category_service_degrades() {
    let (handler, circuit) = handler(dead_endpoint().await, store_with(&[("Dune", 1)]));

    let listing = handler.list_products().await.unwrap();
    assert!(!listing.categories_available);
    assert_eq!(listing.products.len(), 1);
    assert_eq!(circuit.metrics().failure_count, 1);
}

#[tokio::test]
async fn duplicate_ids_keep_the_first_name() {
    let (_scripted, endpoint) = ScriptedCategories::start(Behaviour::Body(
        r#"[{"id":1,"name":"A"},{"id":1,"name":"B"}]"#,
    ))
    .await;
    let (handler, _) = handler(endpoint, store_with(&[("Dune", 1)]));

    let listing = handler.list_products().await.unwrap();
    assert_eq!(listing.category_names.len(), 1);
    assert_eq!(listing.category_name(1), "A");
}
