//! Fallback for category lookups and the protected category service.

use crate::category::{CategoryList, CategoryRecord, FallbackMessage};
use crate::client::{CategoryClient, CategoryClientError};
use catalog_circuitbreaker::{CircuitBreakerError, CircuitBreakerLayer, CircuitBreakerWithFallback};
use tower::util::MapResponse;
use tower::ServiceExt;

/// Name of the circuit guarding the category service.
pub const CATEGORY_CIRCUIT: &str = "categoryServiceCB";

/// Message carried by the degraded category list.
pub const UNAVAILABLE_MESSAGE: &str = "Category service unavailable";

pub type CategoryFailure = CircuitBreakerError<CategoryClientError>;

type ToList = fn(Vec<CategoryRecord>) -> CategoryList;
type Fallback = fn(Option<CategoryFailure>) -> CategoryList;

/// Category client behind the circuit breaker; never fails.
pub type CategoryService = CircuitBreakerWithFallback<MapResponse<CategoryClient, ToList>, Fallback>;

/// Degraded answer for a failed or short-circuited category lookup.
pub fn category_fallback(cause: Option<CategoryFailure>) -> CategoryList {
    match cause {
        None => tracing::debug!(circuit = CATEGORY_CIRCUIT, "short-circuited; categories degraded"),
        Some(err) => tracing::warn!(circuit = CATEGORY_CIRCUIT, error = %err, "category lookup failed; categories degraded"),
    }
    CategoryList::Degraded(FallbackMessage::new(UNAVAILABLE_MESSAGE))
}

/// Wraps `client` in `layer` with [`category_fallback`].
pub fn protect(client: CategoryClient, layer: &CircuitBreakerLayer) -> CategoryService {
    let client = client.map_response(CategoryList::Records as ToList);
    layer
        .layer_fn(client)
        .with_fallback(category_fallback as Fallback)
}
