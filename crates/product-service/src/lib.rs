//! Product service.
//!
//! Lists products together with the name of each product's category. Category
//! names live in a separate service, reached through [`CategoryClient`] behind
//! the `categoryServiceCB` circuit breaker. When that service is slow, failing,
//! or the circuit is open, the lookup degrades to
//! [`CategoryList::Degraded`] and products are still served, labelled
//! [`UNKNOWN_CATEGORY`].
//!
//! ```text
//! ProductListingHandler ──► CircuitBreaker(timeout) ──► CategoryClient ──► GET <endpoint>/api/categories
//!                                 │                           ▲
//!                                 └─► category_fallback       └── ServiceResolver ("category-service")
//! ```

pub mod category;
pub mod client;
pub mod config;
pub mod directory;
pub mod fallback;
pub mod handler;
pub mod http;
pub mod store;

pub use category::{CategoryList, CategoryRecord, FallbackMessage, UNKNOWN_CATEGORY};
pub use client::{CategoryClient, CategoryClientError, ListCategories};
pub use config::{BreakerSettings, Settings};
pub use directory::{Directory, ResolveError, ServiceResolver, StaticResolver, CATEGORY_SERVICE};
pub use fallback::{category_fallback, protect, CategoryService, CATEGORY_CIRCUIT};
pub use handler::{Flash, HandlerError, ProductListing, ProductListingHandler};
pub use http::{router, AppState};
pub use store::{InMemoryProductStore, NewProduct, Product, ProductStore, StoreError};

use catalog_circuitbreaker::CircuitBreakerLayer;
use std::sync::Arc;

/// Wires a resolver, store and breaker layer into the application state.
pub fn app_state(
    resolver: Arc<dyn ServiceResolver>,
    store: Arc<dyn ProductStore>,
    layer: &CircuitBreakerLayer,
) -> AppState {
    let categories = protect(CategoryClient::new(resolver), layer);
    let circuit = categories.handle();
    AppState::new(ProductListingHandler::new(store, categories), circuit)
}
