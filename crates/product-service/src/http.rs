//! HTTP routes for the product service.

use crate::category::CategoryList;
use crate::handler::{EditForm, Flash, HandlerError, ProductListing, ProductListingHandler};
use crate::store::{NewProduct, Product, StoreError};
use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use catalog_circuitbreaker::CircuitHandle;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const FLASH_MESSAGE_HEADER: &str = "x-flash-message";
pub const FLASH_ERROR_HEADER: &str = "x-flash-error";

const LIST_PATH: &str = "/products/list";

#[derive(Clone)]
pub struct AppState {
    handler: Arc<ProductListingHandler>,
    circuit: CircuitHandle,
}

impl AppState {
    pub fn new(handler: ProductListingHandler, circuit: CircuitHandle) -> Self {
        Self {
            handler: Arc::new(handler),
            circuit,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/products/list", get(list_products))
        .route("/products/add", get(add_form))
        .route("/products/save", post(save_product))
        .route("/products/detail/:id", get(product_detail))
        .route("/products/edit/:id", get(edit_form))
        .route("/products/update/:id", post(update_product))
        .route("/products/delete/:id", get(delete_product))
        .route("/health/ready", get(health_ready))
        .route("/health/live", get(health_live))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductRow<'a> {
    #[serde(flatten)]
    product: &'a Product,
    category_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListingView<'a> {
    products: Vec<ProductRow<'a>>,
    category_names: &'a BTreeMap<i64, String>,
    categories_available: bool,
}

impl<'a> From<&'a ProductListing> for ListingView<'a> {
    fn from(listing: &'a ProductListing) -> Self {
        let products = listing
            .products
            .iter()
            .map(|product| ProductRow {
                product,
                category_name: listing.category_name(product.category_id),
            })
            .collect();
        Self {
            products,
            category_names: &listing.category_names,
            categories_available: listing.categories_available,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddFormView {
    all_categories: CategoryList,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EditFormView {
    product: Product,
    all_categories: CategoryList,
}

impl From<EditForm> for EditFormView {
    fn from(form: EditForm) -> Self {
        Self {
            product: form.product,
            all_categories: form.all_categories,
        }
    }
}

async fn list_products(State(state): State<AppState>) -> Result<Response, HandlerError> {
    let listing = state.handler.list_products().await?;
    Ok(Json(ListingView::from(&listing)).into_response())
}

async fn add_form(State(state): State<AppState>) -> Json<AddFormView> {
    Json(AddFormView {
        all_categories: state.handler.add_form().await,
    })
}

async fn save_product(
    State(state): State<AppState>,
    Json(product): Json<NewProduct>,
) -> Result<Redirect, HandlerError> {
    state.handler.save(product)?;
    Ok(Redirect::to(LIST_PATH))
}

async fn product_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Product>, HandlerError> {
    Ok(Json(state.handler.detail(id)?))
}

async fn edit_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<EditFormView>, HandlerError> {
    let form = state.handler.edit_form(id).await?;
    Ok(Json(form.into()))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(product): Json<NewProduct>,
) -> Result<Redirect, HandlerError> {
    state.handler.update(id, product)?;
    Ok(Redirect::to(LIST_PATH))
}

async fn delete_product(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let (header, message) = match state.handler.delete(id) {
        Flash::Message(message) => (FLASH_MESSAGE_HEADER, message),
        Flash::Error(message) => (FLASH_ERROR_HEADER, message),
    };
    let mut response = Redirect::to(LIST_PATH).into_response();
    response
        .headers_mut()
        .insert(header, HeaderValue::from_static(message));
    response
}

/// Readiness follows the category circuit: 503 while it is open.
async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    let circuit = &state.circuit;
    let status =
        StatusCode::from_u16(circuit.http_status()).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);

    (
        status,
        Json(serde_json::json!({
            "status": circuit.health_status(),
            "circuit": circuit.name(),
            "circuit_state": circuit.state(),
            "metrics": circuit.metrics(),
        })),
    )
}

async fn health_live() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = match &self {
            HandlerError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            HandlerError::Store(StoreError::Invalid(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            HandlerError::Store(StoreError::Unavailable(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
