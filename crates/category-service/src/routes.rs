//! HTTP routes.

use crate::model::{Category, NewCategory};
use crate::repository::{CategoryRepository, RepositoryError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

/// Builds the service router over a shared repository.
pub fn router(repository: Arc<CategoryRepository>) -> Router {
    Router::new()
        .route("/api/categories", get(list_categories).post(create_category))
        .route("/api/categories/:id", get(get_category))
        .route("/health/live", get(|| async { "OK" }))
        .with_state(repository)
}

async fn list_categories(State(repository): State<Arc<CategoryRepository>>) -> Json<Vec<Category>> {
    Json(repository.find_all())
}

async fn get_category(
    State(repository): State<Arc<CategoryRepository>>,
    Path(id): Path<i64>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(repository.find_by_id(id)?))
}

async fn create_category(
    State(repository): State<Arc<CategoryRepository>>,
    Json(new): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = repository.save(new)?;
    tracing::info!(id = category.id, name = %category.name, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

struct ApiError(RepositoryError);

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            RepositoryError::NotFound(_) => StatusCode::NOT_FOUND,
            RepositoryError::BlankName => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (status, self.0.to_string()).into_response()
    }
}
