//! HTTP client for the category service.

use crate::category::CategoryRecord;
use crate::directory::{ResolveError, ServiceResolver, CATEGORY_SERVICE};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tower::Service;
use url::Url;

const CATEGORIES_PATH: [&str; 2] = ["api", "categories"];

/// Request for the full category list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListCategories;

#[derive(Debug, Error)]
pub enum CategoryClientError {
    #[error("cannot resolve category service: {0}")]
    Resolve(#[from] ResolveError),
    #[error("category service endpoint {0} cannot take a path")]
    Endpoint(Url),
    #[error("category request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("category service responded with {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed category payload: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Fetches categories from whichever endpoint the resolver hands out.
///
/// One attempt per call; timeouts and retries are left to the caller.
#[derive(Clone)]
pub struct CategoryClient {
    http: reqwest::Client,
    resolver: Arc<dyn ServiceResolver>,
}

impl CategoryClient {
    pub fn new(resolver: Arc<dyn ServiceResolver>) -> Self {
        Self::with_http_client(reqwest::Client::new(), resolver)
    }

    pub fn with_http_client(http: reqwest::Client, resolver: Arc<dyn ServiceResolver>) -> Self {
        Self { http, resolver }
    }

    pub async fn fetch_categories(&self) -> Result<Vec<CategoryRecord>, CategoryClientError> {
        let url = categories_url(self.resolver.resolve(CATEGORY_SERVICE)?)?;
        tracing::debug!(%url, "fetching categories");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(CategoryClientError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CategoryClientError::Status(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(CategoryClientError::Transport)?;
        decode_categories(&body)
    }
}

impl std::fmt::Debug for CategoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryClient").finish_non_exhaustive()
    }
}

/// Appends the list path to `endpoint`, keeping any base path it carries.
fn categories_url(mut endpoint: Url) -> Result<Url, CategoryClientError> {
    if endpoint.cannot_be_a_base() {
        return Err(CategoryClientError::Endpoint(endpoint));
    }
    if let Ok(mut segments) = endpoint.path_segments_mut() {
        segments.pop_if_empty().extend(CATEGORIES_PATH);
    }
    Ok(endpoint)
}

/// An absent body or JSON `null` is an empty list.
pub(crate) fn decode_categories(body: &[u8]) -> Result<Vec<CategoryRecord>, CategoryClientError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    let records: Option<Vec<CategoryRecord>> =
        serde_json::from_slice(body).map_err(CategoryClientError::Decode)?;
    Ok(records.unwrap_or_default())
}

impl Service<ListCategories> for CategoryClient {
    type Response = Vec<CategoryRecord>;
    type Error = CategoryClientError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: ListCategories) -> Self::Future {
        let client = self.clone();
        Box::pin(async move { client.fetch_categories().await })
    }
}
