//! Endpoint resolution for logical service names.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use url::Url;

/// Logical name under which the category service is registered.
pub const CATEGORY_SERVICE: &str = "category-service";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no endpoints registered for service `{0}`")]
    UnknownService(String),
}

/// Supplies one endpoint for a logical service name per call.
pub trait ServiceResolver: Send + Sync + 'static {
    fn resolve(&self, service: &str) -> Result<Url, ResolveError>;
}

/// Resolves every name to the same endpoint.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    endpoint: Url,
}

impl StaticResolver {
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }
}

impl ServiceResolver for StaticResolver {
    fn resolve(&self, _service: &str) -> Result<Url, ResolveError> {
        Ok(self.endpoint.clone())
    }
}

/// Name to endpoint table with round-robin selection per name.
#[derive(Debug, Default)]
pub struct Directory {
    services: HashMap<String, Pool>,
}

#[derive(Debug)]
struct Pool {
    endpoints: Vec<Url>,
    counter: AtomicUsize,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the endpoints for `service`.
    pub fn register<I>(mut self, service: impl Into<String>, endpoints: I) -> Self
    where
        I: IntoIterator<Item = Url>,
    {
        self.services.insert(
            service.into(),
            Pool {
                endpoints: endpoints.into_iter().collect(),
                counter: AtomicUsize::new(0),
            },
        );
        self
    }
}

impl ServiceResolver for Directory {
    fn resolve(&self, service: &str) -> Result<Url, ResolveError> {
        let pool = self
            .services
            .get(service)
            .filter(|pool| !pool.endpoints.is_empty())
            .ok_or_else(|| ResolveError::UnknownService(service.to_string()))?;

        let index = pool.counter.fetch_add(1, Ordering::Relaxed) % pool.endpoints.len();
        Ok(pool.endpoints[index].clone())
    }
}
