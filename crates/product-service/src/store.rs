//! Product storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub image: Option<String>,
    pub category_id: i64,
    /// Serialized as RFC 3339.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product fields supplied by a client on create and update.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub image: Option<String>,
    pub category_id: i64,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("product {0} not found")]
    NotFound(i64),
    #[error("invalid product: {0}")]
    Invalid(&'static str),
    #[error("product store unavailable: {0}")]
    Unavailable(String),
}

pub trait ProductStore: Send + Sync + 'static {
    fn find_all(&self) -> Result<Vec<Product>, StoreError>;
    fn find_by_id(&self, id: i64) -> Result<Product, StoreError>;
    fn create(&self, product: NewProduct) -> Result<Product, StoreError>;
    /// Replaces the fields of `id`, keeping its id and creation time.
    fn update(&self, id: i64, product: NewProduct) -> Result<Product, StoreError>;
    fn delete(&self, id: i64) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    inner: RwLock<Rows>,
}

#[derive(Debug, Default)]
struct Rows {
    products: BTreeMap<i64, Product>,
    last_id: i64,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn validate(product: &NewProduct) -> Result<(), StoreError> {
    if product.name.trim().is_empty() {
        return Err(StoreError::Invalid("name must not be blank"));
    }
    if !product.price.is_finite() || product.price < 0.0 {
        return Err(StoreError::Invalid("price must be a non-negative number"));
    }
    Ok(())
}

impl ProductStore for InMemoryProductStore {
    fn find_all(&self) -> Result<Vec<Product>, StoreError> {
        let rows = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.products.values().cloned().collect())
    }

    fn find_by_id(&self, id: i64) -> Result<Product, StoreError> {
        let rows = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        rows.products
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn create(&self, product: NewProduct) -> Result<Product, StoreError> {
        validate(&product)?;
        let mut rows = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        rows.last_id += 1;
        let now = Utc::now();
        let created = Product {
            id: rows.last_id,
            name: product.name,
            price: product.price,
            image: product.image,
            category_id: product.category_id,
            created_at: now,
            updated_at: now,
        };
        rows.products.insert(created.id, created.clone());
        Ok(created)
    }

    fn update(&self, id: i64, product: NewProduct) -> Result<Product, StoreError> {
        validate(&product)?;
        let mut rows = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let existing = rows.products.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        existing.name = product.name;
        existing.price = product.price;
        existing.image = product.image;
        existing.category_id = product.category_id;
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut rows = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        rows.products
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}
