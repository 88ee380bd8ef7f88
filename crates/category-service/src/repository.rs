//! In-memory category storage.

use crate::model::{Category, NewCategory};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("category {0} not found")]
    NotFound(i64),
    #[error("category name must not be blank")]
    BlankName,
}

/// Thread-safe category store with sequential ids starting at 1.
#[derive(Debug, Default)]
pub struct CategoryRepository {
    inner: RwLock<Store>,
}

#[derive(Debug, Default)]
struct Store {
    rows: BTreeMap<i64, Category>,
    last_id: i64,
}

impl CategoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-populated with the given names.
    pub fn seeded<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let repository = Self::new();
        for name in names {
            let name = name.into();
            if let Err(err) = repository.save(NewCategory { name: name.clone() }) {
                tracing::warn!(%name, error = %err, "skipping seed category");
            }
        }
        repository
    }

    /// All categories ordered by id.
    pub fn find_all(&self) -> Vec<Category> {
        let store = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        store.rows.values().cloned().collect()
    }

    pub fn find_by_id(&self, id: i64) -> Result<Category, RepositoryError> {
        let store = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        store
            .rows
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    pub fn save(&self, new: NewCategory) -> Result<Category, RepositoryError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(RepositoryError::BlankName);
        }

        let mut store = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        store.last_id += 1;
        let category = Category {
            id: store.last_id,
            name: name.to_string(),
        };
        store.rows.insert(category.id, category.clone());
        Ok(category)
    }
}
