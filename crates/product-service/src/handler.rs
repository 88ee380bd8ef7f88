//! Product operations, enriched with category names.

use crate::category::{CategoryList, UNKNOWN_CATEGORY};
use crate::client::ListCategories;
use crate::fallback::CategoryService;
use crate::store::{NewProduct, Product, ProductStore, StoreError};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tower::{Service, ServiceExt};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Products with whatever category names could be resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductListing {
    pub products: Vec<Product>,
    pub category_names: BTreeMap<i64, String>,
    /// False when the category lookup was degraded.
    pub categories_available: bool,
}

impl ProductListing {
    pub fn category_name(&self, id: i64) -> &str {
        self.category_names
            .get(&id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CATEGORY)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditForm {
    pub product: Product,
    pub all_categories: CategoryList,
}

/// Outcome of a delete, shown once on the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flash {
    Message(&'static str),
    Error(&'static str),
}

/// Serves product pages. Category lookups go through `C`, which must answer
/// every request (degrading instead of failing); only product store errors
/// reach the caller.
pub struct ProductListingHandler<C = CategoryService> {
    store: Arc<dyn ProductStore>,
    categories: C,
}

impl<C> ProductListingHandler<C>
where
    C: Service<ListCategories, Response = CategoryList, Error = Infallible> + Clone,
{
    pub fn new(store: Arc<dyn ProductStore>, categories: C) -> Self {
        Self { store, categories }
    }

    async fn all_categories(&self) -> CategoryList {
        self.categories
            .clone()
            .oneshot(ListCategories)
            .await
            .unwrap_or_else(|never| match never {})
    }

    pub async fn list_products(&self) -> Result<ProductListing, HandlerError> {
        let products = self.store.find_all()?;
        let categories = self.all_categories().await;

        Ok(ProductListing {
            products,
            category_names: categories.name_index(),
            categories_available: !categories.is_degraded(),
        })
    }

    /// Categories to choose from when adding a product.
    pub async fn add_form(&self) -> CategoryList {
        self.all_categories().await
    }

    pub fn save(&self, product: NewProduct) -> Result<Product, HandlerError> {
        let saved = self.store.create(product)?;
        tracing::info!(id = saved.id, name = %saved.name, "product saved");
        Ok(saved)
    }

    pub fn detail(&self, id: i64) -> Result<Product, HandlerError> {
        Ok(self.store.find_by_id(id)?)
    }

    pub async fn edit_form(&self, id: i64) -> Result<EditForm, HandlerError> {
        let product = self.store.find_by_id(id)?;
        Ok(EditForm {
            product,
            all_categories: self.all_categories().await,
        })
    }

    pub fn update(&self, id: i64, product: NewProduct) -> Result<Product, HandlerError> {
        let updated = self.store.update(id, product)?;
        tracing::info!(id, "product updated");
        Ok(updated)
    }

    /// Deleting an id that is already gone succeeds.
    pub fn delete(&self, id: i64) -> Flash {
        match self.store.delete(id) {
            Ok(()) => {
                tracing::info!(id, "product deleted");
                Flash::Message("Product deleted successfully.")
            }
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(id, "product already absent");
                Flash::Message("Product deleted successfully.")
            }
            Err(err) => {
                tracing::warn!(id, error = %err, "product delete failed");
                Flash::Error("Failed to delete product.")
            }
        }
    }
}
