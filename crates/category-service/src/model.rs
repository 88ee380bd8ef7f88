use serde::{Deserialize, Serialize};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Payload for creating a category; the id is assigned by the repository.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
}
