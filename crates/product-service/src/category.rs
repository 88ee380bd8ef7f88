//! Category data as seen from the product side.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label shown for a product whose category cannot be named.
pub const UNKNOWN_CATEGORY: &str = "Unknown category";

/// A category as returned by the category service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
}

/// Marker carried by a degraded category list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackMessage {
    pub message: String,
}

impl FallbackMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of a protected category lookup.
///
/// `Records(vec![])` means the category service answered with no categories;
/// `Degraded` means the categories are unknown right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "camelCase")]
pub enum CategoryList {
    Records(Vec<CategoryRecord>),
    Degraded(FallbackMessage),
}

impl CategoryList {
    pub fn is_degraded(&self) -> bool {
        matches!(self, CategoryList::Degraded(_))
    }

    /// Real records, empty when degraded.
    pub fn records(&self) -> &[CategoryRecord] {
        match self {
            CategoryList::Records(records) => records,
            CategoryList::Degraded(_) => &[],
        }
    }

    /// Builds the id to name lookup. The first record wins on duplicate ids.
    pub fn name_index(&self) -> BTreeMap<i64, String> {
        let mut index = BTreeMap::new();
        for record in self.records() {
            index
                .entry(record.id)
                .or_insert_with(|| record.name.clone());
        }
        index
    }
}
