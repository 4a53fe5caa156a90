use serde::{Deserialize, Serialize};

/// A single catalog entry.
///
/// `id` is assigned by the registry and is not guaranteed to be stable
/// across edits that rewrite it through a patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub barcode: String,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    pub price: f64,
}

/// Payload for creating a product. `barcode`, `name` and `price` are
/// required; `unit` defaults to an empty string.
#[derive(Debug, Deserialize)]
pub struct NewProduct {
    pub barcode: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Partial update for an existing product. Absent fields keep their
/// current value.
///
/// A patch may overwrite `id` and `barcode`; the registry does not
/// re-validate the merged record.
#[derive(Debug, Default, Deserialize)]
pub struct ProductPatch {
    pub id: Option<i64>,
    pub barcode: Option<String>,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub price: Option<f64>,
}

impl Product {
    /// Merges `patch` into `self`, field by field.
    pub fn apply(&mut self, patch: ProductPatch) {
        if let Some(id) = patch.id {
            self.id = id;
        }
        if let Some(barcode) = patch.barcode {
            self.barcode = barcode;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(unit) = patch.unit {
            self.unit = unit;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
    }
}
