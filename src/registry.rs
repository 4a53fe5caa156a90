use crate::error::{AppError, StoreError};
use crate::product::{NewProduct, Product, ProductPatch};
use crate::store::SpreadsheetStore;

/// In-memory product catalog backed by a [`SpreadsheetStore`].
///
/// The registry owns the authoritative product list. Every mutation edits
/// the list first and then rewrites the backing file, so a failed save
/// leaves the file one edit behind the memory state until the next
/// successful write.
pub struct ProductRegistry {
    products: Vec<Product>,
    store: SpreadsheetStore,
}

impl ProductRegistry {
    /// Open the catalog at the store's path, loading whatever is there.
    pub fn open(store: SpreadsheetStore) -> Result<Self, StoreError> {
        let products = store.load()?;
        Ok(Self { products, store })
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn find(&self, barcode: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.barcode == barcode)
    }

    /// Insert a new product and persist the catalog.
    ///
    /// Barcode and name are trimmed and must be non-empty, the price must
    /// not be negative, and the barcode must not collide with an existing
    /// product (case-sensitive comparison). The new id is one above the
    /// current maximum, so deleting the highest product frees its id for
    /// reuse.
    pub fn insert(&mut self, draft: NewProduct) -> Result<Product, AppError> {
        let barcode = draft.barcode.trim();
        let name = draft.name.trim();
        if barcode.is_empty() || name.is_empty() || draft.price < 0.0 {
            return Err(AppError::Validation("invalid fields".into()));
        }
        if self.find(barcode).is_some() {
            return Err(AppError::DuplicateBarcode);
        }

        let id = self.products.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let product = Product {
            id,
            barcode: barcode.to_string(),
            name: name.to_string(),
            unit: draft.unit.unwrap_or_default(),
            price: draft.price,
        };
        self.products.push(product.clone());
        self.store.save(&self.products)?;

        Ok(product)
    }

    /// Merge `patch` into the product with `barcode` and persist.
    ///
    /// The patch is applied as-is, including an `id` or `barcode` field if
    /// one is present.
    pub fn update(&mut self, barcode: &str, patch: ProductPatch) -> Result<Product, AppError> {
        let index = self.position(barcode)?;
        self.products[index].apply(patch);
        let updated = self.products[index].clone();
        self.store.save(&self.products)?;

        Ok(updated)
    }

    /// Remove the product with `barcode` and persist.
    pub fn remove(&mut self, barcode: &str) -> Result<(), AppError> {
        let index = self.position(barcode)?;
        self.products.remove(index);
        self.store.save(&self.products)?;

        Ok(())
    }

    fn position(&self, barcode: &str) -> Result<usize, AppError> {
        self.products
            .iter()
            .position(|p| p.barcode == barcode)
            .ok_or(AppError::NotFound)
    }
}
