use crate::{
    db_types::{Category, License, NewProduct, Product},
    traits::StorefrontError,
};

/// Products, categories and the license pool.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    async fn insert_category(&self, name: &str) -> Result<Category, StorefrontError>;

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StorefrontError>;

    /// Adds the given codes to the product's pool as `Available` units. Codes are trimmed and blank ones dropped; it is
    /// an error if nothing is left.
    async fn import_licenses(&self, product_id: i64, codes: &[String]) -> Result<Vec<License>, StorefrontError>;

    /// Available units for the product, newest first.
    async fn fetch_available_licenses(&self, product_id: i64, limit: i64) -> Result<Vec<License>, StorefrontError>;

    async fn stock_level(&self, product_id: i64) -> Result<i64, StorefrontError>;
}
