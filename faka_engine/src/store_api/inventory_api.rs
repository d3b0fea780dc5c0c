use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Category, License, NewProduct, Product},
    traits::{InventoryManagement, StorefrontDatabase, StorefrontError},
};

/// The maximum number of available units listed at once.
pub const LICENSE_LIST_LIMIT: i64 = 100;

/// Products and the license pool.
pub struct InventoryApi<B> {
    db: B,
}

impl<B: Debug> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi ({:?})", self.db)
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement + StorefrontDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn create_category(&self, name: &str) -> Result<Category, StorefrontError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorefrontError::InvalidInput("A category name is required".into()));
        }
        self.db.insert_category(name).await
    }

    pub async fn create_product(&self, product: NewProduct) -> Result<Product, StorefrontError> {
        if product.name.trim().is_empty() {
            return Err(StorefrontError::InvalidInput("A product name is required".into()));
        }
        if product.price.is_negative() {
            return Err(StorefrontError::InvalidInput("A product price cannot be negative".into()));
        }
        let product = self.db.insert_product(product).await?;
        info!("📦️ Product #{} ({}) created", product.id, product.name);
        Ok(product)
    }

    pub async fn product(&self, product_id: i64) -> Result<Option<Product>, StorefrontError> {
        self.db.fetch_product(product_id).await
    }

    /// Adds codes to a product's pool. Blank codes are dropped.
    pub async fn import_licenses(&self, product_id: i64, codes: &[String]) -> Result<Vec<License>, StorefrontError> {
        let imported = self.db.import_licenses(product_id, codes).await?;
        info!("📦️ Imported {} units for product #{product_id}", imported.len());
        Ok(imported)
    }

    /// Available units for the product, newest first.
    pub async fn available_licenses(&self, product_id: i64) -> Result<Vec<License>, StorefrontError> {
        self.db.fetch_available_licenses(product_id, LICENSE_LIST_LIMIT).await
    }

    pub async fn stock_level(&self, product_id: i64) -> Result<i64, StorefrontError> {
        self.db.stock_level(product_id).await
    }
}
