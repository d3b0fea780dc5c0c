//! `SqliteDatabase` is a concrete implementation of a Faka storefront backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
//!
//! ## Locking
//! SQLite allows one writer at a time. A deferred transaction that reads first and writes later can fail outright if
//! another writer commits in between, so every critical section here opens with a write. `create_order` inserts the
//! order row first, and `fulfil_order` touches the order row first. Competing transactions then queue on the write
//! lock, and each one re-reads state that the previous one committed.
//!
//! Writes that return rows (`INSERT … RETURNING`) always run inside an explicit transaction, even on their own. A
//! bare `fetch_one` leaves the statement unfinished, which keeps the implicit transaction open on a pooled connection.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{coupons, db_url, licenses, new_pool, orders, products, settings, traffic_accounts};
use crate::{
    db_types::{
        normalize_coupon_code,
        Category,
        Coupon,
        License,
        NewCoupon,
        NewOrder,
        NewProduct,
        Order,
        OrderNo,
        OrderStatusType,
        Product,
        ProductKind,
        Setting,
        TrafficAccount,
    },
    helpers::{check_coupon, order_total, CouponError, MAX_ORDER_QUANTITY},
    traits::{
        CouponManagement,
        FulfilmentResult,
        InventoryManagement,
        ProvisionedCredentials,
        SettingsManagement,
        StorefrontDatabase,
        StorefrontError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the `FAKA_DATABASE_URL` environment variable, or the default URL.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), StorefrontError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorefrontError::DatabaseError(format!("Migration failed. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    async fn allocate_standard(
        &self,
        order: &Order,
        now: DateTime<Utc>,
        tx: &mut sqlx::SqliteConnection,
    ) -> Result<(), StorefrontError> {
        let ids = licenses::oldest_available(order.product_id, order.quantity, tx).await?;
        let available = ids.len() as i64;
        if available < order.quantity {
            warn!(
                "🗃️ Cannot allocate {} units of product #{} to order [{}]. Only {available} left.",
                order.quantity, order.product_id, order.order_no
            );
            return Err(StorefrontError::InsufficientStock {
                product_id: order.product_id,
                requested: order.quantity,
                available,
            });
        }
        let sold = licenses::mark_sold(&ids, order.id, now, tx).await? as i64;
        if sold != order.quantity {
            return Err(StorefrontError::InsufficientStock {
                product_id: order.product_id,
                requested: order.quantity,
                available: sold,
            });
        }
        Ok(())
    }

    async fn allocate_provisioned(
        &self,
        order: &Order,
        duration: Option<Duration>,
        credentials: Option<ProvisionedCredentials>,
        now: DateTime<Utc>,
        tx: &mut sqlx::SqliteConnection,
    ) -> Result<(), StorefrontError> {
        let credentials = credentials.ok_or_else(|| StorefrontError::ProvisioningRequired(order.order_no.clone()))?;
        let expires_at = duration.map(|d| now + d);
        traffic_accounts::insert_traffic_account(&credentials, order.id, expires_at, now, &mut *tx).await?;
        licenses::insert_sold_license(order.product_id, &credentials.descriptor(), order.id, now, tx).await?;
        Ok(())
    }
}

impl StorefrontDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StorefrontError> {
        if !(1..=MAX_ORDER_QUANTITY).contains(&order.quantity) {
            return Err(StorefrontError::InvalidInput(format!("Quantity must be between 1 and {MAX_ORDER_QUANTITY}")));
        }
        if order.contact.is_empty() {
            return Err(StorefrontError::InvalidInput("A contact address is required".into()));
        }
        if self.fetch_product(order.product_id).await?.is_none() {
            return Err(StorefrontError::ProductNotFound(order.product_id));
        }
        let mut tx = self.pool.begin().await?;
        let inserted = orders::insert_order(&order, &mut tx).await?;
        let product = products::fetch_product(order.product_id, &mut tx)
            .await?
            .ok_or(StorefrontError::ProductNotFound(order.product_id))?;
        if !product.is_provisioned() {
            let available = licenses::count_available(product.id, &mut tx).await?;
            if available < order.quantity {
                debug!("🗃️ Order [{}] rejected. {available} of product #{} in stock", order.order_no, product.id);
                return Err(StorefrontError::InsufficientStock {
                    product_id: product.id,
                    requested: order.quantity,
                    available,
                });
            }
        }
        let (discount, coupon_id) = match order.coupon_code.as_deref().map(normalize_coupon_code) {
            Some(code) if !code.is_empty() => {
                let coupon = coupons::fetch_coupon_by_code(&code, &mut tx)
                    .await?
                    .ok_or_else(|| CouponError::NotFound(code.clone()))?;
                let discount = check_coupon(&coupon, &product)?;
                if !coupons::consume_coupon(coupon.id, inserted.id, &mut tx).await? {
                    return Err(CouponError::AlreadyUsed(code).into());
                }
                trace!("🗃️ Coupon {code} consumed by order [{}]", order.order_no);
                (Some(discount), Some(coupon.id))
            },
            _ => (None, None),
        };
        let total = order_total(product.price, order.quantity, discount.as_ref())
            .ok_or_else(|| StorefrontError::InvalidInput("The order total is too large".into()))?;
        let order = orders::set_order_pricing(inserted.id, total, coupon_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{}] created for {}. Total {}", order.order_no, order.contact, order.total_amount);
        Ok(order)
    }

    async fn fetch_order(&self, order_no: &OrderNo) -> Result<Option<Order>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_no(order_no, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_contact(&self, contact: &str, limit: i64) -> Result<Vec<Order>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_contact(contact, limit, &mut conn).await?;
        Ok(orders)
    }

    async fn fulfil_order(
        &self,
        order_no: &OrderNo,
        payment_method: &str,
        payment_window: Duration,
        now: DateTime<Utc>,
        provisioned: Option<ProvisionedCredentials>,
    ) -> Result<FulfilmentResult, StorefrontError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_order_for_update(order_no, now, &mut tx)
            .await?
            .ok_or_else(|| StorefrontError::OrderNotFound(order_no.clone()))?;
        let status = order.status;
        match status {
            OrderStatusType::Paid => {
                tx.rollback().await?;
                let order = self.fetch_order(order_no).await?.unwrap_or(order);
                trace!("🗃️ Order [{order_no}] is already paid");
                return Ok(FulfilmentResult::AlreadyPaid { order });
            },
            OrderStatusType::Expired => {
                tx.rollback().await?;
                let order = self.fetch_order(order_no).await?.unwrap_or(order);
                return Ok(FulfilmentResult::Expired { order, newly_expired: false });
            },
            OrderStatusType::Pending => {},
        }
        if order.is_stale(now, payment_window) {
            let expired = orders::expire_order(order.id, now, &mut tx)
                .await?
                .ok_or_else(|| StorefrontError::StateConflict(format!("Order {order_no} is no longer pending")))?;
            tx.commit().await?;
            return Ok(FulfilmentResult::Expired { order: expired, newly_expired: true });
        }
        let product = products::fetch_product(order.product_id, &mut tx)
            .await?
            .ok_or(StorefrontError::ProductNotFound(order.product_id))?;
        match product.kind() {
            ProductKind::Standard => self.allocate_standard(&order, now, &mut tx).await?,
            ProductKind::Provisioned { duration } => {
                self.allocate_provisioned(&order, duration, provisioned, now, &mut tx).await?
            },
        }
        let paid = orders::mark_order_paid(order.id, payment_method, now, &mut tx)
            .await?
            .ok_or_else(|| StorefrontError::StateConflict(format!("Order {order_no} is no longer pending")))?;
        let licenses = licenses::fetch_licenses_for_order(paid.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{order_no}] paid via {payment_method}. {} units allocated", licenses.len());
        Ok(FulfilmentResult::Paid { order: paid, licenses })
    }

    async fn expire_stale_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StorefrontError> {
        let mut tx = self.pool.begin().await?;
        let expired = orders::expire_orders_created_before(cutoff, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        if !expired.is_empty() {
            debug!("🗃️ {} pending orders created before {cutoff} have expired", expired.len());
        }
        Ok(expired)
    }

    async fn fetch_licenses_for_order(&self, order_id: i64) -> Result<Vec<License>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        let licenses = licenses::fetch_licenses_for_order(order_id, &mut conn).await?;
        Ok(licenses)
    }

    async fn mark_email_sent(&self, order_no: &OrderNo) -> Result<bool, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        let changed = orders::mark_email_sent(order_no, Utc::now(), &mut conn).await?;
        Ok(changed)
    }

    async fn fetch_traffic_account(&self, username: &str) -> Result<Option<TrafficAccount>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        let account = traffic_accounts::fetch_by_username(username, &mut conn).await?;
        Ok(account)
    }

    async fn fetch_expired_traffic_accounts(&self, now: DateTime<Utc>) -> Result<Vec<TrafficAccount>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        let accounts = traffic_accounts::fetch_expired(now, &mut conn).await?;
        Ok(accounts)
    }

    async fn delete_traffic_account(&self, id: i64) -> Result<(), StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        traffic_accounts::delete_traffic_account(id, &mut conn).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StorefrontError> {
        self.pool.close().await;
        Ok(())
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn insert_category(&self, name: &str) -> Result<Category, StorefrontError> {
        let mut tx = self.pool.begin().await?;
        let category = products::insert_category(name, &mut tx).await?;
        tx.commit().await?;
        Ok(category)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StorefrontError> {
        let mut tx = self.pool.begin().await?;
        let product = products::insert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn import_licenses(&self, product_id: i64, codes: &[String]) -> Result<Vec<License>, StorefrontError> {
        let codes = codes.iter().map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect::<Vec<String>>();
        if codes.is_empty() {
            return Err(StorefrontError::InvalidInput("No valid codes provided".into()));
        }
        let mut tx = self.pool.begin().await?;
        if products::fetch_product(product_id, &mut tx).await?.is_none() {
            return Err(StorefrontError::ProductNotFound(product_id));
        }
        let inserted = licenses::insert_licenses(product_id, &codes, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn fetch_available_licenses(&self, product_id: i64, limit: i64) -> Result<Vec<License>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        let licenses = licenses::fetch_available_licenses(product_id, limit, &mut conn).await?;
        Ok(licenses)
    }

    async fn stock_level(&self, product_id: i64) -> Result<i64, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        let count = licenses::count_available(product_id, &mut conn).await?;
        Ok(count)
    }
}

fn map_coupon_insert_error(code: &str, e: sqlx::Error) -> StorefrontError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorefrontError::CouponAlreadyExists(code.to_string()),
        _ => StorefrontError::from(e),
    }
}

impl CouponManagement for SqliteDatabase {
    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        let coupon = coupons::fetch_coupon_by_code(&normalize_coupon_code(code), &mut conn).await?;
        Ok(coupon)
    }

    async fn insert_coupon(&self, coupon: NewCoupon) -> Result<Coupon, StorefrontError> {
        let mut tx = self.pool.begin().await?;
        let inserted =
            coupons::insert_coupon(&coupon, &mut tx).await.map_err(|e| map_coupon_insert_error(&coupon.code, e))?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn insert_coupons(&self, new_coupons: Vec<NewCoupon>) -> Result<Vec<Coupon>, StorefrontError> {
        let mut tx = self.pool.begin().await?;
        let mut result = Vec::with_capacity(new_coupons.len());
        for coupon in &new_coupons {
            let inserted =
                coupons::insert_coupon(coupon, &mut tx).await.map_err(|e| map_coupon_insert_error(&coupon.code, e))?;
            result.push(inserted);
        }
        tx.commit().await?;
        debug!("🗃️ {} coupons created", result.len());
        Ok(result)
    }

    async fn fetch_coupons(&self, limit: i64) -> Result<Vec<Coupon>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        let coupons = coupons::fetch_coupons(limit, &mut conn).await?;
        Ok(coupons)
    }
}

impl SettingsManagement for SqliteDatabase {
    async fn fetch_settings(&self) -> Result<Vec<Setting>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        let settings = settings::fetch_settings(&mut conn).await?;
        Ok(settings)
    }

    async fn upsert_settings(&self, values: &[Setting]) -> Result<usize, StorefrontError> {
        let mut tx = self.pool.begin().await?;
        for setting in values {
            settings::upsert_setting(setting.key.trim(), &setting.value, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(values.len())
    }
}
