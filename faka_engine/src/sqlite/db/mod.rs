//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
//!
//! Timestamps are always bound from Rust rather than taken from `CURRENT_TIMESTAMP`, so that every stored time has
//! the same format and time comparisons go through `julianday()`.
use std::{env, str::FromStr};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod coupons;
pub mod licenses;
pub mod orders;
pub mod products;
pub mod settings;
pub mod traffic_accounts;

const SQLITE_DB_URL: &str = "sqlite://data/faka_store.db";

pub fn db_url() -> String {
    let result = env::var("FAKA_DATABASE_URL").unwrap_or_else(|_| {
        info!("FAKA_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true).foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
