//! SQLite backend for the Faka storefront.
//!
//! The schema lives in `migrations/` and is applied with [`SqliteDatabase::migrate`].
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
