//! Database operations for the hosted storefront `PostgreSQL`.
//!
//! # Tables
//!
//! The catalog is read-only from here; only `cart_items` is written.
//!
//! - `categories (id uuid, name text, slug text)`
//! - `products (id uuid, name text, description text null, price numeric,
//!   image text null, category_id uuid null, stock int, featured bool)`
//! - `product_variants (id uuid, product_id uuid, name text, value text,
//!   price_modifier numeric, stock int)`
//! - `cart_items (id uuid, user_id uuid, product_id uuid, quantity int,
//!   selected_variants jsonb, created_at timestamptz, updated_at timestamptz)`
//!
//! Schema changes are managed outside this workspace.

pub mod cart_items;
pub mod products;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cart_items::CartItemRepository;
pub use products::ProductRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unknown product on insert).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Convert a database `int` to a non-negative count.
pub(crate) fn non_negative(value: i32, field: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {field}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_negative() {
        assert_eq!(non_negative(7, "stock").ok(), Some(7));
        assert!(matches!(
            non_negative(-1, "stock"),
            Err(RepositoryError::DataCorruption(msg)) if msg == "negative stock: -1"
        ));
    }
}
