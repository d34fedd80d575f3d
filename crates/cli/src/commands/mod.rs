//! Command implementations.
//!
//! Every command works against a [`Shop`]: a cart manager wired to the
//! `PostgreSQL` stores and the local cart directory from configuration.

pub mod cart;
pub mod checkout;

use std::sync::Arc;

use thiserror::Error;

use cartwheel_core::VariantSelectionError;
use cartwheel_storefront::config::CartConfig;
use cartwheel_storefront::db::{self, CartItemRepository, ProductRepository, RepositoryError};
use cartwheel_storefront::local::FileLocalStore;
use cartwheel_storefront::services::cart::{CartError, CartManager};
use cartwheel_storefront::services::checkout::CheckoutRates;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The catalog couldn't be read.
    #[error("catalog error: {0}")]
    Catalog(#[from] RepositoryError),

    /// A `--variant` argument was malformed.
    #[error("invalid variant: {0}")]
    Variant(#[from] VariantSelectionError),
}

/// Everything a command needs.
pub struct Shop {
    pub manager: CartManager,
    pub catalog: ProductRepository,
    pub rates: CheckoutRates,
}

impl Shop {
    /// Connect to the database and build the cart manager.
    ///
    /// # Errors
    ///
    /// Returns the pool's connection error, boxed, if the database can't be
    /// reached.
    pub async fn connect(config: &CartConfig) -> Result<Self, Box<dyn std::error::Error>> {
        tracing::debug!("Connecting to database...");
        let pool = db::create_pool(&config.database_url).await?;

        let catalog = ProductRepository::new(pool.clone(), config.product_cache_ttl);
        let manager = CartManager::new(
            Arc::new(CartItemRepository::new(pool)),
            Arc::new(FileLocalStore::new(&config.local_dir)),
            Arc::new(catalog.clone()),
            config.sign_in_policy,
        );

        Ok(Self {
            manager,
            catalog,
            rates: config.rates,
        })
    }
}
