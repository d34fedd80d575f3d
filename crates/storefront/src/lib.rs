//! Cartwheel storefront library.
//!
//! The cart manager and everything it talks to: the remote cart store and
//! product catalog in `PostgreSQL`, device-local persistence for anonymous
//! carts, the shopper identity seam, and checkout totals.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use cartwheel_storefront::local::MemoryLocalStore;
//! use cartwheel_storefront::memory::{MemoryCartStore, MemoryCatalog};
//! use cartwheel_storefront::models::CartOwner;
//! use cartwheel_storefront::services::cart::{CartManager, SignInPolicy};
//!
//! # async fn demo() {
//! let catalog = MemoryCatalog::new();
//! let manager = CartManager::new(
//!     Arc::new(MemoryCartStore::new(catalog.clone())),
//!     Arc::new(MemoryLocalStore::new()),
//!     Arc::new(catalog),
//!     SignInPolicy::Discard,
//! );
//! let cart = manager.resync(CartOwner::Anonymous).await;
//! assert!(cart.is_empty());
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod local;
pub mod memory;
pub mod models;
pub mod services;
