//! Integration tests for Cartwheel.
//!
//! The tests drive a [`CartManager`] wired to in-memory collaborators, so
//! they run without a database:
//!
//! ```bash
//! cargo test -p cartwheel-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_anonymous` - Device-local carts
//! - `cart_identified` - Carts stored remotely per user
//! - `cart_identity` - Sign-in, sign-out, and identity tracking
//! - `cart_properties` - Invariants over random operation sequences
//! - `checkout` - Totals and checkout completion

use std::sync::Arc;

use rust_decimal::Decimal;

use cartwheel_core::{Product, ProductId, ProductVariant, UserId, VariantId};
use cartwheel_storefront::local::MemoryLocalStore;
use cartwheel_storefront::memory::{MemoryCartStore, MemoryCatalog};
use cartwheel_storefront::models::CartOwner;
use cartwheel_storefront::services::cart::{CartManager, SignInPolicy};

/// A cart manager plus handles on everything behind it.
///
/// The handles share state with the manager, so tests can inspect what was
/// written or inject failures.
pub struct TestShop {
    pub manager: CartManager,
    pub catalog: MemoryCatalog,
    pub remote: MemoryCartStore,
    pub local: MemoryLocalStore,
}

impl TestShop {
    /// A shop that discards the anonymous cart on sign-in.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(SignInPolicy::Discard)
    }

    #[must_use]
    pub fn with_policy(policy: SignInPolicy) -> Self {
        let catalog = MemoryCatalog::new();
        let remote = MemoryCartStore::new(catalog.clone());
        let local = MemoryLocalStore::new();
        let manager = CartManager::new(
            Arc::new(remote.clone()),
            Arc::new(local.clone()),
            Arc::new(catalog.clone()),
            policy,
        );
        Self {
            manager,
            catalog,
            remote,
            local,
        }
    }

    /// A second manager over the same device storage, remote store, and
    /// catalog, as if the app were restarted.
    #[must_use]
    pub fn reopen(&self) -> CartManager {
        CartManager::new(
            Arc::new(self.remote.clone()),
            Arc::new(self.local.clone()),
            Arc::new(self.catalog.clone()),
            self.manager.policy(),
        )
    }

    /// Put `product` in the catalog and hand it back.
    pub fn stock(&self, product: Product) -> Product {
        self.catalog.upsert(product.clone());
        product
    }
}

impl Default for TestShop {
    fn default() -> Self {
        Self::new()
    }
}

/// A product without variants priced at `cents`.
#[must_use]
pub fn product(name: &str, cents: i64, stock: u32) -> Product {
    Product {
        id: ProductId::generate(),
        name: name.to_owned(),
        description: None,
        price: Decimal::new(cents, 2),
        image: None,
        stock,
        featured: false,
        category: None,
        variants: Vec::new(),
    }
}

/// Add a variant option to `product`.
#[must_use]
pub fn with_variant(
    mut product: Product,
    axis: &str,
    value: &str,
    modifier_cents: i64,
    stock: u32,
) -> Product {
    product.variants.push(ProductVariant {
        id: VariantId::generate(),
        product_id: product.id,
        name: axis.to_owned(),
        value: value.to_owned(),
        price_modifier: Decimal::new(modifier_cents, 2),
        stock,
    });
    product
}

/// A fresh signed-in owner.
#[must_use]
pub fn shopper() -> (UserId, CartOwner) {
    let user = UserId::generate();
    (user, CartOwner::Identified(user))
}

/// Dollars and cents as a [`Decimal`].
#[must_use]
pub fn dollars(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
