//! In-memory collaborators.
//!
//! [`MemoryCatalog`] and [`MemoryCartStore`] stand in for the `PostgreSQL`
//! repositories in tests and demos. The cart store joins its rows against
//! the catalog on `list`, like the database does, and can be told to fail
//! every call until it recovers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cartwheel_core::{LineItemId, Product, ProductId, UserId, VariantSelection};

use crate::db::RepositoryError;
use crate::services::cart::{ProductLookup, RemoteCartStore, RemoteLineItem};

/// A product catalog held in memory. Clones share the same products.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    products: Arc<Mutex<HashMap<ProductId, Product>>>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a product.
    pub fn upsert(&self, product: Product) {
        self.products
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(product.id, product);
    }

    /// Remove a product. Cart rows referencing it disappear from listings.
    pub fn remove(&self, id: ProductId) -> Option<Product> {
        self.products
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    /// Change a product's stock, if it exists.
    pub fn set_stock(&self, id: ProductId, stock: u32) {
        if let Some(product) = self
            .products
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&id)
        {
            product.stock = stock;
        }
    }

    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<Product> {
        self.products
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

#[async_trait]
impl ProductLookup for MemoryCatalog {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.get(id))
    }
}

/// A stored cart row, before the product join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub id: LineItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub selected_variants: VariantSelection,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct StoreState {
    rows: Vec<StoredRow>,
    failure: Option<String>,
    fail_after: Option<(usize, String)>,
    calls: usize,
}

/// A [`RemoteCartStore`] held in memory. Clones share the same rows.
#[derive(Debug, Clone)]
pub struct MemoryCartStore {
    catalog: MemoryCatalog,
    state: Arc<Mutex<StoreState>>,
}

impl MemoryCartStore {
    /// Create a store whose rows join against `catalog`.
    #[must_use]
    pub fn new(catalog: MemoryCatalog) -> Self {
        Self {
            catalog,
            state: Arc::default(),
        }
    }

    /// Make every subsequent call fail with `RepositoryError::Unavailable`.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.lock().failure = Some(message.into());
    }

    /// Let the next `successes` calls through, then fail every call after
    /// them with `RepositoryError::Unavailable`.
    pub fn fail_after(&self, successes: usize, message: impl Into<String>) {
        self.lock().fail_after = Some((successes, message.into()));
    }

    /// Stop failing.
    pub fn recover(&self) {
        let mut state = self.lock();
        state.failure = None;
        state.fail_after = None;
    }

    /// Rows for `user_id` in insertion order, without the product join.
    #[must_use]
    pub fn rows(&self, user_id: UserId) -> Vec<StoredRow> {
        self.lock()
            .rows
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Insert a row directly, bypassing failure injection.
    ///
    /// Nothing stops two rows for the same pair, which lets tests reproduce
    /// a cart left inconsistent by a racing client.
    pub fn seed(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
        selected_variants: VariantSelection,
    ) -> LineItemId {
        let id = LineItemId::generate();
        self.lock().rows.push(StoredRow {
            id,
            user_id,
            product_id,
            quantity,
            selected_variants,
            created_at: Utc::now(),
        });
        id
    }

    /// Number of store calls made so far, failed ones included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and fail it if a failure is injected.
    fn begin(&self) -> Result<std::sync::MutexGuard<'_, StoreState>, RepositoryError> {
        let mut state = self.lock();
        state.calls += 1;
        if let Some((remaining, message)) = state.fail_after.take() {
            match remaining.checked_sub(1) {
                Some(left) => state.fail_after = Some((left, message)),
                None => state.failure = Some(message),
            }
        }
        if let Some(message) = &state.failure {
            return Err(RepositoryError::Unavailable(message.clone()));
        }
        Ok(state)
    }
}

#[async_trait]
impl RemoteCartStore for MemoryCartStore {
    async fn list(&self, user_id: UserId) -> Result<Vec<RemoteLineItem>, RepositoryError> {
        let rows: Vec<StoredRow> = self
            .begin()?
            .rows
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let product = self.catalog.get(row.product_id)?;
                Some(RemoteLineItem {
                    id: row.id,
                    user_id: row.user_id,
                    product,
                    quantity: row.quantity,
                    selected_variants: row.selected_variants,
                    created_at: row.created_at,
                })
            })
            .collect())
    }

    async fn insert(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
        selected_variants: &VariantSelection,
    ) -> Result<LineItemId, RepositoryError> {
        let mut state = self.begin()?;
        if self.catalog.get(product_id).is_none() {
            return Err(RepositoryError::Conflict(format!(
                "unknown product {product_id}"
            )));
        }
        let id = LineItemId::generate();
        state.rows.push(StoredRow {
            id,
            user_id,
            product_id,
            quantity,
            selected_variants: selected_variants.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn update_quantity(
        &self,
        line_item_id: LineItemId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let mut state = self.begin()?;
        let row = state
            .rows
            .iter_mut()
            .find(|row| row.id == line_item_id)
            .ok_or(RepositoryError::NotFound)?;
        row.quantity = quantity;
        Ok(())
    }

    async fn delete(&self, line_item_id: LineItemId) -> Result<(), RepositoryError> {
        self.begin()?.rows.retain(|row| row.id != line_item_id);
        Ok(())
    }

    async fn delete_all(&self, user_id: UserId) -> Result<(), RepositoryError> {
        self.begin()?.rows.retain(|row| row.user_id != user_id);
        Ok(())
    }
}
