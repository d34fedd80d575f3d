//! Collaborator contracts the cart manager depends on.
//!
//! Both traits are object safe; the manager holds them as `Arc<dyn _>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cartwheel_core::{LineItemId, Product, ProductId, UserId, VariantSelection};

use crate::db::RepositoryError;
use crate::models::{LineItem, ProductSnapshot};

/// A cart row as stored remotely, with its product joined in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLineItem {
    pub id: LineItemId,
    pub user_id: UserId,
    pub product: Product,
    pub quantity: u32,
    pub selected_variants: VariantSelection,
    pub created_at: DateTime<Utc>,
}

impl RemoteLineItem {
    /// Whether this row holds exactly this `(product, selection)` pair.
    #[must_use]
    pub fn matches(&self, product_id: ProductId, selection: &VariantSelection) -> bool {
        self.product.id == product_id && &self.selected_variants == selection
    }

    /// Units available for this row's combination.
    #[must_use]
    pub fn available_stock(&self) -> u32 {
        self.product.available_stock_for(&self.selected_variants)
    }
}

impl From<RemoteLineItem> for LineItem {
    fn from(row: RemoteLineItem) -> Self {
        Self {
            id: row.id,
            product_id: row.product.id,
            quantity: row.quantity,
            product: ProductSnapshot::capture(&row.product, &row.selected_variants),
            selected_variants: row.selected_variants,
            added_at: row.created_at,
        }
    }
}

/// Server-persisted cart rows keyed by user.
///
/// Every method may fail with a store-specific error; the cart manager
/// treats all of them as non-fatal.
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// All rows for `user_id`, oldest first, with product data joined.
    async fn list(&self, user_id: UserId) -> Result<Vec<RemoteLineItem>, RepositoryError>;

    /// Insert a new row and return its ID.
    async fn insert(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
        selected_variants: &VariantSelection,
    ) -> Result<LineItemId, RepositoryError>;

    /// Overwrite a row's quantity.
    async fn update_quantity(
        &self,
        line_item_id: LineItemId,
        quantity: u32,
    ) -> Result<(), RepositoryError>;

    /// Delete one row. Deleting a missing row succeeds.
    async fn delete(&self, line_item_id: LineItemId) -> Result<(), RepositoryError>;

    /// Delete every row for `user_id`.
    async fn delete_all(&self, user_id: UserId) -> Result<(), RepositoryError>;
}

/// Read-only product catalog.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// Fetch a product with its category and variants.
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
}
