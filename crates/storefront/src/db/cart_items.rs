//! Cart item repository.
//!
//! Rows in `cart_items` are the remote cart for signed-in users. Each row is
//! returned with its product, category and variants joined in.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::{instrument, warn};
use uuid::Uuid;

use cartwheel_core::{LineItemId, ProductId, ProductVariant, UserId, VariantSelection};

use super::products::{PRODUCT_COLUMNS, ProductRow, fetch_variants};
use super::{RepositoryError, non_negative};
use crate::services::cart::{RemoteCartStore, RemoteLineItem};

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: Uuid,
    user_id: Uuid,
    quantity: i32,
    selected_variants: Option<Json<VariantSelection>>,
    created_at: DateTime<Utc>,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl CartItemRow {
    fn into_remote(
        self,
        variants: Vec<ProductVariant>,
    ) -> Result<RemoteLineItem, RepositoryError> {
        Ok(RemoteLineItem {
            id: LineItemId::new(self.id),
            user_id: UserId::new(self.user_id),
            quantity: non_negative(self.quantity, "cart quantity")?,
            selected_variants: self.selected_variants.map(|j| j.0).unwrap_or_default(),
            created_at: self.created_at,
            product: self.product.into_product(variants)?,
        })
    }
}

/// Convert fetched rows, skipping any that can't be read so one bad row
/// doesn't hide the rest of the cart.
fn collect_rows(
    rows: Vec<CartItemRow>,
    variants: &HashMap<Uuid, Vec<ProductVariant>>,
) -> Vec<RemoteLineItem> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            let own = variants.get(&row.product.product_id).cloned().unwrap_or_default();
            match row.into_remote(own) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(line_item_id = %id, error = %e, "Skipping unreadable cart row");
                    None
                }
            }
        })
        .collect()
}

/// `PostgreSQL`-backed [`RemoteCartStore`].
#[derive(Clone)]
pub struct CartItemRepository {
    pool: PgPool,
}

impl CartItemRepository {
    /// Create a new cart item repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_db_quantity(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::Conflict(format!("quantity out of range: {quantity}")))
}

#[async_trait]
impl RemoteCartStore for CartItemRepository {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list(&self, user_id: UserId) -> Result<Vec<RemoteLineItem>, RepositoryError> {
        let sql = format!(
            "SELECT ci.id, ci.user_id, ci.quantity, ci.selected_variants, ci.created_at,
                    {PRODUCT_COLUMNS}
             FROM cart_items ci
             JOIN products p ON p.id = ci.product_id
             LEFT JOIN categories c ON c.id = p.category_id
             WHERE ci.user_id = $1
             ORDER BY ci.created_at, ci.id"
        );
        let rows = sqlx::query_as::<_, CartItemRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        let mut product_ids: Vec<Uuid> = rows.iter().map(|r| r.product.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        let variants = fetch_variants(&self.pool, &product_ids).await?;

        Ok(collect_rows(rows, &variants))
    }

    #[instrument(
        skip(self, selected_variants),
        fields(user_id = %user_id, product_id = %product_id)
    )]
    async fn insert(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
        selected_variants: &VariantSelection,
    ) -> Result<LineItemId, RepositoryError> {
        let id: Uuid = sqlx::query_scalar(
            r"
            INSERT INTO cart_items (user_id, product_id, quantity, selected_variants)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(user_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(to_db_quantity(quantity)?)
        .bind(Json(selected_variants))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::Conflict(format!("unknown product {product_id}"));
            }
            RepositoryError::Database(e)
        })?;

        Ok(LineItemId::new(id))
    }

    #[instrument(skip(self), fields(line_item_id = %line_item_id))]
    async fn update_quantity(
        &self,
        line_item_id: LineItemId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE cart_items
            SET quantity = $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(line_item_id.as_uuid())
        .bind(to_db_quantity(quantity)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(line_item_id = %line_item_id))]
    async fn delete(&self, line_item_id: LineItemId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(line_item_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn delete_all(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
