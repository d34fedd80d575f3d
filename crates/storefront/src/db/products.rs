//! Product catalog repository.
//!
//! Products are read with their category and variants and cached in memory
//! via `moka`. The catalog is owned by another service, so nothing here
//! writes to it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use cartwheel_core::{Category, CategoryId, Product, ProductId, ProductVariant, VariantId};

use super::{RepositoryError, non_negative};
use crate::services::cart::ProductLookup;

/// Product columns shared by catalog and cart queries.
///
/// Column names are prefixed so the row can be flattened into joins.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_description: Option<String>,
    pub product_price: Decimal,
    pub product_image: Option<String>,
    pub product_stock: i32,
    pub product_featured: bool,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
}

/// Select list matching [`ProductRow`], for queries aliasing `products p`
/// and `categories c`.
pub(crate) const PRODUCT_COLUMNS: &str = r"
    p.id AS product_id,
    p.name AS product_name,
    p.description AS product_description,
    p.price AS product_price,
    p.image AS product_image,
    p.stock AS product_stock,
    p.featured AS product_featured,
    c.id AS category_id,
    c.name AS category_name,
    c.slug AS category_slug";

impl ProductRow {
    pub(crate) fn into_product(
        self,
        variants: Vec<ProductVariant>,
    ) -> Result<Product, RepositoryError> {
        let category = match (self.category_id, self.category_name, self.category_slug) {
            (Some(id), Some(name), Some(slug)) => Some(Category {
                id: CategoryId::new(id),
                name,
                slug,
            }),
            (None, _, _) => None,
            (Some(id), _, _) => {
                return Err(RepositoryError::DataCorruption(format!(
                    "category {id} is missing its name or slug"
                )));
            }
        };

        Ok(Product {
            id: ProductId::new(self.product_id),
            name: self.product_name,
            description: self.product_description,
            price: self.product_price,
            image: self.product_image,
            stock: non_negative(self.product_stock, "product stock")?,
            featured: self.product_featured,
            category,
            variants,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: Uuid,
    product_id: Uuid,
    name: String,
    value: String,
    price_modifier: Decimal,
    stock: i32,
}

impl TryFrom<VariantRow> for ProductVariant {
    type Error = RepositoryError;

    fn try_from(row: VariantRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: VariantId::new(row.id),
            product_id: ProductId::new(row.product_id),
            name: row.name,
            value: row.value,
            price_modifier: row.price_modifier,
            stock: non_negative(row.stock, "variant stock")?,
        })
    }
}

/// Fetch variants for a set of products, grouped by product.
pub(crate) async fn fetch_variants(
    pool: &PgPool,
    product_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<ProductVariant>>, RepositoryError> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, VariantRow>(
        r"
        SELECT id, product_id, name, value, price_modifier, stock
        FROM product_variants
        WHERE product_id = ANY($1)
        ORDER BY name, value
        ",
    )
    .bind(product_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<ProductVariant>> = HashMap::new();
    for row in rows {
        let key = row.product_id;
        grouped.entry(key).or_default().push(row.try_into()?);
    }
    Ok(grouped)
}

/// Read-only access to the product catalog.
///
/// Cloning is cheap; clones share the pool and the cache.
#[derive(Clone)]
pub struct ProductRepository {
    inner: Arc<ProductRepositoryInner>,
}

struct ProductRepositoryInner {
    pool: PgPool,
    cache: Cache<ProductId, Product>,
}

impl ProductRepository {
    /// Create a repository whose cache entries live for `ttl`.
    #[must_use]
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(ProductRepositoryInner { pool, cache }),
        }
    }

    /// Get a product by ID, with category and variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stock value is negative.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        if let Some(product) = self.inner.cache.get(&id).await {
            debug!("Cache hit for product");
            return Ok(Some(product));
        }

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM products p
             LEFT JOIN categories c ON c.id = p.category_id
             WHERE p.id = $1"
        );
        let Some(row) = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.inner.pool)
            .await?
        else {
            return Ok(None);
        };

        let mut variants = fetch_variants(&self.inner.pool, &[row.product_id]).await?;
        let product = row.into_product(variants.remove(&id.as_uuid()).unwrap_or_default())?;

        self.inner.cache.insert(id, product.clone()).await;
        Ok(Some(product))
    }

    /// List products, featured first, then by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stock value is negative.
    #[instrument(skip(self))]
    pub async fn list(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM products p
             LEFT JOIN categories c ON c.id = p.category_id
             ORDER BY p.featured DESC, p.name
             LIMIT $1"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(limit)
            .fetch_all(&self.inner.pool)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.product_id).collect();
        let mut variants = fetch_variants(&self.inner.pool, &ids).await?;

        rows.into_iter()
            .map(|row| {
                let own = variants.remove(&row.product_id).unwrap_or_default();
                row.into_product(own)
            })
            .collect()
    }

    /// Drop a cached product.
    pub async fn invalidate(&self, id: ProductId) {
        self.inner.cache.invalidate(&id).await;
    }

    /// Drop every cached product.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl ProductLookup for ProductRepository {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.get(id).await
    }
}
