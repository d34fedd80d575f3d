//! Cart error types.

use thiserror::Error;

use cartwheel_core::ProductId;

use crate::db::RepositoryError;

/// Errors returned by cart mutations.
///
/// When a mutation fails the published cart is left as it was, and the
/// error has already been logged.
#[derive(Debug, Error)]
pub enum CartError {
    /// The remote cart store or product catalog failed.
    #[error("cart store error: {0}")]
    Remote(#[from] RepositoryError),

    /// The product to add doesn't exist in the catalog.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// Checkout was attempted on an empty cart.
    #[error("cart is empty")]
    EmptyCart,
}
