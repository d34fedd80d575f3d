//! Device-local persistence for anonymous carts.
//!
//! A [`LocalPersistence`] is a tiny synchronous key-value store. The cart is
//! kept under a single key ([`CART_KEY`]) as a JSON array of line items.
//! Writes are last-writer-wins; there is no locking between processes.

mod file;
mod memory;

pub use file::FileLocalStore;
pub use memory::MemoryLocalStore;

use thiserror::Error;

use crate::models::LineItem;

/// Key the anonymous cart is stored under.
pub const CART_KEY: &str = "cart";

/// Errors from a local persistence backend.
#[derive(Debug, Error)]
pub enum LocalStoreError {
    /// Reading or writing the backing file failed.
    #[error("local storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The key contains characters that can't be used as a storage name.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Cart items could not be serialized.
    #[error("failed to serialize cart: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key-value blob storage scoped to the current device.
pub trait LocalPersistence: Send + Sync {
    /// Read the value stored under `key`, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the backend can't be read.
    fn read(&self, key: &str) -> Result<Option<String>, LocalStoreError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the backend can't be written.
    fn write(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;
}

/// Serialize line items into the local blob format.
///
/// # Errors
///
/// Returns `LocalStoreError::Serialize` if serialization fails.
pub fn encode_cart(items: &[LineItem]) -> Result<String, LocalStoreError> {
    Ok(serde_json::to_string(items)?)
}

/// Parse the local blob format.
///
/// # Errors
///
/// Returns the parse error for malformed blobs; callers treat that as an
/// empty cart.
pub fn decode_cart(blob: &str) -> Result<Vec<LineItem>, serde_json::Error> {
    serde_json::from_str(blob)
}
