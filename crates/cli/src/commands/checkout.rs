//! Checkout command.
//!
//! # Usage
//!
//! ```bash
//! cartwheel checkout
//! cartwheel --user <user-id> checkout
//! ```
//!
//! No payment is taken. The cart is summarized, emptied, and a receipt is
//! printed.

use cartwheel_storefront::models::CartOwner;

use super::{CommandError, Shop};

/// Complete checkout for `owner` and print the receipt.
///
/// # Errors
///
/// Returns `CommandError::Cart` if the cart is empty or a store fails.
#[allow(clippy::print_stdout)]
pub async fn complete(shop: &Shop, owner: CartOwner) -> Result<(), CommandError> {
    let receipt = shop.manager.complete_checkout(owner, &shop.rates).await?;
    let summary = &receipt.summary;

    println!("Order confirmed: {}", receipt.confirmation);
    println!("Placed at {}", receipt.placed_at.format("%Y-%m-%d %H:%M:%S UTC"));
    for item in &receipt.items {
        println!("  {:>3} x {}", item.quantity, item.product.name);
    }
    println!("  Subtotal  {}", summary.subtotal);
    println!("  Tax       {}", summary.tax);
    if summary.free_shipping() {
        println!("  Shipping  free");
    } else {
        println!("  Shipping  {}", summary.shipping);
    }
    println!("  Total     {}", summary.total);
    Ok(())
}
