//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! cartwheel show
//! cartwheel products --limit 10
//! cartwheel add <product-id> --variant Size=M --quantity 2
//! cartwheel update <line-id> 3
//! cartwheel remove <line-id>
//! cartwheel clear
//! cartwheel sign-in <user-id>
//! ```

use cartwheel_core::{LineItemId, Price, ProductId, UserId, VariantSelection};
use cartwheel_storefront::models::{AddOutcome, Cart, CartOwner};
use cartwheel_storefront::services::cart::CartStatus;
use cartwheel_storefront::services::identity::SessionIdentity;

use super::{CommandError, Shop};

/// Print the cart for `owner`.
pub async fn show(shop: &Shop, owner: CartOwner) {
    let cart = shop.manager.resync(owner).await;
    print_cart(shop, &cart);
}

/// List catalog products with their variant options.
///
/// # Errors
///
/// Returns `CommandError::Catalog` if the catalog can't be read.
#[allow(clippy::print_stdout)]
pub async fn products(shop: &Shop, limit: i64) -> Result<(), CommandError> {
    let products = shop.catalog.list(limit).await?;
    if products.is_empty() {
        println!("No products.");
        return Ok(());
    }

    for product in products {
        let price = Price::new(product.price, shop.rates.currency);
        let marker = if product.featured { "*" } else { " " };
        println!(
            "{marker} {}  {:<32} {:>10}  stock {}",
            product.id, product.name, price, product.stock
        );
        for axis in product.variant_axes() {
            let values: Vec<String> = product
                .variants
                .iter()
                .filter(|v| v.name == axis)
                .map(|v| {
                    if v.price_modifier.is_zero() {
                        format!("{} ({} left)", v.value, v.stock)
                    } else {
                        format!("{} ({:+}, {} left)", v.value, v.price_modifier, v.stock)
                    }
                })
                .collect();
            println!("      {axis}: {}", values.join(", "));
        }
    }
    Ok(())
}

/// Add `quantity` units of a product, stopping early at the stock limit.
///
/// # Errors
///
/// Returns `CommandError::Variant` for malformed `--variant` values and
/// `CommandError::Cart` if the product is unknown or a store fails.
#[allow(clippy::print_stdout)]
pub async fn add(
    shop: &Shop,
    owner: CartOwner,
    product_id: ProductId,
    variants: &[String],
    quantity: u32,
) -> Result<(), CommandError> {
    let selection = VariantSelection::parse_all(variants.iter().map(String::as_str))?;

    let mut added = 0;
    for _ in 0..quantity {
        match shop
            .manager
            .add_product(owner, product_id, &selection)
            .await?
        {
            AddOutcome::Added(_) | AddOutcome::Incremented(_) => added += 1,
            AddOutcome::AtStockLimit(_) => {
                println!("Stock limit reached.");
                break;
            }
            AddOutcome::OutOfStock => {
                println!("Out of stock.");
                break;
            }
        }
    }

    tracing::info!(product_id = %product_id, added, "Added to cart");
    print_cart(shop, &shop.manager.cart());
    Ok(())
}

/// Set a line's quantity.
///
/// # Errors
///
/// Returns `CommandError::Cart` if a store fails.
#[allow(clippy::print_stdout)]
pub async fn update(
    shop: &Shop,
    owner: CartOwner,
    line: LineItemId,
    quantity: i64,
) -> Result<(), CommandError> {
    match shop.manager.update_quantity(owner, line, quantity).await? {
        Some(stored) if i64::from(stored) < quantity => {
            println!("Only {stored} in stock; quantity clamped.");
        }
        Some(_) => {}
        None if quantity <= 0 => {}
        None => println!("Line {line} is no longer in the cart."),
    }
    print_cart(shop, &shop.manager.cart());
    Ok(())
}

/// Remove a line.
///
/// # Errors
///
/// Returns `CommandError::Cart` if a store fails.
#[allow(clippy::print_stdout)]
pub async fn remove(shop: &Shop, owner: CartOwner, line: LineItemId) -> Result<(), CommandError> {
    if !shop.manager.remove_item(owner, line).await? {
        println!("Line {line} is not in the cart.");
    }
    print_cart(shop, &shop.manager.cart());
    Ok(())
}

/// Empty the cart.
///
/// # Errors
///
/// Returns `CommandError::Cart` if a store fails.
pub async fn clear(shop: &Shop, owner: CartOwner) -> Result<(), CommandError> {
    shop.manager.clear_cart(owner).await?;
    print_cart(shop, &shop.manager.cart());
    Ok(())
}

/// Start from the anonymous cart, sign in as `user`, and show the result.
#[allow(clippy::print_stdout)]
pub async fn sign_in(shop: &Shop, user: UserId) {
    let identity = SessionIdentity::new(None);
    shop.manager.track_identity(&identity).await;
    let anonymous = shop.manager.cart();
    let mut states = shop.manager.subscribe();

    identity.sign_in(user);
    let owner = CartOwner::Identified(user);
    let cart = states
        .wait_for(|state| state.status == CartStatus::Ready && state.cart.owner() == owner)
        .await
        .map_or_else(|_| shop.manager.cart(), |state| state.cart.clone());
    shop.manager.shutdown().await;

    println!(
        "Signed in as {user}. Anonymous cart had {} item(s); policy: {}.",
        anonymous.item_count(),
        shop.manager.policy()
    );
    print_cart(shop, &cart);
}

/// Print a cart as a table.
#[allow(clippy::print_stdout)]
pub fn print_cart(shop: &Shop, cart: &Cart) {
    let currency = shop.rates.currency;
    match cart.owner() {
        CartOwner::Anonymous => println!("Cart (this device)"),
        CartOwner::Identified(user) => println!("Cart (user {user})"),
    }

    if cart.is_empty() {
        println!("  (empty)");
        return;
    }

    for item in cart.items() {
        let options = if item.selected_variants.is_empty() {
            String::new()
        } else {
            format!(" [{}]", item.selected_variants)
        };
        println!(
            "  {}  {:>3} x {}{}  @ {}  = {}",
            item.id,
            item.quantity,
            item.product.name,
            options,
            Price::new(item.product.unit_price(), currency),
            Price::new(item.line_total(), currency),
        );
    }
    println!(
        "  {} item(s), subtotal {}",
        cart.item_count(),
        Price::new(cart.subtotal(), currency)
    );
}
