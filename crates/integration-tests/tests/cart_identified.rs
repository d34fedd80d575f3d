//! Integration tests for signed-in carts.
//!
//! An identified cart lives in the remote store. Every change is written
//! there and followed by a full reload, so the published cart always
//! matches the stored rows.

#![allow(clippy::unwrap_used)]

use cartwheel_core::{LineItemId, ProductId, UserId, VariantSelection};
use cartwheel_integration_tests::{TestShop, dollars, product, shopper, with_variant};
use cartwheel_storefront::db::RepositoryError;
use cartwheel_storefront::local::{CART_KEY, LocalPersistence};
use cartwheel_storefront::models::{AddOutcome, CartOwner};
use cartwheel_storefront::services::cart::{CartError, CartStatus};

fn plain() -> VariantSelection {
    VariantSelection::new()
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test]
async fn test_add_inserts_then_increments_remote_row() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));

    let first = shop.manager.add_item(owner, &mug, &plain()).await.unwrap();
    let second = shop.manager.add_item(owner, &mug, &plain()).await.unwrap();

    let AddOutcome::Added(id) = first else {
        panic!("expected a new row, got {first:?}");
    };
    assert_eq!(second, AddOutcome::Incremented(id));

    let rows = shop.remote.rows(user);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, id);
    assert_eq!(rows[0].quantity, 2);

    let cart = shop.manager.cart();
    assert_eq!(cart.owner(), owner);
    assert_eq!(cart.items()[0].id, id);
    assert_eq!(cart.subtotal(), dollars(2500));
}

#[tokio::test]
async fn test_identified_changes_leave_local_storage_alone() {
    let shop = TestShop::new();
    let (_, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));

    shop.manager.add_item(owner, &mug, &plain()).await.unwrap();
    shop.manager.clear_cart(owner).await.unwrap();

    assert!(shop.local.read(CART_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_variant_selection_is_stored() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let tee = with_variant(product("Logo Tee", 2000, 10), "Color", "Red", 150, 4);
    let tee = shop.stock(tee);
    let red = VariantSelection::new().with("Color", "Red");

    shop.manager.add_item(owner, &tee, &red).await.unwrap();

    assert_eq!(shop.remote.rows(user)[0].selected_variants, red);
    let cart = shop.manager.cart();
    let line = &cart.items()[0];
    assert_eq!(line.selected_variants, red);
    assert_eq!(line.product.unit_price(), dollars(2150));
    assert_eq!(line.product.stock, 4);
}

#[tokio::test]
async fn test_add_at_stock_limit_writes_nothing() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let pin = shop.stock(product("Enamel Pin", 600, 1));

    shop.manager.add_item(owner, &pin, &plain()).await.unwrap();
    let outcome = shop.manager.add_item(owner, &pin, &plain()).await.unwrap();

    assert!(matches!(outcome, AddOutcome::AtStockLimit(_)));
    assert_eq!(shop.remote.rows(user)[0].quantity, 1);
}

#[tokio::test]
async fn test_update_writes_and_reloads() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    shop.manager.add_item(owner, &mug, &plain()).await.unwrap();
    let line = shop.manager.cart().items()[0].id;

    let stored = shop.manager.update_quantity(owner, line, 4).await.unwrap();

    assert_eq!(stored, Some(4));
    assert_eq!(shop.remote.rows(user)[0].quantity, 4);
    assert_eq!(shop.manager.cart().subtotal(), dollars(5000));
}

#[tokio::test]
async fn test_update_clamps_to_remote_stock() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let pin = shop.stock(product("Enamel Pin", 600, 3));
    shop.manager.add_item(owner, &pin, &plain()).await.unwrap();
    let line = shop.manager.cart().items()[0].id;

    let stored = shop.manager.update_quantity(owner, line, 40).await.unwrap();

    assert_eq!(stored, Some(3));
    assert_eq!(shop.remote.rows(user)[0].quantity, 3);
}

#[tokio::test]
async fn test_update_to_zero_deletes_row() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    shop.manager.add_item(owner, &mug, &plain()).await.unwrap();
    let line = shop.manager.cart().items()[0].id;

    let stored = shop.manager.update_quantity(owner, line, 0).await.unwrap();

    assert_eq!(stored, None);
    assert!(shop.remote.rows(user).is_empty());
    assert!(shop.manager.cart().is_empty());
}

#[tokio::test]
async fn test_remove_deletes_row() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    let cap = shop.stock(product("Cap", 300, 10));
    shop.manager.add_item(owner, &mug, &plain()).await.unwrap();
    shop.manager.add_item(owner, &cap, &plain()).await.unwrap();
    let mug_line = shop.manager.cart().find_matching(mug.id, &plain()).unwrap().id;

    assert!(shop.manager.remove_item(owner, mug_line).await.unwrap());

    let rows = shop.remote.rows(user);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].product_id, cap.id);
    assert_eq!(shop.manager.cart().item_count(), 1);
}

#[tokio::test]
async fn test_unknown_line_makes_no_remote_calls() {
    let shop = TestShop::new();
    let (_, owner) = shopper();
    shop.manager.resync(owner).await;
    let calls = shop.remote.calls();

    let removed = shop
        .manager
        .remove_item(owner, LineItemId::generate())
        .await
        .unwrap();
    let updated = shop
        .manager
        .update_quantity(owner, LineItemId::generate(), 2)
        .await
        .unwrap();

    assert!(!removed);
    assert_eq!(updated, None);
    assert_eq!(shop.remote.calls(), calls);
}

#[tokio::test]
async fn test_clear_deletes_only_this_users_rows() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let other = UserId::generate();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    shop.remote.seed(other, mug.id, 1, plain());
    shop.manager.add_item(owner, &mug, &plain()).await.unwrap();

    shop.manager.clear_cart(owner).await.unwrap();

    assert!(shop.remote.rows(user).is_empty());
    assert_eq!(shop.remote.rows(other).len(), 1);
    assert!(shop.manager.cart().is_empty());
}

#[tokio::test]
async fn test_unknown_product_is_rejected() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let missing = ProductId::generate();

    let result = shop.manager.add_product(owner, missing, &plain()).await;

    assert!(matches!(result, Err(CartError::ProductNotFound(id)) if id == missing));
    assert!(shop.remote.rows(user).is_empty());
}

#[tokio::test]
async fn test_concurrent_adds_are_serialized() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    let other_view = shop.manager.clone();
    let selection = plain();

    let (a, b) = tokio::join!(
        shop.manager.add_item(owner, &mug, &selection),
        other_view.add_item(owner, &mug, &selection),
    );
    a.unwrap();
    b.unwrap();

    let rows = shop.remote.rows(user);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity, 2);
    assert_eq!(shop.manager.cart().item_count(), 2);
}

// =============================================================================
// Loading
// =============================================================================

#[tokio::test]
async fn test_resync_loads_rows_in_order() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    let cap = shop.stock(product("Cap", 300, 10));
    shop.remote.seed(user, mug.id, 2, plain());
    shop.remote.seed(user, cap.id, 1, plain());

    let cart = shop.manager.resync(owner).await;

    assert_eq!(cart.items().len(), 2);
    assert_eq!(cart.items()[0].product_id, mug.id);
    assert_eq!(cart.items()[1].product_id, cap.id);
    assert_eq!(cart.subtotal(), dollars(2800));
}

#[tokio::test]
async fn test_resync_repairs_duplicate_and_empty_rows() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    let cap = shop.stock(product("Cap", 300, 10));
    let first = shop.remote.seed(user, mug.id, 2, plain());
    shop.remote.seed(user, cap.id, 0, plain());
    shop.remote.seed(user, mug.id, 3, plain());

    let cart = shop.manager.resync(owner).await;

    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.items()[0].id, first);
    assert_eq!(cart.items()[0].quantity, 5);

    let rows = shop.remote.rows(user);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, first);
    assert_eq!(rows[0].quantity, 5);
}

#[tokio::test]
async fn test_resync_clamps_to_current_stock() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    let line = shop.remote.seed(user, mug.id, 5, plain());

    shop.catalog.set_stock(mug.id, 2);
    let cart = shop.manager.resync(owner).await;
    assert_eq!(cart.get(line).unwrap().quantity, 2);
    assert_eq!(shop.remote.rows(user)[0].quantity, 2);

    shop.catalog.set_stock(mug.id, 0);
    assert!(shop.manager.resync(owner).await.is_empty());
    assert!(shop.remote.rows(user).is_empty());
}

#[tokio::test]
async fn test_rows_for_deleted_products_disappear() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    shop.remote.seed(user, mug.id, 1, plain());
    assert_eq!(shop.manager.resync(owner).await.items().len(), 1);

    shop.catalog.remove(mug.id);

    assert!(shop.manager.resync(owner).await.is_empty());
}

#[tokio::test]
async fn test_operation_for_other_owner_reloads_first() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    shop.remote.seed(user, mug.id, 2, plain());
    shop.manager.resync(CartOwner::Anonymous).await;

    let outcome = shop.manager.add_item(owner, &mug, &plain()).await.unwrap();

    assert!(matches!(outcome, AddOutcome::Incremented(_)));
    assert_eq!(shop.manager.cart().owner(), owner);
    assert_eq!(shop.remote.rows(user)[0].quantity, 3);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failed_add_leaves_cart_unchanged() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    shop.manager.add_item(owner, &mug, &plain()).await.unwrap();
    let before = shop.manager.cart();

    shop.remote.fail_with("connection reset");
    let result = shop.manager.add_item(owner, &mug, &plain()).await;

    assert!(matches!(
        result,
        Err(CartError::Remote(RepositoryError::Unavailable(_)))
    ));
    assert_eq!(shop.manager.cart(), before);
    assert_eq!(shop.manager.state().status, CartStatus::Ready);

    shop.remote.recover();
    assert_eq!(shop.remote.rows(user)[0].quantity, 1);
}

#[tokio::test]
async fn test_failed_resync_keeps_last_cart() {
    let shop = TestShop::new();
    let (_, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    shop.manager.add_item(owner, &mug, &plain()).await.unwrap();
    let before = shop.manager.cart();

    shop.remote.fail_with("timeout");
    let cart = shop.manager.resync(owner).await;

    assert_eq!(cart, before);
    assert_eq!(shop.manager.state().status, CartStatus::Ready);
}

#[tokio::test]
async fn test_failed_resync_for_new_owner_publishes_empty() {
    let shop = TestShop::new();
    let (user, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    shop.remote.seed(user, mug.id, 1, plain());

    shop.remote.fail_with("timeout");
    let cart = shop.manager.resync(owner).await;

    assert!(cart.is_empty());
    assert_eq!(cart.owner(), owner);
    assert_eq!(shop.manager.state().status, CartStatus::Ready);
}

#[tokio::test]
async fn test_failed_clear_keeps_cart() {
    let shop = TestShop::new();
    let (_, owner) = shopper();
    let mug = shop.stock(product("Camp Mug", 1250, 10));
    shop.manager.add_item(owner, &mug, &plain()).await.unwrap();
    let before = shop.manager.cart();

    shop.remote.fail_with("read only");
    assert!(shop.manager.clear_cart(owner).await.is_err());
    assert_eq!(shop.manager.cart(), before);
}
