//! The cart manager.
//!
//! [`CartManager`] is the single source of truth for the current shopper's
//! cart. Anonymous carts live in memory and are written through to
//! [`LocalPersistence`] after every change. Identified carts live in the
//! [`RemoteCartStore`]; every change is written there and followed by a full
//! reload, so published totals always reflect the server.
//!
//! Mutations and reloads run one at a time behind an async mutex. The latest
//! [`CartState`] is published on a `tokio::sync::watch` channel.
//!
//! Store failures never crash the host. A failed mutation leaves the
//! published cart as it was; a failed reload keeps the last cart for the
//! same owner, or publishes an empty one for a new owner.

mod error;
mod ports;
mod reconcile;

pub use error::CartError;
pub use ports::{ProductLookup, RemoteCartStore, RemoteLineItem};
pub use reconcile::{RemoteWrite, SignInPolicy, UnknownPolicy, plan_merge, plan_repairs};

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use cartwheel_core::{LineItemId, Product, ProductId, UserId, VariantSelection};

use super::checkout::{CheckoutRates, CheckoutReceipt};
use super::identity::IdentityProvider;
use crate::db::RepositoryError;
use crate::error::{add_breadcrumb, report_store_error};
use crate::local::{CART_KEY, LocalPersistence, decode_cart, encode_cart};
use crate::models::{AddOutcome, Cart, CartOwner, LineItem, clamp_quantity};

/// Where the published cart is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartStatus {
    /// Nothing has been loaded yet.
    Uninitialized,
    /// A reload is in progress.
    Loading,
    /// The cart reflects its backing store.
    Ready,
}

/// What observers of the cart see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartState {
    pub status: CartStatus,
    pub cart: Cart,
}

impl CartState {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.status, CartStatus::Loading)
    }
}

impl Default for CartState {
    fn default() -> Self {
        Self {
            status: CartStatus::Uninitialized,
            cart: Cart::empty(CartOwner::Anonymous),
        }
    }
}

/// Owns the shopper's cart and routes changes to the right backing store.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct CartManager {
    inner: Arc<CartManagerInner>,
}

struct CartManagerInner {
    remote: Arc<dyn RemoteCartStore>,
    local: Arc<dyn LocalPersistence>,
    catalog: Arc<dyn ProductLookup>,
    policy: SignInPolicy,
    state: watch::Sender<CartState>,
    flight: tokio::sync::Mutex<()>,
    tracker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for CartManagerInner {
    fn drop(&mut self) {
        if let Some(handle) = self
            .tracker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl CartManager {
    /// Create a manager. Nothing is loaded until the first resync or
    /// operation.
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteCartStore>,
        local: Arc<dyn LocalPersistence>,
        catalog: Arc<dyn ProductLookup>,
        policy: SignInPolicy,
    ) -> Self {
        let (state, _) = watch::channel(CartState::default());
        Self {
            inner: Arc::new(CartManagerInner {
                remote,
                local,
                catalog,
                policy,
                state,
                flight: tokio::sync::Mutex::new(()),
                tracker: Mutex::new(None),
            }),
        }
    }

    /// Observe every published state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// The most recently published state.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// The most recently published cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.inner.state.borrow().cart.clone()
    }

    #[must_use]
    pub fn policy(&self) -> SignInPolicy {
        self.inner.policy
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Reload the cart for `owner` from its backing store and publish it.
    ///
    /// Never fails. A malformed local blob loads as an empty cart; a remote
    /// failure is logged and handled as described in the module docs.
    pub async fn resync(&self, owner: CartOwner) -> Cart {
        let _flight = self.inner.flight.lock().await;
        self.resync_locked(owner).await
    }

    /// Switch to a new shopper identity and load their cart.
    ///
    /// With [`SignInPolicy::Merge`], an anonymous cart that was loaded when
    /// the shopper signs in is added to their remote cart first.
    pub async fn switch_identity(&self, identity: Option<UserId>) -> Cart {
        let _flight = self.inner.flight.lock().await;
        let owner = CartOwner::from(identity);
        let current = self.state();

        if let CartOwner::Identified(user_id) = owner
            && self.inner.policy == SignInPolicy::Merge
            && current.status == CartStatus::Ready
            && current.cart.owner().is_anonymous()
            && !current.cart.is_empty()
        {
            self.merge_anonymous(user_id, current.cart.items()).await;
        }

        self.resync_locked(owner).await
    }

    /// Follow `provider`: load the current identity's cart now, then reload
    /// on every sign-in and sign-out until [`Self::shutdown`].
    pub async fn track_identity(&self, provider: &dyn IdentityProvider) {
        let mut changes = provider.subscribe();
        changes.mark_unchanged();
        self.switch_identity(provider.current_identity()).await;

        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let identity = *changes.borrow_and_update();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Self { inner }.switch_identity(identity).await;
            }
            debug!("Identity tracking stopped");
        });

        let previous = self
            .inner
            .tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop following identity changes.
    pub async fn shutdown(&self) {
        let handle = self
            .inner
            .tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of `product` with `selection`.
    ///
    /// Never exceeds the stock available for the combination; at the limit
    /// the cart is left unchanged and [`AddOutcome::AtStockLimit`] returned.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Remote` if the remote store fails.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_item(
        &self,
        owner: CartOwner,
        product: &Product,
        selection: &VariantSelection,
    ) -> Result<AddOutcome, CartError> {
        let _flight = self.inner.flight.lock().await;
        self.ensure_owner(owner).await;

        let outcome = match owner {
            CartOwner::Anonymous => {
                let mut cart = self.cart();
                let outcome = cart.add(product, selection);
                if outcome.changed() {
                    self.commit_local(cart);
                }
                outcome
            }
            CartOwner::Identified(user_id) => {
                let outcome = self.add_remote(user_id, product, selection).await?;
                if outcome.changed() {
                    self.resync_locked(owner).await;
                }
                outcome
            }
        };

        match outcome {
            AddOutcome::AtStockLimit(_) => debug!("Line already holds all available stock"),
            AddOutcome::OutOfStock => debug!("Combination is out of stock"),
            AddOutcome::Added(_) | AddOutcome::Incremented(_) => {
                let product_id = product.id.to_string();
                add_breadcrumb("cart", "Added item", Some(&[("product_id", product_id.as_str())]));
            }
        }
        Ok(outcome)
    }

    /// Look up `product_id` in the catalog and add one unit of it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the catalog has no such
    /// product, or `CartError::Remote` if a store fails.
    pub async fn add_product(
        &self,
        owner: CartOwner,
        product_id: ProductId,
        selection: &VariantSelection,
    ) -> Result<AddOutcome, CartError> {
        let product = self
            .inner
            .catalog
            .product(product_id)
            .await
            .map_err(|e| Self::remote_failure("product", e))?
            .ok_or(CartError::ProductNotFound(product_id))?;
        self.add_item(owner, &product, selection).await
    }

    /// Remove a line. Removing a line that isn't in the cart is a no-op.
    ///
    /// Returns whether a line was removed.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Remote` if the remote store fails.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        owner: CartOwner,
        line_item_id: LineItemId,
    ) -> Result<bool, CartError> {
        let _flight = self.inner.flight.lock().await;
        self.ensure_owner(owner).await;
        self.remove_locked(owner, line_item_id).await
    }

    /// Set a line's quantity.
    ///
    /// Zero or below removes the line. Anything above the line's stock is
    /// clamped to it. Returns the stored quantity, or `None` if no line
    /// remains.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Remote` if the remote store fails.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        owner: CartOwner,
        line_item_id: LineItemId,
        quantity: i64,
    ) -> Result<Option<u32>, CartError> {
        let _flight = self.inner.flight.lock().await;
        self.ensure_owner(owner).await;

        if quantity <= 0 {
            self.remove_locked(owner, line_item_id).await?;
            return Ok(None);
        }
        let requested = u32::try_from(quantity).unwrap_or(u32::MAX);

        let cart = self.cart();
        let Some(line) = cart.get(line_item_id) else {
            debug!("Line not in cart");
            return Ok(None);
        };

        let stored = match owner {
            CartOwner::Anonymous => {
                let mut cart = cart.clone();
                let stored = cart.set_quantity(line_item_id, requested);
                self.commit_local(cart);
                stored
            }
            CartOwner::Identified(_) => {
                let target = clamp_quantity(requested, line.product.stock);
                let written = match target {
                    Some(q) => self.inner.remote.update_quantity(line_item_id, q).await,
                    None => self.inner.remote.delete(line_item_id).await,
                };
                written.map_err(|e| Self::remote_failure("update_quantity", e))?;
                self.resync_locked(owner)
                    .await
                    .get(line_item_id)
                    .map(|l| l.quantity)
            }
        };

        let line_id = line_item_id.to_string();
        add_breadcrumb("cart", "Updated quantity", Some(&[("line_item_id", line_id.as_str())]));
        Ok(stored)
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Remote` if the remote store fails.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, owner: CartOwner) -> Result<(), CartError> {
        let _flight = self.inner.flight.lock().await;
        self.clear_locked(owner).await
    }

    /// Finish checkout: summarize the cart, empty it, and return a receipt.
    ///
    /// # Errors
    ///
    /// Returns `CartError::EmptyCart` if there is nothing to check out, or
    /// `CartError::Remote` if the remote store fails while clearing.
    #[instrument(skip(self, rates))]
    pub async fn complete_checkout(
        &self,
        owner: CartOwner,
        rates: &CheckoutRates,
    ) -> Result<CheckoutReceipt, CartError> {
        let _flight = self.inner.flight.lock().await;
        self.ensure_owner(owner).await;

        let cart = self.cart();
        if cart.is_empty() {
            return Err(CartError::EmptyCart);
        }
        self.clear_locked(owner).await?;

        let receipt = CheckoutReceipt::new(cart, rates);
        info!(
            confirmation = %receipt.confirmation,
            total = %receipt.summary.total,
            items = receipt.summary.item_count,
            "Checkout completed"
        );
        Ok(receipt)
    }

    // =========================================================================
    // Internals (callers hold the flight lock)
    // =========================================================================

    async fn resync_locked(&self, owner: CartOwner) -> Cart {
        let previous = self.cart();
        self.inner
            .state
            .send_modify(|state| state.status = CartStatus::Loading);

        let cart = match owner {
            CartOwner::Anonymous => self.load_local(),
            CartOwner::Identified(user_id) => match self.load_remote(user_id).await {
                Ok(cart) => cart,
                Err(e) => {
                    report_store_error("list", &e);
                    if previous.owner() == owner {
                        previous
                    } else {
                        Cart::empty(owner)
                    }
                }
            },
        };

        self.publish(cart.clone());
        cart
    }

    async fn ensure_owner(&self, owner: CartOwner) {
        let current = self.state();
        if current.status != CartStatus::Ready || current.cart.owner() != owner {
            self.resync_locked(owner).await;
        }
    }

    fn load_local(&self) -> Cart {
        let blob = match self.inner.local.read(CART_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => return Cart::empty(CartOwner::Anonymous),
            Err(e) => {
                warn!(error = %e, "Failed to read local cart");
                return Cart::empty(CartOwner::Anonymous);
            }
        };
        match decode_cart(&blob) {
            Ok(items) => Cart::normalized(CartOwner::Anonymous, items),
            Err(e) => {
                warn!(error = %e, "Discarding malformed local cart");
                Cart::empty(CartOwner::Anonymous)
            }
        }
    }

    async fn load_remote(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let rows = self.inner.remote.list(user_id).await?;
        let (repairs, rows) = plan_repairs(rows);
        if !repairs.is_empty() {
            info!(writes = repairs.len(), "Repairing remote cart rows");
            self.apply(user_id, repairs).await?;
        }
        let items: Vec<LineItem> = rows.into_iter().map(LineItem::from).collect();
        Ok(Cart::new(CartOwner::Identified(user_id), items))
    }

    async fn add_remote(
        &self,
        user_id: UserId,
        product: &Product,
        selection: &VariantSelection,
    ) -> Result<AddOutcome, CartError> {
        let rows = self
            .inner
            .remote
            .list(user_id)
            .await
            .map_err(|e| Self::remote_failure("list", e))?;
        let stock = product.available_stock_for(selection);

        let outcome = match rows.iter().find(|row| row.matches(product.id, selection)) {
            Some(row) if row.quantity >= stock => AddOutcome::AtStockLimit(row.id),
            Some(row) => {
                self.inner
                    .remote
                    .update_quantity(row.id, row.quantity + 1)
                    .await
                    .map_err(|e| Self::remote_failure("update_quantity", e))?;
                AddOutcome::Incremented(row.id)
            }
            None if stock == 0 => AddOutcome::OutOfStock,
            None => {
                let id = self
                    .inner
                    .remote
                    .insert(user_id, product.id, 1, selection)
                    .await
                    .map_err(|e| Self::remote_failure("insert", e))?;
                AddOutcome::Added(id)
            }
        };
        Ok(outcome)
    }

    async fn remove_locked(
        &self,
        owner: CartOwner,
        line_item_id: LineItemId,
    ) -> Result<bool, CartError> {
        let mut cart = self.cart();
        if cart.get(line_item_id).is_none() {
            debug!("Line not in cart");
            return Ok(false);
        }

        match owner {
            CartOwner::Anonymous => {
                cart.remove(line_item_id);
                self.commit_local(cart);
            }
            CartOwner::Identified(_) => {
                self.inner
                    .remote
                    .delete(line_item_id)
                    .await
                    .map_err(|e| Self::remote_failure("delete", e))?;
                self.resync_locked(owner).await;
            }
        }

        let line_id = line_item_id.to_string();
        add_breadcrumb("cart", "Removed item", Some(&[("line_item_id", line_id.as_str())]));
        Ok(true)
    }

    async fn clear_locked(&self, owner: CartOwner) -> Result<(), CartError> {
        match owner {
            CartOwner::Anonymous => self.commit_local(Cart::empty(owner)),
            CartOwner::Identified(user_id) => {
                self.inner
                    .remote
                    .delete_all(user_id)
                    .await
                    .map_err(|e| Self::remote_failure("delete_all", e))?;
                self.publish(Cart::empty(owner));
            }
        }
        add_breadcrumb("cart", "Cleared cart", None);
        Ok(())
    }

    /// Carry anonymous lines into the user's remote cart one line at a time.
    ///
    /// Local storage is rewritten with whatever has not reached the remote
    /// store yet, so a failure partway never adds a line twice on retry.
    async fn merge_anonymous(&self, user_id: UserId, items: &[LineItem]) {
        let rows = match self.inner.remote.list(user_id).await {
            Ok(rows) => rows,
            Err(e) => {
                report_store_error("merge", &e);
                return;
            }
        };

        let mut pending = items.to_vec();
        for item in items {
            let writes = plan_merge(&rows, std::slice::from_ref(item));
            if let Err(e) = self.apply(user_id, writes).await {
                report_store_error("merge", &e);
                warn!(remaining = pending.len(), "Merge stopped partway");
                self.persist_local(&pending);
                return;
            }
            pending.retain(|p| p.id != item.id);
        }

        info!(lines = items.len(), "Merged anonymous cart into remote cart");
        self.persist_local(&[]);
    }

    async fn apply(
        &self,
        user_id: UserId,
        writes: Vec<RemoteWrite>,
    ) -> Result<(), RepositoryError> {
        for write in writes {
            match write {
                RemoteWrite::Insert {
                    product_id,
                    quantity,
                    selected_variants,
                } => {
                    self.inner
                        .remote
                        .insert(user_id, product_id, quantity, &selected_variants)
                        .await?;
                }
                RemoteWrite::Update { id, quantity } => {
                    self.inner.remote.update_quantity(id, quantity).await?;
                }
                RemoteWrite::Delete { id } => self.inner.remote.delete(id).await?,
            }
        }
        Ok(())
    }

    /// Write an anonymous cart through to local storage, then publish it.
    fn commit_local(&self, cart: Cart) {
        self.persist_local(cart.items());
        self.publish(cart);
    }

    fn persist_local(&self, items: &[LineItem]) {
        let written = encode_cart(items).and_then(|blob| self.inner.local.write(CART_KEY, &blob));
        if let Err(e) = written {
            warn!(error = %e, "Failed to persist local cart");
        }
    }

    fn publish(&self, cart: Cart) {
        self.inner.state.send_replace(CartState {
            status: CartStatus::Ready,
            cart,
        });
    }

    fn remote_failure(operation: &str, error: RepositoryError) -> CartError {
        report_store_error(operation, &error);
        CartError::Remote(error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::local::MemoryLocalStore;
    use crate::memory::{MemoryCartStore, MemoryCatalog};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use tokio::sync::Semaphore;

    fn product(stock: u32) -> Product {
        Product {
            id: ProductId::generate(),
            name: "Enamel Pin".to_owned(),
            description: None,
            price: Decimal::new(600, 2),
            image: None,
            stock,
            featured: false,
            category: None,
            variants: Vec::new(),
        }
    }

    fn manager(policy: SignInPolicy) -> (CartManager, MemoryCartStore, MemoryLocalStore) {
        let catalog = MemoryCatalog::new();
        let remote = MemoryCartStore::new(catalog.clone());
        let local = MemoryLocalStore::new();
        let manager = CartManager::new(
            Arc::new(remote.clone()),
            Arc::new(local.clone()),
            Arc::new(catalog),
            policy,
        );
        (manager, remote, local)
    }

    /// Holds every `list` until the test hands out a permit.
    struct GatedStore {
        inner: MemoryCartStore,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl RemoteCartStore for GatedStore {
        async fn list(&self, user_id: UserId) -> Result<Vec<RemoteLineItem>, RepositoryError> {
            self.gate.acquire().await.unwrap().forget();
            self.inner.list(user_id).await
        }

        async fn insert(
            &self,
            user_id: UserId,
            product_id: ProductId,
            quantity: u32,
            selected_variants: &VariantSelection,
        ) -> Result<LineItemId, RepositoryError> {
            self.inner
                .insert(user_id, product_id, quantity, selected_variants)
                .await
        }

        async fn update_quantity(
            &self,
            line_item_id: LineItemId,
            quantity: u32,
        ) -> Result<(), RepositoryError> {
            self.inner.update_quantity(line_item_id, quantity).await
        }

        async fn delete(&self, line_item_id: LineItemId) -> Result<(), RepositoryError> {
            self.inner.delete(line_item_id).await
        }

        async fn delete_all(&self, user_id: UserId) -> Result<(), RepositoryError> {
            self.inner.delete_all(user_id).await
        }
    }

    #[tokio::test]
    async fn test_starts_uninitialized() {
        let (manager, _, _) = manager(SignInPolicy::Discard);
        assert_eq!(manager.state().status, CartStatus::Uninitialized);
        assert!(manager.cart().is_empty());
        assert_eq!(manager.policy(), SignInPolicy::Discard);
    }

    #[tokio::test]
    async fn test_resync_publishes_ready() {
        let (manager, _, _) = manager(SignInPolicy::Discard);
        let mut states = manager.subscribe();
        manager.resync(CartOwner::Anonymous).await;
        assert_eq!(states.borrow_and_update().status, CartStatus::Ready);
    }

    #[tokio::test]
    async fn test_resync_publishes_loading_until_store_answers() {
        let catalog = MemoryCatalog::new();
        let remote = MemoryCartStore::new(catalog.clone());
        let gate = Arc::new(Semaphore::new(0));
        let manager = CartManager::new(
            Arc::new(GatedStore {
                inner: remote.clone(),
                gate: Arc::clone(&gate),
            }),
            Arc::new(MemoryLocalStore::new()),
            Arc::new(catalog),
            SignInPolicy::Discard,
        );
        let user = CartOwner::Identified(UserId::generate());
        let mut states = manager.subscribe();

        let pending = tokio::spawn({
            let manager = manager.clone();
            async move { manager.resync(user).await }
        });
        states.wait_for(CartState::is_loading).await.unwrap();
        assert_eq!(manager.state().status, CartStatus::Loading);
        gate.add_permits(1);
        pending.await.unwrap();
        assert_eq!(manager.state().status, CartStatus::Ready);
        assert_eq!(manager.cart().owner(), user);

        // A failed reload still leaves the loading state.
        remote.fail_with("timeout");
        let pending = tokio::spawn({
            let manager = manager.clone();
            async move { manager.resync(user).await }
        });
        states.wait_for(CartState::is_loading).await.unwrap();
        gate.add_permits(1);
        pending.await.unwrap();
        assert_eq!(manager.state().status, CartStatus::Ready);
        assert!(manager.cart().is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_add_writes_through() {
        let (manager, _, local) = manager(SignInPolicy::Discard);
        let pin = product(5);
        manager
            .add_item(CartOwner::Anonymous, &pin, &VariantSelection::new())
            .await
            .unwrap();

        let blob = local.read(CART_KEY).unwrap().unwrap();
        let stored = decode_cart(&blob).unwrap();
        assert_eq!(stored, manager.cart().items());
    }

    #[tokio::test]
    async fn test_failed_mutation_keeps_cart() {
        let (manager, remote, _) = manager(SignInPolicy::Discard);
        let user = CartOwner::Identified(UserId::generate());
        manager.resync(user).await;
        let before = manager.cart();

        remote.fail_with("connection reset");
        let result = manager
            .add_item(user, &product(5), &VariantSelection::new())
            .await;
        assert!(matches!(result, Err(CartError::Remote(_))));
        assert_eq!(manager.cart(), before);
        assert_eq!(manager.state().status, CartStatus::Ready);
    }
}
