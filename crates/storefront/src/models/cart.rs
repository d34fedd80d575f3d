//! Cart domain types.
//!
//! A [`Cart`] owns its line items and the aggregates derived from them.
//! Aggregates are private and recomputed from scratch after every change, so
//! they can never drift from the items.

use rust_decimal::Decimal;

use cartwheel_core::{LineItemId, Product, ProductId, UserId, VariantSelection};

use super::line_item::{LineItem, clamp_quantity};

/// Who a cart belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CartOwner {
    /// Device-local shopper with no durable identity.
    #[default]
    Anonymous,
    /// Signed-in shopper whose cart lives in the remote store.
    Identified(UserId),
}

impl CartOwner {
    /// The user ID for an identified owner.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Anonymous => None,
            Self::Identified(id) => Some(*id),
        }
    }

    /// Whether this is the anonymous owner.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl From<Option<UserId>> for CartOwner {
    fn from(identity: Option<UserId>) -> Self {
        identity.map_or(Self::Anonymous, Self::Identified)
    }
}

/// Result of adding one unit of a product to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new line was appended.
    Added(LineItemId),
    /// An existing line gained one unit.
    Incremented(LineItemId),
    /// The matching line already holds all available stock.
    AtStockLimit(LineItemId),
    /// Nothing of this combination is in stock.
    OutOfStock,
}

impl AddOutcome {
    /// Whether the cart changed.
    #[must_use]
    pub const fn changed(&self) -> bool {
        matches!(self, Self::Added(_) | Self::Incremented(_))
    }
}

/// Subtotal and item count for a sequence of line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartTotals {
    /// Sum of unit price (modifiers included) times quantity.
    pub subtotal: Decimal,
    /// Sum of quantities.
    pub item_count: u32,
}

impl CartTotals {
    /// Compute totals from scratch.
    #[must_use]
    pub fn compute(items: &[LineItem]) -> Self {
        items.iter().fold(Self::default(), |acc, item| Self {
            subtotal: acc.subtotal + item.line_total(),
            item_count: acc.item_count.saturating_add(item.quantity),
        })
    }
}

/// A single owner's line items plus derived totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    owner: CartOwner,
    items: Vec<LineItem>,
    totals: CartTotals,
}

impl Cart {
    /// Build a cart from items as given. Totals are derived here.
    #[must_use]
    pub fn new(owner: CartOwner, items: Vec<LineItem>) -> Self {
        let totals = CartTotals::compute(&items);
        Self {
            owner,
            items,
            totals,
        }
    }

    /// An empty cart.
    #[must_use]
    pub fn empty(owner: CartOwner) -> Self {
        Self::new(owner, Vec::new())
    }

    /// Build a cart from untrusted items, enforcing line-item invariants.
    ///
    /// Lines with no quantity are dropped, duplicate `(product, selection)`
    /// pairs are merged into the first occurrence, and quantities are
    /// clamped to the snapshot stock.
    #[must_use]
    pub fn normalized(owner: CartOwner, items: Vec<LineItem>) -> Self {
        let mut merged: Vec<LineItem> = Vec::with_capacity(items.len());
        for item in items {
            if item.quantity == 0 {
                continue;
            }
            if let Some(existing) = merged
                .iter_mut()
                .find(|m| m.matches(item.product_id, &item.selected_variants))
            {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            } else {
                merged.push(item);
            }
        }
        merged.retain_mut(|item| {
            clamp_quantity(item.quantity, item.product.stock).is_some_and(|q| {
                item.quantity = q;
                true
            })
        });
        Self::new(owner, merged)
    }

    #[must_use]
    pub const fn owner(&self) -> CartOwner {
        self.owner
    }

    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    #[must_use]
    pub fn into_items(self) -> Vec<LineItem> {
        self.items
    }

    #[must_use]
    pub const fn subtotal(&self) -> Decimal {
        self.totals.subtotal
    }

    #[must_use]
    pub const fn item_count(&self) -> u32 {
        self.totals.item_count
    }

    #[must_use]
    pub const fn totals(&self) -> CartTotals {
        self.totals
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find a line by ID.
    #[must_use]
    pub fn get(&self, id: LineItemId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Find the line holding `(product, selection)`.
    #[must_use]
    pub fn find_matching(
        &self,
        product_id: ProductId,
        selection: &VariantSelection,
    ) -> Option<&LineItem> {
        self.items
            .iter()
            .find(|item| item.matches(product_id, selection))
    }

    /// Add one unit of `product` with `selection`.
    ///
    /// Increments the matching line if there is one, otherwise appends a new
    /// line. Never exceeds the stock available for the combination.
    pub fn add(&mut self, product: &Product, selection: &VariantSelection) -> AddOutcome {
        let stock = product.available_stock_for(selection);
        let outcome = match self
            .items
            .iter_mut()
            .find(|item| item.matches(product.id, selection))
        {
            Some(item) if item.quantity >= stock => AddOutcome::AtStockLimit(item.id),
            Some(item) => {
                item.quantity += 1;
                AddOutcome::Incremented(item.id)
            }
            None if stock == 0 => AddOutcome::OutOfStock,
            None => {
                let item = LineItem::new(product, selection);
                let id = item.id;
                self.items.push(item);
                AddOutcome::Added(id)
            }
        };
        self.refresh_totals();
        outcome
    }

    /// Remove a line. Returns the removed line, or `None` if it wasn't there.
    pub fn remove(&mut self, id: LineItemId) -> Option<LineItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        let removed = self.items.remove(index);
        self.refresh_totals();
        Some(removed)
    }

    /// Set a line's quantity, clamped to its stock.
    ///
    /// A request of zero, or a line with no stock left, removes the line.
    /// Returns the quantity actually stored, or `None` if the line is gone.
    pub fn set_quantity(&mut self, id: LineItemId, requested: u32) -> Option<u32> {
        let item = self.items.iter_mut().find(|item| item.id == id)?;
        if let Some(quantity) = clamp_quantity(requested, item.product.stock) {
            item.quantity = quantity;
            self.refresh_totals();
            Some(quantity)
        } else {
            self.remove(id);
            None
        }
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
        self.refresh_totals();
    }

    fn refresh_totals(&mut self) {
        self.totals = CartTotals::compute(&self.items);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cartwheel_core::{ProductVariant, VariantId};

    fn product(name: &str, cents: i64, stock: u32) -> Product {
        Product {
            id: ProductId::generate(),
            name: name.to_owned(),
            description: None,
            price: Decimal::new(cents, 2),
            image: None,
            stock,
            featured: false,
            category: None,
            variants: Vec::new(),
        }
    }

    fn line(product: &Product, quantity: u32) -> LineItem {
        let mut item = LineItem::new(product, &VariantSelection::new());
        item.quantity = quantity;
        item
    }

    #[test]
    fn test_totals_example() {
        let a = product("A", 1000, 10);
        let b = product("B", 500, 10);
        let cart = Cart::new(CartOwner::Anonymous, vec![line(&a, 1), line(&b, 2)]);
        assert_eq!(cart.subtotal(), Decimal::new(20, 0));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_totals_are_idempotent() {
        let a = product("A", 1999, 10);
        let cart = Cart::new(CartOwner::Anonymous, vec![line(&a, 3)]);
        assert_eq!(CartTotals::compute(cart.items()), cart.totals());
        assert_eq!(CartTotals::compute(cart.items()), CartTotals::compute(cart.items()));
    }

    #[test]
    fn test_add_same_pair_increments() {
        let a = product("A", 1000, 10);
        let mut cart = Cart::empty(CartOwner::Anonymous);
        cart.add(&a, &VariantSelection::new());
        cart.add(&a, &VariantSelection::new());
        let outcome = cart.add(&a, &VariantSelection::new());
        assert!(matches!(outcome, AddOutcome::Incremented(_)));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.subtotal(), Decimal::new(30, 0));
    }

    #[test]
    fn test_add_different_selection_adds_line() {
        let mut a = product("A", 1000, 10);
        a.variants.push(ProductVariant {
            id: VariantId::generate(),
            product_id: a.id,
            name: "Size".to_owned(),
            value: "L".to_owned(),
            price_modifier: Decimal::new(200, 2),
            stock: 5,
        });
        let mut cart = Cart::empty(CartOwner::Anonymous);
        cart.add(&a, &VariantSelection::new());
        cart.add(&a, &VariantSelection::new().with("Size", "L"));
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.subtotal(), Decimal::new(22, 0));
    }

    #[test]
    fn test_add_stops_at_stock() {
        let a = product("A", 1000, 2);
        let mut cart = Cart::empty(CartOwner::Anonymous);
        cart.add(&a, &VariantSelection::new());
        cart.add(&a, &VariantSelection::new());
        let outcome = cart.add(&a, &VariantSelection::new());
        assert!(matches!(outcome, AddOutcome::AtStockLimit(_)));
        assert!(!outcome.changed());
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_add_out_of_stock_is_noop() {
        let a = product("A", 1000, 0);
        let mut cart = Cart::empty(CartOwner::Anonymous);
        assert_eq!(cart.add(&a, &VariantSelection::new()), AddOutcome::OutOfStock);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_missing_is_none() {
        let a = product("A", 1000, 5);
        let mut cart = Cart::new(CartOwner::Anonymous, vec![line(&a, 2)]);
        let before = cart.clone();
        assert!(cart.remove(LineItemId::generate()).is_none());
        assert_eq!(cart, before);
    }

    #[test]
    fn test_set_quantity_zero_matches_remove() {
        let a = product("A", 1000, 5);
        let b = product("B", 700, 5);
        let items = vec![line(&a, 2), line(&b, 1)];
        let id = items[0].id;

        let mut by_update = Cart::new(CartOwner::Anonymous, items.clone());
        let mut by_remove = Cart::new(CartOwner::Anonymous, items);
        assert_eq!(by_update.set_quantity(id, 0), None);
        by_remove.remove(id);
        assert_eq!(by_update, by_remove);
    }

    #[test]
    fn test_set_quantity_clamps_to_stock() {
        let a = product("A", 1000, 4);
        let mut cart = Cart::new(CartOwner::Anonymous, vec![line(&a, 1)]);
        let id = cart.items()[0].id;
        assert_eq!(cart.set_quantity(id, 40), Some(4));
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn test_normalized_merges_and_clamps() {
        let a = product("A", 1000, 5);
        let b = product("B", 250, 10);
        let first = line(&a, 2);
        let first_id = first.id;
        let items = vec![first, line(&b, 0), line(&a, 4)];
        let cart = Cart::normalized(CartOwner::Anonymous, items);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].id, first_id);
        assert_eq!(cart.items()[0].quantity, 5);
    }

    #[test]
    fn test_normalized_drops_sold_out_lines() {
        let mut item = line(&product("A", 1000, 5), 1);
        item.product.stock = 0;
        let cart = Cart::normalized(CartOwner::Anonymous, vec![item]);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_owner_from_identity() {
        let user = UserId::generate();
        assert_eq!(CartOwner::from(None), CartOwner::Anonymous);
        assert_eq!(CartOwner::from(Some(user)), CartOwner::Identified(user));
        assert_eq!(CartOwner::Identified(user).user_id(), Some(user));
    }
}
