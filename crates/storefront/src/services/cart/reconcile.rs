//! Reconciling remote cart rows.
//!
//! Two situations need more than a plain load: remote rows that violate the
//! one-line-per-pair rule, and an anonymous cart being carried into a user's
//! remote cart on sign-in. Both are planned here as pure functions and
//! applied by the cart manager.

use core::fmt;
use core::str::FromStr;

use cartwheel_core::{LineItemId, ProductId, VariantSelection};

use super::ports::RemoteLineItem;
use crate::models::{LineItem, clamp_quantity};

/// What happens to the anonymous cart when a shopper signs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignInPolicy {
    /// Leave the anonymous cart in local storage; show only the remote cart.
    #[default]
    Discard,
    /// Add the anonymous lines to the remote cart, then empty local storage.
    Merge,
}

impl SignInPolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Discard => "discard",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for SignInPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`SignInPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sign-in policy '{0}', expected 'discard' or 'merge'")]
pub struct UnknownPolicy(String);

impl FromStr for SignInPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discard" => Ok(Self::Discard),
            "merge" => Ok(Self::Merge),
            _ => Err(UnknownPolicy(s.to_owned())),
        }
    }
}

/// One write against the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    Insert {
        product_id: ProductId,
        quantity: u32,
        selected_variants: VariantSelection,
    },
    Update {
        id: LineItemId,
        quantity: u32,
    },
    Delete {
        id: LineItemId,
    },
}

/// Writes that fold duplicate, empty and over-stock remote rows back into
/// shape.
///
/// The first row for each `(product, selection)` pair keeps its ID and
/// receives the summed quantity; later rows are deleted. Rows with no
/// quantity are deleted outright. Surviving rows are then clamped to the
/// stock their product currently reports, and deleted if none is left.
/// Returns the writes and the surviving rows in their original order, with
/// quantities as they will be after the writes are applied.
#[must_use]
pub fn plan_repairs(rows: Vec<RemoteLineItem>) -> (Vec<RemoteWrite>, Vec<RemoteLineItem>) {
    let mut writes = Vec::new();
    // Each kept row alongside the quantity currently stored for it.
    let mut kept: Vec<(RemoteLineItem, u32)> = Vec::with_capacity(rows.len());

    for row in rows {
        if row.quantity == 0 {
            writes.push(RemoteWrite::Delete { id: row.id });
            continue;
        }
        if let Some((first, _)) = kept
            .iter_mut()
            .find(|(k, _)| k.matches(row.product.id, &row.selected_variants))
        {
            first.quantity = first.quantity.saturating_add(row.quantity);
            writes.push(RemoteWrite::Delete { id: row.id });
        } else {
            let stored = row.quantity;
            kept.push((row, stored));
        }
    }

    let mut surviving = Vec::with_capacity(kept.len());
    for (mut row, stored) in kept {
        match clamp_quantity(row.quantity, row.available_stock()) {
            None => writes.push(RemoteWrite::Delete { id: row.id }),
            Some(quantity) => {
                if quantity != stored {
                    writes.push(RemoteWrite::Update {
                        id: row.id,
                        quantity,
                    });
                }
                row.quantity = quantity;
                surviving.push(row);
            }
        }
    }
    (writes, surviving)
}

/// Writes that add an anonymous cart's lines to a user's remote rows.
///
/// Quantities are summed with an existing row for the same pair and clamped
/// to the stock the remote row's product reports. New pairs are inserted,
/// clamped to the stock recorded on the local line. Lines that end up with
/// nothing to add are skipped.
#[must_use]
pub fn plan_merge(remote: &[RemoteLineItem], local: &[LineItem]) -> Vec<RemoteWrite> {
    local
        .iter()
        .filter_map(|item| {
            match remote
                .iter()
                .find(|row| row.matches(item.product_id, &item.selected_variants))
            {
                Some(row) => {
                    let target = clamp_quantity(
                        row.quantity.saturating_add(item.quantity),
                        row.available_stock(),
                    )?;
                    (target != row.quantity).then_some(RemoteWrite::Update {
                        id: row.id,
                        quantity: target,
                    })
                }
                None => clamp_quantity(item.quantity, item.product.stock).map(|quantity| {
                    RemoteWrite::Insert {
                        product_id: item.product_id,
                        quantity,
                        selected_variants: item.selected_variants.clone(),
                    }
                }),
            }
        })
        .collect()
}
