//! Unit price hints for optimistic adds.
//!
//! Prices are learned from every confirmed cart so that re-adding a variant
//! the backend has priced before shows a real estimate instead of the zero
//! fallback. Hints are filled in at submit time, which keeps the projector a
//! pure function of its inputs.

use std::time::Duration;

use moka::sync::Cache;
use naked_pineapple_core::{Money, VariantId};

use crate::action::CartAction;
use crate::model::Cart;

const DEFAULT_CAPACITY: u64 = 1000;
const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Bounded, expiring cache of variant unit prices.
#[derive(Clone)]
pub struct PriceHints {
    cache: Cache<VariantId, Money>,
}

impl std::fmt::Debug for PriceHints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceHints")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl Default for PriceHints {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl PriceHints {
    /// Create a cache holding at most `capacity` prices for `ttl` each.
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Remember a unit price.
    pub fn insert(&self, variant_id: VariantId, unit_price: Money) {
        self.cache.insert(variant_id, unit_price);
    }

    /// Last known unit price for a variant.
    #[must_use]
    pub fn get(&self, variant_id: &VariantId) -> Option<Money> {
        self.cache.get(variant_id)
    }

    /// Record the unit price of every line in a confirmed cart.
    pub fn learn(&self, cart: &Cart) {
        for line in cart.lines.iter().filter(|line| line.price_known) {
            self.insert(
                line.merchandise.variant_id.clone(),
                line.cost.amount_per_quantity,
            );
        }
    }

    /// Fill missing unit prices on an add from known hints.
    #[must_use]
    pub fn annotate(&self, action: CartAction) -> CartAction {
        match action {
            CartAction::AddLines(mut lines) => {
                for line in &mut lines {
                    if line.unit_price.is_none() {
                        line.unit_price = self.get(&line.merchandise.variant_id);
                    }
                }
                CartAction::AddLines(lines)
            }
            other => other,
        }
    }
}
