//! Cart domain types.
//!
//! The same [`Cart`] type is used for the confirmed source of truth and for
//! the projected display cart. Fields that only the projector sets
//! (`is_optimistic`, `price_known`, [`PendingFlags`], [`CostAmount::Pending`])
//! have neutral defaults on carts returned by the backend.

use naked_pineapple_core::{CartId, CartLineId, CurrencyCode, Money, VariantId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Merchandise
// =============================================================================

/// Selected option on a product variant (e.g. `Size: M`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedOption {
    /// Option name.
    pub name: String,
    /// Option value.
    pub value: String,
}

impl SelectedOption {
    /// Create a selected option.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The purchasable variant a cart line refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchandise {
    /// Product variant ID.
    pub variant_id: VariantId,
    /// Handle of the parent product.
    pub product_handle: String,
    /// Display title (product title, plus variant title when not the default).
    pub title: String,
    /// Selected options. Order carries no meaning.
    pub selected_options: Vec<SelectedOption>,
}

impl Merchandise {
    /// Merchandise with only a variant ID, as known when adding by ID.
    #[must_use]
    pub fn variant(variant_id: VariantId) -> Self {
        Self {
            variant_id,
            product_handle: String::new(),
            title: String::new(),
            selected_options: Vec::new(),
        }
    }
}

// =============================================================================
// Cost
// =============================================================================

/// Cost for a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCost {
    /// Price per unit.
    pub amount_per_quantity: Money,
    /// Compare-at price per unit.
    pub compare_at_amount_per_quantity: Option<Money>,
    /// Subtotal (before discounts).
    pub subtotal_amount: Money,
    /// Total (after discounts).
    pub total_amount: Money,
}

impl LineCost {
    /// Cost of `quantity` units at `unit` with no discount.
    #[must_use]
    pub fn at_unit_price(unit: Money, quantity: u32) -> Self {
        let subtotal = unit.times(quantity);
        Self {
            amount_per_quantity: unit,
            compare_at_amount_per_quantity: None,
            subtotal_amount: subtotal,
            total_amount: subtotal,
        }
    }
}

/// A cart-level amount that may not be computable during the optimistic window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "money", rename_all = "snake_case")]
pub enum CostAmount {
    /// Amount is known (confirmed, or safely estimated).
    Known(Money),
    /// Amount depends on information only the backend has.
    Pending,
}

impl CostAmount {
    /// The amount, if known.
    #[must_use]
    pub const fn known(&self) -> Option<Money> {
        match self {
            Self::Known(money) => Some(*money),
            Self::Pending => None,
        }
    }

    /// Whether the amount is still waiting on the backend.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for CostAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Known(money) => write!(f, "{money}"),
            Self::Pending => f.write_str("pending"),
        }
    }
}

/// Cart cost summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCost {
    /// Subtotal before tax/shipping.
    pub subtotal: CostAmount,
    /// Total amount.
    pub total: CostAmount,
}

impl CartCost {
    /// Zero cost in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self {
            subtotal: CostAmount::Known(Money::zero(currency_code)),
            total: CostAmount::Known(Money::zero(currency_code)),
        }
    }
}

// =============================================================================
// Lines
// =============================================================================

fn default_true() -> bool {
    true
}

/// A line item in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Cart line ID. `None` for optimistic placeholder lines.
    pub id: Option<CartLineId>,
    /// Product variant.
    pub merchandise: Merchandise,
    /// Quantity. Always at least 1 while the line is present.
    pub quantity: u32,
    /// Line cost.
    pub cost: LineCost,
    /// Whether this line reflects state the backend has not confirmed.
    #[serde(default)]
    pub is_optimistic: bool,
    /// Whether `cost` is based on a real unit price rather than the zero fallback.
    #[serde(default = "default_true")]
    pub price_known: bool,
}

impl CartLine {
    /// Whether this line has been confirmed by the backend.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        self.id.is_some()
    }
}

// =============================================================================
// Codes and buyer identity
// =============================================================================

/// Discount code applied to cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCode {
    /// The discount code.
    pub code: String,
    /// Whether the code is applicable.
    pub applicable: bool,
}

/// Gift card applied to cart. Only the last characters are ever exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedGiftCard {
    /// Last characters of the gift card code.
    pub last_characters: String,
}

impl AppliedGiftCard {
    /// Number of characters kept when masking a code.
    pub const VISIBLE_CHARACTERS: usize = 4;

    /// Mask a full gift card code down to its last characters.
    #[must_use]
    pub fn masked(code: &str) -> Self {
        let chars: Vec<char> = code.trim().chars().collect();
        let start = chars.len().saturating_sub(Self::VISIBLE_CHARACTERS);
        Self {
            last_characters: chars.get(start..).unwrap_or_default().iter().collect(),
        }
    }

    /// A full code with everything but its last characters starred out.
    #[must_use]
    pub fn redact(code: &str) -> String {
        format!("****{}", Self::masked(code).last_characters)
    }

    /// [`redact`](Self::redact) every code in `codes`.
    #[must_use]
    pub fn redact_all(codes: &[String]) -> Vec<String> {
        codes.iter().map(|code| Self::redact(code)).collect()
    }
}

/// Buyer identity for the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerIdentity {
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Country code (ISO 3166-1 alpha-2).
    pub country_code: Option<String>,
}

impl BuyerIdentity {
    /// Whether no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone.is_none() && self.country_code.is_none()
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Which parts of a projected cart are waiting on the backend.
///
/// Always all-false on confirmed carts. UI collaborators use these to disable
/// controls while a mutation is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFlags {
    /// A line add/update/remove is in flight.
    pub lines: bool,
    /// A discount code update is in flight.
    pub discount_codes: bool,
    /// A gift card update is in flight.
    pub gift_card_codes: bool,
    /// A buyer identity update is in flight.
    pub buyer_identity: bool,
}

impl PendingFlags {
    /// Whether anything is pending.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.lines || self.discount_codes || self.gift_card_codes || self.buyer_identity
    }
}

/// A shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Cart ID. `None` until the backend has created the cart.
    pub id: Option<CartId>,
    /// Checkout URL. Present only once the backend has a cart ID.
    pub checkout_url: Option<String>,
    /// Cart note.
    pub note: Option<String>,
    /// Cart lines, in backend order.
    pub lines: Vec<CartLine>,
    /// Total item quantity. Always the sum of line quantities.
    pub total_quantity: u32,
    /// Cart cost summary.
    pub cost: CartCost,
    /// Applied discount codes.
    pub discount_codes: Vec<DiscountCode>,
    /// Applied gift cards (masked).
    pub gift_cards: Vec<AppliedGiftCard>,
    /// Buyer identity.
    pub buyer_identity: Option<BuyerIdentity>,
    /// In-flight state, set only on projected carts.
    #[serde(default)]
    pub pending: PendingFlags,
}

impl Cart {
    /// The cart shown before the backend has created one.
    #[must_use]
    pub const fn empty(currency_code: CurrencyCode) -> Self {
        Self {
            id: None,
            checkout_url: None,
            note: None,
            lines: Vec::new(),
            total_quantity: 0,
            cost: CartCost::zero(currency_code),
            discount_codes: Vec::new(),
            gift_cards: Vec::new(),
            buyer_identity: None,
            pending: PendingFlags {
                lines: false,
                discount_codes: false,
                gift_card_codes: false,
                buyer_identity: false,
            },
        }
    }

    /// Sum of line quantities.
    #[must_use]
    pub fn line_quantity_sum(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Normalize a cart received from the backend.
    ///
    /// Drops zero-quantity lines, recomputes `total_quantity`, and clears any
    /// projection-only markers.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.lines.retain(|line| line.quantity > 0);
        for line in &mut self.lines {
            line.is_optimistic = false;
            line.price_known = true;
        }
        self.total_quantity = self.line_quantity_sum();
        self.pending = PendingFlags::default();
        self
    }

    /// Currency of the cart, taken from the subtotal or the first line.
    #[must_use]
    pub fn currency_code(&self) -> Option<CurrencyCode> {
        self.cost
            .subtotal
            .known()
            .or_else(|| self.cost.total.known())
            .map(|money| money.currency_code)
            .or_else(|| {
                self.lines
                    .first()
                    .map(|line| line.cost.amount_per_quantity.currency_code)
            })
    }

    /// Find a line by its confirmed ID.
    #[must_use]
    pub fn line(&self, id: &CartLineId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.id.as_ref() == Some(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_gift_card_masking() {
        assert_eq!(AppliedGiftCard::masked("ABCD-EFGH-1234").last_characters, "1234");
        assert_eq!(AppliedGiftCard::masked("xy").last_characters, "xy");
        assert_eq!(AppliedGiftCard::masked("  9876  ").last_characters, "9876");
        assert_eq!(AppliedGiftCard::redact("ABCD-EFGH-1234"), "****1234");
    }

    #[test]
    fn test_normalized_recomputes_total_quantity() {
        let mut cart = Cart::empty(CurrencyCode::USD);
        let unit = Money::zero(CurrencyCode::USD);
        for (id, quantity) in [("a", 2), ("b", 0), ("c", 5)] {
            cart.lines.push(CartLine {
                id: Some(CartLineId::new(id)),
                merchandise: Merchandise::variant(VariantId::new(id)),
                quantity,
                cost: LineCost::at_unit_price(unit, quantity),
                is_optimistic: true,
                price_known: false,
            });
        }
        cart.total_quantity = 99;

        let cart = cart.normalized();
        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.total_quantity, 7);
        assert!(cart.lines.iter().all(|l| !l.is_optimistic && l.price_known));
    }

    #[test]
    fn test_empty_cart_has_no_pending_flags() {
        let cart = Cart::empty(CurrencyCode::EUR);
        assert!(!cart.pending.any());
        assert_eq!(cart.currency_code(), Some(CurrencyCode::EUR));
    }

    #[test]
    fn test_pending_cost_serializes_without_amount() {
        let json = serde_json::to_value(CostAmount::Pending).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "pending" }));

        let confirmed: Cart = serde_json::from_value(serde_json::json!({
            "id": null,
            "checkout_url": null,
            "note": null,
            "lines": [],
            "total_quantity": 0,
            "cost": {
                "subtotal": { "state": "known", "money": { "amount": "0", "currency_code": "USD" } },
                "total": { "state": "known", "money": { "amount": "0", "currency_code": "USD" } }
            },
            "discount_codes": [],
            "gift_cards": [],
            "buyer_identity": null
        }))
        .unwrap();
        assert!(!confirmed.pending.any());
    }
}
