//! Optimistic projector.
//!
//! [`project`] derives the cart to display from the last confirmed cart and
//! the pending actions, applied in submission order. It holds no state and
//! never mutates its inputs, so calling it again with the same inputs always
//! yields the same cart.
//!
//! Cost rules while lines are pending:
//! - line subtotal is unit price times quantity
//! - line total is that subtotal minus the discount the line already carried,
//!   floored at zero
//! - cart subtotal is the sum of line subtotals
//! - cart total is the confirmed total shifted by the change in line totals
//!
//! Either cart amount becomes [`CostAmount::Pending`] when a line's price is
//! unknown or amounts in different currencies meet. The total is also
//! pending while discount codes are being changed.

use naked_pineapple_core::{CartLineId, CurrencyCode, Money, MoneyError};

use crate::action::{AddLine, CartAction, LineUpdate, MAX_LINE_QUANTITY, clamp_quantity};
use crate::identity::{MerchandiseKey, find_slot};
use crate::model::{AppliedGiftCard, Cart, CartLine, CostAmount, DiscountCode, LineCost};

/// Project the display cart from the confirmed cart and pending actions.
#[must_use]
pub fn project<'a, I>(confirmed: &Cart, actions: I) -> Cart
where
    I: IntoIterator<Item = &'a CartAction>,
{
    let mut actions = actions.into_iter().peekable();
    if actions.peek().is_none() {
        return confirmed.clone();
    }

    let mut projection = Projection::new(confirmed);
    for action in actions {
        projection.apply(action);
    }
    projection.finish(confirmed)
}

struct Projection {
    cart: Cart,
    currency: CurrencyCode,
    lines_touched: bool,
    estimate_failed: bool,
}

impl Projection {
    fn new(confirmed: &Cart) -> Self {
        Self {
            cart: confirmed.clone(),
            currency: confirmed.currency_code().unwrap_or_default(),
            lines_touched: false,
            estimate_failed: false,
        }
    }

    fn apply(&mut self, action: &CartAction) {
        match action {
            CartAction::AddLines(lines) => {
                self.lines_touched = true;
                for line in lines {
                    self.add_line(line);
                }
            }
            CartAction::UpdateLines(updates) => {
                self.lines_touched = true;
                for update in updates {
                    self.update_line(update);
                }
            }
            CartAction::RemoveLines(ids) => {
                self.lines_touched = true;
                self.remove_lines(ids);
            }
            CartAction::UpdateDiscountCodes(codes) => {
                self.cart.discount_codes = codes
                    .iter()
                    .map(|code| DiscountCode {
                        code: code.clone(),
                        applicable: true,
                    })
                    .collect();
                self.cart.pending.discount_codes = true;
            }
            CartAction::UpdateGiftCardCodes(codes) => {
                self.cart.gift_cards = codes.iter().map(|c| AppliedGiftCard::masked(c)).collect();
                self.cart.pending.gift_card_codes = true;
            }
            CartAction::UpdateBuyerIdentity(_) => {
                self.cart.pending.buyer_identity = true;
            }
        }
    }

    fn add_line(&mut self, add: &AddLine) {
        let quantity = clamp_quantity(add.quantity);
        let key = MerchandiseKey::from(&add.merchandise);
        let unit_price = add
            .unit_price
            .filter(|price| price.currency_code == self.currency);
        if add.unit_price.is_some() && unit_price.is_none() {
            self.estimate_failed = true;
        }

        if let Some(index) = find_slot(&self.cart.lines, &key) {
            let Some(line) = self.cart.lines.get_mut(index) else {
                return;
            };
            if !line.price_known
                && let Some(unit) = unit_price
            {
                line.cost.amount_per_quantity = unit;
                line.price_known = true;
            }
            let merged = line.quantity.saturating_add(quantity).min(MAX_LINE_QUANTITY);
            self.estimate_failed |= reprice(line, merged).is_err();
            return;
        }

        let (cost, price_known) = unit_price.map_or_else(
            || (LineCost::at_unit_price(Money::zero(self.currency), quantity), false),
            |unit| (LineCost::at_unit_price(unit, quantity), true),
        );
        self.cart.lines.push(CartLine {
            id: None,
            merchandise: add.merchandise.clone(),
            quantity,
            cost,
            is_optimistic: true,
            price_known,
        });
    }

    fn update_line(&mut self, update: &LineUpdate) {
        let quantity = clamp_quantity(update.quantity);
        if quantity == 0 {
            self.remove_lines(std::slice::from_ref(&update.id));
            return;
        }
        // The line may already be gone from a later confirmed cart.
        let Some(line) = self
            .cart
            .lines
            .iter_mut()
            .find(|line| line.id.as_ref() == Some(&update.id))
        else {
            return;
        };
        self.estimate_failed |= reprice(line, quantity).is_err();
    }

    fn remove_lines(&mut self, ids: &[CartLineId]) {
        self.cart
            .lines
            .retain(|line| line.id.as_ref().is_none_or(|id| !ids.contains(id)));
    }

    fn finish(mut self, confirmed: &Cart) -> Cart {
        self.cart.total_quantity = self.cart.line_quantity_sum();
        self.cart.pending.lines = self.lines_touched;

        if self.lines_touched {
            let estimate = self.estimate_cost(confirmed);
            self.cart.cost.subtotal = estimate.map_or(CostAmount::Pending, |(s, _)| s);
            self.cart.cost.total = estimate.map_or(CostAmount::Pending, |(_, t)| t);
        }
        if self.cart.pending.discount_codes {
            self.cart.cost.total = CostAmount::Pending;
        }
        self.cart
    }

    /// Estimated `(subtotal, total)`, or `None` when it cannot be trusted.
    fn estimate_cost(&self, confirmed: &Cart) -> Option<(CostAmount, CostAmount)> {
        if self.estimate_failed || self.cart.lines.iter().any(|line| !line.price_known) {
            return None;
        }

        let subtotal = sum(&self.cart.lines, self.currency, |c| c.subtotal_amount).ok()?;
        let total = match confirmed.cost.total {
            CostAmount::Known(confirmed_total) => {
                let before = sum(&confirmed.lines, self.currency, |c| c.total_amount).ok()?;
                let after = sum(&self.cart.lines, self.currency, |c| c.total_amount).ok()?;
                let shifted = confirmed_total
                    .checked_add(after)
                    .and_then(|t| t.checked_sub(before))
                    .ok()?;
                CostAmount::Known(shifted)
            }
            CostAmount::Pending => CostAmount::Pending,
        };
        Some((CostAmount::Known(subtotal), total))
    }
}

/// Set a line's quantity and recompute its cost.
fn reprice(line: &mut CartLine, quantity: u32) -> Result<(), MoneyError> {
    line.quantity = quantity;
    line.is_optimistic = true;

    let discount = line
        .cost
        .subtotal_amount
        .saturating_sub(line.cost.total_amount)?;
    let subtotal = line.cost.amount_per_quantity.times(quantity);
    line.cost.subtotal_amount = subtotal;
    line.cost.total_amount = subtotal.saturating_sub(discount)?;
    Ok(())
}

fn sum(
    lines: &[CartLine],
    currency: CurrencyCode,
    amount: impl Fn(&LineCost) -> Money,
) -> Result<Money, MoneyError> {
    lines
        .iter()
        .try_fold(Money::zero(currency), |acc, line| acc.checked_add(amount(&line.cost)))
}

#[cfg(test)]
mod tests {
    use naked_pineapple_core::VariantId;
    use rust_decimal::Decimal;

    use super::*;
    use crate::model::{CartCost, Merchandise, SelectedOption};

    fn usd(cents: i64) -> Money {
        Money::new(Decimal::new(cents, 2), CurrencyCode::USD)
    }

    fn confirmed_line(id: &str, variant: &str, quantity: u32, unit_cents: i64) -> CartLine {
        CartLine {
            id: Some(CartLineId::new(id)),
            merchandise: Merchandise {
                variant_id: VariantId::new(variant),
                product_handle: "tee".to_string(),
                title: "Tee".to_string(),
                selected_options: vec![SelectedOption::new("Size", "M")],
            },
            quantity,
            cost: LineCost::at_unit_price(usd(unit_cents), quantity),
            is_optimistic: false,
            price_known: true,
        }
    }

    fn cart(lines: Vec<CartLine>, shipping_cents: i64) -> Cart {
        let mut cart = Cart::empty(CurrencyCode::USD);
        cart.lines = lines;
        let subtotal = sum(&cart.lines, CurrencyCode::USD, |c| c.subtotal_amount)
            .unwrap_or_else(|_| usd(0));
        cart.cost = CartCost {
            subtotal: CostAmount::Known(subtotal),
            total: CostAmount::Known(
                subtotal
                    .checked_add(usd(shipping_cents))
                    .unwrap_or_else(|_| usd(0)),
            ),
        };
        cart.normalized()
    }

    fn add(variant: &str, options: &[(&str, &str)], quantity: i64, price: Option<Money>) -> AddLine {
        AddLine {
            merchandise: Merchandise {
                variant_id: VariantId::new(variant),
                product_handle: "tee".to_string(),
                title: "Tee".to_string(),
                selected_options: options
                    .iter()
                    .map(|(n, v)| SelectedOption::new(*n, *v))
                    .collect(),
            },
            quantity,
            unit_price: price,
        }
    }

    fn update(id: &str, quantity: i64) -> CartAction {
        CartAction::UpdateLines(vec![LineUpdate {
            id: CartLineId::new(id),
            quantity,
        }])
    }

    #[test]
    fn test_no_actions_returns_confirmed() {
        let confirmed = cart(vec![confirmed_line("L1", "V1", 2, 1000)], 500);
        assert_eq!(project(&confirmed, &[]), confirmed);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let confirmed = cart(vec![confirmed_line("L1", "V1", 2, 1000)], 0);
        let actions = vec![
            update("L1", 5),
            CartAction::AddLines(vec![add("V9", &[], 1, None)]),
            CartAction::UpdateDiscountCodes(vec!["SAVE".to_string()]),
        ];
        assert_eq!(project(&confirmed, &actions), project(&confirmed, &actions));
    }

    #[test]
    fn test_update_sets_quantity_and_marks_optimistic() {
        let confirmed = cart(vec![confirmed_line("L1", "V1", 2, 1000)], 500);
        let projected = project(&confirmed, &[update("L1", 3)]);

        let line = projected.line(&CartLineId::new("L1"));
        assert!(matches!(line, Some(l) if l.quantity == 3 && l.is_optimistic));
        assert_eq!(projected.total_quantity, 3);
        assert_eq!(projected.cost.subtotal, CostAmount::Known(usd(3000)));
        assert_eq!(projected.cost.total, CostAmount::Known(usd(3500)));
        assert!(projected.pending.lines);
        // The confirmed cart is untouched.
        assert_eq!(confirmed.total_quantity, 2);
    }

    #[test]
    fn test_update_to_zero_matches_remove() {
        let confirmed = cart(
            vec![
                confirmed_line("L1", "V1", 2, 1000),
                confirmed_line("L2", "V2", 1, 250),
            ],
            0,
        );
        let via_update = project(&confirmed, &[update("L2", 0)]);
        let via_remove = project(
            &confirmed,
            &[CartAction::RemoveLines(vec![CartLineId::new("L2")])],
        );
        assert_eq!(via_update, via_remove);
        assert!(via_update.line(&CartLineId::new("L2")).is_none());
        assert_eq!(via_update.total_quantity, 2);
    }

    #[test]
    fn test_double_add_merges_into_one_optimistic_line() {
        let confirmed = cart(vec![], 0);
        let actions = vec![
            CartAction::AddLines(vec![add("V1", &[("Size", "M"), ("Color", "Red")], 2, None)]),
            CartAction::AddLines(vec![add("V1", &[("Color", "Red"), ("Size", "M")], 3, None)]),
        ];
        let projected = project(&confirmed, &actions);

        assert_eq!(projected.lines.len(), 1);
        let line = projected.lines.first();
        assert!(matches!(line, Some(l) if l.quantity == 5 && l.id.is_none() && l.is_optimistic));
        assert_eq!(projected.total_quantity, 5);
    }

    #[test]
    fn test_add_merges_into_confirmed_line() {
        let confirmed = cart(vec![confirmed_line("L1", "V1", 1, 1000)], 0);
        let projected = project(
            &confirmed,
            &[CartAction::AddLines(vec![add("V1", &[("Size", "M")], 2, None)])],
        );
        assert_eq!(projected.lines.len(), 1);
        let line = projected.line(&CartLineId::new("L1"));
        assert!(matches!(line, Some(l) if l.quantity == 3));
        assert_eq!(projected.cost.subtotal, CostAmount::Known(usd(3000)));
    }

    #[test]
    fn test_add_with_different_options_appends() {
        let confirmed = cart(vec![confirmed_line("L1", "V1", 1, 1000)], 0);
        let projected = project(
            &confirmed,
            &[CartAction::AddLines(vec![add("V1", &[("Size", "L")], 1, Some(usd(1000)))])],
        );
        assert_eq!(projected.lines.len(), 2);
        assert_eq!(projected.cost.subtotal, CostAmount::Known(usd(2000)));
    }

    #[test]
    fn test_unknown_price_makes_totals_pending() {
        let confirmed = cart(vec![confirmed_line("L1", "V1", 1, 1000)], 0);
        let projected = project(
            &confirmed,
            &[CartAction::AddLines(vec![add("V2", &[], 1, None)])],
        );
        let placeholder = projected.lines.last();
        assert!(matches!(
            placeholder,
            Some(l) if !l.price_known && l.cost.total_amount.is_zero()
        ));
        assert_eq!(projected.cost.subtotal, CostAmount::Pending);
        assert_eq!(projected.cost.total, CostAmount::Pending);
    }

    #[test]
    fn test_foreign_currency_price_is_not_trusted() {
        let confirmed = cart(vec![], 0);
        let eur = Money::new(Decimal::new(500, 2), CurrencyCode::EUR);
        let projected = project(
            &confirmed,
            &[CartAction::AddLines(vec![add("V2", &[], 1, Some(eur))])],
        );
        assert_eq!(projected.cost.total, CostAmount::Pending);
    }

    #[test]
    fn test_line_discount_is_preserved_on_update() {
        let mut line = confirmed_line("L1", "V1", 2, 1000);
        line.cost.total_amount = usd(1500);
        let mut confirmed = cart(vec![line], 0);
        confirmed.cost.total = CostAmount::Known(usd(1500));

        let projected = project(&confirmed, &[update("L1", 4)]);
        let line = projected.line(&CartLineId::new("L1"));
        assert!(matches!(line, Some(l) if l.cost.total_amount == usd(3500)));
        assert_eq!(projected.cost.total, CostAmount::Known(usd(3500)));
    }

    #[test]
    fn test_discount_codes_replace_and_pend_total() {
        let mut confirmed = cart(vec![confirmed_line("L1", "V1", 1, 1000)], 0);
        confirmed.discount_codes = vec![DiscountCode {
            code: "OLD".to_string(),
            applicable: false,
        }];
        let projected = project(
            &confirmed,
            &[CartAction::UpdateDiscountCodes(vec!["NEW".to_string()])],
        );
        assert_eq!(
            projected.discount_codes,
            vec![DiscountCode {
                code: "NEW".to_string(),
                applicable: true
            }]
        );
        assert!(projected.pending.discount_codes);
        assert_eq!(projected.cost.subtotal, confirmed.cost.subtotal);
        assert_eq!(projected.cost.total, CostAmount::Pending);
    }

    #[test]
    fn test_latest_code_update_wins() {
        let confirmed = cart(vec![], 0);
        let projected = project(
            &confirmed,
            &[
                CartAction::UpdateGiftCardCodes(vec!["AAAA-1111".to_string()]),
                CartAction::UpdateGiftCardCodes(vec!["BBBB-2222".to_string()]),
            ],
        );
        assert_eq!(
            projected.gift_cards,
            vec![AppliedGiftCard {
                last_characters: "2222".to_string()
            }]
        );
        assert!(projected.pending.gift_card_codes);
    }

    #[test]
    fn test_buyer_identity_only_flags_pending() {
        let confirmed = cart(vec![confirmed_line("L1", "V1", 1, 1000)], 0);
        let projected = project(
            &confirmed,
            &[CartAction::UpdateBuyerIdentity(crate::model::BuyerIdentity {
                country_code: Some("CA".to_string()),
                ..Default::default()
            })],
        );
        assert!(projected.pending.buyer_identity);
        assert_eq!(projected.lines, confirmed.lines);
        assert_eq!(projected.cost, confirmed.cost);
        assert_eq!(projected.buyer_identity, confirmed.buyer_identity);
    }

    #[test]
    fn test_update_for_missing_line_is_ignored() {
        let confirmed = cart(vec![confirmed_line("L1", "V1", 1, 1000)], 0);
        let projected = project(&confirmed, &[update("L9", 4)]);
        assert_eq!(projected.lines, confirmed.lines);
        assert_eq!(projected.total_quantity, 1);
    }
}
