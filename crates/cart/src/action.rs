//! Cart actions submitted by UI collaborators.
//!
//! A [`CartAction`] carries the minimal payload needed both to render its
//! optimistic effect and to build the backend mutation. Quantities arrive as
//! `i64` (the shape of Shopify's `Int` and of form input) and are checked by
//! [`CartAction::validate`] before anything is enqueued.

use std::collections::HashSet;
use std::fmt;

use naked_pineapple_core::{CartLineId, Money};
use serde::{Deserialize, Serialize};

use crate::backend::{CartLineInput, CartLineUpdateInput, CartMutation};
use crate::error::ValidationError;
use crate::identity::LineTarget;
use crate::model::{AppliedGiftCard, BuyerIdentity, Merchandise};

/// Largest quantity a single line may hold.
pub const MAX_LINE_QUANTITY: u32 = 999_999;

/// Kind of a cart action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AddLines,
    UpdateLines,
    RemoveLines,
    UpdateDiscountCodes,
    UpdateGiftCardCodes,
    UpdateBuyerIdentity,
}

impl ActionKind {
    /// Whether this kind edits existing lines and therefore takes line locks.
    #[must_use]
    pub const fn edits_lines(self) -> bool {
        matches!(self, Self::UpdateLines | Self::RemoveLines)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddLines => write!(f, "add_lines"),
            Self::UpdateLines => write!(f, "update_lines"),
            Self::RemoveLines => write!(f, "remove_lines"),
            Self::UpdateDiscountCodes => write!(f, "update_discount_codes"),
            Self::UpdateGiftCardCodes => write!(f, "update_gift_card_codes"),
            Self::UpdateBuyerIdentity => write!(f, "update_buyer_identity"),
        }
    }
}

/// A line to add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    /// What to add.
    pub merchandise: Merchandise,
    /// How many units to add.
    pub quantity: i64,
    /// Unit price, when the caller knows it (e.g. from the product page).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Money>,
}

/// A quantity change for an existing line. Quantity 0 removes the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineUpdate {
    /// Line to change.
    pub id: CartLineId,
    /// New quantity.
    pub quantity: i64,
}

/// An action the user submitted against the cart.
///
/// `Debug` output masks gift card codes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum CartAction {
    AddLines(Vec<AddLine>),
    UpdateLines(Vec<LineUpdate>),
    RemoveLines(Vec<CartLineId>),
    /// Full replacement of the applied discount codes.
    UpdateDiscountCodes(Vec<String>),
    /// Full replacement of the applied gift card codes.
    UpdateGiftCardCodes(Vec<String>),
    UpdateBuyerIdentity(BuyerIdentity),
}

impl fmt::Debug for CartAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddLines(lines) => f.debug_tuple("AddLines").field(lines).finish(),
            Self::UpdateLines(updates) => f.debug_tuple("UpdateLines").field(updates).finish(),
            Self::RemoveLines(ids) => f.debug_tuple("RemoveLines").field(ids).finish(),
            Self::UpdateDiscountCodes(codes) => {
                f.debug_tuple("UpdateDiscountCodes").field(codes).finish()
            }
            Self::UpdateGiftCardCodes(codes) => f
                .debug_tuple("UpdateGiftCardCodes")
                .field(&AppliedGiftCard::redact_all(codes))
                .finish(),
            Self::UpdateBuyerIdentity(identity) => {
                f.debug_tuple("UpdateBuyerIdentity").field(identity).finish()
            }
        }
    }
}

impl CartAction {
    /// A copy safe to expose outside the controller: gift card codes are
    /// replaced by their masked form.
    #[must_use]
    pub fn redacted(&self) -> Self {
        match self {
            Self::UpdateGiftCardCodes(codes) => {
                Self::UpdateGiftCardCodes(AppliedGiftCard::redact_all(codes))
            }
            other => other.clone(),
        }
    }

    /// The kind of this action.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::AddLines(_) => ActionKind::AddLines,
            Self::UpdateLines(_) => ActionKind::UpdateLines,
            Self::RemoveLines(_) => ActionKind::RemoveLines,
            Self::UpdateDiscountCodes(_) => ActionKind::UpdateDiscountCodes,
            Self::UpdateGiftCardCodes(_) => ActionKind::UpdateGiftCardCodes,
            Self::UpdateBuyerIdentity(_) => ActionKind::UpdateBuyerIdentity,
        }
    }

    /// Lines this action locks against concurrent updates/removals.
    #[must_use]
    pub fn line_targets(&self) -> Vec<LineTarget> {
        match self {
            Self::UpdateLines(updates) => updates
                .iter()
                .map(|u| LineTarget::Line(u.id.clone()))
                .collect(),
            Self::RemoveLines(ids) => ids.iter().cloned().map(LineTarget::Line).collect(),
            _ => Vec::new(),
        }
    }

    /// Check the payload and return it with codes trimmed.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] describing the first problem found.
    pub fn validate(self) -> Result<Self, ValidationError> {
        match self {
            Self::AddLines(lines) => {
                if lines.is_empty() {
                    return Err(ValidationError::EmptyPayload);
                }
                for line in &lines {
                    if line.quantity < 1 {
                        return Err(ValidationError::NonPositiveQuantity {
                            variant_id: line.merchandise.variant_id.to_string(),
                            quantity: line.quantity,
                        });
                    }
                    check_max(line.quantity)?;
                }
                Ok(Self::AddLines(lines))
            }
            Self::UpdateLines(updates) => {
                if updates.is_empty() {
                    return Err(ValidationError::EmptyPayload);
                }
                check_unique(updates.iter().map(|u| &u.id))?;
                for update in &updates {
                    if update.quantity < 0 {
                        return Err(ValidationError::NegativeQuantity {
                            line_id: update.id.clone(),
                            quantity: update.quantity,
                        });
                    }
                    check_max(update.quantity)?;
                }
                Ok(Self::UpdateLines(updates))
            }
            Self::RemoveLines(ids) => {
                if ids.is_empty() {
                    return Err(ValidationError::EmptyPayload);
                }
                check_unique(ids.iter())?;
                Ok(Self::RemoveLines(ids))
            }
            // An empty list is valid and clears every code.
            Self::UpdateDiscountCodes(codes) => {
                Ok(Self::UpdateDiscountCodes(clean_codes(codes, "discount")?))
            }
            Self::UpdateGiftCardCodes(codes) => {
                Ok(Self::UpdateGiftCardCodes(clean_codes(codes, "gift card")?))
            }
            Self::UpdateBuyerIdentity(identity) => {
                let identity = BuyerIdentity {
                    email: non_blank(identity.email),
                    phone: non_blank(identity.phone),
                    country_code: non_blank(identity.country_code)
                        .map(|c| c.to_ascii_uppercase()),
                };
                if identity.is_empty() {
                    return Err(ValidationError::EmptyBuyerIdentity);
                }
                Ok(Self::UpdateBuyerIdentity(identity))
            }
        }
    }

    /// The backend request for this action.
    #[must_use]
    pub fn to_mutation(&self) -> CartMutation {
        match self {
            Self::AddLines(lines) => CartMutation::AddLines(
                lines
                    .iter()
                    .map(|line| CartLineInput {
                        merchandise_id: line.merchandise.variant_id.clone(),
                        quantity: clamp_quantity(line.quantity),
                    })
                    .collect(),
            ),
            Self::UpdateLines(updates) => CartMutation::UpdateLines(
                updates
                    .iter()
                    .map(|u| CartLineUpdateInput {
                        id: u.id.clone(),
                        quantity: clamp_quantity(u.quantity),
                    })
                    .collect(),
            ),
            Self::RemoveLines(ids) => CartMutation::RemoveLines(ids.clone()),
            Self::UpdateDiscountCodes(codes) => CartMutation::UpdateDiscountCodes(codes.clone()),
            Self::UpdateGiftCardCodes(codes) => CartMutation::UpdateGiftCardCodes(codes.clone()),
            Self::UpdateBuyerIdentity(identity) => {
                CartMutation::UpdateBuyerIdentity(identity.clone())
            }
        }
    }
}

/// Convert a validated quantity to `u32`, clamping anything out of range.
#[must_use]
pub fn clamp_quantity(quantity: i64) -> u32 {
    u32::try_from(quantity.max(0))
        .unwrap_or(MAX_LINE_QUANTITY)
        .min(MAX_LINE_QUANTITY)
}

fn check_max(quantity: i64) -> Result<(), ValidationError> {
    if quantity > i64::from(MAX_LINE_QUANTITY) {
        return Err(ValidationError::QuantityTooLarge {
            quantity,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

fn check_unique<'a>(ids: impl Iterator<Item = &'a CartLineId>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateLine(id.clone()));
        }
    }
    Ok(())
}

fn clean_codes(codes: Vec<String>, label: &'static str) -> Result<Vec<String>, ValidationError> {
    let mut cleaned: Vec<String> = Vec::with_capacity(codes.len());
    for code in codes {
        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::BlankCode(label));
        }
        if !cleaned.iter().any(|c| c == code) {
            cleaned.push(code.to_string());
        }
    }
    Ok(cleaned)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use naked_pineapple_core::VariantId;

    use super::*;

    fn add(variant: &str, quantity: i64) -> AddLine {
        AddLine {
            merchandise: Merchandise::variant(VariantId::new(variant)),
            quantity,
            unit_price: None,
        }
    }

    #[test]
    fn test_add_requires_positive_quantity() {
        let result = CartAction::AddLines(vec![add("V1", 0)]).validate();
        assert!(matches!(
            result,
            Err(ValidationError::NonPositiveQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn test_add_rejects_huge_quantity() {
        let result = CartAction::AddLines(vec![add("V1", 5_000_000)]).validate();
        assert!(matches!(result, Err(ValidationError::QuantityTooLarge { .. })));
    }

    #[test]
    fn test_update_allows_zero_but_not_negative() {
        let zero = CartAction::UpdateLines(vec![LineUpdate {
            id: CartLineId::new("L1"),
            quantity: 0,
        }]);
        assert!(zero.validate().is_ok());

        let negative = CartAction::UpdateLines(vec![LineUpdate {
            id: CartLineId::new("L1"),
            quantity: -1,
        }]);
        assert!(matches!(
            negative.validate(),
            Err(ValidationError::NegativeQuantity { .. })
        ));
    }

    #[test]
    fn test_duplicate_lines_rejected() {
        let action = CartAction::RemoveLines(vec![CartLineId::new("L1"), CartLineId::new("L1")]);
        assert_eq!(
            action.validate(),
            Err(ValidationError::DuplicateLine(CartLineId::new("L1")))
        );
    }

    #[test]
    fn test_empty_payloads() {
        assert_eq!(
            CartAction::AddLines(vec![]).validate(),
            Err(ValidationError::EmptyPayload)
        );
        assert_eq!(
            CartAction::RemoveLines(vec![]).validate(),
            Err(ValidationError::EmptyPayload)
        );
        // Clearing codes is allowed.
        assert_eq!(
            CartAction::UpdateDiscountCodes(vec![]).validate(),
            Ok(CartAction::UpdateDiscountCodes(vec![]))
        );
    }

    #[test]
    fn test_codes_are_trimmed_and_deduplicated() {
        let action = CartAction::UpdateDiscountCodes(vec![
            " SUMMER ".to_string(),
            "SUMMER".to_string(),
            "VIP".to_string(),
        ]);
        assert_eq!(
            action.validate(),
            Ok(CartAction::UpdateDiscountCodes(vec![
                "SUMMER".to_string(),
                "VIP".to_string()
            ]))
        );
        let blank = CartAction::UpdateGiftCardCodes(vec!["  ".to_string()]);
        assert_eq!(blank.validate(), Err(ValidationError::BlankCode("gift card")));
    }

    #[test]
    fn test_buyer_identity_needs_a_field() {
        let empty = CartAction::UpdateBuyerIdentity(BuyerIdentity {
            email: Some("   ".to_string()),
            ..BuyerIdentity::default()
        });
        assert_eq!(empty.validate(), Err(ValidationError::EmptyBuyerIdentity));

        let country = CartAction::UpdateBuyerIdentity(BuyerIdentity {
            country_code: Some("ca".to_string()),
            ..BuyerIdentity::default()
        });
        assert_eq!(
            country.validate(),
            Ok(CartAction::UpdateBuyerIdentity(BuyerIdentity {
                country_code: Some("CA".to_string()),
                ..BuyerIdentity::default()
            }))
        );
    }

    #[test]
    fn test_line_targets_only_for_line_edits() {
        let update = CartAction::UpdateLines(vec![LineUpdate {
            id: CartLineId::new("L1"),
            quantity: 2,
        }]);
        assert_eq!(
            update.line_targets(),
            vec![LineTarget::Line(CartLineId::new("L1"))]
        );
        assert!(CartAction::AddLines(vec![add("V1", 1)]).line_targets().is_empty());
        assert!(ActionKind::RemoveLines.edits_lines());
        assert!(!ActionKind::AddLines.edits_lines());
    }

    #[test]
    fn test_to_mutation_shapes() {
        let mutation = CartAction::AddLines(vec![add("V1", 3)]).to_mutation();
        assert_eq!(
            mutation,
            CartMutation::AddLines(vec![CartLineInput {
                merchandise_id: VariantId::new("V1"),
                quantity: 3,
            }])
        );
    }

    #[test]
    fn test_gift_card_codes_are_masked_outside_the_queue() {
        let action = CartAction::UpdateGiftCardCodes(vec!["GIFT-SECRET-9876".to_string()]);

        let debug = format!("{action:?}");
        assert!(!debug.contains("GIFT-SECRET"), "{debug}");
        assert!(debug.contains("****9876"), "{debug}");
        assert!(!format!("{:?}", action.to_mutation()).contains("GIFT-SECRET"));

        assert_eq!(
            action.redacted(),
            CartAction::UpdateGiftCardCodes(vec!["****9876".to_string()])
        );
        let discount = CartAction::UpdateDiscountCodes(vec!["SUMMER10".to_string()]);
        assert_eq!(discount.redacted(), discount);
    }

    #[test]
    fn test_clamp_quantity() {
        assert_eq!(clamp_quantity(-5), 0);
        assert_eq!(clamp_quantity(7), 7);
        assert_eq!(clamp_quantity(i64::MAX), MAX_LINE_QUANTITY);
    }
}
