//! Contract with the commerce backend.
//!
//! Every mutation returns the full authoritative cart. There is no
//! field-level merge on success: the controller replaces its confirmed cart
//! with whatever the backend returned.

use std::fmt;

use async_trait::async_trait;
use naked_pineapple_core::{CartId, CartLineId, VariantId};
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, CartUserError, CartWarning};
use crate::model::{AppliedGiftCard, BuyerIdentity, Cart};

/// Input for adding a line to cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineInput {
    /// Product variant ID.
    pub merchandise_id: VariantId,
    /// Quantity to add.
    pub quantity: u32,
}

/// Input for updating a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineUpdateInput {
    /// Cart line ID.
    pub id: CartLineId,
    /// New quantity. Zero removes the line.
    pub quantity: u32,
}

/// A backend mutation request, one variant per mutation kind.
///
/// `Debug` output masks gift card codes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "input", rename_all = "snake_case")]
pub enum CartMutation {
    AddLines(Vec<CartLineInput>),
    UpdateLines(Vec<CartLineUpdateInput>),
    RemoveLines(Vec<CartLineId>),
    UpdateDiscountCodes(Vec<String>),
    UpdateGiftCardCodes(Vec<String>),
    UpdateBuyerIdentity(BuyerIdentity),
}

impl fmt::Debug for CartMutation {
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

impl CartMutation {
    /// Send this mutation to `backend`.
    ///
    /// When `cart_id` is `None` the cart is created with this mutation's
    /// input instead.
    ///
    /// # Errors
    ///
    /// Returns whatever the backend call returns, or
    /// [`BackendError::NotFound`] for a line edit against a cart that does
    /// not exist yet.
    pub async fn dispatch(
        &self,
        backend: &dyn CartBackend,
        cart_id: Option<&CartId>,
    ) -> Result<MutationOutcome, BackendError> {
        let Some(cart_id) = cart_id else {
            if matches!(self, Self::UpdateLines(_) | Self::RemoveLines(_)) {
                return Err(BackendError::NotFound(
                    "cart has not been created yet".to_string(),
                ));
            }
            return backend.create_cart(CartCreateInput::from(self)).await;
        };

        match self {
            Self::AddLines(lines) => backend.add_lines(cart_id, lines).await,
            Self::UpdateLines(lines) => backend.update_lines(cart_id, lines).await,
            Self::RemoveLines(ids) => backend.remove_lines(cart_id, ids).await,
            Self::UpdateDiscountCodes(codes) => {
                backend.update_discount_codes(cart_id, codes).await
            }
            Self::UpdateGiftCardCodes(codes) => {
                backend.update_gift_card_codes(cart_id, codes).await
            }
            Self::UpdateBuyerIdentity(identity) => {
                backend.update_buyer_identity(cart_id, identity).await
            }
        }
    }
}

/// Input for creating a cart, built from the first mutation submitted.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCreateInput {
    /// Initial lines.
    pub lines: Vec<CartLineInput>,
    /// Initial discount codes.
    pub discount_codes: Vec<String>,
    /// Initial gift card codes.
    pub gift_card_codes: Vec<String>,
    /// Initial buyer identity.
    pub buyer_identity: Option<BuyerIdentity>,
}

impl fmt::Debug for CartCreateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartCreateInput")
            .field("lines", &self.lines)
            .field("discount_codes", &self.discount_codes)
            .field(
                "gift_card_codes",
                &AppliedGiftCard::redact_all(&self.gift_card_codes),
            )
            .field("buyer_identity", &self.buyer_identity)
            .finish()
    }
}

impl From<&CartMutation> for CartCreateInput {
    fn from(mutation: &CartMutation) -> Self {
        match mutation {
            CartMutation::AddLines(lines) => Self {
                lines: lines.clone(),
                ..Self::default()
            },
            CartMutation::UpdateDiscountCodes(codes) => Self {
                discount_codes: codes.clone(),
                ..Self::default()
            },
            CartMutation::UpdateGiftCardCodes(codes) => Self {
                gift_card_codes: codes.clone(),
                ..Self::default()
            },
            CartMutation::UpdateBuyerIdentity(identity) => Self {
                buyer_identity: Some(identity.clone()),
                ..Self::default()
            },
            // Never sent: `dispatch` refuses line edits without a cart.
            CartMutation::UpdateLines(_) | CartMutation::RemoveLines(_) => Self::default(),
        }
    }
}

/// What the backend returned for a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    /// The authoritative cart after the mutation.
    pub cart: Cart,
    /// Non-fatal warnings (e.g. quantity adjusted to stock).
    #[serde(default)]
    pub warnings: Vec<CartWarning>,
    /// User errors. A non-empty list means the mutation failed.
    #[serde(default)]
    pub user_errors: Vec<CartUserError>,
}

impl MutationOutcome {
    /// A clean outcome with no warnings or errors.
    #[must_use]
    pub const fn ok(cart: Cart) -> Self {
        Self {
            cart,
            warnings: Vec::new(),
            user_errors: Vec::new(),
        }
    }

    /// Turn user errors into a [`BackendError`], keeping the cart otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::UserErrors`] if any user errors were reported.
    pub fn into_result(self) -> Result<(Cart, Vec<CartWarning>), BackendError> {
        if self.user_errors.is_empty() {
            Ok((self.cart, self.warnings))
        } else {
            Err(BackendError::UserErrors(self.user_errors))
        }
    }
}

/// Commerce backend that executes cart mutations.
///
/// Timeouts are the implementor's responsibility; a timed-out call should
/// return [`BackendError::Timeout`].
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Create a cart.
    async fn create_cart(&self, input: CartCreateInput) -> Result<MutationOutcome, BackendError>;

    /// Add lines to a cart.
    async fn add_lines(
        &self,
        cart_id: &CartId,
        lines: &[CartLineInput],
    ) -> Result<MutationOutcome, BackendError>;

    /// Change line quantities.
    async fn update_lines(
        &self,
        cart_id: &CartId,
        lines: &[CartLineUpdateInput],
    ) -> Result<MutationOutcome, BackendError>;

    /// Remove lines.
    async fn remove_lines(
        &self,
        cart_id: &CartId,
        line_ids: &[CartLineId],
    ) -> Result<MutationOutcome, BackendError>;

    /// Replace the discount codes.
    async fn update_discount_codes(
        &self,
        cart_id: &CartId,
        codes: &[String],
    ) -> Result<MutationOutcome, BackendError>;

    /// Replace the gift card codes.
    async fn update_gift_card_codes(
        &self,
        cart_id: &CartId,
        codes: &[String],
    ) -> Result<MutationOutcome, BackendError>;

    /// Update buyer identity.
    async fn update_buyer_identity(
        &self,
        cart_id: &CartId,
        identity: &BuyerIdentity,
    ) -> Result<MutationOutcome, BackendError>;
}

#[cfg(test)]
mod tests {
    use naked_pineapple_core::CurrencyCode;

    use super::*;

    #[test]
    fn test_create_input_from_add() {
        let mutation = CartMutation::AddLines(vec![CartLineInput {
            merchandise_id: VariantId::new("V1"),
            quantity: 2,
        }]);
        let input = CartCreateInput::from(&mutation);
        assert_eq!(input.lines.len(), 1);
        assert!(input.discount_codes.is_empty());
        assert!(input.buyer_identity.is_none());
    }

    #[test]
    fn test_create_input_from_codes() {
        let mutation = CartMutation::UpdateGiftCardCodes(vec!["GIFT-1234".to_string()]);
        let input = CartCreateInput::from(&mutation);
        assert_eq!(input.gift_card_codes, vec!["GIFT-1234".to_string()]);
        assert!(input.lines.is_empty());

        let debug = format!("{input:?} {mutation:?}");
        assert!(!debug.contains("GIFT-1234"), "{debug}");
        assert!(debug.contains("****1234"), "{debug}");
    }

    #[test]
    fn test_outcome_with_user_errors_is_failure() {
        let outcome = MutationOutcome {
            cart: Cart::empty(CurrencyCode::USD),
            warnings: vec![],
            user_errors: vec![CartUserError {
                code: None,
                field: None,
                message: "Variant is sold out".to_string(),
            }],
        };
        assert!(matches!(
            outcome.into_result(),
            Err(BackendError::UserErrors(errors)) if errors.len() == 1
        ));
    }
}
