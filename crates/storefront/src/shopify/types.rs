//! Storefront API wire types.
//!
//! These mirror the GraphQL selections in
//! [`queries`](super::storefront::queries) field for field. They are
//! converted to `naked_pineapple_cart::model` types before leaving this crate.

use serde::{Deserialize, Serialize};

use super::storefront::scalars::{Decimal, ID, URL};

// =============================================================================
// Common
// =============================================================================

/// Monetary amount as returned by Shopify (`MoneyV2`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyV2 {
    /// Decimal amount as a string.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: String,
}

/// Relay-style connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    /// Edges of the connection.
    pub edges: Vec<Edge<T>>,
    /// Paging state. Absent when the selection did not ask for it.
    #[serde(default)]
    pub page_info: PageInfo,
}

/// Relay-style page info.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// More edges exist past this page.
    pub has_next_page: bool,
}

/// Relay-style edge.
#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    /// The node.
    pub node: T,
}

// =============================================================================
// Cart
// =============================================================================

/// The `CartFields` fragment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartFields {
    pub id: ID,
    pub checkout_url: URL,
    pub note: Option<String>,
    pub total_quantity: i64,
    pub buyer_identity: Option<BuyerIdentityFields>,
    pub cost: CartCostFields,
    #[serde(default)]
    pub discount_codes: Vec<DiscountCodeFields>,
    #[serde(default)]
    pub applied_gift_cards: Vec<AppliedGiftCardFields>,
    pub lines: Connection<CartLineFields>,
}

/// Cart-level cost.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartCostFields {
    pub subtotal_amount: MoneyV2,
    pub total_amount: MoneyV2,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerIdentityFields {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscountCodeFields {
    pub code: String,
    pub applicable: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedGiftCardFields {
    pub last_characters: String,
}

/// A cart line (`BaseCartLine`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineFields {
    pub id: ID,
    pub quantity: i64,
    pub cost: CartLineCostFields,
    pub merchandise: MerchandiseFields,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineCostFields {
    pub amount_per_quantity: MoneyV2,
    pub compare_at_amount_per_quantity: Option<MoneyV2>,
    pub subtotal_amount: MoneyV2,
    pub total_amount: MoneyV2,
}

/// Product variant selected on a line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchandiseFields {
    pub id: ID,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selected_options: Vec<SelectedOptionFields>,
    pub product: Option<ProductRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectedOptionFields {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductRef {
    pub handle: String,
    #[serde(default)]
    pub title: String,
}

// =============================================================================
// Mutation payloads
// =============================================================================

/// Common shape of every cart mutation payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartPayload {
    pub cart: Option<CartFields>,
    #[serde(default)]
    pub user_errors: Vec<UserErrorFields>,
    #[serde(default)]
    pub warnings: Vec<WarningFields>,
}

/// `CartUserError`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserErrorFields {
    pub code: Option<String>,
    pub field: Option<Vec<String>>,
    pub message: String,
}

/// `CartWarning`.
#[derive(Debug, Clone, Deserialize)]
pub struct WarningFields {
    pub code: String,
    pub message: String,
}

// =============================================================================
// Inputs
// =============================================================================

/// `CartLineInput`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineInput {
    pub merchandise_id: ID,
    pub quantity: i64,
}

/// `CartLineUpdateInput`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineUpdateInput {
    pub id: ID,
    pub quantity: i64,
}

/// `CartBuyerIdentityInput`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartBuyerIdentityInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

/// `CartInput` for `cartCreate`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartInput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<CartLineInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub discount_codes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gift_card_codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_identity: Option<CartBuyerIdentityInput>,
}
