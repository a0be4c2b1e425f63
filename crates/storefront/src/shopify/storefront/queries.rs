//! GraphQL operations for the Shopify Storefront API cart.
//!
//! Each operation implements [`GraphQLQuery`] by hand: the documents are
//! static and every mutation selects the same `CartFields` fragment, so the
//! response types are shared rather than generated per query.

use graphql_client::{GraphQLQuery, QueryBody};
use serde::{Deserialize, Serialize};

use super::scalars::ID;
use crate::shopify::types::{
    CartBuyerIdentityInput, CartFields, CartInput, CartLineInput, CartLineUpdateInput,
    CartPayload,
};

macro_rules! cart_fragment {
    () => {
        r"
fragment CartFields on Cart {
  id
  checkoutUrl
  note
  totalQuantity
  buyerIdentity { email phone countryCode }
  cost {
    subtotalAmount { amount currencyCode }
    totalAmount { amount currencyCode }
  }
  discountCodes { code applicable }
  appliedGiftCards { lastCharacters }
  lines(first: 250) {
    pageInfo { hasNextPage }
    edges {
      node {
        id
        quantity
        cost {
          amountPerQuantity { amount currencyCode }
          compareAtAmountPerQuantity { amount currencyCode }
          subtotalAmount { amount currencyCode }
          totalAmount { amount currencyCode }
        }
        merchandise {
          ... on ProductVariant {
            id
            title
            selectedOptions { name value }
            product { handle title }
          }
        }
      }
    }
  }
}
"
    };
}

macro_rules! payload_fields {
    () => {
        r"
    cart { ...CartFields }
    userErrors { code field message }
    warnings { code message }
"
    };
}

/// Declare an operation type and its [`GraphQLQuery`] impl.
macro_rules! operation {
    ($name:ident, $operation_name:literal, $vars:ty, $data:ty, $query:expr) => {
        pub struct $name;

        impl GraphQLQuery for $name {
            type Variables = $vars;
            type ResponseData = $data;

            fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
                QueryBody {
                    variables,
                    query: $query,
                    operation_name: $operation_name,
                }
            }
        }
    };
}

// =============================================================================
// Variables
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartIdVariables {
    pub cart_id: ID,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCartVariables {
    pub input: CartInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLinesVariables {
    pub cart_id: ID,
    pub lines: Vec<CartLineInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLinesVariables {
    pub cart_id: ID,
    pub lines: Vec<CartLineUpdateInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveLinesVariables {
    pub cart_id: ID,
    pub line_ids: Vec<ID>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCodesVariables {
    pub cart_id: ID,
    pub discount_codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftCardCodesVariables {
    pub cart_id: ID,
    pub gift_card_codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerIdentityVariables {
    pub cart_id: ID,
    pub buyer_identity: CartBuyerIdentityInput,
}

// =============================================================================
// Response data
// =============================================================================

/// Response data of a mutation, holding its payload under the mutation name.
pub trait MutationData {
    /// The mutation payload, if the field resolved.
    fn into_payload(self) -> Option<CartPayload>;
}

macro_rules! mutation_data {
    ($name:ident, $field:ident) => {
        #[derive(Debug, Clone, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            pub $field: Option<CartPayload>,
        }

        impl MutationData for $name {
            fn into_payload(self) -> Option<CartPayload> {
                self.$field
            }
        }
    };
}

mutation_data!(CartCreateData, cart_create);
mutation_data!(CartLinesAddData, cart_lines_add);
mutation_data!(CartLinesUpdateData, cart_lines_update);
mutation_data!(CartLinesRemoveData, cart_lines_remove);
mutation_data!(CartDiscountCodesUpdateData, cart_discount_codes_update);
mutation_data!(CartGiftCardCodesUpdateData, cart_gift_card_codes_update);
mutation_data!(CartBuyerIdentityUpdateData, cart_buyer_identity_update);

#[derive(Debug, Clone, Deserialize)]
pub struct GetCartData {
    pub cart: Option<CartFields>,
}

// =============================================================================
// Operations
// =============================================================================

operation!(
    GetCart,
    "GetCart",
    CartIdVariables,
    GetCartData,
    concat!(
        "query GetCart($cartId: ID!) {\n  cart(id: $cartId) { ...CartFields }\n}\n",
        cart_fragment!()
    )
);

operation!(
    CreateCart,
    "CreateCart",
    CreateCartVariables,
    CartCreateData,
    concat!(
        "mutation CreateCart($input: CartInput!) {\n  cartCreate(input: $input) {",
        payload_fields!(),
        "  }\n}\n",
        cart_fragment!()
    )
);

operation!(
    AddCartLines,
    "AddCartLines",
    AddLinesVariables,
    CartLinesAddData,
    concat!(
        "mutation AddCartLines($cartId: ID!, $lines: [CartLineInput!]!) {\n",
        "  cartLinesAdd(cartId: $cartId, lines: $lines) {",
        payload_fields!(),
        "  }\n}\n",
        cart_fragment!()
    )
);

operation!(
    UpdateCartLines,
    "UpdateCartLines",
    UpdateLinesVariables,
    CartLinesUpdateData,
    concat!(
        "mutation UpdateCartLines($cartId: ID!, $lines: [CartLineUpdateInput!]!) {\n",
        "  cartLinesUpdate(cartId: $cartId, lines: $lines) {",
        payload_fields!(),
        "  }\n}\n",
        cart_fragment!()
    )
);

operation!(
    RemoveCartLines,
    "RemoveCartLines",
    RemoveLinesVariables,
    CartLinesRemoveData,
    concat!(
        "mutation RemoveCartLines($cartId: ID!, $lineIds: [ID!]!) {\n",
        "  cartLinesRemove(cartId: $cartId, lineIds: $lineIds) {",
        payload_fields!(),
        "  }\n}\n",
        cart_fragment!()
    )
);

operation!(
    UpdateCartDiscountCodes,
    "UpdateCartDiscountCodes",
    DiscountCodesVariables,
    CartDiscountCodesUpdateData,
    concat!(
        "mutation UpdateCartDiscountCodes($cartId: ID!, $discountCodes: [String!]!) {\n",
        "  cartDiscountCodesUpdate(cartId: $cartId, discountCodes: $discountCodes) {",
        payload_fields!(),
        "  }\n}\n",
        cart_fragment!()
    )
);

operation!(
    UpdateCartGiftCardCodes,
    "UpdateCartGiftCardCodes",
    GiftCardCodesVariables,
    CartGiftCardCodesUpdateData,
    concat!(
        "mutation UpdateCartGiftCardCodes($cartId: ID!, $giftCardCodes: [String!]!) {\n",
        "  cartGiftCardCodesUpdate(cartId: $cartId, giftCardCodes: $giftCardCodes) {",
        payload_fields!(),
        "  }\n}\n",
        cart_fragment!()
    )
);

operation!(
    UpdateCartBuyerIdentity,
    "UpdateCartBuyerIdentity",
    BuyerIdentityVariables,
    CartBuyerIdentityUpdateData,
    concat!(
        "mutation UpdateCartBuyerIdentity($cartId: ID!, $buyerIdentity: CartBuyerIdentityInput!) {\n",
        "  cartBuyerIdentityUpdate(cartId: $cartId, buyerIdentity: $buyerIdentity) {",
        payload_fields!(),
        "  }\n}\n",
        cart_fragment!()
    )
);
