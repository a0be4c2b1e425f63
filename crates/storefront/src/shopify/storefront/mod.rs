//! Shopify Storefront API client implementation.
//!
//! Uses hand-declared `graphql_client` operations with `reqwest` 0.13 for
//! HTTP. Every cart mutation selects the full cart so responses can replace
//! the confirmed cart wholesale.

mod backend;
mod conversions;
pub mod queries;
pub mod scalars;

use std::sync::Arc;

use graphql_client::{GraphQLQuery, Response};
use naked_pineapple_cart::backend::{
    CartCreateInput, CartLineInput, CartLineUpdateInput, MutationOutcome,
};
use naked_pineapple_cart::model::{BuyerIdentity, Cart};
use naked_pineapple_core::{CartId, CartLineId};
use secrecy::ExposeSecret;
use tracing::{debug, instrument};

use crate::config::ShopifyStorefrontConfig;
use crate::shopify::ShopifyError;
use crate::shopify::types;

use conversions::{convert_cart, convert_outcome};
use queries::{
    AddCartLines, AddLinesVariables, BuyerIdentityVariables, CartIdVariables, CreateCart,
    CreateCartVariables, DiscountCodesVariables, GetCart, GiftCardCodesVariables, MutationData,
    RemoveCartLines, RemoveLinesVariables, UpdateCartBuyerIdentity, UpdateCartDiscountCodes,
    UpdateCartGiftCardCodes, UpdateCartLines, UpdateLinesVariables,
};

// =============================================================================
// StorefrontClient
// =============================================================================

/// Client for the Shopify Storefront API cart.
#[derive(Clone)]
pub struct StorefrontClient {
    inner: Arc<StorefrontClientInner>,
}

struct StorefrontClientInner {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

impl std::fmt::Debug for StorefrontClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontClient")
            .field("endpoint", &self.inner.endpoint)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontClient {
    /// Create a new Storefront API client.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &ShopifyStorefrontConfig) -> Result<Self, ShopifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let endpoint = format!(
            "https://{}/api/{}/graphql.json",
            config.store, config.api_version
        );

        Ok(Self {
            inner: Arc::new(StorefrontClientInner {
                client,
                endpoint,
                access_token: config.storefront_private_token.expose_secret().to_string(),
            }),
        })
    }

    /// The GraphQL endpoint this client posts to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Execute a GraphQL operation.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, ShopifyError> {
        let request_body = Q::build_query(variables);

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            // Private access tokens use a different header than public tokens
            .header(
                "Shopify-Storefront-Private-Token",
                &self.inner.access_token,
            )
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                operation = request_body.operation_name,
                body = %response_text.chars().take(500).collect::<String>(),
                "Shopify API returned non-success status"
            );
            return Err(ShopifyError::GraphQL(vec![super::GraphQLError {
                message: format!(
                    "HTTP {status}: {}",
                    response_text.chars().take(200).collect::<String>()
                ),
                locations: vec![],
                path: vec![],
            }]));
        }

        parse_response::<Q::ResponseData>(&response_text, request_body.operation_name)
    }

    /// Run a cart mutation and convert its payload.
    async fn mutate<Q>(
        &self,
        variables: Q::Variables,
        operation: &str,
    ) -> Result<MutationOutcome, ShopifyError>
    where
        Q: GraphQLQuery,
        Q::ResponseData: MutationData,
    {
        let data = self.execute::<Q>(variables).await?;
        let payload = data.into_payload().ok_or_else(|| {
            ShopifyError::NotFound(format!("{operation} returned no payload"))
        })?;
        let outcome = convert_outcome(payload, operation)?;
        if !outcome.user_errors.is_empty() {
            debug!(
                operation,
                errors = outcome.user_errors.len(),
                "Cart mutation returned user errors"
            );
        }
        Ok(outcome)
    }

    // =========================================================================
    // Cart Methods
    // =========================================================================

    /// Get an existing cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart is not found or the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn get_cart(&self, cart_id: &CartId) -> Result<Cart, ShopifyError> {
        let variables = CartIdVariables {
            cart_id: cart_id.to_string(),
        };

        let data = self.execute::<GetCart>(variables).await?;

        data.cart
            .map(convert_cart)
            .transpose()?
            .ok_or_else(|| ShopifyError::NotFound(format!("Cart not found: {cart_id}")))
    }

    /// Create a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or Shopify rejects the input
    /// without returning a cart.
    #[instrument(skip(self, input), fields(lines = input.lines.len()))]
    pub async fn create_cart(&self, input: &CartCreateInput) -> Result<MutationOutcome, ShopifyError> {
        let variables = CreateCartVariables {
            input: types::CartInput {
                lines: input.lines.iter().map(line_input).collect(),
                discount_codes: input.discount_codes.clone(),
                gift_card_codes: input.gift_card_codes.clone(),
                buyer_identity: input.buyer_identity.as_ref().map(buyer_identity_input),
            },
        };

        self.mutate::<CreateCart>(variables, "cartCreate").await
    }

    /// Add lines to a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, lines), fields(cart_id = %cart_id, lines = lines.len()))]
    pub async fn add_to_cart(
        &self,
        cart_id: &CartId,
        lines: &[CartLineInput],
    ) -> Result<MutationOutcome, ShopifyError> {
        let variables = AddLinesVariables {
            cart_id: cart_id.to_string(),
            lines: lines.iter().map(line_input).collect(),
        };

        self.mutate::<AddCartLines>(variables, "cartLinesAdd").await
    }

    /// Update cart line quantities.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, lines), fields(cart_id = %cart_id, lines = lines.len()))]
    pub async fn update_cart(
        &self,
        cart_id: &CartId,
        lines: &[CartLineUpdateInput],
    ) -> Result<MutationOutcome, ShopifyError> {
        let variables = UpdateLinesVariables {
            cart_id: cart_id.to_string(),
            lines: lines
                .iter()
                .map(|line| types::CartLineUpdateInput {
                    id: line.id.to_string(),
                    quantity: i64::from(line.quantity),
                })
                .collect(),
        };

        self.mutate::<UpdateCartLines>(variables, "cartLinesUpdate")
            .await
    }

    /// Remove lines from a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, line_ids), fields(cart_id = %cart_id, lines = line_ids.len()))]
    pub async fn remove_from_cart(
        &self,
        cart_id: &CartId,
        line_ids: &[CartLineId],
    ) -> Result<MutationOutcome, ShopifyError> {
        let variables = RemoveLinesVariables {
            cart_id: cart_id.to_string(),
            line_ids: line_ids.iter().map(ToString::to_string).collect(),
        };

        self.mutate::<RemoveCartLines>(variables, "cartLinesRemove")
            .await
    }

    /// Replace the discount codes on a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, discount_codes), fields(cart_id = %cart_id))]
    pub async fn update_discount_codes(
        &self,
        cart_id: &CartId,
        discount_codes: &[String],
    ) -> Result<MutationOutcome, ShopifyError> {
        let variables = DiscountCodesVariables {
            cart_id: cart_id.to_string(),
            discount_codes: discount_codes.to_vec(),
        };

        self.mutate::<UpdateCartDiscountCodes>(variables, "cartDiscountCodesUpdate")
            .await
    }

    /// Replace the gift card codes on a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, gift_card_codes), fields(cart_id = %cart_id))]
    pub async fn update_gift_card_codes(
        &self,
        cart_id: &CartId,
        gift_card_codes: &[String],
    ) -> Result<MutationOutcome, ShopifyError> {
        let variables = GiftCardCodesVariables {
            cart_id: cart_id.to_string(),
            gift_card_codes: gift_card_codes.to_vec(),
        };

        self.mutate::<UpdateCartGiftCardCodes>(variables, "cartGiftCardCodesUpdate")
            .await
    }

    /// Update the buyer identity on a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, identity), fields(cart_id = %cart_id))]
    pub async fn update_buyer_identity(
        &self,
        cart_id: &CartId,
        identity: &BuyerIdentity,
    ) -> Result<MutationOutcome, ShopifyError> {
        let variables = BuyerIdentityVariables {
            cart_id: cart_id.to_string(),
            buyer_identity: buyer_identity_input(identity),
        };

        self.mutate::<UpdateCartBuyerIdentity>(variables, "cartBuyerIdentityUpdate")
            .await
    }
}

fn line_input(line: &CartLineInput) -> types::CartLineInput {
    types::CartLineInput {
        merchandise_id: line.merchandise_id.to_string(),
        quantity: i64::from(line.quantity),
    }
}

fn buyer_identity_input(identity: &BuyerIdentity) -> types::CartBuyerIdentityInput {
    types::CartBuyerIdentityInput {
        email: identity.email.clone(),
        phone: identity.phone.clone(),
        country_code: identity.country_code.clone(),
    }
}

/// Parse a GraphQL response body, surfacing GraphQL errors.
fn parse_response<T>(body: &str, operation: &str) -> Result<T, ShopifyError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let response: Response<T> = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(
                error = %e,
                operation,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse Shopify GraphQL response"
            );
            return Err(ShopifyError::Parse(e));
        }
    };

    if let Some(errors) = response.errors
        && !errors.is_empty()
    {
        debug!(errors = ?errors, operation, "GraphQL errors in response");

        return Err(ShopifyError::GraphQL(
            errors
                .into_iter()
                .map(|e| super::GraphQLError {
                    message: e.message,
                    locations: e.locations.map_or_else(Vec::new, |locs| {
                        locs.into_iter()
                            .map(|l| super::GraphQLErrorLocation {
                                line: i64::from(l.line),
                                column: i64::from(l.column),
                            })
                            .collect()
                    }),
                    path: e.path.map_or_else(Vec::new, |p| {
                        p.into_iter()
                            .map(|fragment| match fragment {
                                graphql_client::PathFragment::Key(s) => {
                                    serde_json::Value::String(s)
                                }
                                graphql_client::PathFragment::Index(i) => {
                                    serde_json::Value::Number(i.into())
                                }
                            })
                            .collect()
                    }),
                })
                .collect(),
        ));
    }

    response.data.ok_or_else(|| {
        tracing::error!(
            operation,
            body = %body.chars().take(500).collect::<String>(),
            "Shopify GraphQL response has no data and no errors"
        );
        ShopifyError::GraphQL(vec![super::GraphQLError {
            message: "No data in response".to_string(),
            locations: vec![],
            path: vec![],
        }])
    })
}
