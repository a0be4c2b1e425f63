//! [`CartBackend`] implementation backed by the Storefront API.

use async_trait::async_trait;
use naked_pineapple_cart::backend::{
    CartBackend, CartCreateInput, CartLineInput, CartLineUpdateInput, MutationOutcome,
};
use naked_pineapple_cart::error::BackendError;
use naked_pineapple_cart::model::BuyerIdentity;
use naked_pineapple_core::{CartId, CartLineId};

use super::StorefrontClient;
use crate::shopify::ShopifyError;

fn log_failure(operation: &str, err: ShopifyError) -> BackendError {
    tracing::error!(operation, error = %err, "Shopify cart mutation failed");
    BackendError::from(err)
}

#[async_trait]
impl CartBackend for StorefrontClient {
    async fn create_cart(&self, input: CartCreateInput) -> Result<MutationOutcome, BackendError> {
        Self::create_cart(self, &input)
            .await
            .map_err(|e| log_failure("cartCreate", e))
    }

    async fn add_lines(
        &self,
        cart_id: &CartId,
        lines: &[CartLineInput],
    ) -> Result<MutationOutcome, BackendError> {
        self.add_to_cart(cart_id, lines)
            .await
            .map_err(|e| log_failure("cartLinesAdd", e))
    }

    async fn update_lines(
        &self,
        cart_id: &CartId,
        lines: &[CartLineUpdateInput],
    ) -> Result<MutationOutcome, BackendError> {
        self.update_cart(cart_id, lines)
            .await
            .map_err(|e| log_failure("cartLinesUpdate", e))
    }

    async fn remove_lines(
        &self,
        cart_id: &CartId,
        line_ids: &[CartLineId],
    ) -> Result<MutationOutcome, BackendError> {
        self.remove_from_cart(cart_id, line_ids)
            .await
            .map_err(|e| log_failure("cartLinesRemove", e))
    }

    async fn update_discount_codes(
        &self,
        cart_id: &CartId,
        codes: &[String],
    ) -> Result<MutationOutcome, BackendError> {
        Self::update_discount_codes(self, cart_id, codes)
            .await
            .map_err(|e| log_failure("cartDiscountCodesUpdate", e))
    }

    async fn update_gift_card_codes(
        &self,
        cart_id: &CartId,
        codes: &[String],
    ) -> Result<MutationOutcome, BackendError> {
        Self::update_gift_card_codes(self, cart_id, codes)
            .await
            .map_err(|e| log_failure("cartGiftCardCodesUpdate", e))
    }

    async fn update_buyer_identity(
        &self,
        cart_id: &CartId,
        identity: &BuyerIdentity,
    ) -> Result<MutationOutcome, BackendError> {
        Self::update_buyer_identity(self, cart_id, identity)
            .await
            .map_err(|e| log_failure("cartBuyerIdentityUpdate", e))
    }
}
