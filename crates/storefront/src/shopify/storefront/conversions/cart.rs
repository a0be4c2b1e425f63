//! Cart type conversion functions.

use naked_pineapple_cart::backend::MutationOutcome;
use naked_pineapple_cart::error::{CartUserError, CartWarning};
use naked_pineapple_cart::model::{
    AppliedGiftCard, BuyerIdentity, Cart, CartCost, CartLine, CostAmount, DiscountCode, LineCost,
    Merchandise, PendingFlags, SelectedOption,
};
use naked_pineapple_core::{CartId, CartLineId, Money, VariantId};

use crate::shopify::ShopifyError;
use crate::shopify::types::{
    BuyerIdentityFields, CartFields, CartLineFields, CartPayload, MoneyV2, UserErrorFields,
    WarningFields,
};

fn convert_money(money: &MoneyV2) -> Result<Money, ShopifyError> {
    Ok(Money::parse(&money.amount, &money.currency_code)?)
}

fn convert_quantity(quantity: i64, what: &str) -> Result<u32, ShopifyError> {
    u32::try_from(quantity).map_err(|_| {
        ShopifyError::InvalidData(format!("{what} quantity out of range: {quantity}"))
    })
}

/// Convert a `CartFields` fragment into a confirmed cart.
///
/// # Errors
///
/// Returns [`ShopifyError::InvalidData`] if an amount or quantity cannot be
/// represented, or if the cart has more lines than one page returns.
pub fn convert_cart(cart: CartFields) -> Result<Cart, ShopifyError> {
    // Reconciliation replaces the whole cart, so a truncated line list would
    // silently drop lines.
    if cart.lines.page_info.has_next_page {
        return Err(ShopifyError::InvalidData(format!(
            "cart has more than {} lines",
            cart.lines.edges.len()
        )));
    }

    let lines = cart
        .lines
        .edges
        .into_iter()
        .map(|edge| convert_cart_line(edge.node))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Cart {
        id: Some(CartId::new(cart.id)),
        checkout_url: Some(cart.checkout_url),
        note: cart.note.filter(|note| !note.is_empty()),
        lines,
        total_quantity: convert_quantity(cart.total_quantity, "cart")?,
        cost: CartCost {
            subtotal: CostAmount::Known(convert_money(&cart.cost.subtotal_amount)?),
            total: CostAmount::Known(convert_money(&cart.cost.total_amount)?),
        },
        discount_codes: cart
            .discount_codes
            .into_iter()
            .map(|d| DiscountCode {
                code: d.code,
                applicable: d.applicable,
            })
            .collect(),
        gift_cards: cart
            .applied_gift_cards
            .into_iter()
            .map(|g| AppliedGiftCard {
                last_characters: g.last_characters,
            })
            .collect(),
        buyer_identity: cart
            .buyer_identity
            .map(convert_buyer_identity)
            .filter(|identity| !identity.is_empty()),
        pending: PendingFlags::default(),
    })
}

fn convert_buyer_identity(b: BuyerIdentityFields) -> BuyerIdentity {
    BuyerIdentity {
        email: b.email,
        phone: b.phone,
        country_code: b.country_code,
    }
}

fn convert_cart_line(line: CartLineFields) -> Result<CartLine, ShopifyError> {
    let merchandise = line.merchandise;
    let (product_handle, product_title) = merchandise
        .product
        .map(|p| (p.handle, p.title))
        .unwrap_or_default();
    // Default variants are titled "Default Title"; show the product instead.
    let title = if merchandise.title.is_empty() || merchandise.title == "Default Title" {
        product_title
    } else if product_title.is_empty() {
        merchandise.title
    } else {
        format!("{product_title} - {}", merchandise.title)
    };

    Ok(CartLine {
        id: Some(CartLineId::new(line.id)),
        merchandise: Merchandise {
            variant_id: VariantId::new(merchandise.id),
            product_handle,
            title,
            selected_options: merchandise
                .selected_options
                .into_iter()
                .map(|o| SelectedOption::new(o.name, o.value))
                .collect(),
        },
        quantity: convert_quantity(line.quantity, "line")?,
        cost: LineCost {
            amount_per_quantity: convert_money(&line.cost.amount_per_quantity)?,
            compare_at_amount_per_quantity: line
                .cost
                .compare_at_amount_per_quantity
                .as_ref()
                .map(convert_money)
                .transpose()?,
            subtotal_amount: convert_money(&line.cost.subtotal_amount)?,
            total_amount: convert_money(&line.cost.total_amount)?,
        },
        is_optimistic: false,
        price_known: true,
    })
}

/// Convert a user error.
#[must_use]
pub fn convert_user_error(e: UserErrorFields) -> CartUserError {
    CartUserError {
        code: e.code,
        field: e.field,
        message: e.message,
    }
}

/// Convert a warning.
#[must_use]
pub fn convert_warning(w: WarningFields) -> CartWarning {
    CartWarning {
        code: w.code,
        message: w.message,
    }
}

/// Convert a mutation payload into an outcome.
///
/// A payload with user errors but no cart (Shopify returns `cart: null` when
/// a mutation is rejected outright) becomes [`ShopifyError::UserErrors`].
///
/// # Errors
///
/// Returns an error if the payload has no cart, or the cart cannot be
/// converted.
pub fn convert_outcome(
    payload: CartPayload,
    operation: &str,
) -> Result<MutationOutcome, ShopifyError> {
    let user_errors: Vec<CartUserError> = payload
        .user_errors
        .into_iter()
        .map(convert_user_error)
        .collect();

    let Some(cart) = payload.cart else {
        if user_errors.is_empty() {
            return Err(ShopifyError::NotFound(format!("{operation} returned no cart")));
        }
        return Err(ShopifyError::UserErrors(user_errors));
    };

    Ok(MutationOutcome {
        cart: convert_cart(cart)?,
        warnings: payload.warnings.into_iter().map(convert_warning).collect(),
        user_errors,
    })
}
