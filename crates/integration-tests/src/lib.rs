//! Integration tests for Naked Pineapple.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p naked-pineapple-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_reconciliation` - Controller against an in-memory shop
//! - `cart_properties` - Property tests for the projector and cart state
//!
//! # Test Support
//!
//! [`FakeShop`] is an in-memory [`CartBackend`] that behaves like the
//! Storefront API: it merges lines by variant, prices them from a catalog,
//! applies the `SAVE10` discount, and reports user errors for unknown
//! variants and lines. Calls can be held back or made to fail to exercise
//! out-of-order responses and rollbacks.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use naked_pineapple_cart::backend::{
    CartBackend, CartCreateInput, CartLineInput, CartLineUpdateInput, MutationOutcome,
};
use naked_pineapple_cart::error::{BackendError, CartUserError};
use naked_pineapple_cart::model::{
    AppliedGiftCard, BuyerIdentity, Cart, CartCost, CartLine, CostAmount, DiscountCode, LineCost,
    Merchandise, SelectedOption,
};
use naked_pineapple_core::{CartId, CartLineId, CurrencyCode, Money, VariantId};
use rust_decimal::Decimal;
use tokio::sync::oneshot;

/// Discount code the fake shop accepts (10% off the cart).
pub const SAVE10: &str = "SAVE10";

/// Cart ID assigned by the fake shop.
pub const FAKE_CART_ID: &str = "gid://shopify/Cart/fake";

/// A purchasable variant.
#[derive(Debug, Clone)]
pub struct CatalogItem {
    pub price: Money,
    pub title: String,
    pub options: Vec<SelectedOption>,
}

#[derive(Debug, Default)]
struct ShopState {
    cart: Option<Cart>,
    next_line: u32,
}

type Edit<'a> = Box<dyn FnOnce(&mut ShopState, &Catalog) -> Result<(), CartUserError> + Send + 'a>;

#[derive(Debug)]
struct Catalog {
    currency: CurrencyCode,
    items: HashMap<VariantId, CatalogItem>,
}

/// In-memory Storefront API stand-in.
#[derive(Debug)]
pub struct FakeShop {
    catalog: Catalog,
    state: Mutex<ShopState>,
    failures: Mutex<VecDeque<BackendError>>,
    holds: Mutex<VecDeque<oneshot::Receiver<()>>>,
    calls: AtomicUsize,
    creates: AtomicUsize,
}

/// Money in `currency` from minor units.
#[must_use]
pub fn money(cents: i64, currency: CurrencyCode) -> Money {
    Money::new(Decimal::new(cents, 2), currency)
}

/// US dollars from cents.
#[must_use]
pub fn usd(cents: i64) -> Money {
    money(cents, CurrencyCode::USD)
}

fn user_error(field: &str, message: String) -> CartUserError {
    CartUserError {
        code: Some("INVALID".to_string()),
        field: Some(vec![field.to_string()]),
        message,
    }
}

impl FakeShop {
    /// An empty shop selling in `currency`.
    #[must_use]
    pub fn new(currency: CurrencyCode) -> Self {
        Self {
            catalog: Catalog {
                currency,
                items: HashMap::new(),
            },
            state: Mutex::new(ShopState::default()),
            failures: Mutex::new(VecDeque::new()),
            holds: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        }
    }

    /// Add a variant priced at `cents`.
    #[must_use]
    pub fn with_variant(mut self, variant_id: &str, cents: i64) -> Self {
        self.catalog.items.insert(
            VariantId::new(variant_id),
            CatalogItem {
                price: money(cents, self.catalog.currency),
                title: format!("Product {variant_id}"),
                options: Vec::new(),
            },
        );
        self
    }

    /// Start with a cart holding `lines` of `(variant, quantity)`.
    #[must_use]
    pub fn with_cart(self, lines: &[(&str, u32)]) -> Self {
        {
            let mut state = self.state();
            let mut cart = Cart::empty(self.catalog.currency);
            cart.id = Some(CartId::new(FAKE_CART_ID));
            cart.checkout_url = Some("https://shop.example/cart/c/fake".to_string());
            state.cart = Some(cart);
            for (variant, quantity) in lines {
                let _ = add_line(&mut state, &self.catalog, &VariantId::new(*variant), *quantity);
            }
            if let Some(cart) = state.cart.as_mut() {
                recompute(cart, self.catalog.currency);
            }
        }
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ShopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The shop's current cart.
    #[must_use]
    pub fn cart(&self) -> Option<Cart> {
        self.state().cart.clone()
    }

    /// The shop's current cart, or an empty one if none was created.
    #[must_use]
    pub fn cart_or_empty(&self) -> Cart {
        self.cart().unwrap_or(Cart::empty(self.catalog.currency))
    }

    /// ID of the line holding `variant_id`.
    #[must_use]
    pub fn line_id(&self, variant_id: &str) -> Option<CartLineId> {
        self.cart()?
            .lines
            .iter()
            .find(|line| line.merchandise.variant_id.as_str() == variant_id)
            .and_then(|line| line.id.clone())
    }

    /// Make the next call fail with `error` without touching the cart.
    pub fn fail_next(&self, error: BackendError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Hold the next call until the returned sender fires (or is dropped).
    #[must_use]
    pub fn hold_next(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(rx);
        tx
    }

    /// Number of calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of carts created.
    #[must_use]
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    async fn run(&self, cart_id: Option<&CartId>, edit: Edit<'_>) -> Result<MutationOutcome, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let hold = self
            .holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(hold) = hold {
            let _ = hold.await;
        }

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        let mut state = self.state();
        if let Some(cart_id) = cart_id {
            let known = state.cart.as_ref().and_then(|cart| cart.id.as_ref());
            if known != Some(cart_id) {
                return Err(BackendError::NotFound(cart_id.to_string()));
            }
        }

        let before = state.cart.clone();
        if let Err(error) = edit(&mut state, &self.catalog) {
            state.cart = before;
            // Like `cartCreate`, a rejected mutation without a cart returns no cart.
            return match state.cart.clone() {
                Some(cart) => Ok(MutationOutcome {
                    cart,
                    warnings: Vec::new(),
                    user_errors: vec![error],
                }),
                None => Err(BackendError::UserErrors(vec![error])),
            };
        }
        let Some(cart) = state.cart.as_mut() else {
            return Err(BackendError::NotFound("no cart".to_string()));
        };
        recompute(cart, self.catalog.currency);

        Ok(MutationOutcome::ok(cart.clone()))
    }
}

fn add_line(
    state: &mut ShopState,
    catalog: &Catalog,
    variant_id: &VariantId,
    quantity: u32,
) -> Result<(), CartUserError> {
    let item = catalog.items.get(variant_id).ok_or_else(|| {
        user_error(
            "merchandiseId",
            format!("The merchandise with id {variant_id} does not exist."),
        )
    })?;
    state.next_line += 1;
    let next_id = CartLineId::new(format!("gid://shopify/CartLine/{}", state.next_line));
    let Some(cart) = state.cart.as_mut() else {
        return Err(user_error("cartId", "Cart does not exist.".to_string()));
    };

    if let Some(line) = cart
        .lines
        .iter_mut()
        .find(|line| &line.merchandise.variant_id == variant_id)
    {
        line.quantity += quantity;
    } else {
        cart.lines.push(CartLine {
            id: Some(next_id),
            merchandise: Merchandise {
                variant_id: variant_id.clone(),
                product_handle: variant_id.as_str().to_lowercase(),
                title: item.title.clone(),
                selected_options: item.options.clone(),
            },
            quantity,
            cost: LineCost::at_unit_price(item.price, quantity),
            is_optimistic: false,
            price_known: true,
        });
    }
    Ok(())
}

fn recompute(cart: &mut Cart, currency: CurrencyCode) {
    let zero = Money::zero(currency);
    let mut subtotal = zero;
    for line in &mut cart.lines {
        line.cost = LineCost::at_unit_price(line.cost.amount_per_quantity, line.quantity);
        subtotal = subtotal.checked_add(line.cost.subtotal_amount).unwrap_or(subtotal);
    }
    for code in &mut cart.discount_codes {
        code.applicable = code.code.eq_ignore_ascii_case(SAVE10);
    }
    let discounted = cart.discount_codes.iter().any(|code| code.applicable);
    let total = if discounted {
        Money::new(subtotal.amount * Decimal::new(9, 1), currency)
    } else {
        subtotal
    };
    cart.cost = CartCost {
        subtotal: CostAmount::Known(subtotal),
        total: CostAmount::Known(total),
    };
    let normalized = std::mem::replace(cart, Cart::empty(currency)).normalized();
    *cart = normalized;
}

fn cart_mut(state: &mut ShopState) -> Result<&mut Cart, CartUserError> {
    state
        .cart
        .as_mut()
        .ok_or_else(|| user_error("cartId", "Cart does not exist.".to_string()))
}

#[async_trait]
impl CartBackend for FakeShop {
    async fn create_cart(&self, input: CartCreateInput) -> Result<MutationOutcome, BackendError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.run(
            None,
            Box::new(move |state: &mut ShopState, catalog: &Catalog| {
                let mut cart = Cart::empty(catalog.currency);
                cart.id = Some(CartId::new(FAKE_CART_ID));
                cart.checkout_url = Some("https://shop.example/cart/c/fake".to_string());
                cart.discount_codes = input
                    .discount_codes
                    .iter()
                    .map(|code| DiscountCode {
                        code: code.clone(),
                        applicable: false,
                    })
                    .collect();
                cart.gift_cards = input
                    .gift_card_codes
                    .iter()
                    .map(|code| AppliedGiftCard::masked(code))
                    .collect();
                cart.buyer_identity = input.buyer_identity.clone();
                state.cart = Some(cart);
                for line in &input.lines {
                    add_line(state, catalog, &line.merchandise_id, line.quantity)?;
                }
                Ok(())
            }),
        )
        .await
    }

    async fn add_lines(
        &self,
        cart_id: &CartId,
        lines: &[CartLineInput],
    ) -> Result<MutationOutcome, BackendError> {
        self.run(
            Some(cart_id),
            Box::new(move |state: &mut ShopState, catalog: &Catalog| {
                for line in lines {
                    add_line(state, catalog, &line.merchandise_id, line.quantity)?;
                }
                Ok(())
            }),
        )
        .await
    }

    async fn update_lines(
        &self,
        cart_id: &CartId,
        lines: &[CartLineUpdateInput],
    ) -> Result<MutationOutcome, BackendError> {
        self.run(
            Some(cart_id),
            Box::new(move |state: &mut ShopState, _: &Catalog| {
                let cart = cart_mut(state)?;
                for update in lines {
                    let line = cart
                        .lines
                        .iter_mut()
                        .find(|line| line.id.as_ref() == Some(&update.id))
                        .ok_or_else(|| {
                            user_error("lines", format!("The line with id {} does not exist.", update.id))
                        })?;
                    line.quantity = update.quantity;
                }
                cart.lines.retain(|line| line.quantity > 0);
                Ok(())
            }),
        )
        .await
    }

    async fn remove_lines(
        &self,
        cart_id: &CartId,
        line_ids: &[CartLineId],
    ) -> Result<MutationOutcome, BackendError> {
        self.run(
            Some(cart_id),
            Box::new(move |state: &mut ShopState, _: &Catalog| {
                let cart = cart_mut(state)?;
                for id in line_ids {
                    if !cart.lines.iter().any(|line| line.id.as_ref() == Some(id)) {
                        return Err(user_error(
                            "lineIds",
                            format!("The line with id {id} does not exist."),
                        ));
                    }
                }
                cart.lines
                    .retain(|line| line.id.as_ref().is_none_or(|id| !line_ids.contains(id)));
                Ok(())
            }),
        )
        .await
    }

    async fn update_discount_codes(
        &self,
        cart_id: &CartId,
        codes: &[String],
    ) -> Result<MutationOutcome, BackendError> {
        self.run(
            Some(cart_id),
            Box::new(move |state: &mut ShopState, _: &Catalog| {
                let cart = cart_mut(state)?;
                cart.discount_codes = codes
                    .iter()
                    .map(|code| DiscountCode {
                        code: code.clone(),
                        applicable: false,
                    })
                    .collect();
                Ok(())
            }),
        )
        .await
    }

    async fn update_gift_card_codes(
        &self,
        cart_id: &CartId,
        codes: &[String],
    ) -> Result<MutationOutcome, BackendError> {
        self.run(
            Some(cart_id),
            Box::new(move |state: &mut ShopState, _: &Catalog| {
                let cart = cart_mut(state)?;
                cart.gift_cards = codes.iter().map(|code| AppliedGiftCard::masked(code)).collect();
                Ok(())
            }),
        )
        .await
    }

    async fn update_buyer_identity(
        &self,
        cart_id: &CartId,
        identity: &BuyerIdentity,
    ) -> Result<MutationOutcome, BackendError> {
        self.run(
            Some(cart_id),
            Box::new(move |state: &mut ShopState, _: &Catalog| {
                let cart = cart_mut(state)?;
                let mut merged = cart.buyer_identity.clone().unwrap_or_default();
                if identity.email.is_some() {
                    merged.email.clone_from(&identity.email);
                }
                if identity.phone.is_some() {
                    merged.phone.clone_from(&identity.phone);
                }
                if identity.country_code.is_some() {
                    merged.country_code.clone_from(&identity.country_code);
                }
                cart.buyer_identity = Some(merged);
                Ok(())
            }),
        )
        .await
    }
}
