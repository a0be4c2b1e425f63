//! Integration tests for cart reconciliation.
//!
//! These drive a [`CartController`] against the in-memory [`FakeShop`] and
//! check what the shopper sees before, during, and after each backend call.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use naked_pineapple_cart::{
    ActionHandle, AddLine, BackendError, BuyerIdentity, Cart, CartAction, CartController,
    CartError, CartEvent, CostAmount, LineUpdate, Merchandise,
};
use naked_pineapple_core::{CartLineId, CurrencyCode, VariantId};
use naked_pineapple_integration_tests::{FakeShop, SAVE10, usd};
use tokio::sync::broadcast;
use tokio::time::timeout;

// =============================================================================
// Helpers
// =============================================================================

fn shop() -> FakeShop {
    FakeShop::new(CurrencyCode::USD)
        .with_variant("V1", 1000)
        .with_variant("V2", 2500)
        .with_variant("V3", 399)
}

fn controller(shop: &Arc<FakeShop>) -> CartController {
    CartController::new(shop.clone(), shop.cart_or_empty())
}

fn add(variant: &str, quantity: i64) -> CartAction {
    CartAction::AddLines(vec![AddLine {
        merchandise: Merchandise::variant(VariantId::new(variant)),
        quantity,
        unit_price: None,
    }])
}

fn update(line: &CartLineId, quantity: i64) -> CartAction {
    CartAction::UpdateLines(vec![LineUpdate {
        id: line.clone(),
        quantity,
    }])
}

/// Wait for the event reporting `handle`.
async fn settled(events: &mut broadcast::Receiver<CartEvent>, handle: ActionHandle) -> CartEvent {
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for cart event")
            .expect("cart events closed");
        if event.handle() == handle {
            return event;
        }
    }
}

fn quantity_of(cart: &Cart, variant: &str) -> Option<u32> {
    cart.lines
        .iter()
        .find(|line| line.merchandise.variant_id.as_str() == variant)
        .map(|line| line.quantity)
}

// =============================================================================
// Creation
// =============================================================================

#[tokio::test]
async fn test_first_add_creates_cart() {
    let shop = Arc::new(shop());
    let cart = controller(&shop);

    let confirmed = cart.apply(add("V1", 2)).await.unwrap();

    assert_eq!(shop.creates(), 1);
    assert!(confirmed.id.is_some());
    assert!(confirmed.checkout_url.is_some());
    assert_eq!(quantity_of(&confirmed, "V1"), Some(2));
    assert_eq!(confirmed.cost.subtotal, CostAmount::Known(usd(2000)));
    assert_eq!(cart.display(), confirmed);
    assert!(cart.pending().is_empty());
}

#[tokio::test]
async fn test_concurrent_adds_create_one_cart() {
    let shop = Arc::new(shop());
    let cart = controller(&shop);
    let mut events = cart.events();

    let first = cart.submit(add("V1", 1)).unwrap();
    let second = cart.submit(add("V2", 1)).unwrap();
    assert_eq!(cart.display().lines.len(), 2);

    for handle in [first, second] {
        assert!(matches!(
            settled(&mut events, handle).await,
            CartEvent::Confirmed { .. }
        ));
    }

    assert_eq!(shop.creates(), 1);
    let confirmed = cart.confirmed();
    assert_eq!(Some(confirmed.clone()), shop.cart());
    assert_eq!(confirmed.total_quantity, 2);
}

#[tokio::test]
async fn test_update_without_cart_fails_without_creating() {
    let shop = Arc::new(shop());
    let cart = controller(&shop);

    let result = cart
        .apply(update(&CartLineId::new("gid://shopify/CartLine/1"), 3))
        .await;

    assert!(matches!(
        result,
        Err(CartError::Backend(BackendError::NotFound(_)))
    ));
    assert_eq!(shop.creates(), 0);
    assert!(cart.confirmed().id.is_none());
}

// =============================================================================
// Optimistic display
// =============================================================================

#[tokio::test]
async fn test_add_is_visible_before_backend_answers() {
    let shop = Arc::new(shop().with_cart(&[("V1", 1)]));
    let cart = controller(&shop);
    let mut events = cart.events();
    let release = shop.hold_next();

    let handle = cart.submit(add("V1", 2)).unwrap();

    let display = cart.display();
    assert_eq!(display.lines.len(), 1, "same variant merges into one line");
    assert_eq!(quantity_of(&display, "V1"), Some(3));
    assert_eq!(display.total_quantity, 3);
    assert!(display.lines[0].is_optimistic);
    assert!(display.pending.lines);
    // V1's price is known from the confirmed cart, so the estimate is exact.
    assert_eq!(display.cost.subtotal, CostAmount::Known(usd(3000)));

    release.send(()).unwrap();
    let CartEvent::Confirmed { cart: confirmed, .. } = settled(&mut events, handle).await else {
        panic!("expected confirmation");
    };
    assert_eq!(confirmed.cost.subtotal, CostAmount::Known(usd(3000)));
    assert_eq!(cart.display(), *confirmed);
    assert!(!cart.display().pending.any());
}

#[tokio::test]
async fn test_unknown_price_leaves_totals_pending() {
    let shop = Arc::new(shop().with_cart(&[("V1", 1)]));
    let cart = controller(&shop);
    let mut events = cart.events();
    let release = shop.hold_next();

    let handle = cart.submit(add("V2", 1)).unwrap();

    let display = cart.display();
    let added = display
        .lines
        .iter()
        .find(|line| line.merchandise.variant_id.as_str() == "V2")
        .unwrap();
    assert!(added.id.is_none());
    assert!(!added.price_known);
    assert!(display.cost.subtotal.is_pending());
    assert!(display.cost.total.is_pending());

    release.send(()).unwrap();
    settled(&mut events, handle).await;
    assert_eq!(
        cart.display().cost.subtotal,
        CostAmount::Known(usd(3500))
    );
}

#[tokio::test]
async fn test_update_to_zero_removes_line() {
    let shop = Arc::new(shop().with_cart(&[("V1", 2), ("V2", 1)]));
    let cart = controller(&shop);
    let line = shop.line_id("V1").unwrap();
    let mut events = cart.events();
    let release = shop.hold_next();

    let handle = cart.submit(update(&line, 0)).unwrap();
    assert_eq!(quantity_of(&cart.display(), "V1"), None);
    assert_eq!(cart.display().total_quantity, 1);

    release.send(()).unwrap();
    settled(&mut events, handle).await;
    assert_eq!(quantity_of(&cart.confirmed(), "V1"), None);
    assert_eq!(cart.confirmed().lines.len(), 1);
}

#[tokio::test]
async fn test_subscriber_sees_optimistic_then_confirmed() {
    let shop = Arc::new(shop().with_cart(&[("V3", 1)]));
    let cart = controller(&shop);
    let mut display = cart.subscribe();
    let release = shop.hold_next();

    cart.submit(add("V3", 1)).unwrap();
    display.changed().await.unwrap();
    assert!(display.borrow_and_update().pending.lines);

    release.send(()).unwrap();
    timeout(Duration::from_secs(5), display.changed())
        .await
        .unwrap()
        .unwrap();
    let seen = display.borrow_and_update().clone();
    assert!(!seen.pending.lines);
    assert_eq!(quantity_of(&seen, "V3"), Some(2));
}

// =============================================================================
// Failure and rollback
// =============================================================================

#[tokio::test]
async fn test_failure_rolls_back_to_confirmed() {
    let shop = Arc::new(shop().with_cart(&[("V1", 1)]));
    let cart = controller(&shop);
    let before = cart.display();
    shop.fail_next(BackendError::Timeout);

    let result = cart.apply(add("V2", 4)).await;

    assert!(matches!(result, Err(CartError::Backend(BackendError::Timeout))));
    assert_eq!(cart.display(), before);
    assert_eq!(cart.confirmed(), before);
    assert_eq!(shop.cart(), Some(before));
}

#[tokio::test]
async fn test_user_errors_roll_back() {
    let shop = Arc::new(shop().with_cart(&[("V1", 1)]));
    let cart = controller(&shop);
    let before = cart.display();
    let mut events = cart.events();

    let handle = cart.submit(add("DISCONTINUED", 1)).unwrap();
    assert_eq!(cart.display().lines.len(), 2);

    let CartEvent::Failed { error, .. } = settled(&mut events, handle).await else {
        panic!("expected failure");
    };
    assert!(matches!(error, BackendError::UserErrors(errors) if errors.len() == 1));
    assert_eq!(cart.display(), before);
}

#[tokio::test]
async fn test_failure_keeps_other_pending_actions() {
    let shop = Arc::new(shop().with_cart(&[("V1", 1)]));
    let cart = controller(&shop);
    let mut events = cart.events();
    let hold_failing = shop.hold_next();
    let hold_other = shop.hold_next();
    shop.fail_next(BackendError::Transport("connection reset".to_string()));

    let failing = cart.submit(add("V2", 1)).unwrap();
    let other = cart.submit(add("V3", 1)).unwrap();

    hold_failing.send(()).unwrap();
    assert!(matches!(
        settled(&mut events, failing).await,
        CartEvent::Failed { .. }
    ));
    let display = cart.display();
    assert_eq!(quantity_of(&display, "V2"), None);
    assert_eq!(quantity_of(&display, "V3"), Some(1));

    hold_other.send(()).unwrap();
    settled(&mut events, other).await;
    assert_eq!(quantity_of(&cart.display(), "V3"), Some(1));
    assert_eq!(Some(cart.confirmed()), shop.cart());
}

// =============================================================================
// Ordering and conflicts
// =============================================================================

#[tokio::test]
async fn test_out_of_order_responses_converge() {
    let shop = Arc::new(shop().with_cart(&[("V1", 1)]));
    let cart = controller(&shop);
    let mut events = cart.events();
    let first_hold = shop.hold_next();
    let second_hold = shop.hold_next();

    let first = cart.submit(add("V2", 1)).unwrap();
    let second = cart.submit(add("V3", 1)).unwrap();
    assert_eq!(cart.display().total_quantity, 3);

    second_hold.send(()).unwrap();
    first_hold.send(()).unwrap();
    for handle in [first, second] {
        assert!(matches!(
            settled(&mut events, handle).await,
            CartEvent::Confirmed { .. }
        ));
    }

    assert!(cart.pending().is_empty());
    assert_eq!(Some(cart.confirmed()), shop.cart());
    assert_eq!(cart.display().total_quantity, 3);
}

#[tokio::test]
async fn test_conflicting_edit_is_rejected_locally() {
    let shop = Arc::new(shop().with_cart(&[("V1", 2)]));
    let cart = controller(&shop);
    let line = shop.line_id("V1").unwrap();
    let mut events = cart.events();
    let release = shop.hold_next();

    let handle = cart.submit(update(&line, 5)).unwrap();
    let conflict = cart.submit(CartAction::RemoveLines(vec![line.clone()]));

    let Err(error) = conflict else {
        panic!("expected a conflict");
    };
    assert!(error.is_local());
    assert!(matches!(error, CartError::Conflict(ref c) if c.line_id == line && c.pending == handle));
    assert_eq!(cart.pending().len(), 1);

    release.send(()).unwrap();
    settled(&mut events, handle).await;
    assert_eq!(shop.calls(), 1);
    assert_eq!(quantity_of(&cart.confirmed(), "V1"), Some(5));

    // Once settled the line can be edited again.
    cart.apply(CartAction::RemoveLines(vec![line])).await.unwrap();
    assert!(cart.confirmed().lines.is_empty());
}

#[tokio::test]
async fn test_invalid_action_never_reaches_backend() {
    let shop = Arc::new(shop().with_cart(&[("V1", 1)]));
    let cart = controller(&shop);

    let result = cart.submit(add("V1", 0));

    assert!(matches!(result, Err(CartError::Validation(_))));
    assert_eq!(shop.calls(), 0);
    assert!(cart.pending().is_empty());
}

// =============================================================================
// Codes and buyer identity
// =============================================================================

#[tokio::test]
async fn test_discount_code_total_pending_until_confirmed() {
    let shop = Arc::new(shop().with_cart(&[("V1", 2)]));
    let cart = controller(&shop);
    let mut events = cart.events();
    let release = shop.hold_next();

    let handle = cart
        .submit(CartAction::UpdateDiscountCodes(vec![format!(" {SAVE10} ")]))
        .unwrap();

    let display = cart.display();
    assert_eq!(display.discount_codes.len(), 1);
    assert_eq!(display.discount_codes[0].code, SAVE10);
    assert!(display.pending.discount_codes);
    assert!(display.cost.total.is_pending());
    assert_eq!(display.cost.subtotal, CostAmount::Known(usd(2000)));

    release.send(()).unwrap();
    settled(&mut events, handle).await;
    let confirmed = cart.confirmed();
    assert!(confirmed.discount_codes[0].applicable);
    assert_eq!(confirmed.cost.total, CostAmount::Known(usd(1800)));
}

#[tokio::test]
async fn test_gift_cards_are_masked() {
    let shop = Arc::new(shop().with_cart(&[("V1", 1)]));
    let cart = controller(&shop);
    let release = shop.hold_next();
    let mut events = cart.events();

    let handle = cart
        .submit(CartAction::UpdateGiftCardCodes(vec![
            "GIFT-CARD-0042".to_string(),
        ]))
        .unwrap();

    let display = cart.display();
    assert_eq!(display.gift_cards[0].last_characters, "0042");
    assert!(display.pending.gift_card_codes);

    release.send(()).unwrap();
    settled(&mut events, handle).await;
    assert_eq!(cart.confirmed().gift_cards[0].last_characters, "0042");
    assert!(!serde_json::to_string(&cart.display())
        .unwrap()
        .contains("GIFT-CARD"));
}

#[tokio::test]
async fn test_buyer_identity_update() {
    let shop = Arc::new(shop().with_cart(&[("V1", 1)]));
    let cart = controller(&shop);

    let confirmed = cart
        .apply(CartAction::UpdateBuyerIdentity(BuyerIdentity {
            email: Some("shopper@example.com".to_string()),
            phone: None,
            country_code: Some("NZ".to_string()),
        }))
        .await
        .unwrap();

    let identity = confirmed.buyer_identity.unwrap();
    assert_eq!(identity.email.as_deref(), Some("shopper@example.com"));
    assert_eq!(identity.country_code.as_deref(), Some("NZ"));
    assert!(!cart.display().pending.buyer_identity);
}
