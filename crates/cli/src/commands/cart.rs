//! Cart commands.
//!
//! Each invocation loads the cart (or starts an empty one), runs a single
//! action through the cart controller, and prints the result as JSON.
//!
//! # Environment Variables
//!
//! - `SHOPIFY_STORE` - Shopify store domain
//! - `SHOPIFY_STOREFRONT_PRIVATE_TOKEN` - Storefront API private access token
//! - `CART_CURRENCY` - Currency for a new cart (default: USD)

use std::sync::Arc;

use naked_pineapple_cart::{
    AddLine, Cart, CartAction, CartController, CartError, CartEvent, LineUpdate, Merchandise,
    SelectedOption,
};
use naked_pineapple_core::{CartId, CartLineId, Money, MoneyError, VariantId};
use naked_pineapple_storefront::{CartConfig, ShopifyError, StorefrontClient};
use serde_json::json;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;

/// Errors that can occur while running a cart command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Talking to Shopify failed.
    #[error("Shopify error: {0}")]
    Shopify(#[from] ShopifyError),

    /// The cart rejected the action.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Output could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid `--option` value.
    #[error("Invalid option '{0}', expected Name=Value")]
    InvalidOption(String),

    /// Invalid `--price` value.
    #[error("Invalid price: {0}")]
    InvalidPrice(#[from] MoneyError),

    /// The controller stopped reporting events before the action settled.
    #[error("Cart events closed before the action settled")]
    EventsClosed,
}

/// A loaded cart and the controller driving it.
pub struct Session {
    controller: CartController,
}

impl Session {
    /// Load `cart_id`, or start an empty cart when it is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or the cart cannot be
    /// fetched.
    pub async fn open(config: &CartConfig, cart_id: Option<&str>) -> Result<Self, CommandError> {
        let client = Arc::new(StorefrontClient::new(&config.shopify)?);

        let cart = match cart_id {
            Some(id) => {
                tracing::info!("Loading cart {id}");
                client.get_cart(&CartId::new(id)).await?
            }
            None => Cart::empty(config.currency),
        };

        Ok(Self {
            controller: CartController::new(client, cart),
        })
    }

    /// Print the current cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be serialized.
    pub fn show(&self) -> Result<(), CommandError> {
        print_json(&json!({ "cart": self.controller.confirmed() }))
    }

    /// Submit an action, print the optimistic cart, then wait for Shopify.
    ///
    /// # Errors
    ///
    /// Returns an error if the action is rejected locally or by Shopify.
    pub async fn mutate(&self, action: CartAction) -> Result<(), CommandError> {
        let mut events = self.controller.events();
        let handle = self.controller.submit(action)?;

        print_json(&json!({ "optimistic": self.controller.display() }))?;

        loop {
            match events.recv().await {
                Ok(event) if event.handle() != handle => {}
                Ok(CartEvent::Confirmed { cart, warnings, .. }) => {
                    for warning in &warnings {
                        tracing::warn!("{}: {}", warning.code, warning.message);
                    }
                    return print_json(&json!({ "confirmed": cart }));
                }
                Ok(CartEvent::Failed { error, .. }) => {
                    return Err(CartError::Backend(error).into());
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Skipped {skipped} cart events");
                }
                Err(RecvError::Closed) => return Err(CommandError::EventsClosed),
            }
        }
    }
}

#[allow(clippy::print_stdout)]
fn print_json(value: &serde_json::Value) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Build an add action from command-line arguments.
///
/// # Errors
///
/// Returns an error if an option is not `Name=Value` or the price is not a
/// decimal amount.
pub fn add_action(
    variant: &str,
    quantity: i64,
    options: &[String],
    price: Option<&str>,
    config: &CartConfig,
) -> Result<CartAction, CommandError> {
    let selected_options = options
        .iter()
        .map(|option| parse_option(option))
        .collect::<Result<Vec<_>, _>>()?;
    let unit_price = price
        .map(|amount| Money::parse(amount, config.currency.code()))
        .transpose()?;

    Ok(CartAction::AddLines(vec![AddLine {
        merchandise: Merchandise {
            selected_options,
            ..Merchandise::variant(VariantId::new(variant))
        },
        quantity,
        unit_price,
    }]))
}

/// Build a quantity update for one line.
#[must_use]
pub fn update_action(line: &str, quantity: i64) -> CartAction {
    CartAction::UpdateLines(vec![LineUpdate {
        id: CartLineId::new(line),
        quantity,
    }])
}

/// Build a removal of the given lines.
#[must_use]
pub fn remove_action(lines: &[String]) -> CartAction {
    CartAction::RemoveLines(lines.iter().map(CartLineId::new).collect())
}

fn parse_option(option: &str) -> Result<SelectedOption, CommandError> {
    match option.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok(SelectedOption::new(name.trim(), value.trim()))
        }
        _ => Err(CommandError::InvalidOption(option.to_string())),
    }
}
