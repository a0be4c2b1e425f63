//! Reconciliation state: the confirmed cart plus the pending queue.
//!
//! [`CartState`] is the only owner of the source-of-truth cart. It is purely
//! synchronous; the async driver in [`crate::controller`] wraps it and talks
//! to the backend.
//!
//! Per action: `Submitted -> Confirmed | Failed`. On confirmation the whole
//! confirmed cart is replaced by the one the backend returned, so whichever
//! response is received last defines the cart. Only the matching queue entry
//! is retired. On failure the cart is untouched and the entry is dropped,
//! which rolls back its optimistic effect on the next projection.

use naked_pineapple_core::{ActionStatus, CurrencyCode};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::action::CartAction;
use crate::backend::{CartMutation, MutationOutcome};
use crate::error::{BackendError, CartError, CartWarning};
use crate::pricing::PriceHints;
use crate::projector::project;
use crate::queue::{ActionHandle, PendingActionQueue, PendingEntry};
use crate::model::Cart;

/// An accepted action and the request to send for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Handle to resolve or reject later.
    pub handle: ActionHandle,
    /// Backend request for the action.
    pub mutation: CartMutation,
}

/// A confirmed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// The new confirmed cart.
    pub cart: Cart,
    /// Warnings the backend attached to the mutation.
    pub warnings: Vec<CartWarning>,
}

/// Confirmed cart, pending queue, and the display-cart channel.
#[derive(Debug)]
pub struct CartState {
    confirmed: Cart,
    queue: PendingActionQueue,
    hints: PriceHints,
    display: watch::Sender<Cart>,
}

impl CartState {
    /// Start from a confirmed cart (or [`Cart::empty`] before one exists).
    #[must_use]
    pub fn new(confirmed: Cart) -> Self {
        Self::with_price_hints(confirmed, PriceHints::default())
    }

    /// Start with an existing price hint cache.
    #[must_use]
    pub fn with_price_hints(confirmed: Cart, hints: PriceHints) -> Self {
        let confirmed = confirmed.normalized();
        hints.learn(&confirmed);
        let (display, _) = watch::channel(confirmed.clone());
        Self {
            confirmed,
            queue: PendingActionQueue::new(),
            hints,
            display,
        }
    }

    /// Start from an empty cart in `currency_code`.
    #[must_use]
    pub fn empty(currency_code: CurrencyCode) -> Self {
        Self::new(Cart::empty(currency_code))
    }

    /// The source-of-truth cart.
    #[must_use]
    pub const fn confirmed(&self) -> &Cart {
        &self.confirmed
    }

    /// The pending queue.
    #[must_use]
    pub const fn queue(&self) -> &PendingActionQueue {
        &self.queue
    }

    /// The cart to display right now.
    #[must_use]
    pub fn display(&self) -> Cart {
        project(&self.confirmed, self.queue.actions())
    }

    /// Receive the display cart whenever it changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.display.subscribe()
    }

    /// Enqueue an action.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Validation`] or [`CartError::Conflict`]; nothing
    /// changes in that case.
    pub fn submit(&mut self, action: CartAction) -> Result<Submission, CartError> {
        let action = self.hints.annotate(action);
        let handle = self.queue.enqueue(action)?;
        let mutation = self
            .queue
            .get(handle)
            .map(|entry| entry.action.to_mutation())
            .ok_or(CartError::UnknownAction(handle))?;
        self.publish();
        Ok(Submission { handle, mutation })
    }

    /// Apply a backend response for `handle`.
    ///
    /// An outcome carrying user errors is treated as a failure and rejected.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownAction`] for a handle that is not pending
    /// (nothing changes), or [`CartError::Backend`] if the outcome carried
    /// user errors (the action is rejected).
    pub fn resolve(
        &mut self,
        handle: ActionHandle,
        outcome: MutationOutcome,
    ) -> Result<Confirmation, CartError> {
        if self.queue.get(handle).is_none() {
            return Err(CartError::UnknownAction(handle));
        }

        let (cart, warnings) = match outcome.into_result() {
            Ok(confirmed) => confirmed,
            Err(error) => {
                self.reject(handle, error.clone())?;
                return Err(CartError::Backend(error));
            }
        };

        let entry = self.queue.take(handle, ActionStatus::Confirmed)?;
        self.confirmed = cart.normalized();
        self.hints.learn(&self.confirmed);
        info!(
            handle = %handle,
            kind = %entry.action.kind(),
            total_quantity = self.confirmed.total_quantity,
            still_pending = self.queue.len(),
            "Cart action confirmed"
        );
        for warning in &warnings {
            debug!(code = %warning.code, message = %warning.message, "Cart warning");
        }
        self.publish();

        Ok(Confirmation {
            cart: self.confirmed.clone(),
            warnings,
        })
    }

    /// Drop `handle` without applying anything.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownAction`] for a handle that is not pending.
    pub fn reject(
        &mut self,
        handle: ActionHandle,
        error: BackendError,
    ) -> Result<PendingEntry, CartError> {
        let entry = self.queue.take(handle, ActionStatus::Failed)?;
        warn!(
            handle = %handle,
            kind = %entry.action.kind(),
            error = %error,
            "Cart action failed, rolling back"
        );
        self.publish();
        Ok(entry)
    }

    /// Replace the confirmed cart outright (e.g. after a reload).
    pub fn replace_confirmed(&mut self, cart: Cart) {
        self.confirmed = cart.normalized();
        self.hints.learn(&self.confirmed);
        self.publish();
    }

    fn publish(&self) {
        self.display.send_replace(self.display());
    }
}
