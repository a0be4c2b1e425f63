//! Async driver for cart mutations.
//!
//! [`CartController`] owns a [`CartState`] behind a mutex and a
//! [`CartBackend`]. Submitting an action projects it immediately, then sends
//! the mutation. Mutations for different actions run concurrently and may
//! complete in any order; each response is reconciled as it arrives.
//!
//! Before a cart exists, the first mutation creates it. Later mutations wait
//! on a creation lock and then target the new cart, so only one cart is ever
//! created per controller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use naked_pineapple_core::CartId;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, instrument, warn};

use crate::action::{ActionKind, CartAction};
use crate::backend::{CartBackend, MutationOutcome};
use crate::error::{BackendError, CartError, CartWarning};
use crate::model::Cart;
use crate::pricing::PriceHints;
use crate::queue::{ActionHandle, PendingEntry};
use crate::state::{CartState, Submission};

const EVENT_CAPACITY: usize = 64;

/// What happened to a submitted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    /// The backend accepted the action; `cart` is the new confirmed cart.
    Confirmed {
        handle: ActionHandle,
        kind: ActionKind,
        cart: Box<Cart>,
        warnings: Vec<CartWarning>,
    },
    /// The backend rejected the action; its effect has been rolled back.
    Failed {
        handle: ActionHandle,
        kind: ActionKind,
        error: BackendError,
    },
}

impl CartEvent {
    /// Handle of the action this event is about.
    #[must_use]
    pub const fn handle(&self) -> ActionHandle {
        match self {
            Self::Confirmed { handle, .. } | Self::Failed { handle, .. } => *handle,
        }
    }
}

/// Cart controller. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CartController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    state: Mutex<CartState>,
    backend: Arc<dyn CartBackend>,
    creating: tokio::sync::Mutex<()>,
    events: broadcast::Sender<CartEvent>,
}

impl std::fmt::Debug for CartController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CartController")
            .field("cart_id", &state.confirmed().id)
            .field("pending", &state.queue().len())
            .finish_non_exhaustive()
    }
}

impl CartController {
    /// Create a controller over `backend`, starting from `confirmed`.
    ///
    /// Pass [`Cart::empty`] when no cart has been created yet.
    #[must_use]
    pub fn new(backend: Arc<dyn CartBackend>, confirmed: Cart) -> Self {
        Self::with_state(backend, CartState::new(confirmed))
    }

    /// Create a controller sharing an existing price hint cache.
    #[must_use]
    pub fn with_price_hints(
        backend: Arc<dyn CartBackend>,
        confirmed: Cart,
        hints: PriceHints,
    ) -> Self {
        Self::with_state(backend, CartState::with_price_hints(confirmed, hints))
    }

    fn with_state(backend: Arc<dyn CartBackend>, state: CartState) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(state),
                backend,
                creating: tokio::sync::Mutex::new(()),
                events,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CartState> {
        // State is only mutated through complete method calls, so a poisoned
        // guard still holds a consistent value.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The cart to display right now.
    #[must_use]
    pub fn display(&self) -> Cart {
        self.lock().display()
    }

    /// The last cart the backend confirmed.
    #[must_use]
    pub fn confirmed(&self) -> Cart {
        self.lock().confirmed().clone()
    }

    /// Actions still waiting on the backend, in submission order.
    ///
    /// Gift card codes are masked in the returned entries.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingEntry> {
        self.lock().queue().iter().map(PendingEntry::redacted).collect()
    }

    /// Receive the display cart whenever it changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.lock().subscribe()
    }

    /// Receive confirmation and failure events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<CartEvent> {
        self.inner.events.subscribe()
    }

    /// Replace the confirmed cart (e.g. after reloading it from the backend).
    pub fn replace_confirmed(&self, cart: Cart) {
        self.lock().replace_confirmed(cart);
    }

    /// Submit an action and send it in the background.
    ///
    /// The action shows up in [`display`](Self::display) before this returns.
    /// Its outcome is reported on [`events`](Self::events).
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Validation`] or [`CartError::Conflict`] if the
    /// action was not accepted, or [`CartError::NoRuntime`] when called
    /// outside a Tokio runtime. Nothing is queued or sent in those cases.
    #[instrument(skip(self, action), fields(kind = %action.kind()))]
    pub fn submit(&self, action: CartAction) -> Result<ActionHandle, CartError> {
        let (handle, _task) = self.spawn(action)?;
        Ok(handle)
    }

    /// Submit an action and wait for the backend to answer.
    ///
    /// The backend call runs in its own task, so dropping this future does
    /// not strand the action: it is still reconciled when the backend
    /// answers.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Validation`], [`CartError::Conflict`] or
    /// [`CartError::NoRuntime`] if the action was not accepted, or
    /// [`CartError::Backend`] if the backend rejected it (the optimistic
    /// effect is rolled back).
    #[instrument(skip(self, action), fields(kind = %action.kind()))]
    pub async fn apply(&self, action: CartAction) -> Result<Cart, CartError> {
        let (_, task) = self.spawn(action)?;
        task.await.unwrap_or_else(|error| {
            Err(CartError::Backend(BackendError::Transport(format!(
                "cart task did not finish: {error}"
            ))))
        })
    }

    /// Enqueue `action` and start the task that sends and reconciles it.
    fn spawn(
        &self,
        action: CartAction,
    ) -> Result<(ActionHandle, JoinHandle<Result<Cart, CartError>>), CartError> {
        let runtime = Handle::try_current().map_err(|_| CartError::NoRuntime)?;
        let submission = self.lock().submit(action)?;
        let handle = submission.handle;
        let controller = self.clone();

        let spawner = runtime.clone();
        let task = runtime.spawn(async move {
            let call = spawner.spawn({
                let controller = controller.clone();
                async move { controller.dispatch(submission).await }
            });
            match call.await {
                Ok(result) => result,
                // The backend call panicked or was cancelled before it was
                // reconciled; roll the action back like any other failure.
                Err(error) => {
                    error!(handle = %handle, error = %error, "Cart mutation task aborted");
                    controller.reconcile(
                        handle,
                        Err(BackendError::Transport(format!(
                            "cart mutation aborted: {error}"
                        ))),
                    )
                }
            }
        });
        Ok((handle, task))
    }

    fn cart_id(&self) -> Option<CartId> {
        self.lock().confirmed().id.clone()
    }

    #[instrument(skip_all, fields(handle = %submission.handle))]
    async fn dispatch(&self, submission: Submission) -> Result<Cart, CartError> {
        let backend = self.inner.backend.as_ref();

        if let Some(cart_id) = self.cart_id() {
            let result = submission.mutation.dispatch(backend, Some(&cart_id)).await;
            return self.reconcile(submission.handle, result);
        }

        // Hold the lock until the new cart is confirmed so that waiters see
        // its id.
        let _creating = self.inner.creating.lock().await;
        let cart_id = self.cart_id();
        let result = submission.mutation.dispatch(backend, cart_id.as_ref()).await;
        self.reconcile(submission.handle, result)
    }

    fn reconcile(
        &self,
        handle: ActionHandle,
        result: Result<MutationOutcome, BackendError>,
    ) -> Result<Cart, CartError> {
        let mut state = self.lock();
        let kind = state
            .queue()
            .get(handle)
            .map(|entry| entry.action.kind())
            .ok_or(CartError::UnknownAction(handle))?;

        let outcome = match result {
            Ok(outcome) => state.resolve(handle, outcome),
            Err(error) => {
                state.reject(handle, error.clone())?;
                Err(CartError::Backend(error))
            }
        };
        drop(state);

        match &outcome {
            Ok(confirmation) => {
                let _ = self.inner.events.send(CartEvent::Confirmed {
                    handle,
                    kind,
                    cart: Box::new(confirmation.cart.clone()),
                    warnings: confirmation.warnings.clone(),
                });
            }
            Err(CartError::Backend(error)) => {
                let _ = self.inner.events.send(CartEvent::Failed {
                    handle,
                    kind,
                    error: error.clone(),
                });
            }
            Err(error) => {
                warn!(handle = %handle, error = %error, "Unexpected reconcile error");
            }
        }

        outcome.map(|confirmation| confirmation.cart)
    }
}
