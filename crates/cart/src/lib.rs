//! Naked Pineapple Cart - Optimistic cart state.
//!
//! Every cart mutation is shown to the shopper immediately and reconciled
//! with the commerce backend once it answers:
//!
//! 1. An action is validated and queued ([`queue`]).
//! 2. The display cart is recomputed by replaying every queued action over
//!    the last confirmed cart ([`projector`]).
//! 3. The backend call runs in the background ([`controller`]).
//! 4. On success the confirmed cart is replaced with the backend's cart; on
//!    failure the action is dropped, which rolls it back ([`state`]).
//!
//! The backend is abstract ([`backend::CartBackend`]); the Shopify adapter
//! lives in `naked-pineapple-storefront`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod action;
pub mod backend;
pub mod controller;
pub mod error;
pub mod identity;
pub mod model;
pub mod pricing;
pub mod projector;
pub mod queue;
pub mod state;

pub use action::{ActionKind, AddLine, CartAction, LineUpdate, MAX_LINE_QUANTITY};
pub use backend::{
    CartBackend, CartCreateInput, CartLineInput, CartLineUpdateInput, CartMutation,
    MutationOutcome,
};
pub use controller::{CartController, CartEvent};
pub use error::{
    BackendError, CartError, CartUserError, CartWarning, ConflictError, ValidationError,
};
pub use identity::{MerchandiseKey, find_slot, same_slot};
pub use model::{
    AppliedGiftCard, BuyerIdentity, Cart, CartCost, CartLine, CostAmount, DiscountCode,
    LineCost, Merchandise, PendingFlags, SelectedOption,
};
pub use pricing::PriceHints;
pub use projector::project;
pub use queue::{ActionHandle, PendingActionQueue, PendingEntry};
pub use state::{CartState, Confirmation, Submission};
