//! Type conversion functions for Shopify Storefront API responses.

pub mod cart;

pub use cart::{convert_cart, convert_outcome, convert_user_error, convert_warning};
