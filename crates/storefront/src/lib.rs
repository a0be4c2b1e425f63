//! Naked Pineapple Storefront - Shopify cart adapter.
//!
//! Connects the optimistic cart in `naked-pineapple-cart` to the Shopify
//! Storefront API, and loads the configuration needed to do so.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod shopify;

pub use config::{CartConfig, ConfigError, ShopifyStorefrontConfig};
pub use shopify::{ShopifyError, StorefrontClient};
