//! Naked Pineapple Core - Shared types library.
//!
//! This crate provides common types used across the Naked Pineapple cart
//! components:
//! - `cart` - Optimistic cart state, projection and reconciliation
//! - `storefront` - Shopify Storefront API adapter
//! - `cli` - Command-line driver
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for Shopify IDs, money, and action statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
