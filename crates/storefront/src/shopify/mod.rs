//! Shopify Storefront API cart adapter.
//!
//! # Architecture
//!
//! - GraphQL documents are static; requests and responses use the
//!   `graphql_client` envelope with `reqwest` 0.13 for HTTP
//! - Shopify is the source of truth: every mutation returns the full cart,
//!   which replaces the local confirmed cart
//! - [`StorefrontClient`] implements
//!   [`CartBackend`](naked_pineapple_cart::backend::CartBackend)
//!
//! # Example
//!
//! ```rust,ignore
//! use naked_pineapple_cart::CartController;
//! use naked_pineapple_storefront::shopify::StorefrontClient;
//!
//! let client = Arc::new(StorefrontClient::new(&config.shopify)?);
//! let cart = client.get_cart(&cart_id).await?;
//! let controller = CartController::new(client, cart);
//! ```

mod storefront;
pub mod types;

pub use storefront::StorefrontClient;
pub use storefront::queries;

use naked_pineapple_cart::error::{BackendError, CartUserError};
use naked_pineapple_core::MoneyError;
use thiserror::Error;

/// Errors that can occur when interacting with Shopify APIs.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Mutation rejected with user errors and no cart.
    #[error("User error: {}", format_user_errors(.0))]
    UserErrors(Vec<CartUserError>),

    /// Response values that cannot be represented locally.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<MoneyError> for ShopifyError {
    fn from(err: MoneyError) -> Self {
        Self::InvalidData(err.to_string())
    }
}

impl From<ShopifyError> for BackendError {
    fn from(err: ShopifyError) -> Self {
        match err {
            ShopifyError::Http(e) if e.is_timeout() => Self::Timeout,
            ShopifyError::Http(e) => Self::Transport(e.to_string()),
            ShopifyError::RateLimited(retry_after_secs) => Self::RateLimited { retry_after_secs },
            ShopifyError::UserErrors(errors) => Self::UserErrors(errors),
            ShopifyError::NotFound(what) => Self::NotFound(what),
            err @ (ShopifyError::GraphQL(_)
            | ShopifyError::Parse(_)
            | ShopifyError::InvalidData(_)) => Self::InvalidResponse(err.to_string()),
        }
    }
}

fn format_user_errors(errors: &[CartUserError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A GraphQL error returned by the Shopify API.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();

            // Include message if present
            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }

            // Include path if present
            if !e.path.is_empty() {
                let path_str = e
                    .path
                    .iter()
                    .map(|p| match p {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                parts.push(format!("path: {path_str}"));
            }

            // Include location if present
            if let Some(loc) = e.locations.first() {
                parts.push(format!("at line {}:{}", loc.line, loc.column));
            }

            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
