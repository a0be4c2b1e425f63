//! Custom scalar types for the Shopify GraphQL API.

/// Custom scalar for ID (Shopify returns GID strings).
#[allow(clippy::upper_case_acronyms)]
pub type ID = String;

/// Custom scalar for Decimal (Shopify returns decimal strings).
pub type Decimal = String;

/// Custom scalar for URL (Shopify returns URL strings).
#[allow(clippy::upper_case_acronyms)]
pub type URL = String;
