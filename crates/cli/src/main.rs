//! Naked Pineapple CLI - Optimistic cart client for the Shopify Storefront API.
//!
//! # Usage
//!
//! ```bash
//! # Show a cart
//! np-cart --cart gid://shopify/Cart/abc show
//!
//! # Add a variant (creates a cart when --cart is omitted)
//! np-cart add -v gid://shopify/ProductVariant/123 -q 2 -o Size=M
//!
//! # Change or remove lines
//! np-cart --cart gid://shopify/Cart/abc update -l gid://shopify/CartLine/1 -q 3
//! np-cart --cart gid://shopify/Cart/abc remove gid://shopify/CartLine/1
//!
//! # Replace discount or gift card codes (no codes clears them)
//! np-cart --cart gid://shopify/Cart/abc discount SAVE10
//! np-cart --cart gid://shopify/Cart/abc gift-cards
//! ```
//!
//! Mutations print the optimistic cart first, then the cart Shopify
//! confirmed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use naked_pineapple_storefront::CartConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "np-cart")]
#[command(author, version, about = "Naked Pineapple cart client")]
struct Cli {
    /// Cart ID to operate on. Omit to start a new cart.
    #[arg(long, global = true)]
    cart: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart
    Show,
    /// Add a product variant
    Add {
        /// Product variant ID
        #[arg(short, long)]
        variant: String,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: i64,

        /// Selected option as `Name=Value` (repeatable)
        #[arg(short, long = "option")]
        options: Vec<String>,

        /// Known unit price, used for the optimistic total
        #[arg(short, long)]
        price: Option<String>,
    },
    /// Set the quantity of a line (0 removes it)
    Update {
        /// Cart line ID
        #[arg(short, long)]
        line: String,

        /// New quantity
        #[arg(short, long)]
        quantity: i64,
    },
    /// Remove lines
    Remove {
        /// Cart line IDs
        #[arg(required = true)]
        lines: Vec<String>,
    },
    /// Replace the discount codes
    Discount {
        /// Discount codes
        codes: Vec<String>,
    },
    /// Replace the gift card codes
    GiftCards {
        /// Gift card codes
        codes: Vec<String>,
    },
    /// Update the buyer identity
    Buyer {
        /// Email address
        #[arg(short, long)]
        email: Option<String>,

        /// Phone number
        #[arg(short, long)]
        phone: Option<String>,

        /// Country code (ISO 3166-1 alpha-2)
        #[arg(short, long)]
        country: Option<String>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "naked_pineapple_cart=info,naked_pineapple_storefront=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Sentry must be initialized before the tracing subscriber
    let config = CartConfig::from_env();
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let result = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        // process::exit skips destructors; flush Sentry first
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), Box<dyn std::error::Error>> {
    let session = commands::cart::Session::open(config, cli.cart.as_deref()).await?;

    match cli.command {
        Commands::Show => session.show()?,
        Commands::Add {
            variant,
            quantity,
            options,
            price,
        } => {
            let action =
                commands::cart::add_action(&variant, quantity, &options, price.as_deref(), config)?;
            session.mutate(action).await?;
        }
        Commands::Update { line, quantity } => {
            session
                .mutate(commands::cart::update_action(&line, quantity))
                .await?;
        }
        Commands::Remove { lines } => {
            session
                .mutate(commands::cart::remove_action(&lines))
                .await?;
        }
        Commands::Discount { codes } => {
            session
                .mutate(naked_pineapple_cart::CartAction::UpdateDiscountCodes(codes))
                .await?;
        }
        Commands::GiftCards { codes } => {
            session
                .mutate(naked_pineapple_cart::CartAction::UpdateGiftCardCodes(codes))
                .await?;
        }
        Commands::Buyer {
            email,
            phone,
            country,
        } => {
            let identity = naked_pineapple_cart::BuyerIdentity {
                email,
                phone,
                country_code: country,
            };
            session
                .mutate(naked_pineapple_cart::CartAction::UpdateBuyerIdentity(identity))
                .await?;
        }
    }
    Ok(())
}
