//! Cartwheel CLI - Shopper console for the cart.
//!
//! # Usage
//!
//! ```bash
//! # Show the anonymous cart stored on this device
//! cartwheel show
//!
//! # Add two medium red shirts to a signed-in user's cart
//! cartwheel --user 6f1c0d0e-8a53-4e43-9a38-54c9a1d5b2d1 add <product-id> \
//!     --variant Color=Red --variant Size=M --quantity 2
//!
//! # Sign in, applying CARTWHEEL_SIGN_IN_POLICY to the anonymous cart
//! cartwheel sign-in 6f1c0d0e-8a53-4e43-9a38-54c9a1d5b2d1
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart and its totals
//! - `products` - List catalog products
//! - `add` - Add a product
//! - `update` - Set a line's quantity (zero or below removes it)
//! - `remove` - Remove a line
//! - `clear` - Empty the cart
//! - `checkout` - Complete checkout and print the receipt
//! - `sign-in` - Switch from the anonymous cart to a user's cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cartwheel_core::{LineItemId, ProductId, UserId};
use cartwheel_storefront::config::CartConfig;
use cartwheel_storefront::models::CartOwner;

mod commands;

#[derive(Parser)]
#[command(name = "cartwheel")]
#[command(author, version, about = "Cartwheel shopper console")]
struct Cli {
    /// Act as this signed-in user instead of the anonymous device cart
    #[arg(short, long, global = true, value_name = "USER_ID")]
    user: Option<UserId>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart and its totals
    Show,
    /// List catalog products
    Products {
        /// Maximum number of products to list
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
    /// Add a product to the cart
    Add {
        /// Product ID
        product: ProductId,

        /// Variant choice, repeatable (e.g. `--variant Size=M`)
        #[arg(short, long = "variant", value_name = "AXIS=VALUE")]
        variants: Vec<String>,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity; zero or below removes the line
    Update {
        /// Line item ID
        line: LineItemId,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line from the cart
    Remove {
        /// Line item ID
        line: LineItemId,
    },
    /// Remove every line
    Clear,
    /// Complete checkout and print the receipt
    Checkout,
    /// Sign in as a user, starting from the anonymous cart
    SignIn {
        /// User ID to sign in as
        user: UserId,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
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

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartwheel_storefront=info,cartwheel_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: CartConfig) -> Result<(), Box<dyn std::error::Error>> {
    let shop = commands::Shop::connect(&config).await?;
    let owner = CartOwner::from(cli.user);

    match cli.command {
        Commands::Show => commands::cart::show(&shop, owner).await,
        Commands::Products { limit } => commands::cart::products(&shop, limit).await?,
        Commands::Add {
            product,
            variants,
            quantity,
        } => commands::cart::add(&shop, owner, product, &variants, quantity).await?,
        Commands::Update { line, quantity } => {
            commands::cart::update(&shop, owner, line, quantity).await?;
        }
        Commands::Remove { line } => commands::cart::remove(&shop, owner, line).await?,
        Commands::Clear => commands::cart::clear(&shop, owner).await?,
        Commands::Checkout => commands::checkout::complete(&shop, owner).await?,
        Commands::SignIn { user } => commands::cart::sign_in(&shop, user).await,
    }
    Ok(())
}
