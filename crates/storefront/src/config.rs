//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CARTWHEEL_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `CARTWHEEL_LOCAL_DIR` - Directory for the anonymous cart (default: .cartwheel)
//! - `CARTWHEEL_SIGN_IN_POLICY` - `discard` or `merge` (default: discard)
//! - `CARTWHEEL_TAX_RATE` - Tax as a fraction of the subtotal (default: 0.10)
//! - `CARTWHEEL_FREE_SHIPPING_OVER` - Subtotal above which shipping is free (default: 50)
//! - `CARTWHEEL_SHIPPING_FLAT_RATE` - Shipping charged otherwise (default: 9.99)
//! - `CARTWHEEL_PRODUCT_CACHE_TTL_SECS` - Product cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use cartwheel_core::CurrencyCode;

use crate::services::cart::SignInPolicy;
use crate::services::checkout::CheckoutRates;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Directory holding the anonymous cart file
    pub local_dir: PathBuf,
    /// What happens to the anonymous cart on sign-in
    pub sign_in_policy: SignInPolicy,
    /// Tax and shipping rates applied at checkout
    pub rates: CheckoutRates,
    /// How long catalog products stay cached
    pub product_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_vars(vars: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get_database_url(&vars, "CARTWHEEL_DATABASE_URL")?;
        let local_dir =
            PathBuf::from(get_env_or_default(&vars, "CARTWHEEL_LOCAL_DIR", ".cartwheel"));
        let sign_in_policy =
            get_parsed(&vars, "CARTWHEEL_SIGN_IN_POLICY", SignInPolicy::default())?;

        let defaults = CheckoutRates::default();
        let rates = CheckoutRates {
            tax_rate: get_parsed(&vars, "CARTWHEEL_TAX_RATE", defaults.tax_rate)?,
            free_shipping_over: get_parsed(
                &vars,
                "CARTWHEEL_FREE_SHIPPING_OVER",
                defaults.free_shipping_over,
            )?,
            flat_shipping: get_parsed(
                &vars,
                "CARTWHEEL_SHIPPING_FLAT_RATE",
                defaults.flat_shipping,
            )?,
            currency: CurrencyCode::USD,
        };
        validate_rates(&rates)?;

        let ttl_secs: u64 = get_parsed(&vars, "CARTWHEEL_PRODUCT_CACHE_TTL_SECS", 300)?;

        Ok(Self {
            database_url,
            local_dir,
            sign_in_policy,
            rates,
            product_cache_ttl: Duration::from_secs(ttl_secs),
            sentry_dsn: get_optional_env(&vars, "SENTRY_DSN"),
            sentry_environment: get_optional_env(&vars, "SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(
    vars: &impl Fn(&str) -> Option<String>,
    primary_key: &str,
) -> Result<SecretString, ConfigError> {
    vars(primary_key)
        .or_else(|| vars("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(vars: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    vars(key).filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(vars: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get_optional_env(vars, key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
fn get_parsed<T>(
    vars: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(vars, key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Reject rates that can't produce a sensible total.
fn validate_rates(rates: &CheckoutRates) -> Result<(), ConfigError> {
    if rates.tax_rate < Decimal::ZERO || rates.tax_rate > Decimal::ONE {
        return Err(ConfigError::InvalidEnvVar(
            "CARTWHEEL_TAX_RATE".to_string(),
            format!("must be between 0 and 1 (got {})", rates.tax_rate),
        ));
    }
    if rates.free_shipping_over.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            "CARTWHEEL_FREE_SHIPPING_OVER".to_string(),
            "must not be negative".to_string(),
        ));
    }
    if rates.flat_shipping.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            "CARTWHEEL_SHIPPING_FLAT_RATE".to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(())
}
