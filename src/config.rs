//! Server configuration

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Path to the SQLite database; `None` runs with the in-memory store
    pub database: Option<String>,

    /// Platform Stripe secret key (used for identity verification sessions)
    pub stripe_secret_key: Option<String>,

    /// Webhook signing secret for Stripe Identity events; unsigned payloads
    /// are accepted when unset (test mode)
    pub identity_webhook_secret: Option<String>,

    /// Platform fee percentage recorded on booking payment intents
    pub platform_fee_percent: f64,

    /// Seconds an abandoned signaling room survives before the sweep drops it
    pub signaling_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults suitable for local development.
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            database: env::var("DATABASE_PATH").ok(),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").ok(),
            identity_webhook_secret: env::var("STRIPE_IDENTITY_WEBHOOK_SECRET").ok(),
            platform_fee_percent: env::var("PLATFORM_FEE_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10.0),
            signaling_ttl_secs: env::var("SIGNALING_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            database: None,
            stripe_secret_key: None,
            identity_webhook_secret: None,
            platform_fee_percent: 10.0,
            signaling_ttl_secs: 3600,
        }
    }
}
