//! LoveMatch backend
//!
//! HTTP/JSON API for a dating and companionship platform: accounts and
//! profiles, swipe matching, chat, synchronized watch-together sessions,
//! paid bookings with Stripe direct charges, and Stripe Identity based
//! 18+ verification.

pub mod config;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod payments;
pub mod routes;
pub mod signaling;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::ApiError;
pub use identity::{IdentityVerifier, StripeIdentity};
pub use payments::{PaymentProvider, StripePayments};
pub use signaling::SignalingStore;
pub use state::AppState;
pub use store::{InMemoryStore, SqliteStore, Store};
