//! Payment provider abstraction
//!
//! Bookings are charged directly on the service provider's own payment
//! account, using the API key the provider registered with. The trait keeps
//! handlers testable with a mock in place of the live Stripe client.

use std::collections::HashMap;

use async_trait::async_trait;

mod stripe;

pub use stripe::StripePayments;

/// Minimal view of a connected payment account
#[derive(Debug, Clone)]
pub struct ProviderAccount {
    pub id: String,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub business_name: Option<String>,
}

/// Minimal view of a payment intent
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: String,
    pub latest_charge: Option<String>,
}

/// Parameters for creating a payment intent
#[derive(Debug, Clone)]
pub struct PaymentIntentRequest {
    /// Amount in the currency's minor unit (kopecks for RUB)
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    pub metadata: HashMap<String, String>,
}

/// Outbound payment operations, keyed by the service provider's API key
#[async_trait]
pub trait PaymentProvider: Send + Sync + 'static {
    /// Fetch the account behind an API key, to validate it on registration
    async fn retrieve_account(&self, api_key: &str) -> Result<ProviderAccount, String>;

    /// Create a payment intent on the provider's account
    async fn create_payment_intent(
        &self,
        api_key: &str,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, String>;

    /// Fetch the current state of a payment intent
    async fn retrieve_payment_intent(
        &self,
        api_key: &str,
        intent_id: &str,
    ) -> Result<PaymentIntent, String>;
}
