//! Stripe payment client
//!
//! Talks to the Stripe REST API with form-encoded requests. Every call is
//! authenticated with the service provider's own secret key, so charges land
//! on the provider's account rather than a platform account.

use async_trait::async_trait;
use serde::Deserialize;

use super::{PaymentIntent, PaymentIntentRequest, PaymentProvider, ProviderAccount};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

pub struct StripePayments {
    client: reqwest::Client,
    api_base: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    id: String,
    #[serde(default)]
    charges_enabled: bool,
    #[serde(default)]
    payouts_enabled: bool,
    #[serde(default)]
    business_profile: Option<BusinessProfile>,
}

#[derive(Deserialize)]
struct BusinessProfile {
    name: Option<String>,
}

#[derive(Deserialize)]
struct PaymentIntentResponse {
    id: String,
    client_secret: Option<String>,
    status: String,
    latest_charge: Option<String>,
}

#[derive(Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}

impl StripePayments {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    /// Point the client at a different base URL (used against a stub server)
    pub fn with_api_base(api_base: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read Stripe response: {}", e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| format!("Stripe returned HTTP {}", status));
            return Err(message);
        }

        serde_json::from_str(&body).map_err(|e| format!("Unexpected Stripe response: {}", e))
    }
}

impl Default for StripePayments {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for StripePayments {
    async fn retrieve_account(&self, api_key: &str) -> Result<ProviderAccount, String> {
        let response = self
            .client
            .get(format!("{}/account", self.api_base))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| format!("Stripe request failed: {}", e))?;

        let account: AccountResponse = Self::decode(response).await?;
        Ok(ProviderAccount {
            id: account.id,
            charges_enabled: account.charges_enabled,
            payouts_enabled: account.payouts_enabled,
            business_name: account.business_profile.and_then(|p| p.name),
        })
    }

    async fn create_payment_intent(
        &self,
        api_key: &str,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, String> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount_minor.to_string()),
            ("currency".to_string(), request.currency.clone()),
            ("description".to_string(), request.description.clone()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let response = self
            .client
            .post(format!("{}/payment_intents", self.api_base))
            .bearer_auth(api_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| format!("Stripe request failed: {}", e))?;

        let intent: PaymentIntentResponse = Self::decode(response).await?;
        Ok(PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
            latest_charge: intent.latest_charge,
        })
    }

    async fn retrieve_payment_intent(
        &self,
        api_key: &str,
        intent_id: &str,
    ) -> Result<PaymentIntent, String> {
        let response = self
            .client
            .get(format!("{}/payment_intents/{}", self.api_base, intent_id))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| format!("Stripe request failed: {}", e))?;

        let intent: PaymentIntentResponse = Self::decode(response).await?;
        Ok(PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
            status: intent.status,
            latest_charge: intent.latest_charge,
        })
    }
}
