//! Stripe Identity client

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use super::{IdentityVerifier, VerificationReport, VerificationSessionHandle, VerificationSessionState};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

pub struct StripeIdentity {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    status: String,
    client_secret: Option<String>,
    url: Option<String>,
    #[serde(default)]
    verified_outputs: Option<VerifiedOutputs>,
}

#[derive(Deserialize)]
struct VerifiedOutputs {
    #[serde(default)]
    id_number_type: Option<String>,
    #[serde(default)]
    dob: Option<DateParts>,
}

#[derive(Deserialize)]
struct DateParts {
    year: i32,
    month: u32,
    day: u32,
}

#[derive(Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}

impl StripeIdentity {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: STRIPE_API_BASE.to_string(),
            secret_key,
        }
    }

    /// Point the client at a different base URL (used against a stub server)
    pub fn with_api_base(secret_key: String, api_base: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            secret_key,
        }
    }

    async fn decode(response: reqwest::Response) -> Result<SessionResponse, String> {
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

fn into_state(session: SessionResponse) -> VerificationSessionState {
    let report = session.verified_outputs.map(|outputs| VerificationReport {
        document_type: outputs.id_number_type,
        date_of_birth: outputs
            .dob
            .and_then(|dob| NaiveDate::from_ymd_opt(dob.year, dob.month, dob.day)),
    });
    VerificationSessionState {
        id: session.id,
        status: session.status,
        report,
    }
}

#[async_trait]
impl IdentityVerifier for StripeIdentity {
    async fn create_session(
        &self,
        account_id: &str,
        return_url: &str,
    ) -> Result<VerificationSessionHandle, String> {
        let form = [
            ("type", "document"),
            ("metadata[user_id]", account_id),
            ("return_url", return_url),
            ("options[document][require_matching_selfie]", "true"),
        ];

        let response = self
            .client
            .post(format!("{}/identity/verification_sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| format!("Stripe request failed: {}", e))?;

        let session = Self::decode(response).await?;
        Ok(VerificationSessionHandle {
            id: session.id,
            client_secret: session.client_secret,
            url: session.url,
        })
    }

    async fn retrieve_session(
        &self,
        session_id: &str,
    ) -> Result<VerificationSessionState, String> {
        let response = self
            .client
            .get(format!(
                "{}/identity/verification_sessions/{}?expand[]=verified_outputs",
                self.api_base, session_id
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| format!("Stripe request failed: {}", e))?;

        let session = Self::decode(response).await?;
        Ok(into_state(session))
    }
}
