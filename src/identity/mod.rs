//! Identity verification provider abstraction
//!
//! Age checks run through a document verification service (Stripe Identity
//! in production). The trait mirrors the two calls the flow needs: open a
//! verification session and read it back once the user has submitted their
//! document.

use async_trait::async_trait;
use chrono::NaiveDate;

mod stripe;
mod webhook;

pub use stripe::StripeIdentity;
pub use webhook::verify_webhook_signature;

/// A freshly created verification session, handed to the client to redirect
#[derive(Debug, Clone)]
pub struct VerificationSessionHandle {
    pub id: String,
    pub client_secret: Option<String>,
    pub url: Option<String>,
}

/// Current state of a verification session
#[derive(Debug, Clone)]
pub struct VerificationSessionState {
    pub id: String,
    /// Provider-side status: requires_input, processing, verified, canceled
    pub status: String,
    pub report: Option<VerificationReport>,
}

/// Extracted document fields, present once the session is verified
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub document_type: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Open a verification session for the given account
    async fn create_session(
        &self,
        account_id: &str,
        return_url: &str,
    ) -> Result<VerificationSessionHandle, String>;

    /// Fetch a session including its verification report if available
    async fn retrieve_session(&self, session_id: &str)
        -> Result<VerificationSessionState, String>;
}

/// Full years between a birth date and `today`
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i64 {
    let mut age = today.years_since(date_of_birth).unwrap_or(0) as i64;
    // years_since rounds down already, but guard against a future birth date
    if date_of_birth > today {
        age = 0;
    }
    age
}
