//! Identity verification (18+ age check)
//!
//! Accounts verify through a document verification provider. The state
//! machine lives on the account: unverified → pending → processing →
//! verified | failed | cancelled. A verified report with a date of birth
//! under 18 forces `failed` and withholds platform access.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tower_cookies::Cookies;

use crate::error::ApiError;
use crate::identity::{age_on, verify_webhook_signature, IdentityVerifier};
use crate::payments::PaymentProvider;
use crate::state::AppState;
use crate::store::{Store, VerificationStatus};

/// Maximum verification attempts inside the rolling window
const MAX_ATTEMPTS: i32 = 5;
/// Rolling attempt window in seconds (24 hours)
const ATTEMPT_WINDOW_SECS: i64 = 86_400;
/// Trust score boost on successful verification
const TRUST_BOOST: i32 = 30;

/// GET /api/verification/status
pub async fn status<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;

    Ok(Json(json!({
        "identity_verified": account.identity_verified,
        "identity_verification_status": account.identity_verification_status.as_str(),
        "identity_age_verified": account.identity_age_verified,
        "identity_verified_at": account.identity_verified_at.map(|t| t.to_rfc3339()),
        "identity_document_type": account.identity_document_type,
        "verification_attempts": account.verification_attempts,
        "can_use_platform": account.can_use_platform(),
    })))
}

/// POST /api/verification/create-session
///
/// Opens a new provider session. Already-verified accounts are refused, and
/// more than five attempts inside 24 hours are rate limited with a
/// `retry_after` hint.
pub async fn create_session<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let mut account = super::session::require_user(&cookies, &state.store)?;

    if account.identity_verified && account.identity_age_verified {
        return Err(ApiError::Conflict("Already verified".to_string()));
    }

    if account.verification_attempts >= MAX_ATTEMPTS {
        if let Some(last) = account.last_verification_attempt {
            let elapsed = (Utc::now() - last).num_seconds();
            if elapsed < ATTEMPT_WINDOW_SECS {
                return Err(ApiError::RateLimited {
                    retry_after: ATTEMPT_WINDOW_SECS - elapsed,
                });
            }
        }
        // Window elapsed, counter starts over
        account.verification_attempts = 0;
    }

    let frontend_url = headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http://localhost:3000");
    let return_url = format!("{}/verification/complete", frontend_url);

    let session = state
        .identity
        .create_session(&account.id.0, &return_url)
        .await
        .map_err(ApiError::Upstream)?;

    account.identity_session_id = Some(session.id.clone());
    account.identity_verification_status = VerificationStatus::Pending;
    account.verification_attempts += 1;
    account.last_verification_attempt = Some(Utc::now());
    account.updated_at = Utc::now();
    state.store.update_account(&account)?;

    tracing::info!(
        account = %account.id,
        session = %session.id,
        attempt = account.verification_attempts,
        "Verification session created"
    );

    Ok(Json(json!({
        "session_id": session.id,
        "client_secret": session.client_secret,
        "url": session.url,
        "status": "pending",
    })))
}

/// GET /api/verification/check-session/:session_id
pub async fn check_session<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let mut account = super::session::require_user(&cookies, &state.store)?;

    if account.identity_session_id.as_deref() != Some(session_id.as_str()) {
        return Err(ApiError::NotFound("Session"));
    }

    let session = state
        .identity
        .retrieve_session(&session_id)
        .await
        .map_err(ApiError::Upstream)?;

    let mut changed = true;
    match session.status.as_str() {
        "verified" => {
            // A session already marked verified has been processed; replayed
            // polls must not re-apply the trust boost.
            if account.identity_verification_status == VerificationStatus::Verified {
                changed = false;
            } else {
                if let Some(report) = &session.report {
                    if let Some(dob) = report.date_of_birth {
                        let age = age_on(dob, Utc::now().date_naive());
                        if age < 18 {
                            account.identity_age_verified = false;
                            account.identity_verified = false;
                            account.identity_verification_status = VerificationStatus::Failed;
                            account.updated_at = Utc::now();
                            state.store.update_account(&account)?;

                            return Ok(Json(json!({
                                "status": "failed",
                                "reason": "age_under_18",
                                "message": "You must be 18 or older to use this platform.",
                            })));
                        }
                        account.identity_age_verified = true;
                    }
                    if let Some(doc_type) = report.document_type.clone() {
                        account.identity_document_type = Some(doc_type);
                    }
                }
                account.identity_verified = true;
                account.identity_verification_status = VerificationStatus::Verified;
                account.identity_verified_at = Some(Utc::now());
                account.trust_score = (account.trust_score + TRUST_BOOST).min(100);
            }
        }
        "requires_input" => {
            account.identity_verification_status = VerificationStatus::Pending;
        }
        "processing" => {
            account.identity_verification_status = VerificationStatus::Processing;
        }
        "canceled" => {
            account.identity_verification_status = VerificationStatus::Cancelled;
        }
        other => {
            tracing::warn!(session = %session_id, status = other, "Unexpected session status");
            changed = false;
        }
    }

    if changed {
        account.updated_at = Utc::now();
        state.store.update_account(&account)?;
    }

    Ok(Json(json!({
        "session_id": session_id,
        "status": session.status,
        "identity_verified": account.identity_verified,
        "identity_age_verified": account.identity_age_verified,
        "identity_verification_status": account.identity_verification_status.as_str(),
        "can_use_platform": account.can_use_platform(),
    })))
}

/// POST /api/verification/webhook
///
/// Provider-side notifications. The signature is checked when a webhook
/// secret is configured; without one the payload is accepted as-is for
/// local development.
pub async fn webhook<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    if let Some(secret) = state.config.identity_webhook_secret.as_deref() {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Validation("Missing signature header".to_string()))?;
        if !verify_webhook_signature(&body, signature, secret, Utc::now().timestamp()) {
            return Err(ApiError::Validation("Invalid webhook signature".to_string()));
        }
    }

    let event: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::Validation("Invalid webhook payload".to_string()))?;
    let event_type = event.get("type").and_then(Value::as_str).unwrap_or("");
    let session_id = event
        .pointer("/data/object/id")
        .and_then(Value::as_str)
        .unwrap_or("");

    if session_id.is_empty() {
        return Ok(Json(json!({"received": true})));
    }

    let account = state.store.get_account_by_identity_session(session_id)?;
    let Some(mut account) = account else {
        tracing::warn!(session = session_id, "Webhook for unknown session");
        return Ok(Json(json!({"received": true})));
    };

    match event_type {
        "identity.verification_session.verified" => {
            // Redelivered events for an already-processed session are
            // acknowledged without re-applying the trust boost.
            if account.identity_verification_status == VerificationStatus::Verified {
                tracing::debug!(session = session_id, "Session already processed");
                return Ok(Json(json!({"received": true})));
            }

            // Pull the report for the age check when the provider has it
            let mut underage = false;
            if let Ok(session) = state.identity.retrieve_session(session_id).await {
                if let Some(report) = session.report {
                    if let Some(dob) = report.date_of_birth {
                        if age_on(dob, Utc::now().date_naive()) < 18 {
                            underage = true;
                        } else {
                            account.identity_age_verified = true;
                        }
                    }
                    if let Some(doc_type) = report.document_type {
                        account.identity_document_type = Some(doc_type);
                    }
                }
            }

            if underage {
                account.identity_age_verified = false;
                account.identity_verified = false;
                account.identity_verification_status = VerificationStatus::Failed;
            } else {
                account.identity_verified = true;
                account.identity_verification_status = VerificationStatus::Verified;
                account.identity_verified_at = Some(Utc::now());
                account.trust_score = (account.trust_score + TRUST_BOOST).min(100);
            }
            account.updated_at = Utc::now();
            state.store.update_account(&account)?;
        }
        "identity.verification_session.requires_input" => {
            account.identity_verification_status = VerificationStatus::Pending;
            account.updated_at = Utc::now();
            state.store.update_account(&account)?;
        }
        "identity.verification_session.canceled" => {
            account.identity_verification_status = VerificationStatus::Cancelled;
            account.updated_at = Utc::now();
            state.store.update_account(&account)?;
        }
        _ => {
            tracing::debug!(event = event_type, "Ignoring webhook event");
        }
    }

    Ok(Json(json!({"received": true})))
}

/// GET /api/verification/require-check
pub async fn require_check<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;

    let can_access = account.can_use_platform();
    let message = if can_access {
        "Access granted"
    } else {
        "Identity verification required to use the platform"
    };

    Ok(Json(json!({
        "can_access": can_access,
        "requires_verification": !can_access,
        "verification_status": account.identity_verification_status.as_str(),
        "message": message,
    })))
}
