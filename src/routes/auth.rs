//! Registration, login, and session endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_cookies::Cookies;

use crate::crypto::{hash_password, is_valid_email, validate_password, verify_password};
use crate::error::ApiError;
use crate::identity::IdentityVerifier;
use crate::payments::PaymentProvider;
use crate::state::AppState;
use crate::store::{Account, AccountId, Goal, Store, SubscriptionPlan, VerificationStatus};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    pub goal: String,
    pub age: i32,
    pub gender: String,
    pub city: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub looking_for_gender: Option<String>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub business_name: Option<String>,
    pub hourly_rate: Option<f64>,
}

/// POST /api/auth/register
pub async fn register<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    if !is_valid_email(&req.email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }
    validate_password(&req.password).map_err(ApiError::Validation)?;

    let goal = Goal::from_str(&req.goal).ok_or_else(|| {
        ApiError::Validation(
            "Invalid goal. Must be one of: relationship, friendship, intimate_services, casual"
                .to_string(),
        )
    })?;

    if req.age < 18 || req.age > 100 {
        return Err(ApiError::Validation(
            "Age must be between 18 and 100".to_string(),
        ));
    }

    let email = req.email.to_lowercase();
    if state.store.get_account_by_email(&email)?.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }
    if state.store.get_account_by_username(&req.username)?.is_some() {
        return Err(ApiError::Conflict("Username already taken".to_string()));
    }

    let is_provider = goal == Goal::IntimateServices;
    let now = Utc::now();
    let account = Account {
        id: AccountId::generate(),
        email,
        username: req.username,
        password_hash: hash_password(&req.password)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
        first_name: req.first_name,
        last_name: req.last_name,
        age: Some(req.age),
        gender: Some(req.gender),
        city: Some(req.city),
        bio: req.bio,
        photos: Vec::new(),
        goal,
        subscription_plan: SubscriptionPlan::Free,
        looking_for_gender: req.looking_for_gender,
        age_min: Some(req.age_min.unwrap_or(18)),
        age_max: Some(req.age_max.unwrap_or(100)),
        is_service_provider: is_provider,
        service_verified: false,
        business_name: if is_provider { req.business_name } else { None },
        provider_stripe_key: None,
        stripe_account_id: None,
        hourly_rate: if is_provider { req.hourly_rate } else { None },
        trust_score: 50,
        is_active: true,
        is_banned: false,
        banned_reason: None,
        is_admin: false,
        identity_verified: false,
        identity_verification_status: VerificationStatus::Unverified,
        identity_session_id: None,
        identity_verified_at: None,
        identity_document_type: None,
        identity_age_verified: false,
        verification_attempts: 0,
        last_verification_attempt: None,
        created_at: now,
        updated_at: now,
        last_active: now,
    };

    state.store.create_account(&account)?;

    let session = state.store.create_auth_session(&account.id)?;
    super::session::set_session_cookie(&cookies, &session.token);

    tracing::info!(account = %account.id, "Account registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful",
            "user": {
                "id": account.id.0,
                "email": account.email,
                "username": account.username,
                "goal": account.goal,
                "subscription_plan": account.subscription_plan,
                "is_service_provider": account.is_service_provider,
            }
        })),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/login
pub async fn login<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let mut account = state
        .store
        .get_account_by_email(&req.email.to_lowercase())?
        .ok_or(ApiError::NotAuthenticated)?;

    let valid = verify_password(&req.password, &account.password_hash)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !valid {
        return Err(ApiError::NotAuthenticated);
    }

    if !account.is_active {
        return Err(ApiError::Forbidden("Account is deactivated".to_string()));
    }
    if account.is_banned {
        let reason = account.banned_reason.as_deref().unwrap_or("unspecified");
        return Err(ApiError::Forbidden(format!("Account is banned: {}", reason)));
    }

    account.last_active = Utc::now();
    state.store.update_account(&account)?;

    let session = state.store.create_auth_session(&account.id)?;
    super::session::set_session_cookie(&cookies, &session.token);

    Ok(Json(json!({
        "message": "Login successful",
        "user": {
            "id": account.id.0,
            "email": account.email,
            "username": account.username,
            "first_name": account.first_name,
            "last_name": account.last_name,
            "goal": account.goal,
            "subscription_plan": account.subscription_plan,
            "is_service_provider": account.is_service_provider,
            "service_verified": account.service_verified,
            "trust_score": account.trust_score,
        }
    })))
}

/// POST /api/auth/logout
pub async fn logout<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
) -> Json<Value>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    if let Some(cookie) = cookies.get(super::session::SESSION_COOKIE) {
        let _ = state.store.delete_auth_session(cookie.value());
    }
    super::session::clear_session_cookie(&cookies);

    Json(json!({"message": "Logged out"}))
}

/// GET /api/auth/me
///
/// Photos are deliberately left out here; they are loaded through the
/// profile endpoints instead.
pub async fn me<S, P, V>(
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
        "user": {
            "id": account.id.0,
            "email": account.email,
            "username": account.username,
            "first_name": account.first_name,
            "last_name": account.last_name,
            "age": account.age,
            "gender": account.gender,
            "city": account.city,
            "bio": account.bio,
            "goal": account.goal,
            "looking_for_gender": account.looking_for_gender,
            "age_min": account.age_min,
            "age_max": account.age_max,
            "subscription_plan": account.subscription_plan,
            "is_service_provider": account.is_service_provider,
            "service_verified": account.service_verified,
            "trust_score": account.trust_score,
            "identity_verified": account.identity_verified,
            "identity_verification_status": account.identity_verification_status,
            "identity_age_verified": account.identity_age_verified,
            "created_at": account.created_at.to_rfc3339(),
            "is_admin": account.is_admin,
        }
    })))
}
