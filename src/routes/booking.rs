//! Bookings and direct-charge payments
//!
//! Charges go straight onto the service provider's own Stripe account using
//! the secret key the provider registered. Providers without a key fall back
//! to a simulated test-mode payment so the booking flow stays usable in
//! development.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_cookies::Cookies;

use crate::error::ApiError;
use crate::identity::IdentityVerifier;
use crate::payments::{PaymentIntentRequest, PaymentProvider};
use crate::state::AppState;
use crate::store::{
    Account, AccountId, Booking, BookingRole, BookingStatus, PaymentStatus, Store,
};

const CURRENCY: &str = "rub";

fn require_provider(account: &Account) -> Result<(), ApiError> {
    if !account.is_service_provider {
        return Err(ApiError::Forbidden(
            "Only service providers can perform this action".to_string(),
        ));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct ProviderSetupRequest {
    pub stripe_key: Option<String>,
}

/// POST /api/payment/provider/setup
///
/// Validates the submitted secret key by fetching the account behind it,
/// then stores the key for direct charges.
pub async fn provider_setup<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Json(req): Json<ProviderSetupRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let mut account = super::session::require_user(&cookies, &state.store)?;
    require_provider(&account)?;

    let stripe_key = req
        .stripe_key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::Validation("Stripe secret key is required".to_string()))?;

    let provider_account = state
        .payments
        .retrieve_account(&stripe_key)
        .await
        .map_err(ApiError::Upstream)?;

    let verified = provider_account.charges_enabled && provider_account.payouts_enabled;

    account.provider_stripe_key = Some(stripe_key);
    account.stripe_account_id = Some(provider_account.id.clone());
    account.service_verified = verified;
    if let Some(name) = provider_account.business_name.clone() {
        account.business_name = Some(name);
    }
    account.updated_at = Utc::now();
    state.store.update_account(&account)?;

    tracing::info!(provider = %account.id, verified, "Payment account connected");

    Ok(Json(json!({
        "message": "Stripe account connected successfully",
        "account_id": provider_account.id,
        "verified": verified,
        "charges_enabled": provider_account.charges_enabled,
        "payouts_enabled": provider_account.payouts_enabled,
    })))
}

/// GET /api/payment/provider/stats
pub async fn provider_stats<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    require_provider(&account)?;

    let bookings = state
        .store
        .list_bookings(&account.id, BookingRole::Provider)?;

    let total_bookings = bookings.len();
    let completed_bookings = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Completed)
        .count();
    let total_earnings: f64 = bookings
        .iter()
        .filter(|b| b.payment_status == PaymentStatus::Paid)
        .map(|b| b.total_amount)
        .sum();
    let pending_earnings: f64 = bookings
        .iter()
        .filter(|b| b.payment_status == PaymentStatus::Pending)
        .map(|b| b.total_amount)
        .sum();

    // list_bookings returns newest first
    let mut recent = Vec::new();
    for booking in bookings.iter().take(10) {
        let client_name = state
            .store
            .get_account(&booking.client_id)?
            .map(|c| c.username)
            .unwrap_or_else(|| "Unknown".to_string());
        recent.push(json!({
            "id": booking.id,
            "client_name": client_name,
            "booking_date": booking.booking_date.to_rfc3339(),
            "duration_hours": booking.duration_hours,
            "total_amount": booking.total_amount,
            "status": booking.status.as_str(),
            "payment_status": booking.payment_status.as_str(),
            "created_at": booking.created_at.to_rfc3339(),
        }));
    }

    Ok(Json(json!({
        "total_bookings": total_bookings,
        "completed_bookings": completed_bookings,
        "total_earnings": total_earnings,
        "pending_earnings": pending_earnings,
        "hourly_rate": account.hourly_rate,
        "recent_bookings": recent,
        "stripe_connected": account.stripe_account_id.is_some(),
        "verified": account.service_verified,
    })))
}

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub provider_id: Option<String>,
    pub booking_date: Option<String>,
    pub duration_hours: Option<f64>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// POST /api/payment/bookings
pub async fn create_booking<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;

    let provider_id = req
        .provider_id
        .ok_or_else(|| ApiError::Validation("Missing required field: provider_id".to_string()))?;
    let booking_date = req
        .booking_date
        .ok_or_else(|| ApiError::Validation("Missing required field: booking_date".to_string()))?;
    let duration = req.duration_hours.ok_or_else(|| {
        ApiError::Validation("Missing required field: duration_hours".to_string())
    })?;

    if duration <= 0.0 {
        return Err(ApiError::Validation(
            "Duration must be positive".to_string(),
        ));
    }

    let booking_date = DateTime::parse_from_rfc3339(&booking_date)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ApiError::Validation("Invalid booking_date".to_string()))?;

    let provider = state
        .store
        .get_account(&AccountId(provider_id))?
        .filter(|p| p.is_service_provider)
        .ok_or(ApiError::NotFound("Provider"))?;

    let hourly_rate = provider
        .hourly_rate
        .filter(|r| *r > 0.0)
        .ok_or_else(|| ApiError::Validation("Provider has not set hourly rate".to_string()))?;

    // Rate and total are frozen at creation time
    let now = Utc::now();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        client_id: account.id,
        provider_id: provider.id,
        booking_date,
        duration_hours: duration,
        hourly_rate,
        total_amount: duration * hourly_rate,
        location: req.location,
        notes: req.notes,
        payment_intent_id: None,
        charge_id: None,
        payment_status: PaymentStatus::Pending,
        status: BookingStatus::Pending,
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
        confirmed_at: None,
        completed_at: None,
        cancelled_at: None,
    };
    state.store.create_booking(&booking)?;

    tracing::info!(booking = %booking.id, total = booking.total_amount, "Booking created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Booking created successfully",
            "booking": {
                "id": booking.id,
                "booking_date": booking.booking_date.to_rfc3339(),
                "duration_hours": booking.duration_hours,
                "total_amount": booking.total_amount,
                "status": booking.status.as_str(),
                "payment_status": booking.payment_status.as_str(),
            }
        })),
    ))
}

#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub role: Option<String>,
}

/// GET /api/payment/bookings?role=client|provider
pub async fn list_bookings<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;

    let role = match query.role.as_deref() {
        Some("provider") => BookingRole::Provider,
        _ => BookingRole::Client,
    };

    let mut bookings = Vec::new();
    for booking in state.store.list_bookings(&account.id, role)? {
        let other_id = match role {
            BookingRole::Client => &booking.provider_id,
            BookingRole::Provider => &booking.client_id,
        };
        let other_user = state.store.get_account(other_id)?.map(|u| {
            json!({
                "id": u.id.0,
                "username": u.username,
                "first_name": u.first_name,
            })
        });
        bookings.push(json!({
            "id": booking.id,
            "other_user": other_user,
            "booking_date": booking.booking_date.to_rfc3339(),
            "duration_hours": booking.duration_hours,
            "hourly_rate": booking.hourly_rate,
            "total_amount": booking.total_amount,
            "status": booking.status.as_str(),
            "payment_status": booking.payment_status.as_str(),
            "location": booking.location,
            "notes": booking.notes,
            "created_at": booking.created_at.to_rfc3339(),
        }));
    }

    Ok(Json(json!({"bookings": bookings, "count": bookings.len()})))
}

fn load_booking<S: Store>(store: &S, booking_id: &str) -> Result<Booking, ApiError> {
    store
        .get_booking(booking_id)?
        .ok_or(ApiError::NotFound("Booking"))
}

/// POST /api/payment/bookings/:booking_id/pay
///
/// Creates a payment intent on the provider's own account. Providers with no
/// registered key get a simulated intent instead.
pub async fn pay<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(booking_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let mut booking = load_booking(&state.store, &booking_id)?;

    if booking.client_id != account.id {
        return Err(ApiError::Forbidden(
            "Only the client can pay for a booking".to_string(),
        ));
    }
    if booking.payment_status == PaymentStatus::Paid {
        return Err(ApiError::Conflict("Booking already paid".to_string()));
    }

    let provider = state
        .store
        .get_account(&booking.provider_id)?
        .ok_or(ApiError::NotFound("Provider"))?;

    let Some(provider_key) = provider.provider_stripe_key.as_deref() else {
        tracing::warn!(booking = %booking.id, "Provider has no payment key, simulating intent");
        return Ok(Json(json!({
            "message": "Test mode - Payment intent simulated",
            "client_secret": format!("test_secret_{}", booking.id),
            "payment_intent_id": format!("test_pi_{}", booking.id),
            "amount": booking.total_amount,
            "currency": CURRENCY,
            "test_mode": true,
        })));
    };

    let amount_minor = (booking.total_amount * 100.0).round() as i64;
    let fee_minor =
        (amount_minor as f64 * state.config.platform_fee_percent / 100.0).round() as i64;

    let mut metadata = HashMap::new();
    metadata.insert("booking_id".to_string(), booking.id.clone());
    metadata.insert("client_id".to_string(), account.id.0.clone());
    metadata.insert("provider_id".to_string(), provider.id.0.clone());
    metadata.insert("platform".to_string(), "LoveMatch".to_string());
    // Fee is recorded for reporting only; nothing collects it yet
    metadata.insert("platform_fee_minor".to_string(), fee_minor.to_string());

    let intent = state
        .payments
        .create_payment_intent(
            provider_key,
            &PaymentIntentRequest {
                amount_minor,
                currency: CURRENCY.to_string(),
                description: format!("Booking #{} - {}", booking.id, provider.username),
                metadata,
            },
        )
        .await
        .map_err(ApiError::Upstream)?;

    booking.payment_intent_id = Some(intent.id.clone());
    booking.updated_at = Utc::now();
    state.store.update_booking(&booking)?;

    tracing::info!(booking = %booking.id, intent = %intent.id, "Payment intent created");

    Ok(Json(json!({
        "message": "Payment intent created",
        "client_secret": intent.client_secret,
        "payment_intent_id": intent.id,
        "amount": booking.total_amount,
        "currency": CURRENCY,
    })))
}

/// POST /api/payment/bookings/:booking_id/confirm-payment
pub async fn confirm_payment<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(booking_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let mut booking = load_booking(&state.store, &booking_id)?;

    if booking.client_id != account.id {
        return Err(ApiError::Forbidden(
            "Only the client can confirm payment".to_string(),
        ));
    }

    let intent_id = booking
        .payment_intent_id
        .clone()
        .ok_or_else(|| ApiError::Validation("No payment intent found".to_string()))?;

    let provider = state
        .store
        .get_account(&booking.provider_id)?
        .ok_or(ApiError::NotFound("Provider"))?;
    let provider_key = provider
        .provider_stripe_key
        .as_deref()
        .ok_or_else(|| ApiError::Validation("Provider has no payment key".to_string()))?;

    let intent = state
        .payments
        .retrieve_payment_intent(provider_key, &intent_id)
        .await
        .map_err(ApiError::Upstream)?;

    if intent.status != "succeeded" {
        return Err(ApiError::Validation(format!(
            "Payment not completed: {}",
            intent.status
        )));
    }

    booking.payment_status = PaymentStatus::Paid;
    booking.charge_id = intent.latest_charge;
    booking.updated_at = Utc::now();
    state.store.update_booking(&booking)?;

    Ok(Json(json!({
        "message": "Payment confirmed",
        "booking": {
            "id": booking.id,
            "payment_status": booking.payment_status.as_str(),
            "total_amount": booking.total_amount,
        }
    })))
}

/// POST /api/payment/bookings/:booking_id/confirm-payment-test
///
/// Marks the booking paid without talking to any payment provider.
pub async fn confirm_payment_test<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(booking_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let mut booking = load_booking(&state.store, &booking_id)?;

    if booking.client_id != account.id {
        return Err(ApiError::Forbidden(
            "Only the client can confirm payment".to_string(),
        ));
    }

    booking.payment_status = PaymentStatus::Paid;
    booking.updated_at = Utc::now();
    state.store.update_booking(&booking)?;

    Ok(Json(json!({
        "message": "Payment confirmed (test mode)",
        "booking": {
            "id": booking.id,
            "payment_status": booking.payment_status.as_str(),
            "total_amount": booking.total_amount,
            "status": booking.status.as_str(),
            "booking_date": booking.booking_date.to_rfc3339(),
        }
    })))
}

/// POST /api/payment/bookings/:booking_id/confirm
pub async fn confirm<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(booking_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let mut booking = load_booking(&state.store, &booking_id)?;

    if booking.provider_id != account.id {
        return Err(ApiError::Forbidden(
            "Only provider can confirm booking".to_string(),
        ));
    }
    if booking.payment_status != PaymentStatus::Paid {
        return Err(ApiError::Validation(
            "Booking must be paid before confirmation".to_string(),
        ));
    }

    booking.status = BookingStatus::Confirmed;
    booking.confirmed_at = Some(Utc::now());
    booking.updated_at = Utc::now();
    state.store.update_booking(&booking)?;

    Ok(Json(json!({
        "message": "Booking confirmed",
        "booking": {
            "id": booking.id,
            "status": booking.status.as_str(),
            "confirmed_at": booking.confirmed_at.map(|t| t.to_rfc3339()),
        }
    })))
}

/// POST /api/payment/bookings/:booking_id/complete
pub async fn complete<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(booking_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let mut booking = load_booking(&state.store, &booking_id)?;

    if booking.provider_id != account.id {
        return Err(ApiError::Forbidden(
            "Only provider can complete booking".to_string(),
        ));
    }

    booking.status = BookingStatus::Completed;
    booking.completed_at = Some(Utc::now());
    booking.updated_at = Utc::now();
    state.store.update_booking(&booking)?;

    Ok(Json(json!({
        "message": "Booking completed",
        "booking": {
            "id": booking.id,
            "status": booking.status.as_str(),
            "completed_at": booking.completed_at.map(|t| t.to_rfc3339()),
        }
    })))
}

#[derive(Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

/// POST /api/payment/bookings/:booking_id/cancel
pub async fn cancel<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(booking_id): Path<String>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let mut booking = load_booking(&state.store, &booking_id)?;

    if booking.client_id != account.id && booking.provider_id != account.id {
        return Err(ApiError::Forbidden(
            "Only the client or provider can cancel a booking".to_string(),
        ));
    }
    if booking.status == BookingStatus::Completed {
        return Err(ApiError::Conflict(
            "Completed bookings cannot be cancelled".to_string(),
        ));
    }
    if booking.status == BookingStatus::Cancelled {
        return Err(ApiError::Conflict(
            "Booking is already cancelled".to_string(),
        ));
    }

    booking.status = BookingStatus::Cancelled;
    booking.cancellation_reason = req.reason;
    booking.cancelled_at = Some(Utc::now());
    booking.updated_at = Utc::now();
    state.store.update_booking(&booking)?;

    tracing::info!(booking = %booking.id, by = %account.id, "Booking cancelled");

    Ok(Json(json!({
        "message": "Booking cancelled",
        "booking": {
            "id": booking.id,
            "status": booking.status.as_str(),
            "cancelled_at": booking.cancelled_at.map(|t| t.to_rfc3339()),
        }
    })))
}
