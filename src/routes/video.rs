//! WebRTC call signaling endpoints
//!
//! The server only relays session descriptions and ICE candidates between
//! the two sides of a match; media flows peer to peer. Rooms live in memory
//! and expire after a period of inactivity.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_cookies::Cookies;

use crate::error::ApiError;
use crate::identity::IdentityVerifier;
use crate::payments::PaymentProvider;
use crate::state::AppState;
use crate::store::{Account, Interaction, MatchId, Store};

fn member_interaction<S: Store>(
    store: &S,
    match_id: &str,
    account: &Account,
) -> Result<Interaction, ApiError> {
    super::session::require_match_member(store, &MatchId(match_id.to_string()), &account.id)
}

#[derive(Deserialize)]
pub struct InitiateRequest {
    pub match_id: Option<String>,
}

/// POST /api/video/call/initiate
pub async fn initiate<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Json(req): Json<InitiateRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let match_id = req
        .match_id
        .ok_or_else(|| ApiError::Validation("Match ID is required".to_string()))?;
    member_interaction(&state.store, &match_id, &account)?;

    state.signaling.initiate(&match_id, &account.id);

    tracing::info!(call = %match_id, by = %account.id, "Call initiated");

    Ok(Json(json!({
        "message": "Call initiated",
        "match_id": match_id,
        "call_id": match_id,
    })))
}

#[derive(Deserialize)]
pub struct OfferRequest {
    pub match_id: Option<String>,
    pub offer: Option<Value>,
}

/// POST /api/video/call/offer
pub async fn offer<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Json(req): Json<OfferRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let (match_id, offer) = match (req.match_id, req.offer) {
        (Some(m), Some(o)) => (m, o),
        _ => {
            return Err(ApiError::Validation(
                "Match ID and offer are required".to_string(),
            ))
        }
    };
    member_interaction(&state.store, &match_id, &account)?;

    state.signaling.put_offer(&match_id, &account.id, offer);

    Ok(Json(json!({"message": "Offer sent successfully"})))
}

#[derive(Deserialize)]
pub struct AnswerRequest {
    pub match_id: Option<String>,
    pub answer: Option<Value>,
}

/// POST /api/video/call/answer
pub async fn answer<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let (match_id, answer) = match (req.match_id, req.answer) {
        (Some(m), Some(a)) => (m, a),
        _ => {
            return Err(ApiError::Validation(
                "Match ID and answer are required".to_string(),
            ))
        }
    };
    member_interaction(&state.store, &match_id, &account)?;

    state.signaling.put_answer(&match_id, &account.id, answer);

    Ok(Json(json!({"message": "Answer sent successfully"})))
}

#[derive(Deserialize)]
pub struct IceCandidateRequest {
    pub match_id: Option<String>,
    pub candidate: Option<Value>,
}

/// POST /api/video/call/ice-candidate
pub async fn ice_candidate<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Json(req): Json<IceCandidateRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let (match_id, candidate) = match (req.match_id, req.candidate) {
        (Some(m), Some(c)) => (m, c),
        _ => {
            return Err(ApiError::Validation(
                "Match ID and candidate are required".to_string(),
            ))
        }
    };
    member_interaction(&state.store, &match_id, &account)?;

    state
        .signaling
        .put_ice_candidate(&match_id, &account.id, candidate);

    Ok(Json(json!({"message": "ICE candidate sent successfully"})))
}

#[derive(Deserialize)]
pub struct CallQuery {
    pub match_id: Option<String>,
}

/// GET /api/video/call/poll?match_id=
///
/// Returns whatever the counterpart peer has published so far.
pub async fn poll<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Query(query): Query<CallQuery>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let match_id = query
        .match_id
        .ok_or_else(|| ApiError::Validation("Match ID is required".to_string()))?;
    let interaction = member_interaction(&state.store, &match_id, &account)?;

    let other = interaction.counterpart(&account.id);
    let signals = state.signaling.poll(&match_id, other);

    Ok(Json(json!({
        "offer": signals.offer,
        "answer": signals.answer,
        "ice_candidates": signals.ice_candidates,
    })))
}

/// POST /api/video/call/end
pub async fn end<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Json(req): Json<InitiateRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let match_id = req
        .match_id
        .ok_or_else(|| ApiError::Validation("Match ID is required".to_string()))?;
    member_interaction(&state.store, &match_id, &account)?;

    state.signaling.end(&match_id);

    Ok(Json(json!({"message": "Call ended successfully"})))
}

/// GET /api/video/call/status?match_id=
pub async fn status<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Query(query): Query<CallQuery>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let match_id = query
        .match_id
        .ok_or_else(|| ApiError::Validation("Match ID is required".to_string()))?;
    member_interaction(&state.store, &match_id, &account)?;

    let status = state.signaling.status(&match_id);

    Ok(Json(json!({
        "active": status.active,
        "initiator": status.initiator.map(|id| id.0),
        "started_at": status.started_at.map(|t| t.to_rfc3339()),
        "participants": status.participants,
    })))
}
