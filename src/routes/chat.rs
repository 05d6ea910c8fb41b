//! Chat endpoints scoped to a matched pair

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_cookies::Cookies;

use crate::error::ApiError;
use crate::identity::IdentityVerifier;
use crate::payments::PaymentProvider;
use crate::state::AppState;
use crate::store::{Account, MatchId, Message, Store, SubscriptionPlan};

fn display_name(account: &Account) -> String {
    account
        .first_name
        .clone()
        .unwrap_or_else(|| account.username.clone())
}

fn message_json<S: Store>(store: &S, message: &Message) -> Result<Value, ApiError> {
    let sender_name = match store.get_account(&message.sender_id)? {
        Some(sender) => display_name(&sender),
        None => "Unknown".to_string(),
    };
    Ok(json!({
        "id": message.id,
        "message": message.body,
        "sender_id": message.sender_id.0,
        "sender_name": sender_name,
        "is_read": message.is_read,
        "created_at": message.created_at.to_rfc3339(),
    }))
}

/// GET /api/chat/:match_id/messages
///
/// Returns the full history oldest-first and marks everything addressed to
/// the caller as read.
pub async fn list_messages<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(match_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let match_id = MatchId(match_id);
    let interaction = super::session::require_match_member(&state.store, &match_id, &account.id)?;

    state.store.mark_messages_read(&match_id, &account.id)?;

    let mut messages = Vec::new();
    for message in state.store.list_messages(&match_id)? {
        messages.push(message_json(&state.store, &message)?);
    }

    let other = state
        .store
        .get_account(interaction.counterpart(&account.id))?;
    let other_user = other.map(|u| {
        json!({
            "id": u.id.0,
            "username": u.username,
            "first_name": u.first_name,
            "last_name": u.last_name,
            "photos": u.photos,
            "trust_score": u.trust_score,
        })
    });

    Ok(Json(json!({
        "messages": messages,
        "match_id": match_id.0,
        "other_user": other_user,
    })))
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub message: Option<String>,
}

/// POST /api/chat/:match_id/messages
pub async fn send_message<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(match_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;

    let body = req
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::Validation("Message is required".to_string()))?;

    let match_id = MatchId(match_id);
    super::session::require_match_member(&state.store, &match_id, &account.id)?;

    let message = Message {
        id: uuid::Uuid::new_v4().to_string(),
        match_id: match_id.clone(),
        sender_id: account.id.clone(),
        body,
        is_read: false,
        created_at: Utc::now(),
    };
    state.store.create_message(&message)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": {
                "id": message.id,
                "message": message.body,
                "sender_id": message.sender_id.0,
                "sender_name": display_name(&account),
                "is_read": message.is_read,
                "created_at": message.created_at.to_rfc3339(),
            }
        })),
    ))
}

/// GET /api/chat/:match_id/room
///
/// Room metadata for a match, including which shared features the pair can
/// use.
pub async fn room_info<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(match_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let match_id = MatchId(match_id);
    let interaction = super::session::require_match_member(&state.store, &match_id, &account.id)?;

    let user1 = state
        .store
        .get_account(&interaction.sender_id)?
        .ok_or(ApiError::NotFound("User"))?;
    let user2 = state
        .store
        .get_account(&interaction.receiver_id)?
        .ok_or(ApiError::NotFound("User"))?;

    let room_user = |u: &Account| {
        json!({
            "id": u.id.0,
            "username": u.username,
            "first_name": u.first_name,
            "photos": u.photos,
            "subscription_plan": u.subscription_plan.as_str(),
        })
    };

    let video_chat = user1.subscription_plan == SubscriptionPlan::Premium
        || user2.subscription_plan == SubscriptionPlan::Premium;

    Ok(Json(json!({
        "match_id": match_id.0,
        "created_at": interaction.created_at.to_rfc3339(),
        "users": [room_user(&user1), room_user(&user2)],
        "features": {
            "chat": true,
            "movie_theater": true,
            "date_planning": true,
            "video_chat": video_chat,
        },
    })))
}
