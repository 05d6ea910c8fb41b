//! Swipe and match endpoints

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
use crate::store::{AccountId, Goal, ProfilePreview, Store, SwipeKind};

const DISCOVER_LIMIT: usize = 50;

#[derive(Deserialize)]
pub struct DiscoverQuery {
    pub category: Option<String>,
}

/// GET /api/match/discover?category=
pub async fn discover<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Query(query): Query<DiscoverQuery>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;

    // Category override lets a user browse outside their own goal
    let category = match query.category.as_deref() {
        Some(raw) => Goal::from_str(raw)
            .ok_or_else(|| ApiError::Validation("Invalid category".to_string()))?,
        None => account.goal,
    };

    let candidates = state.store.discover(&account, category, DISCOVER_LIMIT)?;
    let users: Vec<ProfilePreview> = candidates.iter().map(ProfilePreview::from).collect();

    Ok(Json(json!({"users": users, "count": users.len()})))
}

#[derive(Deserialize)]
pub struct SwipeRequest {
    pub user_id: String,
}

/// POST /api/match/like
pub async fn like<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Json(req): Json<SwipeRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;

    let target_id = AccountId(req.user_id);
    if state.store.get_account(&target_id)?.is_none() {
        return Err(ApiError::NotFound("User"));
    }

    let outcome = state
        .store
        .record_swipe(&account.id, &target_id, SwipeKind::Like)?;

    if outcome.is_match {
        tracing::info!(a = %account.id, b = %target_id, "New mutual match");
    }

    Ok(Json(json!({
        "message": "User liked",
        "is_match": outcome.is_match,
        "match_id": outcome.match_id.0,
    })))
}

/// POST /api/match/pass
pub async fn pass<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Json(req): Json<SwipeRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;

    let target_id = AccountId(req.user_id);
    if state.store.get_account(&target_id)?.is_none() {
        return Err(ApiError::NotFound("User"));
    }

    state
        .store
        .record_swipe(&account.id, &target_id, SwipeKind::Pass)?;

    Ok(Json(json!({"message": "User passed"})))
}

/// GET /api/match/matches
pub async fn list_matches<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;

    let mut matches = Vec::new();
    for interaction in state.store.list_matches(&account.id)? {
        let other_id = interaction.counterpart(&account.id);
        if let Some(other) = state.store.get_account(other_id)? {
            matches.push(json!({
                "match_id": interaction.id.0,
                "matched_at": interaction.created_at.to_rfc3339(),
                "user": ProfilePreview::from(&other),
            }));
        }
    }

    Ok(Json(json!({"matches": matches, "count": matches.len()})))
}

/// GET /api/match/likes/incoming
pub async fn incoming_likes<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;

    let mut likes = Vec::new();
    for interaction in state.store.list_incoming_likes(&account.id)? {
        if let Some(sender) = state.store.get_account(&interaction.sender_id)? {
            likes.push(json!({
                "match_id": interaction.id.0,
                "liked_at": interaction.created_at.to_rfc3339(),
                "user": ProfilePreview::from(&sender),
            }));
        }
    }

    Ok(Json(json!({"likes": likes, "count": likes.len()})))
}
