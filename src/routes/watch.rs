//! Synchronized watch-together sessions for a matched pair

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
use crate::store::{MatchId, Store, WatchSession, WatchStatus};

/// GET /api/movie/:match_id/session
///
/// Latest session for the match, or `session: null` when the pair has never
/// started one.
pub async fn get_session<S, P, V>(
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
    super::session::require_match_member(&state.store, &match_id, &account.id)?;

    let session = match state.store.latest_watch_session(&match_id)? {
        Some(session) => json!({
            "id": session.id,
            "movie_title": session.movie_title,
            "movie_url": session.movie_url,
            "movie_thumbnail": session.movie_thumbnail,
            "status": session.status.as_str(),
            "current_time": session.current_time,
            "started_by": session.started_by.0,
            "started_at": session.started_at.map(|t| t.to_rfc3339()),
            "created_at": session.created_at.to_rfc3339(),
        }),
        None => Value::Null,
    };

    Ok(Json(json!({"session": session})))
}

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub movie_title: Option<String>,
    pub movie_url: Option<String>,
    pub movie_thumbnail: Option<String>,
}

/// POST /api/movie/:match_id/session
pub async fn create_session<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(match_id): Path<String>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let match_id = MatchId(match_id);
    super::session::require_match_member(&state.store, &match_id, &account.id)?;

    let now = Utc::now();
    let session = WatchSession {
        id: uuid::Uuid::new_v4().to_string(),
        match_id,
        movie_title: req.movie_title,
        movie_url: req.movie_url,
        movie_thumbnail: req.movie_thumbnail,
        status: WatchStatus::Selecting,
        current_time: 0.0,
        started_by: account.id,
        started_at: None,
        ended_at: None,
        created_at: now,
        updated_at: now,
    };
    state.store.create_watch_session(&session)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Movie session created",
            "session": {
                "id": session.id,
                "movie_title": session.movie_title,
                "movie_url": session.movie_url,
                "status": session.status.as_str(),
            }
        })),
    ))
}

#[derive(Deserialize)]
pub struct UpdateSessionRequest {
    pub status: Option<String>,
    pub current_time: Option<f64>,
    pub movie_title: Option<String>,
    pub movie_url: Option<String>,
    pub movie_thumbnail: Option<String>,
}

/// PUT /api/movie/:match_id/session/:session_id
///
/// Play/pause/seek updates. Status changes must follow the allowed
/// transition graph; an ended session rejects everything.
pub async fn update_session<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path((match_id, session_id)): Path<(String, String)>,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let match_id = MatchId(match_id);
    super::session::require_match_member(&state.store, &match_id, &account.id)?;

    let mut session = state
        .store
        .get_watch_session(&session_id, &match_id)?
        .ok_or(ApiError::NotFound("Session"))?;

    if session.status == WatchStatus::Ended {
        return Err(ApiError::Conflict("Session has ended".to_string()));
    }

    if let Some(raw) = req.status.as_deref() {
        let next = WatchStatus::from_str(raw)
            .ok_or_else(|| ApiError::Validation(format!("Invalid status: {}", raw)))?;
        if !session.status.can_transition(next) {
            return Err(ApiError::Conflict(format!(
                "Cannot transition from {} to {}",
                session.status.as_str(),
                next.as_str()
            )));
        }
        session.status = next;
        if next == WatchStatus::Playing && session.started_at.is_none() {
            session.started_at = Some(Utc::now());
        } else if next == WatchStatus::Ended {
            session.ended_at = Some(Utc::now());
        }
    }

    if let Some(position) = req.current_time {
        session.current_time = position;
    }
    if let Some(title) = req.movie_title {
        session.movie_title = Some(title);
    }
    if let Some(url) = req.movie_url {
        session.movie_url = Some(url);
    }
    if let Some(thumbnail) = req.movie_thumbnail {
        session.movie_thumbnail = Some(thumbnail);
    }

    session.updated_at = Utc::now();
    state.store.update_watch_session(&session)?;

    Ok(Json(json!({
        "message": "Session updated",
        "session": {
            "id": session.id,
            "status": session.status.as_str(),
            "current_time": session.current_time,
            "updated_at": session.updated_at.to_rfc3339(),
        }
    })))
}

/// DELETE /api/movie/:match_id/session/:session_id
pub async fn end_session<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path((match_id, session_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    let match_id = MatchId(match_id);
    super::session::require_match_member(&state.store, &match_id, &account.id)?;

    let mut session = state
        .store
        .get_watch_session(&session_id, &match_id)?
        .ok_or(ApiError::NotFound("Session"))?;

    if session.status != WatchStatus::Ended {
        session.status = WatchStatus::Ended;
        session.ended_at = Some(Utc::now());
        session.updated_at = Utc::now();
        state.store.update_watch_session(&session)?;
    }

    Ok(Json(json!({"message": "Session ended"})))
}
