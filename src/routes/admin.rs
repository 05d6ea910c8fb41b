//! Admin endpoints for account moderation

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_cookies::Cookies;

use crate::error::ApiError;
use crate::identity::IdentityVerifier;
use crate::payments::PaymentProvider;
use crate::state::AppState;
use crate::store::{Account, AccountId, Store, SubscriptionPlan};

const DEFAULT_PER_PAGE: usize = 50;
const MAX_PER_PAGE: usize = 200;

fn require_admin(account: &Account) -> Result<(), ApiError> {
    if !account.is_admin {
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }
    Ok(())
}

fn admin_user_json(user: &Account) -> Value {
    json!({
        "id": user.id.0,
        "email": user.email,
        "username": user.username,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "age": user.age,
        "gender": user.gender,
        "city": user.city,
        "goal": user.goal.as_str(),
        "subscription_plan": user.subscription_plan.as_str(),
        "trust_score": user.trust_score,
        "is_active": user.is_active,
        "is_banned": user.is_banned,
        "banned_reason": user.banned_reason,
        "is_admin": user.is_admin,
        "created_at": user.created_at.to_rfc3339(),
    })
}

#[derive(Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub search: Option<String>,
}

/// GET /api/admin/users?page=&per_page=&search=
pub async fn list_users<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    require_admin(&account)?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let search = query.search.as_deref().filter(|s| !s.is_empty());

    let accounts = state
        .store
        .list_accounts(search, per_page, (page - 1) * per_page)?;
    let users: Vec<Value> = accounts.iter().map(admin_user_json).collect();

    Ok(Json(json!({
        "users": users,
        "count": users.len(),
        "page": page,
        "per_page": per_page,
    })))
}

/// GET /api/admin/stats
pub async fn stats<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    require_admin(&account)?;

    let stats = state.store.platform_stats()?;

    Ok(Json(json!({
        "total_users": stats.total_users,
        "active_users": stats.active_users,
        "banned_users": stats.banned_users,
        "users_by_goal": stats.users_by_goal,
        "users_by_subscription": stats.users_by_subscription,
        "total_matches": stats.total_matches,
        "total_likes": stats.total_likes,
        "total_messages": stats.total_messages,
    })))
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub is_active: Option<bool>,
    pub is_banned: Option<bool>,
    pub banned_reason: Option<String>,
    pub trust_score: Option<i32>,
    pub subscription_plan: Option<String>,
}

/// PUT /api/admin/users/:user_id
///
/// Moderation edit of a limited field set. Unknown subscription plans and
/// out-of-range trust scores are rejected.
pub async fn update_user<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    require_admin(&account)?;

    let mut target = state
        .store
        .get_account(&AccountId(user_id))?
        .ok_or(ApiError::NotFound("User"))?;

    if let Some(is_active) = req.is_active {
        target.is_active = is_active;
    }
    if let Some(is_banned) = req.is_banned {
        target.is_banned = is_banned;
        if !is_banned {
            target.banned_reason = None;
        }
    }
    if let Some(reason) = req.banned_reason {
        target.banned_reason = Some(reason);
    }
    if let Some(score) = req.trust_score {
        if !(0..=100).contains(&score) {
            return Err(ApiError::Validation(
                "trust_score must be between 0 and 100".to_string(),
            ));
        }
        target.trust_score = score;
    }
    if let Some(plan) = req.subscription_plan.as_deref() {
        target.subscription_plan = SubscriptionPlan::from_str(plan)
            .ok_or_else(|| ApiError::Validation("Invalid subscription plan".to_string()))?;
    }

    target.updated_at = Utc::now();
    state.store.update_account(&target)?;

    tracing::info!(user = %target.id, admin = %account.id, "User updated by admin");

    Ok(Json(json!({
        "message": "User updated successfully",
        "user": admin_user_json(&target),
    })))
}

#[derive(Deserialize)]
pub struct BanRequest {
    pub reason: Option<String>,
}

/// POST /api/admin/users/:user_id/ban
pub async fn ban_user<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(user_id): Path<String>,
    Json(req): Json<BanRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    require_admin(&account)?;

    let mut target = state
        .store
        .get_account(&AccountId(user_id))?
        .ok_or(ApiError::NotFound("User"))?;

    target.is_banned = true;
    target.banned_reason = req.reason;
    target.updated_at = Utc::now();
    state.store.update_account(&target)?;

    tracing::info!(user = %target.id, admin = %account.id, "User banned");

    Ok(Json(json!({
        "message": "User banned",
        "user": {
            "id": target.id.0,
            "is_banned": target.is_banned,
            "banned_reason": target.banned_reason,
        }
    })))
}

/// POST /api/admin/users/:user_id/unban
pub async fn unban_user<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let account = super::session::require_user(&cookies, &state.store)?;
    require_admin(&account)?;

    let mut target = state
        .store
        .get_account(&AccountId(user_id))?
        .ok_or(ApiError::NotFound("User"))?;

    target.is_banned = false;
    target.banned_reason = None;
    target.updated_at = Utc::now();
    state.store.update_account(&target)?;

    tracing::info!(user = %target.id, admin = %account.id, "User unbanned");

    Ok(Json(json!({
        "message": "User unbanned",
        "user": {
            "id": target.id.0,
            "is_banned": target.is_banned,
        }
    })))
}
