//! Profile endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_cookies::Cookies;

use crate::error::ApiError;
use crate::identity::IdentityVerifier;
use crate::payments::PaymentProvider;
use crate::state::AppState;
use crate::store::{AccountId, Store};

#[derive(Deserialize, Default)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub bio: Option<String>,
    pub looking_for_gender: Option<String>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub photos: Option<Vec<String>>,
    pub hourly_rate: Option<f64>,
    pub business_name: Option<String>,
}

/// PUT /api/user/profile
pub async fn update_profile<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let mut account = super::session::require_user(&cookies, &state.store)?;

    if let Some(first_name) = req.first_name {
        account.first_name = Some(first_name);
    }
    if let Some(last_name) = req.last_name {
        account.last_name = Some(last_name);
    }
    if let Some(age) = req.age {
        if !(18..=100).contains(&age) {
            return Err(ApiError::Validation(
                "Age must be between 18 and 100".to_string(),
            ));
        }
        account.age = Some(age);
    }
    if let Some(gender) = req.gender {
        account.gender = Some(gender);
    }
    if let Some(city) = req.city {
        account.city = Some(city);
    }
    if let Some(bio) = req.bio {
        account.bio = Some(bio);
    }
    if let Some(looking_for_gender) = req.looking_for_gender {
        account.looking_for_gender = Some(looking_for_gender);
    }
    if let Some(age_min) = req.age_min {
        account.age_min = Some(age_min);
    }
    if let Some(age_max) = req.age_max {
        account.age_max = Some(age_max);
    }
    if let Some(photos) = req.photos {
        account.photos = photos;
    }
    if account.is_service_provider {
        if let Some(hourly_rate) = req.hourly_rate {
            account.hourly_rate = Some(hourly_rate);
        }
        if let Some(business_name) = req.business_name {
            account.business_name = Some(business_name);
        }
    }

    account.updated_at = Utc::now();
    state.store.update_account(&account)?;

    Ok(Json(json!({
        "message": "Profile updated",
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
            "looking_for_gender": account.looking_for_gender,
            "age_min": account.age_min,
            "age_max": account.age_max,
            "photos": account.photos,
            "subscription_plan": account.subscription_plan,
            "trust_score": account.trust_score,
        }
    })))
}

/// GET /api/user/:user_id
///
/// Full profile view, including whether the caller is matched with the
/// requested user.
pub async fn get_profile<S, P, V>(
    State(state): State<Arc<AppState<S, P, V>>>,
    cookies: Cookies,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
    S: Store,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    let caller = super::session::require_user(&cookies, &state.store)?;

    let target_id = AccountId(user_id);
    let target = state
        .store
        .get_account(&target_id)?
        .ok_or(ApiError::NotFound("User"))?;

    let matched = state.store.find_match_between(&caller.id, &target_id)?;

    Ok(Json(json!({
        "user": {
            "id": target.id.0,
            "username": target.username,
            "first_name": target.first_name,
            "last_name": target.last_name,
            "age": target.age,
            "gender": target.gender,
            "city": target.city,
            "bio": target.bio,
            "photos": target.photos,
            "goal": target.goal,
            "subscription_plan": target.subscription_plan,
            "trust_score": target.trust_score,
            "is_service_provider": target.is_service_provider,
            "service_verified": target.service_verified,
            "hourly_rate": if target.is_service_provider { target.hourly_rate } else { None },
            "last_active": target.last_active.to_rfc3339(),
            "created_at": target.created_at.to_rfc3339(),
        },
        "match_id": matched.as_ref().map(|m| m.id.0.clone()),
        "is_matched": matched.is_some(),
    })))
}
