//! Cookie session helpers shared by all route modules

use tower_cookies::{Cookie, Cookies};

use crate::error::ApiError;
use crate::store::{Account, AccountId, Interaction, InteractionStatus, MatchId, Store};

pub const SESSION_COOKIE: &str = "lovematch_session";

/// Resolve the calling account from the session cookie.
///
/// Banned and deactivated accounts can hold a valid session but are refused
/// everywhere, so the check lives here rather than in each handler.
pub fn require_user<S: Store>(cookies: &Cookies, store: &S) -> Result<Account, ApiError> {
    let token = cookies
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::NotAuthenticated)?;

    let session = store
        .get_auth_session(&token)?
        .ok_or(ApiError::NotAuthenticated)?;

    let account = store
        .get_account(&session.account_id)?
        .ok_or(ApiError::NotAuthenticated)?;

    if !account.is_active {
        return Err(ApiError::Forbidden("Account is deactivated".to_string()));
    }
    if account.is_banned {
        let reason = account.banned_reason.as_deref().unwrap_or("unspecified");
        return Err(ApiError::Forbidden(format!("Account is banned: {}", reason)));
    }

    Ok(account)
}

/// Load a matched interaction and check the caller is one of its two sides.
pub fn require_match_member<S: Store>(
    store: &S,
    match_id: &MatchId,
    caller: &AccountId,
) -> Result<Interaction, ApiError> {
    let interaction = store
        .get_interaction(match_id)?
        .ok_or(ApiError::NotFound("Match"))?;
    if interaction.status != InteractionStatus::Matched || !interaction.involves(caller) {
        return Err(ApiError::NotFound("Match"));
    }
    Ok(interaction)
}

/// Helper to set the session cookie
pub fn set_session_cookie(cookies: &Cookies, token: &str) {
    let cookie = Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .build();
    cookies.add(cookie);
}

/// Helper to clear the session cookie
pub fn clear_session_cookie(cookies: &Cookies) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(tower_cookies::cookie::time::Duration::ZERO)
        .build();
    cookies.add(cookie);
}
