//! HTTP routes for the platform

mod admin;
mod auth;
mod booking;
mod chat;
mod matching;
mod profile;
pub(crate) mod session;
mod verification;
mod video;
mod watch;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::identity::IdentityVerifier;
use crate::payments::PaymentProvider;
use crate::state::AppState;
use crate::store::Store;

/// Create the router with all routes
pub fn create_router<S, P, V>(state: Arc<AppState<S, P, V>>) -> Router
where
    S: Store + 'static,
    P: PaymentProvider,
    V: IdentityVerifier,
{
    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/user/profile", put(profile::update_profile))
        .route("/api/user/:user_id", get(profile::get_profile))
        .route("/api/match/discover", get(matching::discover))
        .route("/api/match/like", post(matching::like))
        .route("/api/match/pass", post(matching::pass))
        .route("/api/match/matches", get(matching::list_matches))
        .route("/api/match/likes/incoming", get(matching::incoming_likes))
        .route(
            "/api/chat/:match_id/messages",
            get(chat::list_messages).post(chat::send_message),
        )
        .route("/api/chat/:match_id/room", get(chat::room_info))
        .route(
            "/api/movie/:match_id/session",
            get(watch::get_session).post(watch::create_session),
        )
        .route(
            "/api/movie/:match_id/session/:session_id",
            put(watch::update_session).delete(watch::end_session),
        )
        .route("/api/payment/provider/setup", post(booking::provider_setup))
        .route("/api/payment/provider/stats", get(booking::provider_stats))
        .route(
            "/api/payment/bookings",
            get(booking::list_bookings).post(booking::create_booking),
        )
        .route("/api/payment/bookings/:booking_id/pay", post(booking::pay))
        .route(
            "/api/payment/bookings/:booking_id/confirm-payment",
            post(booking::confirm_payment),
        )
        .route(
            "/api/payment/bookings/:booking_id/confirm-payment-test",
            post(booking::confirm_payment_test),
        )
        .route(
            "/api/payment/bookings/:booking_id/confirm",
            post(booking::confirm),
        )
        .route(
            "/api/payment/bookings/:booking_id/complete",
            post(booking::complete),
        )
        .route(
            "/api/payment/bookings/:booking_id/cancel",
            post(booking::cancel),
        )
        .route("/api/verification/status", get(verification::status))
        .route(
            "/api/verification/create-session",
            post(verification::create_session),
        )
        .route(
            "/api/verification/check-session/:session_id",
            get(verification::check_session),
        )
        .route("/api/verification/webhook", post(verification::webhook))
        .route(
            "/api/verification/require-check",
            get(verification::require_check),
        )
        .route("/api/video/call/initiate", post(video::initiate))
        .route("/api/video/call/offer", post(video::offer))
        .route("/api/video/call/answer", post(video::answer))
        .route("/api/video/call/ice-candidate", post(video::ice_candidate))
        .route("/api/video/call/poll", get(video::poll))
        .route("/api/video/call/end", post(video::end))
        .route("/api/video/call/status", get(video::status))
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:user_id", put(admin::update_user))
        .route("/api/admin/users/:user_id/ban", post(admin::ban_user))
        .route("/api/admin/users/:user_id/unban", post(admin::unban_user))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
