//! Tests for synchronized watch-together sessions

mod common;

use common::{create_test_server, make_match, register, session_cookie, TestContext};
use serde_json::{json, Value};

async fn setup_match(ctx: &TestContext) -> (String, String, String) {
    let (session_a, id_a) = register(&ctx.server, "a@example.com", "alice").await;
    let (session_b, id_b) = register(&ctx.server, "b@example.com", "bob").await;
    let match_id = make_match(&ctx.server, &session_a, &id_a, &session_b, &id_b).await;
    (session_a, session_b, match_id)
}

async fn create_session(ctx: &TestContext, session: &str, match_id: &str) -> String {
    let response = ctx
        .server
        .post(&format!("/api/movie/{}/session", match_id))
        .add_cookie(session_cookie(session))
        .json(&json!({
            "movie_title": "Casablanca",
            "movie_url": "https://movies.example/casablanca.mp4",
        }))
        .await;
    assert_eq!(response.status_code(), 201, "{}", response.text());
    let body: Value = response.json();
    assert_eq!(body["session"]["status"], "selecting");
    body["session"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_no_session_yet_returns_null() {
    let ctx = create_test_server();
    let (session_a, _, match_id) = setup_match(&ctx).await;

    let response = ctx
        .server
        .get(&format!("/api/movie/{}/session", match_id))
        .add_cookie(session_cookie(&session_a))
        .await;

    assert_eq!(response.status_code(), 200);
    assert!(response.json::<Value>()["session"].is_null());
}

#[tokio::test]
async fn test_create_and_fetch_session() {
    let ctx = create_test_server();
    let (session_a, session_b, match_id) = setup_match(&ctx).await;

    let session_id = create_session(&ctx, &session_a, &match_id).await;

    // The other side sees the same session
    let response = ctx
        .server
        .get(&format!("/api/movie/{}/session", match_id))
        .add_cookie(session_cookie(&session_b))
        .await;
    let body: Value = response.json();
    assert_eq!(body["session"]["id"], session_id.as_str());
    assert_eq!(body["session"]["movie_title"], "Casablanca");
    assert_eq!(body["session"]["current_time"], 0.0);
    assert!(body["session"]["started_at"].is_null());
}

#[tokio::test]
async fn test_play_sets_started_at_once() {
    let ctx = create_test_server();
    let (session_a, _, match_id) = setup_match(&ctx).await;
    let session_id = create_session(&ctx, &session_a, &match_id).await;

    let url = format!("/api/movie/{}/session/{}", match_id, session_id);

    let response = ctx
        .server
        .put(&url)
        .add_cookie(session_cookie(&session_a))
        .json(&json!({"status": "playing"}))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["session"]["status"], "playing");

    let response = ctx
        .server
        .get(&format!("/api/movie/{}/session", match_id))
        .add_cookie(session_cookie(&session_a))
        .await;
    let started_at = response.json::<Value>()["session"]["started_at"].clone();
    assert!(started_at.is_string());

    // Pause and resume; started_at stays at the first play
    ctx.server
        .put(&url)
        .add_cookie(session_cookie(&session_a))
        .json(&json!({"status": "paused"}))
        .await;
    ctx.server
        .put(&url)
        .add_cookie(session_cookie(&session_a))
        .json(&json!({"status": "playing"}))
        .await;

    let response = ctx
        .server
        .get(&format!("/api/movie/{}/session", match_id))
        .add_cookie(session_cookie(&session_a))
        .await;
    assert_eq!(response.json::<Value>()["session"]["started_at"], started_at);
}

#[tokio::test]
async fn test_seek_updates_position() {
    let ctx = create_test_server();
    let (session_a, _, match_id) = setup_match(&ctx).await;
    let session_id = create_session(&ctx, &session_a, &match_id).await;
    let url = format!("/api/movie/{}/session/{}", match_id, session_id);

    ctx.server
        .put(&url)
        .add_cookie(session_cookie(&session_a))
        .json(&json!({"status": "playing"}))
        .await;

    let response = ctx
        .server
        .put(&url)
        .add_cookie(session_cookie(&session_a))
        .json(&json!({"current_time": 734.5}))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["session"]["current_time"], 734.5);
}

#[tokio::test]
async fn test_selecting_to_paused_rejected() {
    let ctx = create_test_server();
    let (session_a, _, match_id) = setup_match(&ctx).await;
    let session_id = create_session(&ctx, &session_a, &match_id).await;

    let response = ctx
        .server
        .put(&format!("/api/movie/{}/session/{}", match_id, session_id))
        .add_cookie(session_cookie(&session_a))
        .json(&json!({"status": "paused"}))
        .await;

    assert_eq!(response.status_code(), 409);
    assert_eq!(response.json::<Value>()["kind"], "conflict");
}

#[tokio::test]
async fn test_reasserting_status_is_idempotent() {
    let ctx = create_test_server();
    let (session_a, _, match_id) = setup_match(&ctx).await;
    let session_id = create_session(&ctx, &session_a, &match_id).await;
    let url = format!("/api/movie/{}/session/{}", match_id, session_id);

    ctx.server
        .put(&url)
        .add_cookie(session_cookie(&session_a))
        .json(&json!({"status": "playing"}))
        .await;

    let response = ctx
        .server
        .put(&url)
        .add_cookie(session_cookie(&session_a))
        .json(&json!({"status": "playing", "current_time": 10.0}))
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_ended_session_is_terminal() {
    let ctx = create_test_server();
    let (session_a, _, match_id) = setup_match(&ctx).await;
    let session_id = create_session(&ctx, &session_a, &match_id).await;
    let url = format!("/api/movie/{}/session/{}", match_id, session_id);

    let response = ctx
        .server
        .delete(&url)
        .add_cookie(session_cookie(&session_a))
        .await;
    assert_eq!(response.status_code(), 200);

    // Ending again is a no-op
    let response = ctx
        .server
        .delete(&url)
        .add_cookie(session_cookie(&session_a))
        .await;
    assert_eq!(response.status_code(), 200);

    // But any further update is refused
    let response = ctx
        .server
        .put(&url)
        .add_cookie(session_cookie(&session_a))
        .json(&json!({"status": "playing"}))
        .await;
    assert_eq!(response.status_code(), 409);

    let response = ctx
        .server
        .put(&url)
        .add_cookie(session_cookie(&session_a))
        .json(&json!({"current_time": 5.0}))
        .await;
    assert_eq!(response.status_code(), 409);
}

#[tokio::test]
async fn test_latest_session_wins() {
    let ctx = create_test_server();
    let (session_a, _, match_id) = setup_match(&ctx).await;

    let first = create_session(&ctx, &session_a, &match_id).await;
    ctx.server
        .delete(&format!("/api/movie/{}/session/{}", match_id, first))
        .add_cookie(session_cookie(&session_a))
        .await;
    let second = create_session(&ctx, &session_a, &match_id).await;

    let response = ctx
        .server
        .get(&format!("/api/movie/{}/session", match_id))
        .add_cookie(session_cookie(&session_a))
        .await;
    assert_eq!(response.json::<Value>()["session"]["id"], second.as_str());
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_outsider_cannot_touch_session() {
    let ctx = create_test_server();
    let (session_a, _, match_id) = setup_match(&ctx).await;
    let (session_c, _) = register(&ctx.server, "c@example.com", "carol").await;
    create_session(&ctx, &session_a, &match_id).await;

    let response = ctx
        .server
        .get(&format!("/api/movie/{}/session", match_id))
        .add_cookie(session_cookie(&session_c))
        .await;
    assert_eq!(response.status_code(), 404);
}
