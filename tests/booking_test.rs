//! Tests for bookings and direct-charge payments

mod common;

use common::{create_test_server, register, register_provider, session_cookie, TestContext};
use serde_json::{json, Value};

async fn create_booking(ctx: &TestContext, client: &str, provider_id: &str) -> String {
    let response = ctx
        .server
        .post("/api/payment/bookings")
        .add_cookie(session_cookie(client))
        .json(&json!({
            "provider_id": provider_id,
            "booking_date": "2026-09-15T18:00:00Z",
            "duration_hours": 2.0,
        }))
        .await;
    assert_eq!(response.status_code(), 201, "{}", response.text());
    response.json::<Value>()["booking"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_booking_freezes_rate_and_total() {
    let ctx = create_test_server();
    let (client, _) = register(&ctx.server, "client@example.com", "pavel").await;
    let (_, provider_id) =
        register_provider(&ctx.server, "vera@example.com", "vera", 5000.0).await;

    let response = ctx
        .server
        .post("/api/payment/bookings")
        .add_cookie(session_cookie(&client))
        .json(&json!({
            "provider_id": provider_id,
            "booking_date": "2026-09-15T18:00:00Z",
            "duration_hours": 2.0,
        }))
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    assert_eq!(body["booking"]["total_amount"], 10000.0);
    assert_eq!(body["booking"]["status"], "pending");
    assert_eq!(body["booking"]["payment_status"], "pending");
}

#[tokio::test]
async fn test_booking_requires_provider_with_rate() {
    let ctx = create_test_server();
    let (client, _) = register(&ctx.server, "client@example.com", "pavel").await;
    let (_, plain_id) = register(&ctx.server, "bob@example.com", "bob").await;

    // A non-provider target is not bookable
    let response = ctx
        .server
        .post("/api/payment/bookings")
        .add_cookie(session_cookie(&client))
        .json(&json!({
            "provider_id": plain_id,
            "booking_date": "2026-09-15T18:00:00Z",
            "duration_hours": 1.0,
        }))
        .await;
    assert_eq!(response.status_code(), 404);

    let response = ctx
        .server
        .post("/api/payment/bookings")
        .add_cookie(session_cookie(&client))
        .json(&json!({"provider_id": plain_id}))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_full_test_mode_payment_flow() {
    // Provider without a Stripe key: the booking runs the whole lifecycle
    // on the simulated payment path.
    let ctx = create_test_server();
    let (client, _) = register(&ctx.server, "client@example.com", "pavel").await;
    let (provider, provider_id) =
        register_provider(&ctx.server, "vera@example.com", "vera", 5000.0).await;

    let booking_id = create_booking(&ctx, &client, &provider_id).await;

    // Pay falls back to test mode
    let response = ctx
        .server
        .post(&format!("/api/payment/bookings/{}/pay", booking_id))
        .add_cookie(session_cookie(&client))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["test_mode"], true);
    assert_eq!(
        body["client_secret"],
        format!("test_secret_{}", booking_id)
    );
    assert_eq!(body["amount"], 10000.0);

    // Test-mode confirmation marks it paid
    let response = ctx
        .server
        .post(&format!(
            "/api/payment/bookings/{}/confirm-payment-test",
            booking_id
        ))
        .add_cookie(session_cookie(&client))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["booking"]["payment_status"], "paid");

    // Provider confirms, then completes
    let response = ctx
        .server
        .post(&format!("/api/payment/bookings/{}/confirm", booking_id))
        .add_cookie(session_cookie(&provider))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["booking"]["status"], "confirmed");

    let response = ctx
        .server
        .post(&format!("/api/payment/bookings/{}/complete", booking_id))
        .add_cookie(session_cookie(&provider))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["booking"]["status"], "completed");
}

#[tokio::test]
async fn test_provider_setup_and_real_payment_flow() {
    let ctx = create_test_server();
    let (client, _) = register(&ctx.server, "client@example.com", "pavel").await;
    let (provider, provider_id) =
        register_provider(&ctx.server, "vera@example.com", "vera", 5000.0).await;

    // Provider connects a payment account
    let response = ctx
        .server
        .post("/api/payment/provider/setup")
        .add_cookie(session_cookie(&provider))
        .json(&json!({"stripe_key": "sk_test_vera"}))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    let body: Value = response.json();
    assert_eq!(body["account_id"], "acct_mock");
    assert_eq!(body["verified"], true);

    let booking_id = create_booking(&ctx, &client, &provider_id).await;

    // Pay creates a real intent on the provider's account
    let response = ctx
        .server
        .post(&format!("/api/payment/bookings/{}/pay", booking_id))
        .add_cookie(session_cookie(&client))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert!(body.get("test_mode").is_none());
    let intent_id = body["payment_intent_id"].as_str().unwrap().to_string();

    // Confirming before the charge succeeds fails
    let response = ctx
        .server
        .post(&format!(
            "/api/payment/bookings/{}/confirm-payment",
            booking_id
        ))
        .add_cookie(session_cookie(&client))
        .await;
    assert_eq!(response.status_code(), 400);

    // Client completes the charge, then confirms
    ctx.payments.mark_succeeded(&intent_id);
    let response = ctx
        .server
        .post(&format!(
            "/api/payment/bookings/{}/confirm-payment",
            booking_id
        ))
        .add_cookie(session_cookie(&client))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["booking"]["payment_status"], "paid");
}

#[tokio::test]
async fn test_provider_setup_rejects_bad_key() {
    let ctx = create_test_server();
    let (provider, _) =
        register_provider(&ctx.server, "vera@example.com", "vera", 5000.0).await;

    let response = ctx
        .server
        .post("/api/payment/provider/setup")
        .add_cookie(session_cookie(&provider))
        .json(&json!({"stripe_key": "sk_bad_key"}))
        .await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["kind"], "upstream");
}

#[tokio::test]
async fn test_provider_setup_forbidden_for_regular_users() {
    let ctx = create_test_server();
    let (session, _) = register(&ctx.server, "bob@example.com", "bob").await;

    let response = ctx
        .server
        .post("/api/payment/provider/setup")
        .add_cookie(session_cookie(&session))
        .json(&json!({"stripe_key": "sk_test_x"}))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_only_client_can_pay() {
    let ctx = create_test_server();
    let (client, _) = register(&ctx.server, "client@example.com", "pavel").await;
    let (provider, provider_id) =
        register_provider(&ctx.server, "vera@example.com", "vera", 5000.0).await;
    let booking_id = create_booking(&ctx, &client, &provider_id).await;

    let response = ctx
        .server
        .post(&format!("/api/payment/bookings/{}/pay", booking_id))
        .add_cookie(session_cookie(&provider))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_paying_twice_conflicts() {
    let ctx = create_test_server();
    let (client, _) = register(&ctx.server, "client@example.com", "pavel").await;
    let (_, provider_id) =
        register_provider(&ctx.server, "vera@example.com", "vera", 5000.0).await;
    let booking_id = create_booking(&ctx, &client, &provider_id).await;

    ctx.server
        .post(&format!(
            "/api/payment/bookings/{}/confirm-payment-test",
            booking_id
        ))
        .add_cookie(session_cookie(&client))
        .await;

    let response = ctx
        .server
        .post(&format!("/api/payment/bookings/{}/pay", booking_id))
        .add_cookie(session_cookie(&client))
        .await;
    assert_eq!(response.status_code(), 409);
}

#[tokio::test]
async fn test_confirm_requires_payment_first() {
    let ctx = create_test_server();
    let (client, _) = register(&ctx.server, "client@example.com", "pavel").await;
    let (provider, provider_id) =
        register_provider(&ctx.server, "vera@example.com", "vera", 5000.0).await;
    let booking_id = create_booking(&ctx, &client, &provider_id).await;

    let response = ctx
        .server
        .post(&format!("/api/payment/bookings/{}/confirm", booking_id))
        .add_cookie(session_cookie(&provider))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_cancel_before_completion() {
    let ctx = create_test_server();
    let (client, _) = register(&ctx.server, "client@example.com", "pavel").await;
    let (_, provider_id) =
        register_provider(&ctx.server, "vera@example.com", "vera", 5000.0).await;
    let booking_id = create_booking(&ctx, &client, &provider_id).await;

    let response = ctx
        .server
        .post(&format!("/api/payment/bookings/{}/cancel", booking_id))
        .add_cookie(session_cookie(&client))
        .json(&json!({"reason": "change of plans"}))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["booking"]["status"], "cancelled");

    // Cancelling again conflicts
    let response = ctx
        .server
        .post(&format!("/api/payment/bookings/{}/cancel", booking_id))
        .add_cookie(session_cookie(&client))
        .json(&json!({"reason": "again"}))
        .await;
    assert_eq!(response.status_code(), 409);
}

#[tokio::test]
async fn test_completed_booking_cannot_be_cancelled() {
    let ctx = create_test_server();
    let (client, _) = register(&ctx.server, "client@example.com", "pavel").await;
    let (provider, provider_id) =
        register_provider(&ctx.server, "vera@example.com", "vera", 5000.0).await;
    let booking_id = create_booking(&ctx, &client, &provider_id).await;

    ctx.server
        .post(&format!(
            "/api/payment/bookings/{}/confirm-payment-test",
            booking_id
        ))
        .add_cookie(session_cookie(&client))
        .await;
    ctx.server
        .post(&format!("/api/payment/bookings/{}/complete", booking_id))
        .add_cookie(session_cookie(&provider))
        .await;

    let response = ctx
        .server
        .post(&format!("/api/payment/bookings/{}/cancel", booking_id))
        .add_cookie(session_cookie(&client))
        .json(&json!({"reason": "too late"}))
        .await;
    assert_eq!(response.status_code(), 409);
}

#[tokio::test]
async fn test_list_bookings_by_role() {
    let ctx = create_test_server();
    let (client, _) = register(&ctx.server, "client@example.com", "pavel").await;
    let (provider, provider_id) =
        register_provider(&ctx.server, "vera@example.com", "vera", 5000.0).await;
    create_booking(&ctx, &client, &provider_id).await;

    let response = ctx
        .server
        .get("/api/payment/bookings")
        .add_cookie(session_cookie(&client))
        .await;
    let body: Value = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["bookings"][0]["other_user"]["username"], "vera");

    let response = ctx
        .server
        .get("/api/payment/bookings?role=provider")
        .add_cookie(session_cookie(&provider))
        .await;
    let body: Value = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["bookings"][0]["other_user"]["username"], "pavel");

    // The provider has nothing as a client
    let response = ctx
        .server
        .get("/api/payment/bookings")
        .add_cookie(session_cookie(&provider))
        .await;
    assert_eq!(response.json::<Value>()["count"], 0);
}

#[tokio::test]
async fn test_provider_stats() {
    let ctx = create_test_server();
    let (client, _) = register(&ctx.server, "client@example.com", "pavel").await;
    let (provider, provider_id) =
        register_provider(&ctx.server, "vera@example.com", "vera", 5000.0).await;
    let booking_id = create_booking(&ctx, &client, &provider_id).await;

    ctx.server
        .post(&format!(
            "/api/payment/bookings/{}/confirm-payment-test",
            booking_id
        ))
        .add_cookie(session_cookie(&client))
        .await;
    ctx.server
        .post(&format!("/api/payment/bookings/{}/complete", booking_id))
        .add_cookie(session_cookie(&provider))
        .await;

    let response = ctx
        .server
        .get("/api/payment/provider/stats")
        .add_cookie(session_cookie(&provider))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["total_bookings"], 1);
    assert_eq!(body["completed_bookings"], 1);
    assert_eq!(body["total_earnings"], 10000.0);
    assert_eq!(body["pending_earnings"], 0.0);
    assert_eq!(body["hourly_rate"], 5000.0);
    assert_eq!(body["stripe_connected"], false);
}
