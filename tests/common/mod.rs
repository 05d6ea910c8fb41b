//! Common test utilities for API integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::NaiveDate;
use serde_json::{json, Value};

use lovematch_server::identity::{
    IdentityVerifier, VerificationReport, VerificationSessionHandle, VerificationSessionState,
};
use lovematch_server::payments::{
    PaymentIntent, PaymentIntentRequest, PaymentProvider, ProviderAccount,
};
use lovematch_server::{routes, AppState, Config, InMemoryStore};

pub const SESSION_COOKIE: &str = "lovematch_session";

/// Mock payment provider backed by an in-memory intent table
#[derive(Default, Clone)]
pub struct MockPayments {
    intents: Arc<RwLock<HashMap<String, PaymentIntent>>>,
    counter: Arc<AtomicUsize>,
}

impl MockPayments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip an intent to succeeded, as if the client completed the charge
    pub fn mark_succeeded(&self, intent_id: &str) {
        let mut intents = self.intents.write().unwrap();
        if let Some(intent) = intents.get_mut(intent_id) {
            intent.status = "succeeded".to_string();
            intent.latest_charge = Some(format!("ch_{}", intent_id));
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPayments {
    async fn retrieve_account(&self, api_key: &str) -> Result<ProviderAccount, String> {
        if api_key.starts_with("sk_bad") {
            return Err("Invalid API key".to_string());
        }
        Ok(ProviderAccount {
            id: "acct_mock".to_string(),
            charges_enabled: true,
            payouts_enabled: true,
            business_name: Some("Velvet Hours".to_string()),
        })
    }

    async fn create_payment_intent(
        &self,
        _api_key: &str,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let intent = PaymentIntent {
            id: format!("pi_mock_{}", n),
            client_secret: Some(format!("pi_mock_{}_secret", n)),
            status: "requires_payment_method".to_string(),
            latest_charge: None,
        };
        assert!(request.amount_minor > 0);
        self.intents
            .write()
            .unwrap()
            .insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(
        &self,
        _api_key: &str,
        intent_id: &str,
    ) -> Result<PaymentIntent, String> {
        self.intents
            .read()
            .unwrap()
            .get(intent_id)
            .cloned()
            .ok_or_else(|| format!("No such payment intent: {}", intent_id))
    }
}

/// Mock identity verifier whose session outcomes the test scripts
#[derive(Default, Clone)]
pub struct MockIdentity {
    sessions: Arc<RwLock<HashMap<String, VerificationSessionState>>>,
    counter: Arc<AtomicUsize>,
}

impl MockIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, session_id: &str, status: &str) {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(session) = sessions.get_mut(session_id) {
            session.status = status.to_string();
        }
    }

    /// Mark a session verified with the given date of birth
    pub fn set_verified(&self, session_id: &str, date_of_birth: NaiveDate) {
        let mut sessions = self.sessions.write().unwrap();
        if let Some(session) = sessions.get_mut(session_id) {
            session.status = "verified".to_string();
            session.report = Some(VerificationReport {
                document_type: Some("passport".to_string()),
                date_of_birth: Some(date_of_birth),
            });
        }
    }
}

#[async_trait]
impl IdentityVerifier for MockIdentity {
    async fn create_session(
        &self,
        _account_id: &str,
        _return_url: &str,
    ) -> Result<VerificationSessionHandle, String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("ivs_mock_{}", n);
        self.sessions.write().unwrap().insert(
            id.clone(),
            VerificationSessionState {
                id: id.clone(),
                status: "requires_input".to_string(),
                report: None,
            },
        );
        Ok(VerificationSessionHandle {
            id: id.clone(),
            client_secret: Some(format!("{}_secret", id)),
            url: Some(format!("https://verify.example/{}", id)),
        })
    }

    async fn retrieve_session(
        &self,
        session_id: &str,
    ) -> Result<VerificationSessionState, String> {
        self.sessions
            .read()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| format!("No such session: {}", session_id))
    }
}

/// A test server with handles to the store and both mock providers
pub struct TestContext {
    pub server: TestServer,
    pub store: Arc<InMemoryStore>,
    pub payments: MockPayments,
    pub identity: MockIdentity,
}

pub fn create_test_server() -> TestContext {
    let store = Arc::new(InMemoryStore::new());
    let payments = MockPayments::new();
    let identity = MockIdentity::new();

    let state = Arc::new(AppState::new(
        Arc::clone(&store),
        payments.clone(),
        identity.clone(),
        Config::default(),
    ));

    let server =
        TestServer::new(routes::create_router(state)).expect("Failed to create test server");

    TestContext {
        server,
        store,
        payments,
        identity,
    }
}

pub fn session_cookie(value: &str) -> cookie::Cookie<'static> {
    cookie::Cookie::new(SESSION_COOKIE, value.to_string())
}

/// Register an account and return (session token, user id)
pub async fn register(server: &TestServer, email: &str, username: &str) -> (String, String) {
    register_with(server, email, username, "relationship", None).await
}

/// Register a service provider with an hourly rate
pub async fn register_provider(
    server: &TestServer,
    email: &str,
    username: &str,
    hourly_rate: f64,
) -> (String, String) {
    register_with(server, email, username, "intimate_services", Some(hourly_rate)).await
}

async fn register_with(
    server: &TestServer,
    email: &str,
    username: &str,
    goal: &str,
    hourly_rate: Option<f64>,
) -> (String, String) {
    let mut body = json!({
        "email": email,
        "password": "testpassword1",
        "username": username,
        "goal": goal,
        "age": 25,
        "gender": "female",
        "city": "Berlin",
    });
    if let Some(rate) = hourly_rate {
        body["hourly_rate"] = json!(rate);
        body["business_name"] = json!("Test Studio");
    }

    let response = server.post("/api/auth/register").json(&body).await;
    assert_eq!(response.status_code(), 201, "{}", response.text());

    let user_id = response.json::<Value>()["user"]["id"]
        .as_str()
        .expect("No user id in registration response")
        .to_string();
    let token = response
        .maybe_cookie(SESSION_COOKIE)
        .expect("No session cookie")
        .value()
        .to_string();

    (token, user_id)
}

/// Create a mutual match between two registered users, returning the match id
pub async fn make_match(
    server: &TestServer,
    session_a: &str,
    id_a: &str,
    session_b: &str,
    id_b: &str,
) -> String {
    let response = server
        .post("/api/match/like")
        .add_cookie(session_cookie(session_a))
        .json(&json!({"user_id": id_b}))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    assert_eq!(response.json::<Value>()["is_match"], false);

    let response = server
        .post("/api/match/like")
        .add_cookie(session_cookie(session_b))
        .json(&json!({"user_id": id_a}))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    let body: Value = response.json();
    assert_eq!(body["is_match"], true);

    body["match_id"]
        .as_str()
        .expect("No match id in like response")
        .to_string()
}
