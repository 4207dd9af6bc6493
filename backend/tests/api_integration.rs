//! Integration tests for duet backend API endpoints.
//!
//! Tests the full HTTP API including the bearer token, subscription
//! validation and the notify fan-out. Browsers are simulated with
//! duet-core's test recipients; push services with wiremock.

use duet_backend::auth::ApiToken;
use duet_backend::models::{NewSubscription, NotificationPayload, PayloadDefaults};
use duet_backend::store::{MemoryStore, StoreError, SubscriptionStore};
use duet_backend::{build_router, AppState, Deliverer, DeliveryOptions};
use duet_core::testing::TestRecipient;
use duet_core::{codec, VapidIdentity};
use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_TOKEN: &str = "relay-test-token";

struct TestApp {
    server: TestServer,
    store: Arc<MemoryStore>,
    identity: Arc<VapidIdentity>,
}

fn test_identity() -> Arc<VapidIdentity> {
    Arc::new(
        VapidIdentity::generate(&mut StdRng::seed_from_u64(7), "mailto:ops@duet.example")
            .unwrap(),
    )
}

fn build_app_with_store(store: Arc<dyn SubscriptionStore>, token: Option<&str>) -> TestServer {
    let identity = test_identity();
    let deliverer = Arc::new(
        Deliverer::new(store.clone(), identity.clone(), DeliveryOptions::default()).unwrap(),
    );
    let state = AppState::new(
        store,
        deliverer,
        identity,
        ApiToken::new(token),
        PayloadDefaults::default(),
    );
    TestServer::new(build_router(state)).unwrap()
}

/// Build test server with the application router
fn build_test_app(token: Option<&str>) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    TestApp {
        server: build_app_with_store(store.clone(), token),
        store,
        identity: test_identity(),
    }
}

/// Create authorization header value
fn auth_header(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

fn subscribe_body(owner: &str, endpoint: &str, recipient: &TestRecipient) -> Value {
    json!({
        "group_id": "g1",
        "owner_id": owner,
        "endpoint": endpoint,
        "keys": { "p256dh": recipient.p256dh, "auth": recipient.auth },
        "user_agent": "Mozilla/5.0"
    })
}

fn recipient(seed: u64) -> TestRecipient {
    TestRecipient::generate(&mut StdRng::seed_from_u64(seed))
}

// =============================================================================
// Health / Public Key
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_app(Some(API_TOKEN));

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_public_key_needs_no_token() {
    let app = build_test_app(Some(API_TOKEN));

    let response = app.server.get("/v1/push/public-key").await;

    response.assert_status_ok();
    let body: Value = response.json();
    let key = body["public_key"].as_str().unwrap();
    assert_eq!(key, app.identity.public_key_base64url());

    let raw = codec::decode(key).unwrap();
    assert_eq!(raw.len(), 65);
    assert_eq!(raw[0], 0x04);
}

// =============================================================================
// Subscription Tests
// =============================================================================

#[tokio::test]
async fn test_subscribe_success() {
    let app = build_test_app(None);
    let bob = recipient(1);

    let response = app
        .server
        .post("/v1/subscriptions")
        .json(&subscribe_body("bob", "https://push.example/bob", &bob))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert!(body["id"].is_string());
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn test_subscribe_is_idempotent_per_endpoint() {
    let app = build_test_app(None);
    let bob = recipient(2);

    let first: Value = app
        .server
        .post("/v1/subscriptions")
        .json(&subscribe_body("bob", "https://push.example/bob", &bob))
        .await
        .json();

    // Browser rotated its keys for the same endpoint
    let rotated = recipient(3);
    let second: Value = app
        .server
        .post("/v1/subscriptions")
        .json(&subscribe_body("bob", "https://push.example/bob", &rotated))
        .await
        .json();

    assert_eq!(first["id"], second["id"]);
    assert_eq!(app.store.len(), 1);
    let targets = app.store.find_for_group("g1", "alice").await.unwrap();
    assert_eq!(targets[0].p256dh, rotated.p256dh);
}

#[tokio::test]
async fn test_subscribe_rejects_malformed_keys() {
    let app = build_test_app(None);
    let bob = recipient(4);

    let bad_keys = [
        // 64-byte key
        json!({ "p256dh": codec::encode([4u8; 64]), "auth": bob.auth }),
        // Wrong prefix
        json!({ "p256dh": codec::encode([2u8; 65]), "auth": bob.auth }),
        // Short auth secret
        json!({ "p256dh": bob.p256dh, "auth": codec::encode([1u8; 15]) }),
        // Not base64url
        json!({ "p256dh": "***", "auth": bob.auth }),
    ];

    for keys in bad_keys {
        let response = app
            .server
            .post("/v1/subscriptions")
            .json(&json!({
                "group_id": "g1",
                "owner_id": "bob",
                "endpoint": "https://push.example/bob",
                "keys": keys
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_KEYS");
    }
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_subscribe_rejects_bad_input() {
    let app = build_test_app(None);
    let bob = recipient(5);

    for (owner, endpoint) in [
        ("bob", "http://push.example/plaintext"),
        ("bob", "not a url"),
        ("", "https://push.example/bob"),
    ] {
        let response = app
            .server
            .post("/v1/subscriptions")
            .json(&subscribe_body(owner, endpoint, &bob))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_INPUT");
    }
}

#[tokio::test]
async fn test_unsubscribe() {
    let app = build_test_app(None);
    let bob = recipient(6);

    app.server
        .post("/v1/subscriptions")
        .json(&subscribe_body("bob", "https://push.example/bob", &bob))
        .await
        .assert_status(StatusCode::CREATED);

    // Someone else cannot remove bob's device
    let response = app
        .server
        .delete("/v1/subscriptions")
        .json(&json!({ "owner_id": "alice", "endpoint": "https://push.example/bob" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["removed"], false);
    assert_eq!(app.store.len(), 1);

    let response = app
        .server
        .delete("/v1/subscriptions")
        .json(&json!({ "owner_id": "bob", "endpoint": "https://push.example/bob" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["removed"], true);
    assert!(app.store.is_empty());
}

// =============================================================================
// Token Tests
// =============================================================================

#[tokio::test]
async fn test_token_required_when_configured() {
    let app = build_test_app(Some(API_TOKEN));
    let bob = recipient(7);

    let response = app
        .server
        .post("/v1/subscriptions")
        .json(&subscribe_body("bob", "https://push.example/bob", &bob))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "MISSING_AUTH");

    let response = app
        .server
        .post("/v1/notify")
        .add_header(header::AUTHORIZATION, auth_header("wrong-token"))
        .json(&json!({ "group_id": "g1", "sender_id": "alice", "type": "chat" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED");

    let response = app
        .server
        .post("/v1/subscriptions")
        .add_header(header::AUTHORIZATION, auth_header(API_TOKEN))
        .json(&subscribe_body("bob", "https://push.example/bob", &bob))
        .await;
    response.assert_status(StatusCode::CREATED);
}

// =============================================================================
// Notify Tests
// =============================================================================

#[tokio::test]
async fn test_notify_without_targets_returns_zeros() {
    let app = build_test_app(None);

    let response = app
        .server
        .post("/v1/notify")
        .json(&json!({ "group_id": "g1", "sender_id": "alice", "type": "chat" }))
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({ "sent": 0, "failed": 0, "total": 0 })
    );
}

#[tokio::test]
async fn test_notify_delivers_and_prunes() {
    let app = build_test_app(Some(API_TOKEN));
    let push = MockServer::start().await;
    let phone = recipient(8);
    let laptop = recipient(9);

    // Stored directly: the API only accepts https endpoints
    for (route, device) in [("/push/phone", &phone), ("/push/laptop", &laptop)] {
        app.store
            .upsert(NewSubscription {
                group_id: "g1".to_string(),
                owner_id: "bob".to_string(),
                endpoint: format!("{}{route}", push.uri()),
                p256dh: device.p256dh.clone(),
                auth: device.auth.clone(),
                user_agent: None,
            })
            .await
            .unwrap();
    }
    Mock::given(method("POST"))
        .and(path("/push/phone"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&push)
        .await;
    Mock::given(method("POST"))
        .and(path("/push/laptop"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&push)
        .await;

    let response = app
        .server
        .post("/v1/notify")
        .add_header(header::AUTHORIZATION, auth_header(API_TOKEN))
        .json(&json!({
            "group_id": "g1",
            "sender_id": "alice",
            "type": "memory",
            "title": "Alice",
            "body": "added a memory",
            "url": "/memories/1"
        }))
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({ "sent": 1, "failed": 1, "total": 2 })
    );

    // Laptop was pruned
    let remaining = app.store.find_for_group("g1", "alice").await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].endpoint.ends_with("/push/phone"));

    // The phone got the defaults-filled payload
    let requests = push.received_requests().await.unwrap();
    let to_phone = requests
        .iter()
        .find(|r| r.url.path() == "/push/phone")
        .unwrap();
    let payload: NotificationPayload =
        serde_json::from_slice(&phone.decrypt(&to_phone.body).unwrap()).unwrap();
    assert_eq!(payload.title, "Alice");
    assert_eq!(payload.body, "added a memory");
    assert_eq!(payload.url, "/memories/1");
    assert_eq!(payload.tag, "memory");
    assert_eq!(payload.icon.as_deref(), Some("/icon-192x192.png"));
}

#[tokio::test]
async fn test_notify_store_failure_is_500() {
    struct OfflineStore;

    #[async_trait]
    impl SubscriptionStore for OfflineStore {
        async fn upsert(
            &self,
            _: NewSubscription,
        ) -> Result<duet_backend::models::PushSubscription, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn find_for_group(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Vec<duet_backend::models::PushSubscription>, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn delete(&self, _: uuid::Uuid) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn delete_by_endpoint(&self, _: &str, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("offline".into()))
        }
    }

    let server = build_app_with_store(Arc::new(OfflineStore), None);

    let response = server
        .post("/v1/notify")
        .json(&json!({ "group_id": "g1", "sender_id": "alice" }))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<Value>()["code"], "INTERNAL_ERROR");

    let response = server
        .post("/v1/subscriptions")
        .json(&subscribe_body("bob", "https://push.example/bob", &recipient(10)))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_notify_requires_ids() {
    let app = build_test_app(None);

    let response = app
        .server
        .post("/v1/notify")
        .json(&json!({ "group_id": "", "sender_id": "alice" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "INVALID_INPUT");
}
