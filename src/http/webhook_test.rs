use super::*;
use axum::body::Body;
use axum::http::Request;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct RecordingSync {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait::async_trait]
impl ActivitySync for RecordingSync {
    async fn apply(&self, _event: &WebhookEvent) -> crate::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(crate::TrackbeatError::sync("provider unavailable"))
        } else {
            Ok(())
        }
    }
}

struct RecordingCache {
    tags: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl CacheInvalidator for RecordingCache {
    async fn invalidate(&self, tag: &str) {
        self.tags.lock().await.push(tag.to_string());
    }
}

struct Harness {
    state: WebhookState,
    sync: Arc<RecordingSync>,
    cache: Arc<RecordingCache>,
}

fn harness(strava_base: &str, sync_fails: bool) -> Harness {
    let config = Arc::new(Config {
        strava_client_id: Some("strava-id".to_string()),
        strava_client_secret: Some("strava-secret".to_string()),
        webhook_verify_token: Some("verify-me".to_string()),
        strava_base: strava_base.to_string(),
        ..Config::default()
    });
    let sync = Arc::new(RecordingSync {
        calls: AtomicUsize::new(0),
        fail: sync_fails,
    });
    let cache = Arc::new(RecordingCache {
        tags: Mutex::new(Vec::new()),
    });
    Harness {
        state: WebhookState {
            subscriptions: Arc::new(
                SubscriptionManager::new(config.clone()).expect("subscription manager"),
            ),
            config,
            sync: sync.clone(),
            cache: cache.clone(),
        },
        sync,
        cache,
    }
}

async fn mount_known_subscription(server: &MockServer, id: i64) {
    Mock::given(method("GET"))
        .and(path("/api/v3/push_subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": id }])))
        .mount(server)
        .await;
}

async fn get(state: WebhookState, uri: &str) -> Response {
    create_webhook_routes()
        .with_state(state)
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn post(state: WebhookState, body: &str) -> Response {
    create_webhook_routes()
        .with_state(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn event_body(subscription_id: i64) -> String {
    json!({
        "aspect_type": "create",
        "object_type": "activity",
        "object_id": 1234567890,
        "owner_id": 42,
        "subscription_id": subscription_id,
        "event_time": 1709556000
    })
    .to_string()
}

#[tokio::test]
async fn test_handshake_echoes_challenge() {
    let h = harness("http://127.0.0.1:0", false);
    let response = get(
        h.state,
        "/webhooks?hub.mode=subscribe&hub.challenge=abc123&hub.verify_token=verify-me",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"hub.challenge": "abc123"}));
}

#[tokio::test]
async fn test_handshake_wrong_token_fails_closed() {
    let h = harness("http://127.0.0.1:0", false);
    let response = get(
        h.state,
        "/webhooks?hub.mode=subscribe&hub.challenge=abc123&hub.verify_token=wrong",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_handshake_wrong_mode_fails_closed() {
    let h = harness("http://127.0.0.1:0", false);
    let response = get(
        h.state,
        "/webhooks?hub.mode=unsubscribe&hub.challenge=abc123&hub.verify_token=verify-me",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_handshake_missing_param_fails_closed() {
    let h = harness("http://127.0.0.1:0", false);
    let response = get(h.state, "/webhooks?hub.mode=subscribe&hub.challenge=abc123").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_handshake_without_configured_token_never_succeeds() {
    let mut h = harness("http://127.0.0.1:0", false);
    h.state.config = Arc::new(Config {
        webhook_verify_token: None,
        ..Config::default()
    });
    let response = get(
        h.state,
        "/webhooks?hub.mode=subscribe&hub.challenge=abc123&hub.verify_token=verify-me",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_without_hub_params_is_ignored() {
    let h = harness("http://127.0.0.1:0", false);
    let response = get(h.state, "/webhooks?utm_source=scanner").await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_activity_event_syncs_and_invalidates() {
    let server = MockServer::start().await;
    mount_known_subscription(&server, 254710).await;

    let h = harness(&server.uri(), false);
    let response = post(h.state, &event_body(254710)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.sync.calls.load(Ordering::SeqCst), 1);
    assert_eq!(*h.cache.tags.lock().await, vec![activity_tag().to_string()]);
}

#[tokio::test]
async fn test_replayed_event_is_applied_again_and_converges() {
    let server = MockServer::start().await;
    mount_known_subscription(&server, 254710).await;

    let h = harness(&server.uri(), false);
    let first = post(h.state.clone(), &event_body(254710)).await;
    let second = post(h.state.clone(), &event_body(254710)).await;

    // Delivery retries are expected; each one re-applies the idempotent
    // sync and re-signals invalidation for the same tag.
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(h.sync.calls.load(Ordering::SeqCst), 2);
    let tag = activity_tag().to_string();
    assert_eq!(*h.cache.tags.lock().await, vec![tag.clone(), tag]);
}

#[test]
fn test_payload_logging_masks_sensitive_values() {
    let scrubbed = scrubbed_for_log(&json!({
        "subscription_id": 254710,
        "verify_token": "super-secret-value",
        "updates": {"authorization": "Bearer abcdefghijklmnop"}
    }));

    assert_eq!(scrubbed["subscription_id"], 254710);
    assert_eq!(scrubbed["verify_token"], "supe****");
    assert_eq!(scrubbed["updates"]["authorization"], "Bear****");
}

#[tokio::test]
async fn test_unknown_subscription_id_is_forbidden() {
    let server = MockServer::start().await;
    mount_known_subscription(&server, 254710).await;

    let h = harness(&server.uri(), false);
    let response = post(h.state, &event_body(999999)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await, json!({"error": "Forbidden"}));
    assert_eq!(h.sync.calls.load(Ordering::SeqCst), 0);
    assert!(h.cache.tags.lock().await.is_empty());
}

#[tokio::test]
async fn test_athlete_event_is_acknowledged_without_sync() {
    let server = MockServer::start().await;
    mount_known_subscription(&server, 254710).await;

    let h = harness(&server.uri(), false);
    let body = json!({
        "aspect_type": "update",
        "object_type": "athlete",
        "object_id": 42,
        "subscription_id": 254710,
        "updates": {"authorized": "false"}
    })
    .to_string();
    let response = post(h.state, &body).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.sync.calls.load(Ordering::SeqCst), 0);
    assert!(h.cache.tags.lock().await.is_empty());
}

#[tokio::test]
async fn test_sync_failure_is_500_without_invalidation() {
    let server = MockServer::start().await;
    mount_known_subscription(&server, 254710).await;

    let h = harness(&server.uri(), true);
    let response = post(h.state, &event_body(254710)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Failed to sync webhook event"})
    );
    assert_eq!(h.sync.calls.load(Ordering::SeqCst), 1);
    assert!(h.cache.tags.lock().await.is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let h = harness("http://127.0.0.1:0", false);
    let response = post(h.state, "{not json").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_foreign_payload_is_accepted_and_ignored() {
    let h = harness("http://127.0.0.1:0", false);
    let response = post(h.state.clone(), r#"{"ping": "pong"}"#).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post(h.state, r#"[1, 2, 3]"#).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(h.sync.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_recognized_but_invalid_event_is_bad_request() {
    let h = harness("http://127.0.0.1:0", false);

    // Unknown aspect_type value
    let body = json!({
        "aspect_type": "upsert",
        "object_type": "activity",
        "object_id": 1,
        "subscription_id": 254710
    })
    .to_string();
    let response = post(h.state.clone(), &body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Marker keys present but subscription_id missing
    let body = json!({
        "aspect_type": "create",
        "object_type": "activity",
        "object_id": 1
    })
    .to_string();
    let response = post(h.state, &body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.sync.calls.load(Ordering::SeqCst), 0);
}
