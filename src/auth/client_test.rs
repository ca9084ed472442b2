use super::*;
use crate::storage::MemoryStorage;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base: &str) -> Arc<Config> {
    Arc::new(Config {
        spotify_client_id: Some("spotify-id".to_string()),
        strava_client_id: Some("strava-id".to_string()),
        strava_client_secret: Some("strava-secret".to_string()),
        oauth_redirect_url: Some("http://localhost:3000/oauth".to_string()),
        spotify_accounts_base: base.to_string(),
        spotify_api_base: base.to_string(),
        strava_base: base.to_string(),
        ..Config::default()
    })
}

fn stored(provider: Provider, access: &str, refresh: Option<&str>) -> StoredToken {
    StoredToken {
        provider,
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        scope: None,
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_exchange_code_persists_strava_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("client_secret=strava-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "expires_at": (Utc::now() + Duration::hours(6)).timestamp(),
            "scope": "activity:read_all"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let client = TokenClient::new(test_config(&server.uri()), storage.clone()).unwrap();

    let token = client
        .exchange_code(Provider::Strava, "auth-code", None)
        .await
        .unwrap();
    assert_eq!(token.access_token, "new-access");
    assert_eq!(token.refresh_token.as_deref(), Some("new-refresh"));
    assert!(token.expires_at.is_some());

    let persisted = storage.get_token(Provider::Strava).await.unwrap().unwrap();
    assert_eq!(persisted.access_token, "new-access");
}

#[tokio::test]
async fn test_exchange_code_sends_pkce_verifier_for_spotify() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("code_verifier=the-verifier"))
        .and(body_string_contains("client_id=spotify-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "spotify-access",
            "refresh_token": "spotify-refresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let client = TokenClient::new(test_config(&server.uri()), storage.clone()).unwrap();

    let token = client
        .exchange_code(Provider::Spotify, "auth-code", Some("the-verifier"))
        .await
        .unwrap();
    assert_eq!(token.provider, Provider::Spotify);
    assert!(token.expires_at.is_some());
}

#[tokio::test]
async fn test_exchange_code_requires_verifier_for_pkce_provider() {
    let storage = Arc::new(MemoryStorage::new());
    let client = TokenClient::new(test_config("http://127.0.0.1:0"), storage).unwrap();

    let result = client.exchange_code(Provider::Spotify, "auth-code", None).await;
    assert!(matches!(result, Err(TrackbeatError::TokenExchange { .. })));
}

#[tokio::test]
async fn test_exchange_code_failure_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "Bad Request"})))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let client = TokenClient::new(test_config(&server.uri()), storage.clone()).unwrap();

    let result = client.exchange_code(Provider::Strava, "used-code", None).await;
    assert!(matches!(result, Err(TrackbeatError::TokenExchange { .. })));
    assert!(storage.get_token(Provider::Strava).await.unwrap().is_none());
}

#[tokio::test]
async fn test_force_refresh_keeps_unrotated_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage
        .save_token(&stored(Provider::Strava, "old-access", Some("old-refresh")))
        .await
        .unwrap();
    let client = TokenClient::new(test_config(&server.uri()), storage.clone()).unwrap();

    let token = client.force_refresh(Provider::Strava).await.unwrap();
    assert_eq!(token.access_token, "fresh-access");
    assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
}

#[tokio::test]
async fn test_force_refresh_without_refresh_token_fails() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .save_token(&stored(Provider::Strava, "access", None))
        .await
        .unwrap();
    let client = TokenClient::new(test_config("http://127.0.0.1:0"), storage).unwrap();

    let result = client.force_refresh(Provider::Strava).await;
    assert!(matches!(result, Err(TrackbeatError::Refresh { .. })));
}

#[tokio::test]
async fn test_authenticated_fetch_passes_through_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage
        .save_token(&stored(Provider::Strava, "valid-access", Some("refresh")))
        .await
        .unwrap();
    let client = TokenClient::new(test_config(&server.uri()), storage).unwrap();

    let request = client
        .http()
        .get(format!("{}/api/v3/athlete/activities", server.uri()));
    let response = client
        .authenticated_fetch(Provider::Strava, request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_authenticated_fetch_refreshes_expired_token_before_sending() {
    let server = MockServer::start().await;
    // Only the refreshed token is ever accepted; the expired one reaching
    // the API would match no mock and fail the expectations below.
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete/activities"))
        .and(wiremock::matchers::header("authorization", "Bearer fresh-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let mut token = stored(Provider::Strava, "expired-access", Some("refresh"));
    token.expires_at = Some(Utc::now() - Duration::minutes(1));
    storage.save_token(&token).await.unwrap();
    let client = TokenClient::new(test_config(&server.uri()), storage.clone()).unwrap();

    let request = client
        .http()
        .get(format!("{}/api/v3/athlete/activities", server.uri()));
    let response = client
        .authenticated_fetch(Provider::Strava, request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let persisted = storage.get_token(Provider::Strava).await.unwrap().unwrap();
    assert_eq!(persisted.access_token, "fresh-access");
}

#[tokio::test]
async fn test_authenticated_fetch_refreshes_once_and_retries() {
    let server = MockServer::start().await;
    // Stale token is rejected, refreshed token is accepted.
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete/activities"))
        .and(wiremock::matchers::header("authorization", "Bearer stale-access"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete/activities"))
        .and(wiremock::matchers::header("authorization", "Bearer fresh-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage
        .save_token(&stored(Provider::Strava, "stale-access", Some("refresh")))
        .await
        .unwrap();
    let client = TokenClient::new(test_config(&server.uri()), storage.clone()).unwrap();

    let request = client
        .http()
        .get(format!("{}/api/v3/athlete/activities", server.uri()));
    let response = client
        .authenticated_fetch(Provider::Strava, request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let persisted = storage.get_token(Provider::Strava).await.unwrap().unwrap();
    assert_eq!(persisted.access_token, "fresh-access");
}

#[tokio::test]
async fn test_authenticated_fetch_does_not_loop_on_repeated_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/athlete/activities"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2) // initial attempt + exactly one retry
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "still-rejected",
            "expires_in": 3600
        })))
        .expect(1) // exactly one forced refresh
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    storage
        .save_token(&stored(Provider::Strava, "stale", Some("refresh")))
        .await
        .unwrap();
    let client = TokenClient::new(test_config(&server.uri()), storage).unwrap();

    let request = client
        .http()
        .get(format!("{}/api/v3/athlete/activities", server.uri()));
    let result = client.authenticated_fetch(Provider::Strava, request).await;
    assert!(matches!(result, Err(TrackbeatError::Refresh { .. })));
}

#[tokio::test]
async fn test_authenticated_fetch_without_stored_token() {
    let storage = Arc::new(MemoryStorage::new());
    let client = TokenClient::new(test_config("http://127.0.0.1:0"), storage).unwrap();

    let request = client.http().get("http://127.0.0.1:0/nothing");
    let result = client.authenticated_fetch(Provider::Spotify, request).await;
    assert!(matches!(result, Err(TrackbeatError::Refresh { .. })));
}
