//! Provider token client
//!
//! Exchanges authorization codes for tokens, refreshes them, and wraps
//! authenticated provider calls in a forced-refresh-and-retry-once policy.

use crate::config::Config;
use crate::model::{Provider, StoredToken};
use crate::storage::Storage;
use crate::{NetworkError, Result, TrackbeatError, redact};
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;

/// Token endpoint response
///
/// Spotify reports a relative `expires_in`; Strava reports an absolute
/// `expires_at` (and also an `expires_in` we ignore when the absolute form
/// is present).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)))
    }
}

/// Token client for the two tracked providers
///
/// Owns the per-provider `StoredToken` record: every successful exchange or
/// refresh overwrites it whole, last-write-wins.
#[derive(Clone)]
pub struct TokenClient {
    config: Arc<Config>,
    storage: Arc<dyn Storage>,
    http: reqwest::Client,
}

fn is_auth_failure(status: StatusCode) -> bool {
    // Strava uses 401 for expired tokens and 403 for revoked/under-scoped
    // grants; both mean the current access token is no good.
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

impl TokenClient {
    /// Create a new token client
    ///
    /// Redirects are disabled to prevent authorization-code interception,
    /// and every call carries a bounded timeout so a slow provider cannot
    /// hang a handler.
    pub fn new(config: Arc<Config>, storage: Arc<dyn Storage>) -> Result<Self> {
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(crate::constants::OUTBOUND_HTTP_TIMEOUT)
            .build()
            .map_err(NetworkError::from)?;

        Ok(Self {
            config,
            storage,
            http,
        })
    }

    /// Exchange an authorization code for tokens and persist them
    ///
    /// A failed exchange is terminal: a stale or already-used code cannot be
    /// retried meaningfully.
    pub async fn exchange_code(
        &self,
        provider: Provider,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<StoredToken> {
        let oauth = self.config.oauth_provider(provider);
        let client_id = oauth.client_id.as_deref().ok_or_else(|| {
            TrackbeatError::token_exchange(provider.as_str(), "client id not configured")
        })?;
        let redirect_url = self.config.oauth_redirect_url.as_deref().ok_or_else(|| {
            TrackbeatError::token_exchange(provider.as_str(), "redirect URL not configured")
        })?;

        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_url),
            ("client_id", client_id),
        ];
        if let Some(secret) = oauth.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        if oauth.pkce {
            let verifier = code_verifier.ok_or_else(|| {
                TrackbeatError::token_exchange(provider.as_str(), "missing PKCE code verifier")
            })?;
            form.push(("code_verifier", verifier));
        }

        let response = self
            .http
            .post(&oauth.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                TrackbeatError::token_exchange(provider.as_str(), scrub_reqwest_error(&e))
            })?;

        if !response.status().is_success() {
            return Err(TrackbeatError::token_exchange(
                provider.as_str(),
                redact::response_summary(response.status()),
            ));
        }

        let payload: TokenResponse = response.json().await.map_err(|_| {
            TrackbeatError::token_exchange(provider.as_str(), "malformed token response")
        })?;

        let token = StoredToken {
            provider,
            access_token: payload.access_token.clone(),
            refresh_token: payload.refresh_token.clone(),
            expires_at: payload.expiry(),
            scope: payload.scope.clone(),
            updated_at: Utc::now(),
        };
        self.storage.save_token(&token).await?;

        tracing::info!(
            provider = %provider,
            access_token = %redact::mask(&token.access_token),
            "exchanged authorization code for tokens"
        );
        Ok(token)
    }

    /// Unconditionally refresh the stored token for a provider
    ///
    /// Bypasses any "token still valid" check. Known race: two concurrent
    /// refreshes both succeed and the later write wins; the extra provider
    /// call is harmless because both results are valid tokens.
    pub async fn force_refresh(&self, provider: Provider) -> Result<StoredToken> {
        let current = self
            .storage
            .get_token(provider)
            .await?
            .ok_or_else(|| TrackbeatError::refresh(provider.as_str(), "no stored token"))?;
        let refresh_token = current.refresh_token.clone().ok_or_else(|| {
            TrackbeatError::refresh(provider.as_str(), "no refresh token; re-run authorization")
        })?;

        let oauth = self.config.oauth_provider(provider);
        let client_id = oauth.client_id.as_deref().ok_or_else(|| {
            TrackbeatError::refresh(provider.as_str(), "client id not configured")
        })?;

        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", &refresh_token),
            ("client_id", client_id),
        ];
        if let Some(secret) = oauth.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let response = self
            .http
            .post(&oauth.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| TrackbeatError::refresh(provider.as_str(), scrub_reqwest_error(&e)))?;

        if !response.status().is_success() {
            // Typically a revoked grant; the only recovery is a new init flow.
            return Err(TrackbeatError::refresh(
                provider.as_str(),
                redact::response_summary(response.status()),
            ));
        }

        let payload: TokenResponse = response.json().await.map_err(|_| {
            TrackbeatError::refresh(provider.as_str(), "malformed token response")
        })?;

        let token = StoredToken {
            provider,
            access_token: payload.access_token.clone(),
            // Providers that don't rotate refresh tokens omit the field.
            refresh_token: payload.refresh_token.clone().or(current.refresh_token),
            expires_at: payload.expiry(),
            scope: payload.scope.clone().or(current.scope),
            updated_at: Utc::now(),
        };
        self.storage.save_token(&token).await?;

        tracing::info!(
            provider = %provider,
            access_token = %redact::mask(&token.access_token),
            "refreshed access token"
        );
        Ok(token)
    }

    /// Execute a provider API call with the current access token
    ///
    /// A stored token inside its expiry buffer is refreshed before the first
    /// attempt. On an auth-failure response, forces exactly one refresh and
    /// retries exactly once; a second auth failure propagates. This bounds
    /// the loop for permanently revoked grants while tolerating a
    /// stale-token race.
    pub async fn authenticated_fetch(
        &self,
        provider: Provider,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let token = self
            .storage
            .get_token(provider)
            .await?
            .ok_or_else(|| TrackbeatError::refresh(provider.as_str(), "no stored token"))?;

        // The reactive 401/403 path below still covers clock skew and
        // revocation; this just avoids a round trip that is known to fail.
        let token = if token.is_expired() {
            tracing::debug!(provider = %provider, "stored token within expiry buffer, refreshing before use");
            self.force_refresh(provider).await?
        } else {
            token
        };

        let retry = request.try_clone();
        let response = request
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(NetworkError::from)?;

        if !is_auth_failure(response.status()) {
            return Ok(response);
        }

        let Some(retry) = retry else {
            return Err(NetworkError::Http(
                "authenticated request with streaming body cannot be retried".to_string(),
            )
            .into());
        };

        tracing::debug!(provider = %provider, "auth failure, forcing one refresh and retrying");
        let refreshed = self.force_refresh(provider).await?;
        let response = retry
            .bearer_auth(&refreshed.access_token)
            .send()
            .await
            .map_err(NetworkError::from)?;

        if is_auth_failure(response.status()) {
            return Err(TrackbeatError::refresh(
                provider.as_str(),
                "authentication still failing after forced refresh",
            ));
        }
        Ok(response)
    }

    /// The underlying HTTP client (shared by collaborators)
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

/// Reduce a reqwest error to a loggable category without echoing the URL,
/// which may carry query secrets.
fn scrub_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        "request failed".to_string()
    }
}
