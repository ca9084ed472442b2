//! Downstream collaborators for accepted webhook events
//!
//! The event pipeline hands validated activity events to an idempotent sync
//! and signals cache invalidation for the affected content tag. Both seams
//! are traits so the HTTP layer can be driven in tests without providers.

use crate::config::Config;
use crate::constants::LATEST_ACTIVITY_TAG;
use crate::model::{Provider, WebhookEvent};
use crate::{Result, TokenClient, TrackbeatError};
use async_trait::async_trait;
use std::sync::Arc;

/// Applies an accepted activity event downstream
///
/// Must be safe to call more than once for the same event: the provider's
/// webhook retry policy means duplicates will happen.
#[async_trait]
pub trait ActivitySync: Send + Sync {
    async fn apply(&self, event: &WebhookEvent) -> Result<()>;
}

/// Signals the external response cache that a content tag went stale
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, tag: &str);
}

/// Production sync: re-fetch the athlete's latest activity
///
/// Idempotent by construction: it converges on current provider state
/// instead of applying the event delta, so replaying the same event changes
/// nothing.
pub struct StravaActivitySync {
    tokens: Arc<TokenClient>,
    api_base: String,
}

impl StravaActivitySync {
    pub fn new(config: &Config, tokens: Arc<TokenClient>) -> Self {
        Self {
            tokens,
            api_base: config.strava_base.clone(),
        }
    }
}

#[async_trait]
impl ActivitySync for StravaActivitySync {
    async fn apply(&self, event: &WebhookEvent) -> Result<()> {
        let request = self.tokens.http().get(format!(
            "{}/api/v3/athlete/activities?per_page=1",
            self.api_base
        ));
        let response = self
            .tokens
            .authenticated_fetch(Provider::Strava, request)
            .await?;

        if !response.status().is_success() {
            return Err(TrackbeatError::sync(crate::redact::response_summary(
                response.status(),
            )));
        }

        tracing::info!(
            aspect = ?event.aspect_type,
            object_id = event.object_id,
            "synced latest activity after webhook event"
        );
        Ok(())
    }
}

/// Production invalidator: POST the tag to the site's revalidation hook
///
/// Invalidation is advisory; failures are logged and swallowed so a cache
/// hiccup never turns an accepted event into a provider-visible error.
pub struct RevalidateHook {
    http: reqwest::Client,
    url: Option<String>,
    secret: Option<String>,
}

impl RevalidateHook {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            url: config.revalidate_url.clone(),
            secret: config.revalidate_secret.clone(),
        }
    }
}

#[async_trait]
impl CacheInvalidator for RevalidateHook {
    async fn invalidate(&self, tag: &str) {
        let Some(url) = self.url.as_deref() else {
            tracing::debug!(tag, "no revalidation endpoint configured, skipping");
            return;
        };

        let mut request = self
            .http
            .post(url)
            .json(&serde_json::json!({ "tag": tag }));
        if let Some(secret) = self.secret.as_deref() {
            request = request.header("x-revalidate-secret", secret);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(tag, "cache invalidation signaled");
            }
            Ok(response) => {
                tracing::warn!(tag, status = response.status().as_u16(), "cache invalidation rejected");
            }
            Err(_) => {
                tracing::warn!(tag, "cache invalidation request failed");
            }
        }
    }
}

/// The tag invalidated when an activity event is accepted
#[must_use]
pub fn activity_tag() -> &'static str {
    LATEST_ACTIVITY_TAG
}
