//! Webhook subscription management
//!
//! Create/list/delete the single externally-registered callback subscription
//! per provider. Only Strava exposes a push-subscription API; the closed
//! provider enum keeps that explicit.

use crate::config::Config;
use crate::model::{Provider, WebhookSubscription};
use crate::{NetworkError, Result, TrackbeatError, redact};
use serde::Deserialize;
use std::sync::Arc;

/// Wire shape of a Strava push subscription
#[derive(Debug, Deserialize)]
struct PushSubscription {
    id: i64,
    #[serde(default)]
    callback_url: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

/// Manager for the provider-side webhook registration
#[derive(Clone)]
pub struct SubscriptionManager {
    config: Arc<Config>,
    http: reqwest::Client,
}

struct PushApiCredentials<'a> {
    endpoint: String,
    client_id: &'a str,
    client_secret: &'a str,
}

impl SubscriptionManager {
    /// Create a new subscription manager
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let http = reqwest::ClientBuilder::new()
            .timeout(crate::constants::OUTBOUND_HTTP_TIMEOUT)
            .build()
            .map_err(NetworkError::from)?;
        Ok(Self { config, http })
    }

    fn push_api<'a>(&'a self, provider: Provider) -> Result<PushApiCredentials<'a>> {
        match provider {
            Provider::Strava => Ok(PushApiCredentials {
                endpoint: format!("{}/api/v3/push_subscriptions", self.config.strava_base),
                client_id: self.config.strava_client_id.as_deref().ok_or_else(|| {
                    TrackbeatError::subscription("Strava client id not configured")
                })?,
                client_secret: self.config.strava_client_secret.as_deref().ok_or_else(
                    || TrackbeatError::subscription("Strava client secret not configured"),
                )?,
            }),
            Provider::Spotify => Err(TrackbeatError::subscription(
                "provider does not support webhook subscriptions",
            )),
        }
    }

    /// List the subscriptions registered for this application
    ///
    /// The provider enforces at most one; an empty list means nothing is
    /// registered yet.
    pub async fn list(&self, provider: Provider) -> Result<Vec<WebhookSubscription>> {
        let api = self.push_api(provider)?;

        let response = self
            .http
            .get(&api.endpoint)
            .query(&[
                ("client_id", api.client_id),
                ("client_secret", api.client_secret),
            ])
            .send()
            .await
            .map_err(NetworkError::from)?;

        if !response.status().is_success() {
            return Err(TrackbeatError::subscription(redact::response_summary(
                response.status(),
            )));
        }

        let subscriptions: Vec<PushSubscription> = response
            .json()
            .await
            .map_err(|_| TrackbeatError::subscription("malformed subscription list"))?;

        Ok(subscriptions
            .into_iter()
            .map(|s| WebhookSubscription {
                id: s.id,
                callback_url: s.callback_url.unwrap_or_default(),
                created_at: s.created_at,
            })
            .collect())
    }

    /// Register this deployment's callback URL
    ///
    /// The provider rejects a second registration, which enforces the
    /// one-subscription invariant; callers that care should `list` first.
    pub async fn create(&self, provider: Provider) -> Result<WebhookSubscription> {
        let api = self.push_api(provider)?;
        let callback_url = self.config.webhook_callback_url.as_deref().ok_or_else(|| {
            TrackbeatError::subscription("webhook callback URL not configured")
        })?;
        let verify_token = self.config.webhook_verify_token.as_deref().ok_or_else(|| {
            TrackbeatError::subscription("webhook verify token not configured")
        })?;

        let response = self
            .http
            .post(&api.endpoint)
            .form(&[
                ("client_id", api.client_id),
                ("client_secret", api.client_secret),
                ("callback_url", callback_url),
                ("verify_token", verify_token),
            ])
            .send()
            .await
            .map_err(NetworkError::from)?;

        if !response.status().is_success() {
            return Err(TrackbeatError::subscription(redact::response_summary(
                response.status(),
            )));
        }

        let created: PushSubscription = response
            .json()
            .await
            .map_err(|_| TrackbeatError::subscription("malformed subscription response"))?;

        tracing::info!(provider = %provider, subscription_id = created.id, "webhook subscription created");
        Ok(WebhookSubscription {
            id: created.id,
            callback_url: created
                .callback_url
                .unwrap_or_else(|| callback_url.to_string()),
            created_at: created.created_at,
        })
    }

    /// Delete the currently registered subscription
    ///
    /// The id is looked up server-side via `list` immediately before the
    /// delete; it is never accepted from a client, so a caller cannot remove
    /// an arbitrary subscription by guessing ids.
    pub async fn delete(&self, provider: Provider) -> Result<()> {
        let api = self.push_api(provider)?;

        let existing = self.list(provider).await?;
        let Some(subscription) = existing.first() else {
            return Err(TrackbeatError::subscription("no subscription registered"));
        };

        let response = self
            .http
            .delete(format!("{}/{}", api.endpoint, subscription.id))
            .query(&[
                ("client_id", api.client_id),
                ("client_secret", api.client_secret),
            ])
            .send()
            .await
            .map_err(NetworkError::from)?;

        if !response.status().is_success() {
            return Err(TrackbeatError::subscription(redact::response_summary(
                response.status(),
            )));
        }

        tracing::info!(provider = %provider, "webhook subscription deleted");
        Ok(())
    }

    /// Check whether a presented subscription id belongs to this deployment
    ///
    /// Backs the event pipeline's anti-spoofing gate.
    pub async fn is_registered(&self, provider: Provider, subscription_id: i64) -> Result<bool> {
        let known = self.list(provider).await?;
        Ok(known.iter().any(|s| s.id == subscription_id))
    }
}
