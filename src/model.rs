//! Core data types for trackbeat
//!
//! Provider identity, OAuth state/token records, and webhook event shapes.

use crate::constants::TOKEN_EXPIRY_BUFFER_SECS;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The two tracked providers
///
/// A closed enum rather than a string key so adding a third provider is a
/// compile-time exhaustiveness check across the flow controller, token
/// client, and subscription manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Music streaming (listening history)
    Spotify,
    /// Fitness tracking (activity feed + webhooks)
    Strava,
}

impl Provider {
    /// Stable lowercase key used in URLs, storage, and logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Spotify => "spotify",
            Provider::Strava => "strava",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = crate::TrackbeatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spotify" => Ok(Provider::Spotify),
            "strava" => Ok(Provider::Strava),
            other => Err(crate::TrackbeatError::validation(format!(
                "Unknown provider: {}",
                other
            ))),
        }
    }
}

/// One-time anti-replay record backing the authorization-code flow
///
/// Created by flow init, consumed (read implies delete) by the callback or
/// discarded by expiry cleanup. Never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthStateRecord {
    /// Opaque random token, primary key
    pub state: String,

    /// Provider the init request targeted
    pub provider: Provider,

    /// PKCE code verifier, present only when the provider supports PKCE
    pub code_verifier: Option<String>,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Expiry time (minutes-scale TTL)
    pub expires_at: DateTime<Utc>,
}

impl OAuthStateRecord {
    /// Check whether the record has passed its expiry
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Persisted token set for a provider
///
/// One record per provider, overwritten whole on every successful exchange
/// or refresh. Owned exclusively by the token client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// Owning provider
    pub provider: Provider,

    /// Current access token
    pub access_token: String,

    /// Refresh token (not all providers issue one)
    pub refresh_token: Option<String>,

    /// Access token expiration time
    pub expires_at: Option<DateTime<Utc>>,

    /// Granted scope as reported by the provider
    pub scope: Option<String>,

    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl StoredToken {
    /// Check if the access token is expired or within the refresh buffer
    #[must_use]
    pub fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            Utc::now() + Duration::seconds(TOKEN_EXPIRY_BUFFER_SECS) >= expires_at
        } else {
            false
        }
    }
}

/// Provider-side webhook registration (read-mostly mirror)
///
/// The provider enforces at most one subscription per application; the
/// subscription manager always lists before create/delete decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    /// Provider-assigned subscription id
    pub id: i64,

    /// Callback URL this deployment registered
    pub callback_url: String,

    /// When the provider created the subscription
    #[serde(default)]
    pub created_at: Option<String>,
}

/// What happened to the object a webhook event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectType {
    Create,
    Update,
    Delete,
}

/// What kind of object a webhook event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Activity,
    Athlete,
}

/// Inbound webhook event
///
/// Transient: validated, authenticated, and (for activity events) handed to
/// the sync collaborator. Never persisted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub aspect_type: AspectType,
    pub object_type: ObjectType,
    pub object_id: i64,

    /// Athlete that owns the object (absent on some event kinds)
    #[serde(default)]
    pub owner_id: Option<i64>,

    pub subscription_id: i64,

    /// Provider-side event timestamp (epoch seconds)
    #[serde(default)]
    pub event_time: Option<i64>,

    /// Changed fields for update events (e.g. title, type, private)
    #[serde(default)]
    pub updates: Option<HashMap<String, serde_json::Value>>,
}

#[cfg(test)]
mod model_test {
    include!("model_test.rs");
}
