//! Configuration management for trackbeat
//!
//! All environment access happens here, once, at process start. The resulting
//! `Config` is injected by reference into the components that need it; there
//! are no ambient lookups at call sites.

use crate::constants::*;
use crate::model::Provider;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Complete trackbeat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Spotify application client id (PKCE public client)
    pub spotify_client_id: Option<String>,

    /// Strava application client id
    pub strava_client_id: Option<String>,

    /// Strava application client secret
    pub strava_client_secret: Option<String>,

    /// Redirect URI registered with both providers
    pub oauth_redirect_url: Option<String>,

    /// Where users land after a completed flow
    pub console_url: String,

    /// Where misconfigured init attempts silently land
    pub fallback_url: String,

    /// Publicly reachable webhook callback URL
    pub webhook_callback_url: Option<String>,

    /// Shared secret echoed during webhook verification
    pub webhook_verify_token: Option<String>,

    /// Storage DSN (sqlite path or ":memory:")
    pub storage_dsn: String,

    /// HTTP server settings
    pub http: HttpConfig,

    /// Lifetime of an authorization state record
    pub state_ttl: Duration,

    /// Site revalidation endpoint, if the response cache exposes one
    pub revalidate_url: Option<String>,

    /// Shared secret for the revalidation endpoint
    pub revalidate_secret: Option<String>,

    /// Spotify accounts service base (overridable for tests)
    pub spotify_accounts_base: String,

    /// Spotify Web API base (overridable for tests)
    pub spotify_api_base: String,

    /// Strava base (overridable for tests)
    pub strava_base: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spotify_client_id: None,
            strava_client_id: None,
            strava_client_secret: None,
            oauth_redirect_url: None,
            console_url: "/".to_string(),
            fallback_url: "/".to_string(),
            webhook_callback_url: None,
            webhook_verify_token: None,
            storage_dsn: ":memory:".to_string(),
            http: HttpConfig {
                host: DEFAULT_HTTP_HOST.to_string(),
                port: DEFAULT_HTTP_PORT,
            },
            state_ttl: OAUTH_STATE_TTL,
            revalidate_url: None,
            revalidate_secret: None,
            spotify_accounts_base: SPOTIFY_ACCOUNTS_BASE.to_string(),
            spotify_api_base: SPOTIFY_API_BASE.to_string(),
            strava_base: STRAVA_BASE.to_string(),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Build the configuration from environment variables
    ///
    /// Missing provider credentials are not an error here: the init flow
    /// degrades to a fallback redirect instead of leaking configuration
    /// state to unauthenticated callers.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let console_url = env_opt(ENV_CONSOLE_URL).unwrap_or(defaults.console_url);
        Self {
            spotify_client_id: env_opt(ENV_SPOTIFY_CLIENT_ID),
            strava_client_id: env_opt(ENV_STRAVA_CLIENT_ID),
            strava_client_secret: env_opt(ENV_STRAVA_CLIENT_SECRET),
            oauth_redirect_url: env_opt(ENV_OAUTH_REDIRECT_URL),
            fallback_url: env_opt(ENV_FALLBACK_URL).unwrap_or_else(|| console_url.clone()),
            console_url,
            webhook_callback_url: env_opt(ENV_WEBHOOK_CALLBACK_URL),
            webhook_verify_token: env_opt(ENV_WEBHOOK_VERIFY_TOKEN),
            storage_dsn: env_opt(ENV_DATABASE_URL)
                .unwrap_or_else(|| default_sqlite_dsn().to_string()),
            http: HttpConfig {
                host: env_opt(ENV_HTTP_HOST).unwrap_or(defaults.http.host),
                port: env_opt(ENV_HTTP_PORT)
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(DEFAULT_HTTP_PORT),
            },
            state_ttl: OAUTH_STATE_TTL,
            revalidate_url: env_opt(ENV_REVALIDATE_URL),
            revalidate_secret: env_opt(ENV_REVALIDATE_SECRET),
            spotify_accounts_base: env_opt(ENV_SPOTIFY_ACCOUNTS_BASE)
                .unwrap_or(defaults.spotify_accounts_base),
            spotify_api_base: env_opt(ENV_SPOTIFY_API_BASE).unwrap_or(defaults.spotify_api_base),
            strava_base: env_opt(ENV_STRAVA_BASE).unwrap_or(defaults.strava_base),
        }
    }

    /// Static OAuth settings for a provider
    ///
    /// `client_id` is `None` when the deployment is not configured for that
    /// provider; callers decide how that degrades (the init flow redirects
    /// to the fallback page).
    #[must_use]
    pub fn oauth_provider(&self, provider: Provider) -> ProviderOAuthConfig {
        match provider {
            Provider::Spotify => ProviderOAuthConfig {
                provider,
                authorize_url: format!("{}/authorize", self.spotify_accounts_base),
                token_url: format!("{}/api/token", self.spotify_accounts_base),
                client_id: self.spotify_client_id.clone(),
                client_secret: None,
                scope: SPOTIFY_SCOPES,
                pkce: true,
                // Spotify otherwise silently reuses a prior grant, which makes
                // re-linking a different account impossible from the console.
                extra_params: &[("show_dialog", "true")],
            },
            Provider::Strava => ProviderOAuthConfig {
                provider,
                authorize_url: format!("{}/oauth/authorize", self.strava_base),
                token_url: format!("{}/oauth/token", self.strava_base),
                client_id: self.strava_client_id.clone(),
                client_secret: self.strava_client_secret.clone(),
                scope: STRAVA_SCOPES,
                pkce: false,
                extra_params: &[("approval_prompt", "auto")],
            },
        }
    }
}

/// Static, per-provider OAuth settings
#[derive(Debug, Clone)]
pub struct ProviderOAuthConfig {
    pub provider: Provider,
    pub authorize_url: String,
    pub token_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: &'static str,
    pub pkce: bool,
    /// Fixed extra query parameters appended to the authorization URL
    pub extra_params: &'static [(&'static str, &'static str)],
}

#[cfg(test)]
mod config_test {
    include!("config_test.rs");
}
