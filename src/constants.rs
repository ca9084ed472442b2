//! Constants used throughout trackbeat
//!
//! Provider endpoints, environment variable names, and runtime defaults.

use once_cell::sync::Lazy;
use std::time::Duration;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Get the home directory with fallback to current directory
pub fn get_home_dir() -> &'static str {
    static HOME_DIR: Lazy<String> = Lazy::new(|| {
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string())
    });
    &HOME_DIR
}

/// Default config directory (~/.trackbeat)
pub fn default_config_dir() -> &'static str {
    static CONFIG_DIR: Lazy<String> = Lazy::new(|| format!("{}/.trackbeat", get_home_dir()));
    &CONFIG_DIR
}

/// Default SQLite DSN (~/.trackbeat/trackbeat.db)
pub fn default_sqlite_dsn() -> &'static str {
    static SQLITE_DSN: Lazy<String> =
        Lazy::new(|| format!("{}/trackbeat.db", default_config_dir()));
    &SQLITE_DSN
}

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Default HTTP host
pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";

/// How long an authorization state token stays valid
pub const OAUTH_STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Access tokens within this window of expiry are treated as expired
pub const TOKEN_EXPIRY_BUFFER_SECS: i64 = 5 * 60;

/// Bounded timeout applied to every outbound provider call
pub const OUTBOUND_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Cache tag invalidated when a new activity event is accepted
pub const LATEST_ACTIVITY_TAG: &str = "latest-activity";

// ============================================================================
// PROVIDER ENDPOINTS
// ============================================================================

/// Spotify accounts service (authorization + token endpoints)
pub const SPOTIFY_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

/// Spotify Web API
pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com";

/// Strava site (authorization + token endpoints + API)
pub const STRAVA_BASE: &str = "https://www.strava.com";

/// Scopes requested from Spotify (space-separated, per Spotify API)
pub const SPOTIFY_SCOPES: &str = "user-read-recently-played user-top-read";

/// Scopes requested from Strava (comma-separated, per Strava API)
pub const STRAVA_SCOPES: &str = "activity:read_all";

// ============================================================================
// ENVIRONMENT VARIABLES
// ============================================================================

/// Environment variable: Spotify client id (PKCE public client, no secret)
pub const ENV_SPOTIFY_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";

/// Environment variable: Strava client id
pub const ENV_STRAVA_CLIENT_ID: &str = "STRAVA_CLIENT_ID";

/// Environment variable: Strava client secret
pub const ENV_STRAVA_CLIENT_SECRET: &str = "STRAVA_CLIENT_SECRET";

/// Environment variable: OAuth redirect URI registered with both providers
pub const ENV_OAUTH_REDIRECT_URL: &str = "OAUTH_REDIRECT_URL";

/// Environment variable: console page users land on after a completed flow
pub const ENV_CONSOLE_URL: &str = "CONSOLE_URL";

/// Environment variable: fallback landing page for misconfigured init attempts
pub const ENV_FALLBACK_URL: &str = "FALLBACK_URL";

/// Environment variable: publicly reachable webhook callback URL
pub const ENV_WEBHOOK_CALLBACK_URL: &str = "WEBHOOK_CALLBACK_URL";

/// Environment variable: shared secret echoed during webhook verification
pub const ENV_WEBHOOK_VERIFY_TOKEN: &str = "WEBHOOK_VERIFY_TOKEN";

/// Environment variable: storage DSN override
pub const ENV_DATABASE_URL: &str = "TRACKBEAT_DATABASE_URL";

/// Environment variable: HTTP host override
pub const ENV_HTTP_HOST: &str = "TRACKBEAT_HOST";

/// Environment variable: HTTP port override
pub const ENV_HTTP_PORT: &str = "TRACKBEAT_PORT";

/// Environment variable: site revalidation endpoint (optional)
pub const ENV_REVALIDATE_URL: &str = "REVALIDATE_URL";

/// Environment variable: shared secret for the revalidation endpoint
pub const ENV_REVALIDATE_SECRET: &str = "REVALIDATE_SECRET";

/// Environment variable: Spotify accounts base override (tests)
pub const ENV_SPOTIFY_ACCOUNTS_BASE: &str = "SPOTIFY_ACCOUNTS_BASE";

/// Environment variable: Spotify API base override (tests)
pub const ENV_SPOTIFY_API_BASE: &str = "SPOTIFY_API_BASE";

/// Environment variable: Strava base override (tests)
pub const ENV_STRAVA_BASE: &str = "STRAVA_BASE";
