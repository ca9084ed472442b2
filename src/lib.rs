//! trackbeat - OAuth and webhook integration for a personal site
//!
//! Connects a personal website's backing service to Spotify (listening
//! history) and Strava (fitness activity). Covers the full credential
//! lifecycle:
//! - Browser-facing OAuth authorization-code flows (PKCE for Spotify)
//! - Token persistence and transparent refresh-and-retry for API calls
//! - Strava webhook subscriptions and the event ingestion pipeline
//!
//! # Example
//!
//! ```rust,no_run
//! use trackbeat::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env();
//!     trackbeat::http::start_server(config).await?;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod constants;
pub mod error;
pub mod model;

// Infrastructure
pub mod config;
pub mod redact;
pub mod storage;

// Domain
pub mod auth;
pub mod sync;
pub mod webhook;

// Interface layers
pub mod cli;
pub mod http;

// Re-exports for convenience
pub use auth::{OAuthFlowState, TokenClient, create_oauth_routes};
pub use error::{NetworkError, Result, StorageError, TrackbeatError};
pub use model::{Provider, StoredToken, WebhookEvent, WebhookSubscription};

/// Initialize logging for the application
pub fn init_logging() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "trackbeat=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
