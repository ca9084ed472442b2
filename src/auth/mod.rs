//! Third-party authorization
//!
//! The authorization-code flow (with PKCE for Spotify, without for Strava):
//! - **crypto**: state tokens and the PKCE verifier/challenge pair
//! - **client**: code exchange, forced refresh, refresh-and-retry fetch
//! - **flow**: the `/oauth` init/callback controller

pub mod client;
pub mod crypto;
pub mod flow;

pub use client::TokenClient;
pub use flow::{OAuthFlowState, create_oauth_routes};
