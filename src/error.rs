//! Error types for trackbeat
//!
//! This module provides the error hierarchy using thiserror.
//! All errors can be converted to TrackbeatError for unified handling.

use thiserror::Error;

/// Main error type for trackbeat operations
#[derive(Error, Debug)]
pub enum TrackbeatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Secure random source unavailable: {0}")]
    Entropy(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Token exchange failed for {provider}: {message}")]
    TokenExchange { provider: String, message: String },

    #[error("Token refresh failed for {provider}: {message}")]
    Refresh { provider: String, message: String },

    #[error("Subscription API error: {0}")]
    SubscriptionApi(String),

    #[error("Sync failed: {0}")]
    Sync(String),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

// Implement From for sqlx::Error
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<sqlx::Error> for TrackbeatError {
    fn from(err: sqlx::Error) -> Self {
        TrackbeatError::Storage(StorageError::from(err))
    }
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Convenient result type for trackbeat operations
pub type Result<T> = std::result::Result<T, TrackbeatError>;

impl TrackbeatError {
    /// Create a config error
    #[inline]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        TrackbeatError::Config(msg.into())
    }

    /// Create a validation error
    #[inline]
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        TrackbeatError::Validation(msg.into())
    }

    /// Create a storage error
    #[inline]
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        TrackbeatError::Storage(StorageError::Database(msg.into()))
    }

    /// Create a token exchange error
    #[inline]
    pub fn token_exchange<P: Into<String>, S: Into<String>>(provider: P, msg: S) -> Self {
        TrackbeatError::TokenExchange {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Create a refresh error
    #[inline]
    pub fn refresh<P: Into<String>, S: Into<String>>(provider: P, msg: S) -> Self {
        TrackbeatError::Refresh {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Create a subscription API error
    #[inline]
    pub fn subscription<S: Into<String>>(msg: S) -> Self {
        TrackbeatError::SubscriptionApi(msg.into())
    }

    /// Create a sync error
    #[inline]
    pub fn sync<S: Into<String>>(msg: S) -> Self {
        TrackbeatError::Sync(msg.into())
    }
}
