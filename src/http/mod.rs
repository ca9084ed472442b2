//! HTTP server for trackbeat
//!
//! Wires the OAuth flow and the webhook pipeline into one axum router and
//! serves it. Both surfaces are unauthenticated by necessity (provider
//! redirects and provider callbacks), so every handler is written to fail
//! closed and leak nothing.

pub mod webhook;

use self::webhook::{WebhookState, create_webhook_routes};
use crate::auth::{OAuthFlowState, TokenClient, create_oauth_routes};
use crate::config::Config;
use crate::sync::{RevalidateHook, StravaActivitySync};
use crate::webhook::SubscriptionManager;
use crate::{Result, TrackbeatError};
use axum::{
    Router,
    extract::Json,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    LatencyUnit,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Error type for HTTP handlers
///
/// Maps internal errors onto sanitized responses. Anything unexpected
/// becomes a generic 500 with the detail kept in the server log.
#[derive(Debug)]
pub struct AppError(TrackbeatError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            TrackbeatError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            TrackbeatError::Storage(e) => {
                tracing::error!("Storage error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            TrackbeatError::TokenExchange { provider, .. }
            | TrackbeatError::Refresh { provider, .. } => {
                // Provider responses can echo credentials; only the variant
                // and provider reach the log, nothing reaches the client.
                tracing::error!(provider = %provider, "OAuth token operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Could not complete OAuth flow".to_string(),
                )
            }
            _ => {
                tracing::error!("Internal error: {:?}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<TrackbeatError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let config = Arc::new(config);

    let storage = crate::storage::create_storage(&config.storage_dsn).await?;
    let tokens = Arc::new(TokenClient::new(config.clone(), storage.clone())?);
    let subscriptions = Arc::new(SubscriptionManager::new(config.clone())?);

    let flow_state = OAuthFlowState {
        config: config.clone(),
        storage,
        tokens: tokens.clone(),
    };

    let webhook_state = WebhookState {
        config: config.clone(),
        subscriptions,
        sync: Arc::new(StravaActivitySync::new(&config, tokens.clone())),
        cache: Arc::new(RevalidateHook::new(&config, tokens.http().clone())),
    };

    let app = build_router(flow_state, webhook_state);

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let socket_addr: SocketAddr = addr
        .parse()
        .map_err(|e| TrackbeatError::config(format!("Invalid address {}: {}", addr, e)))?;

    tracing::info!("Starting HTTP server on {}", socket_addr);

    let listener = tokio::net::TcpListener::bind(socket_addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| TrackbeatError::config(format!("Server error: {}", e)))?;

    Ok(())
}

/// Build the router with all endpoints
pub fn build_router(flow_state: OAuthFlowState, webhook_state: WebhookState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .merge(create_oauth_routes().with_state(flow_state))
        .merge(create_webhook_routes().with_state(webhook_state))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new())
                        .on_response(
                            DefaultOnResponse::new()
                                .level(tracing::Level::INFO)
                                .latency_unit(LatencyUnit::Micros),
                        ),
                )
                // Both surfaces are hit by provider servers and top-level
                // browser navigations, never by cross-origin scripts.
                .layer(
                    CorsLayer::new()
                        .allow_methods([axum::http::Method::GET, axum::http::Method::POST]),
                ),
        )
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
