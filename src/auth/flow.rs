//! OAuth flow controller
//!
//! One entry point dispatches on query shape: `provider=` starts an
//! authorization redirect, `code=`/`state=` completes one, anything else
//! lands on the console. Stateless between requests except via the state
//! store and token client.

use crate::auth::crypto;
use crate::config::Config;
use crate::http::AppError;
use crate::model::{OAuthStateRecord, Provider};
use crate::storage::Storage;
use crate::{TokenClient, TrackbeatError};
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use url::Url;

/// Flow controller state
#[derive(Clone)]
pub struct OAuthFlowState {
    pub config: Arc<Config>,
    pub storage: Arc<dyn Storage>,
    pub tokens: Arc<TokenClient>,
}

/// Create the OAuth flow routes
pub fn create_oauth_routes() -> Router<OAuthFlowState> {
    Router::new().route("/oauth", get(handle_oauth))
}

#[derive(Debug, Deserialize)]
struct OAuthQuery {
    provider: Option<String>,
    code: Option<String>,
    state: Option<String>,
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Single OAuth endpoint: init, callback, or idle redirect
async fn handle_oauth(
    State(flow): State<OAuthFlowState>,
    Query(query): Query<OAuthQuery>,
) -> Result<Response, AppError> {
    if let Some(provider) = query.provider.as_deref() {
        return handle_init(&flow, provider).await;
    }
    if query.code.is_some() || query.state.is_some() {
        return handle_callback(&flow, query).await;
    }
    Ok(Redirect::temporary(&flow.config.console_url).into_response())
}

/// INIT: validate config, mint state (+ PKCE pair), redirect to the provider
///
/// Misconfiguration and unknown providers degrade to a silent fallback
/// redirect; an unauthenticated caller learns nothing about which env vars
/// are set.
async fn handle_init(flow: &OAuthFlowState, provider: &str) -> Result<Response, AppError> {
    let Ok(provider) = provider.parse::<Provider>() else {
        tracing::debug!("init request for unknown provider, redirecting to fallback");
        return Ok(Redirect::temporary(&flow.config.fallback_url).into_response());
    };

    let oauth = flow.config.oauth_provider(provider);
    let (Some(client_id), Some(redirect_url)) = (
        oauth.client_id.as_deref(),
        flow.config.oauth_redirect_url.as_deref(),
    ) else {
        tracing::warn!(provider = %provider, "OAuth init without required configuration");
        return Ok(Redirect::temporary(&flow.config.fallback_url).into_response());
    };

    let state = crypto::generate_state()?;
    let code_verifier = if oauth.pkce {
        Some(crypto::generate_code_verifier()?)
    } else {
        None
    };

    let now = Utc::now();
    let record = OAuthStateRecord {
        state: state.clone(),
        provider,
        code_verifier: code_verifier.clone(),
        created_at: now,
        expires_at: now
            + chrono::Duration::from_std(flow.config.state_ttl)
                .unwrap_or_else(|_| chrono::Duration::minutes(10)),
    };
    flow.storage.save_state(&record).await?;

    // Opportunistic expiry sweep, detached: its outcome only feeds logging
    // and never the caller's result.
    let storage = flow.storage.clone();
    tokio::spawn(async move {
        match storage.cleanup_expired_states().await {
            Ok(count) if count > 0 => {
                tracing::debug!(count, "removed expired OAuth state records");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "OAuth state cleanup failed"),
        }
    });

    let mut authorize_url = Url::parse(&oauth.authorize_url)
        .map_err(|e| TrackbeatError::config(format!("Invalid authorize URL: {}", e)))?;
    {
        let mut pairs = authorize_url.query_pairs_mut();
        pairs
            .append_pair("client_id", client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_url)
            .append_pair("state", &state)
            .append_pair("scope", oauth.scope);
        if let Some(verifier) = &code_verifier {
            pairs
                .append_pair("code_challenge", &crypto::code_challenge(verifier))
                .append_pair("code_challenge_method", "S256");
        }
        for (key, value) in oauth.extra_params {
            pairs.append_pair(key, value);
        }
    }

    tracing::info!(provider = %provider, "redirecting to provider authorization endpoint");
    Ok(Redirect::temporary(authorize_url.as_str()).into_response())
}

/// CALLBACK: consume the state, exchange the code, land on the console
async fn handle_callback(flow: &OAuthFlowState, query: OAuthQuery) -> Result<Response, AppError> {
    let Some(code) = query.code.as_deref() else {
        return Ok(error_body(StatusCode::BAD_REQUEST, "Missing code"));
    };
    let Some(state) = query.state.as_deref() else {
        return Ok(error_body(StatusCode::BAD_REQUEST, "Missing state parameter"));
    };

    // Atomic consume: a replayed redirect finds nothing to take.
    let Some(record) = flow.storage.take_state(state).await? else {
        return Ok(error_body(
            StatusCode::BAD_REQUEST,
            "Invalid or expired OAuth state",
        ));
    };

    match flow
        .tokens
        .exchange_code(record.provider, code, record.code_verifier.as_deref())
        .await
    {
        Ok(_) => {
            tracing::info!(provider = %record.provider, "OAuth flow completed");
            Ok(Redirect::temporary(&flow.config.console_url).into_response())
        }
        Err(e) => {
            tracing::error!(provider = %record.provider, error = %e, "code exchange failed");
            Ok(error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not complete OAuth flow",
            ))
        }
    }
}
