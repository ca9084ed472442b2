//! Inbound webhook endpoint
//!
//! Two entry points: the GET handshake that proves endpoint ownership during
//! subscription creation, and the POST pipeline that validates,
//! authenticates, and applies provider events.

use crate::config::Config;
use crate::model::{ObjectType, Provider, WebhookEvent};
use crate::redact;
use crate::sync::{ActivitySync, CacheInvalidator, activity_tag};
use crate::webhook::SubscriptionManager;
use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Webhook pipeline state
#[derive(Clone)]
pub struct WebhookState {
    pub config: Arc<Config>,
    pub subscriptions: Arc<SubscriptionManager>,
    pub sync: Arc<dyn ActivitySync>,
    pub cache: Arc<dyn CacheInvalidator>,
}

/// Create the webhook routes
pub fn create_webhook_routes() -> Router<WebhookState> {
    Router::new().route("/webhooks", get(handle_verification).post(handle_event))
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Render an inbound payload for logging with sensitive values masked
fn scrubbed_for_log(payload: &Value) -> Value {
    let mut scrubbed = payload.clone();
    redact::redact_json(&mut scrubbed);
    scrubbed
}

/// GET: subscription handshake
///
/// Echoes the challenge only when the shared verify token matches; anything
/// that looks like a handshake but doesn't check out fails closed. Requests
/// with no `hub.*` params at all are foreign traffic and are ignored.
async fn handle_verification(
    State(state): State<WebhookState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode");
    let challenge = params.get("hub.challenge");
    let token = params.get("hub.verify_token");

    if mode.is_none() && challenge.is_none() && token.is_none() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let (Some(mode), Some(challenge), Some(token)) = (mode, challenge, token) else {
        return error_body(StatusCode::BAD_REQUEST, "Bad Request");
    };

    let Some(expected) = state.config.webhook_verify_token.as_deref() else {
        // No secret configured means no handshake can ever succeed.
        return error_body(StatusCode::BAD_REQUEST, "Bad Request");
    };

    let token_matches: bool = token.as_bytes().ct_eq(expected.as_bytes()).into();
    if mode == "subscribe" && token_matches {
        tracing::info!("webhook handshake verified");
        (StatusCode::OK, Json(json!({ "hub.challenge": challenge }))).into_response()
    } else {
        tracing::warn!("webhook handshake failed verification");
        error_body(StatusCode::BAD_REQUEST, "Bad Request")
    }
}

/// POST: event ingestion
///
/// Parse, triage shape, authenticate the subscription id, dispatch. Fails
/// open (204) for payloads that aren't provider events at all, closed (403)
/// for anything that is but carries an unrecognized subscription id.
async fn handle_event(State(state): State<WebhookState>, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return error_body(StatusCode::BAD_REQUEST, "Bad Request"),
    };

    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!(payload = %scrubbed_for_log(&payload), "webhook payload received");
    }

    // Shape triage: the endpoint may receive unrelated traffic, so a payload
    // without any provider-event marker is accepted-and-ignored rather than
    // treated as an error.
    let Some(fields) = payload.as_object() else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let recognized = fields.contains_key("aspect_type")
        || fields.contains_key("object_type")
        || fields.contains_key("subscription_id");
    if !recognized {
        return StatusCode::NO_CONTENT.into_response();
    }

    // Recognized-but-invalid is a hard reject: unknown enum values, missing
    // required fields (including subscription_id), non-numeric ids.
    let event: WebhookEvent = match serde_json::from_value(payload) {
        Ok(event) => event,
        Err(_) => return error_body(StatusCode::BAD_REQUEST, "Bad Request"),
    };

    // Anti-spoofing gate: without this, any internet caller could forge
    // events claiming to be the provider. The presented id is deliberately
    // not logged on rejection.
    match state
        .subscriptions
        .is_registered(Provider::Strava, event.subscription_id)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("webhook event rejected: unrecognized subscription");
            return error_body(StatusCode::FORBIDDEN, "Forbidden");
        }
        Err(e) => {
            tracing::error!(error = %e, "subscription lookup failed");
            return error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    }

    match event.object_type {
        ObjectType::Athlete => {
            // Athlete-level changes (e.g. deauthorization) carry no
            // activity-feed side effects here.
            tracing::debug!(aspect = ?event.aspect_type, "athlete event acknowledged");
            (StatusCode::OK, "OK").into_response()
        }
        ObjectType::Activity => match state.sync.apply(&event).await {
            Ok(()) => {
                state.cache.invalidate(activity_tag()).await;
                tracing::info!(
                    aspect = ?event.aspect_type,
                    object_id = event.object_id,
                    "webhook event processed"
                );
                (StatusCode::OK, "OK").into_response()
            }
            Err(e) => {
                // Not retried here; the provider's webhook retry policy is
                // the redelivery mechanism.
                tracing::error!(error = %e, object_id = event.object_id, "event sync failed");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to sync webhook event",
                )
            }
        },
    }
}
