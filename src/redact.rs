//! Log redaction helpers
//!
//! Anything that ends up in a log line goes through here first: values under
//! sensitive keys are masked to a short prefix, and raw HTTP response bodies
//! collapse to their status code.

use once_cell::sync::Lazy;
use serde_json::Value;

/// Keys whose values must never appear in logs
static SENSITIVE_KEYS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "access_token",
        "refresh_token",
        "token",
        "secret",
        "client_secret",
        "authorization",
        "code",
        "code_verifier",
        "verify_token",
        "hub.verify_token",
        "state",
    ]
});

fn is_sensitive(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|k| lower.contains(k))
}

/// Mask a secret to its first four characters
///
/// Short values are fully masked so the mask never reveals most of them.
#[must_use]
pub fn mask(value: &str) -> String {
    // Counted in chars so a multibyte value cannot split mid-codepoint.
    if value.chars().count() <= 8 {
        "****".to_string()
    } else {
        let prefix: String = value.chars().take(4).collect();
        format!("{}****", prefix)
    }
}

/// Redact a JSON document in place for logging
///
/// Walks objects and arrays; string values under sensitive keys are masked,
/// non-string values under sensitive keys are replaced wholesale.
pub fn redact_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if is_sensitive(key) {
                    *v = match v {
                        Value::String(s) => Value::String(mask(s)),
                        _ => Value::String("****".to_string()),
                    };
                } else {
                    redact_json(v);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_json(item);
            }
        }
        _ => {}
    }
}

/// Collapse an upstream response to the only loggable detail: its status
#[must_use]
pub fn response_summary(status: reqwest::StatusCode) -> String {
    format!("upstream responded {}", status.as_u16())
}
