//! Scrubbing of secrets from values that end up in logs.
//!
//! Two shapes of secret reach log lines: credential-like keys inside JSON
//! payloads (event bodies, stored records) and signed query parameters inside
//! presigned object-store URLs. Both are replaced with [`REDACTED`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Placeholder written in place of a secret.
pub const REDACTED: &str = "***REDACTED***";

/// Keys whose values are always hidden (compared case-insensitively).
const SENSITIVE_KEYS: &[&str] = &[
    "user_id",
    "email",
    "api_key",
    "gemini_api_key",
    "access_key",
    "secret_key",
    "password",
];

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&lower.as_str()) || lower.ends_with("_token")
}

/// Return a copy of `value` with every sensitive key's value replaced.
///
/// Objects are walked recursively, including objects nested inside arrays.
/// The replacement happens whatever the original value's type was.
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if is_sensitive_key(k) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_value(v)
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        other => other.clone(),
    }
}

static RE_SIGNED_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([?&](?:[^=&#]*(?:signature|credential|token)[^=&#]*|sig)=)[^&#]*").unwrap()
});

/// Hide signature, credential and token query values of a URL.
///
/// Non-URL strings and URLs without such parameters are returned unchanged.
pub fn redact_url(url: &str) -> String {
    RE_SIGNED_PARAM
        .replace_all(url, format!("${{1}}{}", REDACTED).as_str())
        .into_owned()
}
