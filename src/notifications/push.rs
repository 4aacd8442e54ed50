//! Push subscription records and ingress validation.
//!
//! Browsers send the JSON form of their `PushSubscription` (endpoint,
//! optional expiration time, `p256dh`/`auth` keys). Everything is parsed into
//! explicit types here and validated before it can reach the registry.

// Rust guideline compliant 2026-02

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Decoded length of an uncompressed P-256 public key.
const P256DH_LEN: usize = 65;

/// Decoded length of the RFC 8291 auth secret.
const AUTH_SECRET_LEN: usize = 16;

/// Encryption keys from a browser push subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Browser's P-256 ECDH public key (base64url).
    pub p256dh: String,
    /// Shared auth secret (base64url).
    pub auth: String,
}

/// A browser's push subscription.
///
/// Contains everything needed to encrypt and address a message to one
/// browser. Serialized in the same shape as `PushSubscription.toJSON()`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Expiration time reported by the browser (ms since epoch), if any.
    #[serde(default)]
    pub expiration_time: Option<f64>,
    /// Encryption keys.
    pub keys: SubscriptionKeys,
}

impl PushSubscription {
    /// Check the endpoint and key material.
    ///
    /// The endpoint must be an absolute `http`/`https` URL. `p256dh` must be a
    /// base64url uncompressed P-256 point and `auth` a 16-byte secret.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_endpoint(&self.endpoint)?;

        let p256dh = decode_base64url(&self.keys.p256dh)
            .ok_or_else(|| ValidationError::new("keys.p256dh", "not valid base64url"))?;
        if p256dh.len() != P256DH_LEN || p256dh[0] != 0x04 {
            return Err(ValidationError::new(
                "keys.p256dh",
                "must be a 65-byte uncompressed P-256 point",
            ));
        }

        let auth = decode_base64url(&self.keys.auth)
            .ok_or_else(|| ValidationError::new("keys.auth", "not valid base64url"))?;
        if auth.len() != AUTH_SECRET_LEN {
            return Err(ValidationError::new("keys.auth", "must decode to 16 bytes"));
        }

        Ok(())
    }
}

/// One registered subscriber.
///
/// The endpoint (inside `subscription`) is the unique key. `name` is a display
/// label chosen by the subscribing client and may repeat.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    /// Display name supplied at subscribe time.
    pub name: String,
    /// Browser push subscription. Never mutated after creation.
    pub subscription: PushSubscription,
    /// When the record was registered.
    #[serde(default = "Utc::now")]
    pub subscribed_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Create a record stamped with the current time.
    pub fn new(name: impl Into<String>, subscription: PushSubscription) -> Self {
        Self {
            name: name.into(),
            subscription,
            subscribed_at: Utc::now(),
        }
    }

    /// The push endpoint, which uniquely identifies this record.
    pub fn endpoint(&self) -> &str {
        &self.subscription.endpoint
    }
}

/// Notification content delivered to the service worker.
///
/// Serialized as `{"title": ..., "message": ...}`; absent fields are omitted
/// so the service worker can apply its own defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Notification title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Notification body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl NotificationPayload {
    /// Build a payload with both fields set.
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            message: Some(message.into()),
        }
    }

    /// Encode as the JSON bytes that get encrypted into the push message.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Two optional strings cannot fail to serialize.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Body of a subscribe request, before validation.
///
/// Every field is optional so that a missing endpoint is reported as a
/// validation error naming the field rather than a generic parse failure.
#[derive(Debug, Default, Deserialize)]
pub struct SubscribeRequest {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Raw browser subscription.
    #[serde(default)]
    pub subscription: Option<RawSubscription>,
}

/// Unvalidated browser subscription.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubscription {
    /// Push endpoint URL.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Expiration time (ms since epoch).
    #[serde(default)]
    pub expiration_time: Option<f64>,
    /// Encryption keys.
    #[serde(default)]
    pub keys: Option<RawKeys>,
}

/// Unvalidated subscription keys.
#[derive(Debug, Default, Deserialize)]
pub struct RawKeys {
    /// ECDH public key.
    #[serde(default)]
    pub p256dh: Option<String>,
    /// Auth secret.
    #[serde(default)]
    pub auth: Option<String>,
}

impl SubscribeRequest {
    /// Check presence of every required field and convert to typed parts.
    ///
    /// Returns the name as given and a fully validated [`PushSubscription`].
    pub fn into_parts(self) -> Result<(String, PushSubscription), ValidationError> {
        let name = validate_name(self.name.as_deref().unwrap_or_default())?;

        let raw = self
            .subscription
            .ok_or_else(|| ValidationError::new("subscription", "is required"))?;
        let endpoint = raw
            .endpoint
            .ok_or_else(|| ValidationError::new("subscription.endpoint", "is required"))?;
        let keys = raw
            .keys
            .ok_or_else(|| ValidationError::new("subscription.keys", "is required"))?;
        let p256dh = keys
            .p256dh
            .ok_or_else(|| ValidationError::new("keys.p256dh", "is required"))?;
        let auth = keys
            .auth
            .ok_or_else(|| ValidationError::new("keys.auth", "is required"))?;

        let subscription = PushSubscription {
            endpoint,
            expiration_time: raw.expiration_time,
            keys: SubscriptionKeys { p256dh, auth },
        };
        subscription.validate()?;

        Ok((name, subscription))
    }
}

/// Reject a blank display name. Names are stored and matched verbatim.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("name", "must not be empty"));
    }
    Ok(name.to_string())
}

fn validate_endpoint(endpoint: &str) -> Result<(), ValidationError> {
    if endpoint.trim().is_empty() {
        return Err(ValidationError::new("subscription.endpoint", "is required"));
    }
    let url = Url::parse(endpoint)
        .map_err(|e| ValidationError::new("subscription.endpoint", format!("not a URL: {e}")))?;
    if !matches!(url.scheme(), "https" | "http") || url.host_str().is_none() {
        return Err(ValidationError::new(
            "subscription.endpoint",
            "must be an absolute http(s) URL",
        ));
    }
    Ok(())
}

/// Decode base64url, tolerating trailing `=` padding.
fn decode_base64url(value: &str) -> Option<Vec<u8>> {
    BASE64URL.decode(value.trim_end_matches('=')).ok()
}

/// Malformed subscriber input, rejected before any state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Offending field, dotted path.
    pub field: &'static str,
    /// What is wrong with it.
    pub reason: String,
}

impl ValidationError {
    /// Build a validation error for a field.
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid {}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// Shorten an endpoint for log output.
///
/// Push endpoints are long capability URLs; logging them whole leaks the
/// token and floods the log.
pub fn short_endpoint(endpoint: &str) -> String {
    const KEEP: usize = 48;
    if endpoint.len() <= KEEP {
        return endpoint.to_string();
    }
    let mut cut = KEEP;
    while !endpoint.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &endpoint[..cut])
}
