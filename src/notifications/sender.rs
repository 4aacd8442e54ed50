//! Push sender capability.
//!
//! [`PushSender`] is the seam between the delivery engine and the push
//! transport. The engine hands it a subscription, an already-serialized
//! payload and delivery options; the sender returns success or a classified
//! [`SendError`]. [`WebPushSender`] is the production implementation:
//! RFC 8291 encryption and RFC 8292 VAPID signing via the `web-push` crate,
//! with the HTTP request sent through a shared `reqwest::Client`.

// Rust guideline compliant 2026-02

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::push::{short_endpoint, PushSubscription};
use super::vapid::VapidKeys;
use crate::constants::{GONE_STATUSES, HTTP_CONNECT_TIMEOUT, PUSH_TTL_SECS, SEND_TIMEOUT};

/// Push message urgency (RFC 8030 §5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    /// Deliver only on power and wifi.
    VeryLow,
    /// Deliver on power or wifi.
    Low,
    /// Deliver when not on low battery.
    Normal,
    /// Deliver immediately.
    High,
}

impl Urgency {
    /// Header value for the `Urgency` request header.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryLow => "very-low",
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

/// Per-message delivery options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOptions {
    /// Seconds the push service may hold the message for an offline device.
    pub ttl: u32,
    /// Optional urgency hint.
    pub urgency: Option<Urgency>,
    /// Upper bound on a single send, enforced by the delivery engine.
    pub timeout: Duration,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            ttl: PUSH_TTL_SECS,
            urgency: None,
            timeout: SEND_TIMEOUT,
        }
    }
}

/// A failed push attempt, classified for cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The push service says the endpoint no longer exists (404/410).
    ///
    /// Terminal: the subscription should be removed.
    Gone {
        /// HTTP status returned by the push service.
        status: u16,
    },
    /// Any other failure: network error, timeout, rate limiting, 5xx,
    /// rejected payload. The endpoint may recover, so the record is kept.
    Transient {
        /// HTTP status, if the push service answered at all.
        status: Option<u16>,
        /// Human-readable cause.
        reason: String,
    },
}

impl SendError {
    /// Classify a non-success HTTP status from a push service.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        if GONE_STATUSES.contains(&status) {
            Self::Gone { status }
        } else {
            Self::Transient {
                status: Some(status),
                reason: body.into(),
            }
        }
    }

    /// Build a transient failure that never reached a status code.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            status: None,
            reason: reason.into(),
        }
    }

    /// Whether this failure makes the subscription eligible for cleanup.
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Gone { .. })
    }

    /// HTTP status reported by the push service, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Gone { status } => Some(*status),
            Self::Transient { status, .. } => *status,
        }
    }
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gone { status } => write!(f, "Subscription gone (HTTP {status})"),
            Self::Transient {
                status: Some(status),
                reason,
            } => write!(f, "Push send failed (HTTP {status}): {reason}"),
            Self::Transient {
                status: None,
                reason,
            } => write!(f, "Push send failed: {reason}"),
        }
    }
}

impl std::error::Error for SendError {}

/// Capability that delivers one encrypted push message to one subscription.
///
/// Implementors must not retry; the engine decides what a failure means.
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Deliver `payload` to `subscription`.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Gone`] when the push service reports the endpoint
    /// no longer exists, otherwise [`SendError::Transient`].
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
        options: &DeliveryOptions,
    ) -> Result<(), SendError>;
}

/// Web push sender using VAPID authentication.
///
/// The `reqwest::Client` is shared across sends for connection pooling;
/// cloning the sender is cheap.
#[derive(Debug, Clone)]
pub struct WebPushSender {
    client: reqwest::Client,
    vapid: VapidKeys,
    contact: String,
}

impl WebPushSender {
    /// Create a sender with its own HTTP client.
    ///
    /// `contact` becomes the VAPID `sub` claim (`mailto:` or `https:` URL) so
    /// push service operators can reach whoever runs this server.
    pub fn new(vapid: VapidKeys, contact: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .context("Failed to build push HTTP client")?;
        Ok(Self::with_client(client, vapid, contact))
    }

    /// Create a sender around an existing client.
    pub fn with_client(client: reqwest::Client, vapid: VapidKeys, contact: impl Into<String>) -> Self {
        Self {
            client,
            vapid,
            contact: contact.into(),
        }
    }

    /// Encrypt and sign the message for one subscription.
    fn build_message(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
        ttl: u32,
    ) -> Result<web_push::WebPushMessage, web_push::WebPushError> {
        use web_push::{ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessageBuilder};

        let sub_info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut sig_builder =
            VapidSignatureBuilder::from_base64(self.vapid.private_key_base64url(), &sub_info)?;
        sig_builder.add_claim("sub", self.contact.as_str());
        let signature = sig_builder.build()?;

        let mut builder = WebPushMessageBuilder::new(&sub_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature);
        builder.set_ttl(ttl);
        builder.build()
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
        options: &DeliveryOptions,
    ) -> Result<(), SendError> {
        let message = self
            .build_message(subscription, payload, options.ttl)
            .map_err(|e| SendError::transient(format!("Failed to build web push message: {e}")))?;

        // web-push only builds the message; the POST goes through our client
        let mut request = self
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(urgency) = options.urgency {
            request = request.header("Urgency", urgency.as_str());
        }

        if let Some(topic) = message.topic {
            request = request.header("Topic", topic);
        }

        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }

            request = request.body(push_payload.content);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SendError::transient(format!("Web push HTTP request failed: {e}")))?;
        let status = response.status().as_u16();

        if response.status().is_success() {
            log::debug!("[WebPush] Delivered to {}", short_endpoint(&subscription.endpoint));
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let error = SendError::from_status(status, body);
        match &error {
            SendError::Gone { .. } => log::info!(
                "[WebPush] Subscription expired (HTTP {status}): {}",
                short_endpoint(&subscription.endpoint)
            ),
            SendError::Transient { .. } if status == 429 => {
                log::warn!("[WebPush] Rate limited (429)");
            }
            SendError::Transient { .. } => log::warn!(
                "[WebPush] Send failed (HTTP {status}) for {}",
                short_endpoint(&subscription.endpoint)
            ),
        }
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gone_classification() {
        assert!(SendError::from_status(410, "").is_gone());
        assert!(SendError::from_status(404, "").is_gone());
        assert!(!SendError::from_status(429, "slow down").is_gone());
        assert!(!SendError::from_status(500, "oops").is_gone());
        assert!(!SendError::from_status(413, "too big").is_gone());
        assert!(!SendError::transient("connection refused").is_gone());
    }

    #[test]
    fn test_status_is_preserved() {
        assert_eq!(SendError::from_status(410, "").status(), Some(410));
        assert_eq!(SendError::from_status(503, "").status(), Some(503));
        assert_eq!(SendError::transient("timeout").status(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SendError::Gone { status: 410 }.to_string(),
            "Subscription gone (HTTP 410)"
        );
        assert_eq!(
            SendError::from_status(500, "boom").to_string(),
            "Push send failed (HTTP 500): boom"
        );
    }

    #[test]
    fn test_default_options() {
        let options = DeliveryOptions::default();
        assert_eq!(options.ttl, PUSH_TTL_SECS);
        assert_eq!(options.timeout, SEND_TIMEOUT);
        assert!(options.urgency.is_none());
    }

    #[test]
    fn test_urgency_header_values() {
        assert_eq!(Urgency::VeryLow.as_str(), "very-low");
        assert_eq!(Urgency::High.as_str(), "high");
    }
}
