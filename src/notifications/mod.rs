//! Web push notification infrastructure.
//!
//! Holds the typed subscription records browsers hand us, the VAPID
//! keypair that authenticates this server to push services, and the push
//! sender capability that actually delivers encrypted messages.
//!
//! # Architecture
//!
//! ```text
//! Operator calls notify / notifyone
//!     ↓
//! DeliveryEngine fans out over the registry snapshot
//!     ↓
//! PushSender encrypts (RFC 8291) + signs (RFC 8292) and POSTs (RFC 8030)
//!     ↓
//! Push service delivers to the browser's service worker
//! ```
//!
//! # Push Subscriptions
//!
//! Browsers POST their `PushSubscription.toJSON()` (endpoint + keys) along
//! with a display name. The endpoint is the unique key: one record per
//! endpoint. When a push service answers 404 or 410 the record is pruned.

// Rust guideline compliant 2026-02

pub mod push;
pub mod sender;
pub mod vapid;
