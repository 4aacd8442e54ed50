//! Application-wide constants for eznotif.
//!
//! Centralizes timeouts, delivery defaults and file names so they are
//! discoverable in one place.
//!
//! # Categories
//!
//! - **Timeouts**: push service request bounds
//! - **Delivery**: web push message defaults
//! - **Storage**: persisted state layout
//! - **Server**: listener defaults

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// Per-send timeout applied by the delivery engine.
///
/// One unresponsive push service must not stall a broadcast indefinitely.
/// The engine gives up on a single send after this long and counts it as a
/// transient failure (the subscription is kept).
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect timeout for the shared push HTTP client.
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Delivery
// ============================================================================

/// Time-to-live for queued push messages, in seconds (24 hours).
///
/// Push services hold undelivered messages for at most this long while the
/// device is offline.
pub const PUSH_TTL_SECS: u32 = 86_400;

/// HTTP statuses a push service uses to say an endpoint is gone for good.
///
/// 404 Not Found and 410 Gone are terminal: the subscription is removed.
pub const GONE_STATUSES: [u16; 2] = [404, 410];

// ============================================================================
// Storage
// ============================================================================

/// Application directory name under the platform data dir.
pub const APP_DIR_NAME: &str = "eznotif";

/// File name of the persisted subscription collection.
pub const SUBSCRIPTIONS_FILE: &str = "subscriptions.json";

/// Persisted document format version.
pub const STORE_FORMAT_VERSION: u32 = 1;

// ============================================================================
// Server
// ============================================================================

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";
