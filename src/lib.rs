//! eznotif - self-hosted Web Push notification server.
//!
//! Browsers register push subscriptions under a display name; operators
//! broadcast a notification to everyone or send to one subscriber. The
//! service signs messages with VAPID, encrypts them per RFC 8291, and prunes
//! subscriptions the push service reports as gone.
//!
//! # Architecture
//!
//! - **Store** - durable JSON file, atomic replace on every change
//! - **Registry** - in-memory collection, single writer, persist-then-publish
//! - **Delivery** - concurrent fan-out with per-send timeout and gone cleanup
//! - **Server** - axum HTTP adapter over registry and delivery
//!
//! # Modules
//!
//! - [`notifications`] - subscription types, VAPID keys, push sender
//! - [`registry`] - subscription registry
//! - [`delivery`] - broadcast and targeted send
//! - [`store`] - persistence
//! - [`server`] - HTTP API
//! - [`config`] - environment configuration

pub mod config;
pub mod constants;
pub mod delivery;
pub mod notifications;
pub mod registry;
pub mod server;
pub mod store;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use delivery::{DeliveryEngine, DeliveryError, DeliveryReport};
pub use notifications::push::{NotificationPayload, PushSubscription, SubscriptionRecord};
pub use notifications::sender::{DeliveryOptions, PushSender, SendError, WebPushSender};
pub use notifications::vapid::VapidKeys;
pub use registry::{Registry, RegistryError};
pub use server::AppState;
pub use store::{JsonFileStore, StoreError, SubscriptionStore};
