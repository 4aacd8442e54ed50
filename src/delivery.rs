//! Fan-out delivery engine.
//!
//! Sends a notification to every registered subscriber (broadcast) or to
//! one subscriber by name, classifies failures, and prunes endpoints the
//! push service reports as gone.
//!
//! # Broadcast
//!
//! ```text
//! registry snapshot ─┬─ send(e1) ─┐
//!                    ├─ send(e2) ─┼─ join: all settled ─ classify ─ remove_by_endpoints(gone)
//!                    └─ send(eN) ─┘
//! ```
//!
//! Every send in a broadcast runs concurrently and is bounded by the
//! per-send timeout. Cleanup happens once, after every attempt has settled,
//! in a single batched registry call. Individual send failures never fail
//! the broadcast; only a failure persisting the cleanup does.

// Rust guideline compliant 2026-02

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;

use crate::notifications::push::{short_endpoint, NotificationPayload, PushSubscription};
use crate::notifications::sender::{DeliveryOptions, PushSender, SendError};
use crate::registry::{Registry, RegistryError};

/// One failed attempt within a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// Subscriber name.
    pub name: String,
    /// Subscriber endpoint.
    pub endpoint: String,
    /// Classified failure.
    pub error: SendError,
}

/// Outcome summary of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Sends attempted (registry size at snapshot time).
    pub attempted: usize,
    /// Sends the push service accepted.
    pub succeeded: usize,
    /// Sends that failed for any reason.
    pub failed: usize,
    /// Subscriptions removed because their endpoint is gone.
    pub removed: usize,
    /// Per-subscriber failure details.
    #[serde(skip)]
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    /// Failures classified as gone.
    pub fn gone(&self) -> impl Iterator<Item = &DeliveryFailure> {
        self.failures.iter().filter(|f| f.error.is_gone())
    }
}

/// Errors surfaced by the delivery engine.
#[derive(Debug)]
pub enum DeliveryError {
    /// No subscriber with that name.
    NotFound {
        /// Name that was looked up.
        name: String,
    },
    /// The single targeted send failed.
    Send(SendError),
    /// Cleanup of gone endpoints could not be persisted.
    Registry(RegistryError),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { .. } => write!(f, "Subscription not found"),
            Self::Send(e) => write!(f, "{e}"),
            Self::Registry(e) => write!(f, "Failed to clean up expired subscriptions: {e}"),
        }
    }
}

impl std::error::Error for DeliveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound { .. } => None,
            Self::Send(e) => Some(e),
            Self::Registry(e) => Some(e),
        }
    }
}

/// Sends notifications and feeds gone endpoints back into the registry.
#[derive(Clone)]
pub struct DeliveryEngine {
    registry: Arc<Registry>,
    sender: Arc<dyn PushSender>,
    options: DeliveryOptions,
}

impl std::fmt::Debug for DeliveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl DeliveryEngine {
    /// Create an engine over a registry and a push sender.
    pub fn new(registry: Arc<Registry>, sender: Arc<dyn PushSender>, options: DeliveryOptions) -> Self {
        Self {
            registry,
            sender,
            options,
        }
    }

    /// Delivery options applied to every send.
    pub fn options(&self) -> &DeliveryOptions {
        &self.options
    }

    /// Send `payload` to every registered subscriber.
    ///
    /// # Errors
    ///
    /// Only [`DeliveryError::Registry`], when removing gone endpoints fails
    /// to persist. Individual send failures are reported in the
    /// [`DeliveryReport`].
    pub async fn broadcast(&self, payload: &NotificationPayload) -> Result<DeliveryReport, DeliveryError> {
        let records = self.registry.list().await;
        let body = payload.to_bytes();

        log::info!("[Delivery] Broadcasting to {} subscriber(s)", records.len());

        let outcomes = join_all(
            records
                .iter()
                .map(|record| self.attempt(&record.subscription, &body)),
        )
        .await;

        let mut report = DeliveryReport {
            attempted: records.len(),
            ..DeliveryReport::default()
        };

        for (record, outcome) in records.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(error) => {
                    report.failed += 1;
                    report.failures.push(DeliveryFailure {
                        name: record.name.clone(),
                        endpoint: record.endpoint().to_string(),
                        error,
                    });
                }
            }
        }

        let gone: HashSet<String> = report.gone().map(|f| f.endpoint.clone()).collect();
        if !gone.is_empty() {
            report.removed = self
                .registry
                .remove_by_endpoints(&gone)
                .await
                .map_err(DeliveryError::Registry)?;
        }

        log::info!(
            "[Delivery] Broadcast done: {} attempted, {} succeeded, {} failed, {} removed",
            report.attempted,
            report.succeeded,
            report.failed,
            report.removed
        );
        Ok(report)
    }

    /// Send `payload` to the first subscriber named `name`.
    ///
    /// A gone endpoint is removed here too, the same as in a broadcast, and
    /// the failure is still returned so the caller knows the send did not
    /// happen.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::NotFound`] if no subscriber has that name
    /// - [`DeliveryError::Send`] if the push failed (after any cleanup)
    /// - [`DeliveryError::Registry`] if the cleanup could not be persisted
    pub async fn send_to_one(&self, name: &str, payload: &NotificationPayload) -> Result<(), DeliveryError> {
        let record = self
            .registry
            .find_by_name(name)
            .await
            .ok_or_else(|| DeliveryError::NotFound {
                name: name.to_string(),
            })?;

        let body = payload.to_bytes();
        match self.attempt(&record.subscription, &body).await {
            Ok(()) => {
                log::info!("[Delivery] Sent to '{}'", record.name);
                Ok(())
            }
            Err(error) => {
                if error.is_gone() {
                    let endpoints = HashSet::from([record.endpoint().to_string()]);
                    self.registry
                        .remove_by_endpoints(&endpoints)
                        .await
                        .map_err(DeliveryError::Registry)?;
                }
                log::warn!("[Delivery] Send to '{}' failed: {error}", record.name);
                Err(DeliveryError::Send(error))
            }
        }
    }

    /// One bounded send attempt.
    async fn attempt(&self, subscription: &PushSubscription, body: &[u8]) -> Result<(), SendError> {
        let send = self.sender.send(subscription, body, &self.options);
        match tokio::time::timeout(self.options.timeout, send).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "[Delivery] Send to {} timed out after {:?}",
                    short_endpoint(&subscription.endpoint),
                    self.options.timeout
                );
                Err(SendError::transient(format!(
                    "Timed out after {:?}",
                    self.options.timeout
                )))
            }
        }
    }
}
