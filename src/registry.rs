//! Subscription registry.
//!
//! The registry exclusively owns the in-memory working set of
//! [`SubscriptionRecord`]s and keeps it reconciled with a
//! [`SubscriptionStore`]. Nothing else mutates the collection.
//!
//! # Consistency
//!
//! Every mutation is copy-on-write: the next collection is computed on a
//! clone, saved to the store, and only published in memory once the save
//! succeeds. Writers hold the write lock across the save, so mutations are
//! serialized and readers never see a half-applied change. A failed save
//! leaves both the in-memory and on-disk views exactly as they were.
//!
//! # Uniqueness
//!
//! The endpoint is the key. Registering an endpoint that is already present
//! is a conflict, never an upsert.

// Rust guideline compliant 2026-02

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::notifications::push::{short_endpoint, validate_name, PushSubscription, SubscriptionRecord, ValidationError};
use crate::store::{StoreError, SubscriptionStore};

/// Errors from registry operations.
#[derive(Debug)]
pub enum RegistryError {
    /// Input rejected before any state change.
    Validation(ValidationError),
    /// The endpoint is already registered.
    Conflict {
        /// Endpoint that collided.
        endpoint: String,
    },
    /// No record matched.
    NotFound {
        /// Name or endpoint that was looked up.
        key: String,
    },
    /// The store rejected the write; nothing changed.
    Store(StoreError),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{e}"),
            Self::Conflict { endpoint } => {
                write!(f, "Subscription already exists for endpoint {}", short_endpoint(endpoint))
            }
            Self::NotFound { .. } => write!(f, "Subscription not found"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Conflict { .. } | Self::NotFound { .. } => None,
        }
    }
}

impl From<ValidationError> for RegistryError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<StoreError> for RegistryError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// In-memory subscription collection backed by a durable store.
#[derive(Debug)]
pub struct Registry {
    records: RwLock<Vec<SubscriptionRecord>>,
    store: Arc<dyn SubscriptionStore>,
}

impl Registry {
    /// Load the persisted collection and take ownership of the store.
    ///
    /// Duplicate endpoints in the file (hand edits, older versions) are
    /// collapsed to the first occurrence.
    pub fn open(store: impl SubscriptionStore + 'static) -> Result<Self, StoreError> {
        let loaded = store.load()?;
        let total = loaded.len();

        let mut seen = HashSet::new();
        let records: Vec<SubscriptionRecord> = loaded
            .into_iter()
            .filter(|r| seen.insert(r.endpoint().to_string()))
            .collect();

        if records.len() != total {
            log::warn!(
                "[Registry] Dropped {} duplicate subscription(s) while loading",
                total - records.len()
            );
        }
        log::info!("[Registry] Opened with {} subscription(s)", records.len());

        Ok(Self {
            records: RwLock::new(records),
            store: Arc::new(store),
        })
    }

    /// Snapshot of all records, in registration order.
    pub async fn list(&self) -> Vec<SubscriptionRecord> {
        self.records.read().await.clone()
    }

    /// Number of registered subscriptions.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// First record with the given name, in registration order.
    pub async fn find_by_name(&self, name: &str) -> Option<SubscriptionRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.name == name)
            .cloned()
    }

    /// Register a new subscriber.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Validation`] for a blank name or malformed subscription
    /// - [`RegistryError::Conflict`] if the endpoint is already registered
    /// - [`RegistryError::Store`] if persisting fails
    pub async fn register(
        &self,
        name: &str,
        subscription: PushSubscription,
    ) -> Result<SubscriptionRecord, RegistryError> {
        let name = validate_name(name)?;
        subscription.validate()?;
        let record = SubscriptionRecord::new(name, subscription);

        let created = record.clone();
        self.mutate(move |records| {
            if records.iter().any(|r| r.endpoint() == record.endpoint()) {
                return Err(RegistryError::Conflict {
                    endpoint: record.endpoint().to_string(),
                });
            }
            records.push(record);
            Ok(())
        })
        .await?;

        log::info!(
            "[Registry] Registered '{}' ({})",
            created.name,
            short_endpoint(created.endpoint())
        );
        Ok(created)
    }

    /// Remove the first record whose name matches.
    ///
    /// Names are not unique; when several records share a name only the
    /// earliest registered one is removed. Use [`Self::unregister_by_endpoint`]
    /// to address a specific subscriber.
    pub async fn unregister_by_name(&self, name: &str) -> Result<SubscriptionRecord, RegistryError> {
        let removed = self
            .mutate(|records| {
                let index = records
                    .iter()
                    .position(|r| r.name == name)
                    .ok_or_else(|| RegistryError::NotFound {
                        key: name.to_string(),
                    })?;
                Ok(records.remove(index))
            })
            .await?;

        log::info!("[Registry] Unregistered '{}' by name", removed.name);
        Ok(removed)
    }

    /// Remove the record with exactly this endpoint.
    pub async fn unregister_by_endpoint(
        &self,
        endpoint: &str,
    ) -> Result<SubscriptionRecord, RegistryError> {
        let removed = self
            .mutate(|records| {
                let index = records
                    .iter()
                    .position(|r| r.endpoint() == endpoint)
                    .ok_or_else(|| RegistryError::NotFound {
                        key: endpoint.to_string(),
                    })?;
                Ok(records.remove(index))
            })
            .await?;

        log::info!(
            "[Registry] Unregistered '{}' by endpoint ({})",
            removed.name,
            short_endpoint(endpoint)
        );
        Ok(removed)
    }

    /// Remove every record. Returns how many were removed.
    ///
    /// Clearing an empty registry succeeds without touching the store.
    pub async fn clear(&self) -> Result<usize, RegistryError> {
        let removed = self
            .mutate(|records| {
                let count = records.len();
                records.clear();
                Ok(count)
            })
            .await?;

        log::info!("[Registry] Cleared {removed} subscription(s)");
        Ok(removed)
    }

    /// Remove every record whose endpoint is in `endpoints`, saving once.
    ///
    /// Used by the delivery engine to prune gone endpoints. Endpoints that are
    /// not registered (already removed by a concurrent call) are ignored.
    pub async fn remove_by_endpoints(&self, endpoints: &HashSet<String>) -> Result<usize, RegistryError> {
        if endpoints.is_empty() {
            return Ok(0);
        }

        let removed = self
            .mutate(|records| {
                let before = records.len();
                records.retain(|r| !endpoints.contains(r.endpoint()));
                Ok(before - records.len())
            })
            .await?;

        if removed > 0 {
            log::info!("[Registry] Removed {removed} expired subscription(s)");
        }
        Ok(removed)
    }

    /// Apply `change` copy-on-write and persist before publishing.
    ///
    /// Records are only ever added or removed, so an unchanged length means
    /// nothing changed and the save is skipped.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Vec<SubscriptionRecord>) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut guard = self.records.write().await;
        let mut next = guard.clone();
        let output = change(&mut next)?;

        if next.len() != guard.len() {
            // File I/O runs off the runtime; the write guard is held across it
            let store = Arc::clone(&self.store);
            let saved = tokio::task::spawn_blocking(move || store.save(&next).map(|()| next))
                .await
                .map_err(StoreError::from)
                .and_then(|result| result)
                .inspect_err(|e| {
                    log::error!("[Registry] Failed to persist subscriptions, change discarded: {e}");
                })?;
            *guard = saved;
        }

        Ok(output)
    }
}
