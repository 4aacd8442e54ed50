//! Shared fakes for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};

use crate::notifications::push::{PushSubscription, SubscriptionKeys, SubscriptionRecord};
use crate::notifications::sender::{DeliveryOptions, PushSender, SendError};
use crate::store::{StoreError, SubscriptionStore};

/// A structurally valid subscription for `endpoint`.
pub(crate) fn subscription(endpoint: &str) -> PushSubscription {
    let mut point = [0u8; 65];
    point[0] = 0x04;
    PushSubscription {
        endpoint: endpoint.to_string(),
        expiration_time: None,
        keys: SubscriptionKeys {
            p256dh: BASE64URL.encode(point),
            auth: BASE64URL.encode([9u8; 16]),
        },
    }
}

/// In-memory store with switchable write failures.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryStore {
    records: Arc<Mutex<Vec<SubscriptionRecord>>>,
    fail: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub(crate) fn seed(&self, records: Vec<SubscriptionRecord>) {
        *self.records.lock().unwrap() = records;
    }

    pub(crate) fn snapshot(&self) -> Vec<SubscriptionRecord> {
        self.records.lock().unwrap().clone()
    }

    pub(crate) fn fail_saves(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SubscriptionStore for MemoryStore {
    fn load(&self) -> Result<Vec<SubscriptionRecord>, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, records: &[SubscriptionRecord]) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: "memory".into(),
                source: std::io::Error::other("injected failure"),
            });
        }
        *self.records.lock().unwrap() = records.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scripted outcome for one endpoint.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Deliver,
    Fail(SendError),
    Hang,
}

/// Push sender that answers from a script and records calls.
///
/// Endpoints without a script entry are delivered.
#[derive(Debug, Default)]
pub(crate) struct ScriptedSender {
    script: Mutex<HashMap<String, Outcome>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<(String, Vec<u8>)>>,
}

impl ScriptedSender {
    pub(crate) fn on(&self, endpoint: &str, outcome: Outcome) -> &Self {
        self.script
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), outcome);
        self
    }

    pub(crate) fn with_delay(&self, delay: Duration) -> &Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<u8>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushSender for ScriptedSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
        _options: &DeliveryOptions,
    ) -> Result<(), SendError> {
        self.calls
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload.to_vec()));

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self
            .script
            .lock()
            .unwrap()
            .get(&subscription.endpoint)
            .cloned()
            .unwrap_or(Outcome::Deliver);

        match outcome {
            Outcome::Deliver => Ok(()),
            Outcome::Fail(e) => Err(e),
            Outcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}
