//! The in-memory Global Suppression Hub: a hot index
//! mirroring the persistent store's entries, plus a subscriber
//! fan-out for membership-change events. Non-authoritative — the
//! [`suppression_store::Store`] is the one source of truth; the Hub
//! is rebuilt from it at warmup and kept in sync by every write that
//! passes through [`Hub::suppress`]/[`Hub::remove`].

pub mod error;

use chrono::Utc;
use dashmap::DashMap;
use futures::{Stream, StreamExt};
pub use error::{HubError, HubResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use suppression_api_types::{HubEvent, HubEventKind, HubStatsResponse};
use suppression_fingerprint::{canonicalize, resolve};
use suppression_store::Store;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Per-fingerprint metadata kept in the hot index.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    pub reason: String,
    pub source: String,
    pub list_id: Option<Uuid>,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Capacity of each subscriber's event channel.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

pub struct Hub {
    index: DashMap<String, EntryMeta>,
    subscribers: DashMap<Uuid, mpsc::Sender<HubEvent>>,
    store: Store,
    warm: AtomicBool,
    loaded: AtomicUsize,
}

impl Hub {
    /// Construct a Hub bound to `store`. Callers must invoke
    /// [`Hub::warmup`] before traffic is accepted; until then every
    /// query-shaped operation returns [`HubError::WarmingUp`].
    pub fn new(store: Store) -> Arc<Self> {
        Arc::new(Self {
            index: DashMap::new(),
            subscribers: DashMap::new(),
            store,
            warm: AtomicBool::new(false),
            loaded: AtomicUsize::new(0),
        })
    }

    /// Stream every fingerprint out of the store to populate `M`.
    /// Until this completes, every read operation fails with
    /// `HubError::WarmingUp`.
    pub async fn warmup(&self) -> HubResult<()> {
        let mut stream = self.store.export_fingerprints();
        let mut count = 0usize;
        let now = Utc::now();
        while let Some(fp) = stream.next().await {
            self.index.entry(fp).or_insert_with(|| EntryMeta {
                reason: "warmup".to_string(),
                source: "store".to_string(),
                list_id: None,
                timestamp: now,
            });
            count += 1;
            self.loaded.store(count, Ordering::Relaxed);
        }
        tracing::info!(count, "hub warmup complete");
        self.warm.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_warm(&self) -> bool {
        self.warm.load(Ordering::Acquire)
    }

    fn require_warm(&self) -> HubResult<()> {
        if self.is_warm() {
            Ok(())
        } else {
            Err(HubError::WarmingUp {
                loaded: self.loaded.load(Ordering::Relaxed),
            })
        }
    }

    /// O(1) membership check after canonicalizing/resolving `token`.
    pub fn is_suppressed(&self, token: &str) -> HubResult<bool> {
        self.require_warm()?;
        let resolved = resolve(token);
        Ok(self.index.contains_key(resolved.fingerprint().as_str()))
    }

    /// Canonicalize every input and report membership per unique
    /// canonical key, preserving the caller's original spelling in the
    /// returned map's keys.
    pub fn check_batch(&self, inputs: &[String]) -> HubResult<std::collections::HashMap<String, bool>> {
        self.require_warm()?;
        let mut out = std::collections::HashMap::with_capacity(inputs.len());
        for input in inputs {
            let resolved = resolve(input);
            let suppressed = self.index.contains_key(resolved.fingerprint().as_str());
            out.insert(input.clone(), suppressed);
        }
        Ok(out)
    }

    /// Canonicalize, insert into the hot index, persist a single-entry
    /// add to the store, then fan out an `added` event. The in-memory
    /// insert and the store write are performed before the fan-out so
    /// that a subscriber reacting to the event always sees a hub that
    /// already agrees with the store.
    pub async fn suppress(
        &self,
        email: &str,
        reason: String,
        source: String,
        category: String,
        list_id: Option<Uuid>,
    ) -> HubResult<(bool, String)> {
        let canonical = canonicalize(email);
        let resolved = resolve(&canonical);
        let fingerprint = resolved.fingerprint().as_str().to_string();

        let is_new_store = self
            .store
            .add(
                list_id,
                Some(canonical.clone()),
                fingerprint.clone(),
                reason.clone(),
                source.clone(),
                category,
            )
            .await?;

        let now = Utc::now();
        let is_new_index = self
            .index
            .insert(
                fingerprint.clone(),
                EntryMeta {
                    reason: reason.clone(),
                    source: source.clone(),
                    list_id,
                    timestamp: now,
                },
            )
            .is_none();

        let is_new = is_new_store || is_new_index;

        self.publish(HubEvent {
            kind: HubEventKind::Added,
            fingerprint: fingerprint.clone(),
            reason,
            source,
            timestamp: now,
        });

        Ok((is_new, fingerprint))
    }

    /// Delete every entry with this fingerprint from the store and the
    /// hot index, then fan out a `removed` event.
    pub async fn remove(&self, token: &str) -> HubResult<String> {
        let resolved = resolve(token);
        let fingerprint = resolved.fingerprint().as_str().to_string();

        self.store.remove(fingerprint.clone()).await?;
        self.index.remove(&fingerprint);

        self.publish(HubEvent {
            kind: HubEventKind::Removed,
            fingerprint: fingerprint.clone(),
            reason: String::new(),
            source: String::new(),
            timestamp: Utc::now(),
        });

        Ok(fingerprint)
    }

    /// `|M|`.
    pub fn count(&self) -> usize {
        self.index.len()
    }

    /// Delegates to the store's cached-aggregate stats query: fast regardless of hub warmup state, since it
    /// never touches the in-memory index.
    pub async fn stats(&self) -> HubResult<HubStatsResponse> {
        Ok(self.store.stats().await?)
    }

    /// Lazily iterate every fingerprint currently in the hot index.
    /// Snapshots the key set up front so a concurrent writer cannot
    /// invalidate the iterator mid-stream; this trades perfect
    /// live-ness for a `DashMap` iteration that cannot panic under
    /// concurrent mutation.
    pub fn export_fingerprints(&self) -> impl Stream<Item = String> + Send + 'static {
        let keys: Vec<String> = self.index.iter().map(|entry| entry.key().clone()).collect();
        futures::stream::iter(keys)
    }

    /// Register a new subscriber and return its receiving half.
    pub fn subscribe(&self, id: Uuid) -> mpsc::Receiver<HubEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        self.subscribers.insert(id, tx);
        rx
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.remove(&id);
    }

    /// Fan out `event` to every subscriber. A subscriber whose channel
    /// is full has the event dropped rather than stalling the
    /// publisher; per-subscriber FIFO is
    /// preserved, but there is no ordering guarantee across
    /// subscribers.
    fn publish(&self, event: HubEvent) {
        for entry in self.subscribers.iter() {
            if let Err(err) = entry.value().try_send(event.clone()) {
                match err {
                    mpsc::error::TrySendError::Full(_) => {
                        tracing::warn!(subscriber = %entry.key(), "hub subscriber channel full, dropping event");
                    }
                    mpsc::error::TrySendError::Closed(_) => {
                        tracing::debug!(subscriber = %entry.key(), "hub subscriber channel closed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suppression.db");
        let store = Store::open(path.to_str().unwrap()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn refuses_queries_before_warmup() {
        let (_dir, store) = temp_store();
        let hub = Hub::new(store);
        let err = hub.is_suppressed("alice@example.com").unwrap_err();
        assert!(matches!(err, HubError::WarmingUp { .. }));
    }

    #[tokio::test]
    async fn warmup_then_suppress_and_check() {
        let (_dir, store) = temp_store();
        let hub = Hub::new(store);
        hub.warmup().await.unwrap();
        assert_eq!(hub.count(), 0);

        let (is_new, fingerprint) = hub
            .suppress(
                "Alice@Example.com",
                "bounce".to_string(),
                "test".to_string(),
                "hard_bounce".to_string(),
                None,
            )
            .await
            .unwrap();
        assert!(is_new);
        assert!(!fingerprint.is_empty());

        assert!(hub.is_suppressed("alice@example.com").unwrap());
        assert_eq!(hub.count(), 1);

        let (is_new_again, _) = hub
            .suppress(
                "alice@example.com",
                "bounce".to_string(),
                "test".to_string(),
                "hard_bounce".to_string(),
                None,
            )
            .await
            .unwrap();
        assert!(!is_new_again);
    }

    #[tokio::test]
    async fn remove_clears_membership() {
        let (_dir, store) = temp_store();
        let hub = Hub::new(store);
        hub.warmup().await.unwrap();
        hub.suppress(
            "bob@example.com",
            "manual".to_string(),
            "api".to_string(),
            "manual".to_string(),
            None,
        )
        .await
        .unwrap();
        assert!(hub.is_suppressed("bob@example.com").unwrap());

        hub.remove("bob@example.com").await.unwrap();
        assert!(!hub.is_suppressed("bob@example.com").unwrap());
        assert_eq!(hub.count(), 0);
    }

    #[tokio::test]
    async fn check_batch_preserves_original_spelling() {
        let (_dir, store) = temp_store();
        let hub = Hub::new(store);
        hub.warmup().await.unwrap();
        hub.suppress(
            "carol@example.com",
            "manual".to_string(),
            "api".to_string(),
            "manual".to_string(),
            None,
        )
        .await
        .unwrap();

        let result = hub
            .check_batch(&["Carol@Example.com".to_string(), "dave@example.com".to_string()])
            .unwrap();
        assert_eq!(result.get("Carol@Example.com"), Some(&true));
        assert_eq!(result.get("dave@example.com"), Some(&false));
    }

    #[tokio::test]
    async fn subscriber_receives_added_event() {
        let (_dir, store) = temp_store();
        let hub = Hub::new(store);
        hub.warmup().await.unwrap();
        let id = Uuid::new_v4();
        let mut rx = hub.subscribe(id);

        hub.suppress(
            "erin@example.com",
            "manual".to_string(),
            "api".to_string(),
            "manual".to_string(),
            None,
        )
        .await
        .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, HubEventKind::Added);
    }

    #[tokio::test]
    async fn full_subscriber_channel_drops_without_stalling() {
        let (_dir, store) = temp_store();
        let hub = Hub::new(store);
        hub.warmup().await.unwrap();
        let id = Uuid::new_v4();
        let _rx = hub.subscribe(id);

        for i in 0..(SUBSCRIBER_CHANNEL_CAPACITY + 10) {
            hub.suppress(
                &format!("user{i}@example.com"),
                "manual".to_string(),
                "api".to_string(),
                "manual".to_string(),
                None,
            )
            .await
            .unwrap();
        }
        // Reaching here without blocking forever demonstrates the
        // drop-on-full contract held.
    }
}
