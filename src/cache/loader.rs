//! Stale-while-revalidate read path.
//!
//! `load` is the one entry point every screen goes through: fresh entries
//! return without touching the network, stale entries return immediately and
//! refresh in the background, absent entries block on the fetch. Concurrent
//! work on one key collapses into a single in-flight request shared by all
//! callers; a forced refresh and a periodic tick on the same key therefore
//! serialize instead of racing.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::infra::fetch::FetchError;

use super::keys::CacheKey;
use super::store::CacheStore;

pub(crate) const METRIC_STALE_SERVED: &str = "campanile_cache_stale_served_total";
pub(crate) const METRIC_REVALIDATE_SUCCESS: &str = "campanile_revalidate_success_total";
pub(crate) const METRIC_REVALIDATE_FAILURE: &str = "campanile_revalidate_failure_total";
pub(crate) const METRIC_FLIGHT_JOINED: &str = "campanile_flight_joined_total";

/// Buffered key notifications; a subscriber that falls this far behind is a
/// stuck consumer, and re-reading on its next event is always safe.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

pub(crate) type FlightOutcome = Result<Value, FetchError>;

/// Combines a fetched payload with whatever the cache held before the write.
/// The default policy replaces wholesale; counter-style refreshes overlay
/// fields into the previous payload instead.
pub type MergeFn = Arc<dyn Fn(Option<&Value>, Value) -> Value + Send + Sync>;

pub fn replace_payload() -> MergeFn {
    Arc::new(|_previous, fresh| fresh)
}

/// What a read produced. `is_stale` means the payload predates the TTL (a
/// background refresh is running or failed) or is the empty fallback after a
/// failed blocking fetch. `from_cache` distinguishes a served cache entry
/// from a payload that just crossed the network; callers that refresh live
/// counters on cache hits key off it.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub data: T,
    pub is_stale: bool,
    pub from_cache: bool,
}

#[derive(Clone)]
pub struct CacheLoader {
    store: Arc<CacheStore>,
    flights: Arc<DashMap<CacheKey, broadcast::Sender<FlightOutcome>>>,
    updates: broadcast::Sender<CacheKey>,
}

/// Removes the in-flight entry when the leader settles or is cancelled, so
/// an aborted fetch can never wedge its key.
struct FlightGuard {
    flights: Arc<DashMap<CacheKey, broadcast::Sender<FlightOutcome>>>,
    key: CacheKey,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flights.remove(&self.key);
    }
}

enum FlightRole {
    Leader(broadcast::Sender<FlightOutcome>),
    Joiner(broadcast::Receiver<FlightOutcome>),
}

impl CacheLoader {
    pub fn new(store: Arc<CacheStore>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            store,
            flights: Arc::new(DashMap::new()),
            updates,
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Key notifications, sent once per fetch that settled into the cache.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.updates.subscribe()
    }

    /// The stale-while-revalidate read. Never fails: a total miss plus a
    /// failed fetch degrades to `T::default()` (and is not cached).
    pub async fn load<T, F, Fut>(&self, key: &CacheKey, ttl: Duration, fetch: F) -> Loaded<T>
    where
        T: Serialize + DeserializeOwned + Default + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        if let Some(entry) = self.store.get::<T>(key).await {
            let now = OffsetDateTime::now_utc();
            if entry.is_fresh(ttl, now) {
                return Loaded {
                    data: entry.payload,
                    is_stale: false,
                    from_cache: true,
                };
            }
            counter!(METRIC_STALE_SERVED).increment(1);
            debug!(%key, "serving stale entry, revalidating in background");
            self.spawn_revalidation(key.clone(), erase(fetch), replace_payload());
            return Loaded {
                data: entry.payload,
                is_stale: true,
                from_cache: true,
            };
        }

        match self.run_or_join(key.clone(), erase(fetch), replace_payload()).await {
            Ok(value) => self.decode_loaded(key, value),
            Err(_) => Loaded {
                data: T::default(),
                is_stale: true,
                from_cache: false,
            },
        }
    }

    /// Forced refresh: always fetches, never consults freshness. On failure
    /// it degrades to the last cached payload of any age, else the default.
    pub async fn refresh<T, F, Fut>(&self, key: &CacheKey, fetch: F) -> Loaded<T>
    where
        T: Serialize + DeserializeOwned + Default + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        match self.run_or_join(key.clone(), erase(fetch), replace_payload()).await {
            Ok(value) => self.decode_loaded(key, value),
            Err(_) => match self.store.get::<T>(key).await {
                Some(entry) => Loaded {
                    data: entry.payload,
                    is_stale: true,
                    from_cache: true,
                },
                None => Loaded {
                    data: T::default(),
                    is_stale: true,
                    from_cache: false,
                },
            },
        }
    }

    /// Fire-and-forget revalidation with the replace policy.
    pub fn revalidate<T, F, Fut>(&self, key: CacheKey, fetch: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        self.spawn_revalidation(key, erase(fetch), replace_payload());
    }

    /// Fire-and-forget revalidation with a custom merge policy.
    pub fn revalidate_with<T, F, Fut>(&self, key: CacheKey, fetch: F, merge: MergeFn)
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        self.spawn_revalidation(key, erase(fetch), merge);
    }

    /// Runs one revalidation inline, joining an existing flight if there is
    /// one. Used by the periodic refresh loop so ticks cannot pile up.
    pub(crate) async fn revalidate_now(
        &self,
        key: CacheKey,
        fetch: impl Future<Output = FlightOutcome> + Send,
        merge: MergeFn,
    ) {
        let _ = self.run_or_join(key, fetch, merge).await;
    }

    fn spawn_revalidation(
        &self,
        key: CacheKey,
        fetch: impl Future<Output = FlightOutcome> + Send + 'static,
        merge: MergeFn,
    ) {
        if self.flights.contains_key(&key) {
            debug!(%key, "revalidation already in flight, skipping dispatch");
            return;
        }
        let loader = self.clone();
        tokio::spawn(async move {
            let _ = loader.run_or_join(key, fetch, merge).await;
        });
    }

    async fn run_or_join(
        &self,
        key: CacheKey,
        fetch: impl Future<Output = FlightOutcome> + Send,
        merge: MergeFn,
    ) -> FlightOutcome {
        let role = match self.flights.entry(key.clone()) {
            Entry::Vacant(vacant) => {
                let (tx, _) = broadcast::channel(1);
                vacant.insert(tx.clone());
                FlightRole::Leader(tx)
            }
            Entry::Occupied(occupied) => FlightRole::Joiner(occupied.get().subscribe()),
        };

        match role {
            FlightRole::Leader(tx) => {
                let outcome = {
                    let _guard = FlightGuard {
                        flights: Arc::clone(&self.flights),
                        key: key.clone(),
                    };
                    self.settle(&key, fetch, &merge).await
                };
                // The guard removed the key before this send, so a caller
                // arriving now starts a fresh flight instead of waiting on a
                // closed channel.
                let _ = tx.send(outcome.clone());
                outcome
            }
            FlightRole::Joiner(mut rx) => {
                counter!(METRIC_FLIGHT_JOINED).increment(1);
                match rx.recv().await {
                    Ok(outcome) => outcome,
                    // The flight settled before we subscribed; its payload,
                    // if any, is already in the store.
                    Err(_) => match self.store.get::<Value>(&key).await {
                        Some(entry) => Ok(entry.payload),
                        None => Err(FetchError::Transport("in-flight request abandoned".into())),
                    },
                }
            }
        }
    }

    async fn settle(
        &self,
        key: &CacheKey,
        fetch: impl Future<Output = FlightOutcome> + Send,
        merge: &MergeFn,
    ) -> FlightOutcome {
        match fetch.await {
            Ok(fresh) => {
                let previous = self
                    .store
                    .get::<Value>(key)
                    .await
                    .map(|entry| entry.payload);
                let merged = merge(previous.as_ref(), fresh);
                self.store.put_value(key, merged.clone()).await;
                counter!(METRIC_REVALIDATE_SUCCESS).increment(1);
                let _ = self.updates.send(key.clone());
                Ok(merged)
            }
            Err(err) => {
                counter!(METRIC_REVALIDATE_FAILURE).increment(1);
                warn!(%key, error = %err, "fetch failed, cache left untouched");
                Err(err)
            }
        }
    }

    fn decode_loaded<T: DeserializeOwned + Default>(
        &self,
        key: &CacheKey,
        value: Value,
    ) -> Loaded<T> {
        match serde_json::from_value(value) {
            Ok(data) => Loaded {
                data,
                is_stale: false,
                from_cache: false,
            },
            Err(err) => {
                warn!(%key, error = %err, "fetched payload has an unexpected shape");
                Loaded {
                    data: T::default(),
                    is_stale: true,
                    from_cache: false,
                }
            }
        }
    }
}

pub(crate) fn erase<T, F, Fut>(fetch: F) -> impl Future<Output = FlightOutcome> + Send + 'static
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    async move {
        let data = fetch().await?;
        serde_json::to_value(&data).map_err(|err| FetchError::Decode(err.to_string()))
    }
}
