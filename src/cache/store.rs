//! TTL-aware storage over the persistent KV store.
//!
//! One JSON envelope per key. A bounded hot layer memoizes decoded envelopes
//! in front of the KV store so repeated reads skip storage I/O and parsing;
//! the KV store stays the source of truth, so hot evictions only cost a
//! re-read.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use lru::LruCache;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::infra::kv::KvStore;

use super::entry::{CacheEntry, StoredEnvelope};
use super::keys::CacheKey;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_HIT: &str = "campanile_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "campanile_cache_miss_total";
pub(crate) const METRIC_CACHE_ENTRY_DROPPED: &str = "campanile_cache_entry_dropped_total";
pub(crate) const METRIC_CACHE_INVALIDATED: &str = "campanile_cache_invalidated_total";

pub struct CacheStore {
    kv: Arc<dyn KvStore>,
    hot: Mutex<LruCache<CacheKey, StoredEnvelope>>,
}

impl CacheStore {
    pub fn new(kv: Arc<dyn KvStore>, hot_capacity: NonZeroUsize) -> Self {
        Self {
            kv,
            hot: Mutex::new(LruCache::new(hot_capacity)),
        }
    }

    /// Reads and decodes one entry. Every failure along the way (storage
    /// error, malformed envelope, payload/type mismatch) degrades to a miss;
    /// malformed persisted entries are dropped so they cannot wedge a key.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        let hot_hit = mutex_lock(&self.hot, SOURCE, "get.hot").get(key).cloned();
        let (envelope, layer) = match hot_hit {
            Some(envelope) => (envelope, "hot"),
            None => {
                let raw = match self.kv.get(&key.storage_key()).await {
                    Ok(Some(raw)) => raw,
                    Ok(None) => {
                        counter!(METRIC_CACHE_MISS).increment(1);
                        return None;
                    }
                    Err(err) => {
                        warn!(%key, error = %err, "kv read failed, treating as miss");
                        counter!(METRIC_CACHE_MISS).increment(1);
                        return None;
                    }
                };
                let Ok(envelope) = serde_json::from_str::<StoredEnvelope>(&raw) else {
                    warn!(%key, "malformed cache envelope, dropping entry");
                    counter!(METRIC_CACHE_ENTRY_DROPPED).increment(1);
                    self.invalidate(key).await;
                    return None;
                };
                mutex_lock(&self.hot, SOURCE, "get.hot_fill")
                    .put(key.clone(), envelope.clone());
                (envelope, "kv")
            }
        };

        match envelope.decode::<T>() {
            Ok(entry) => {
                counter!(METRIC_CACHE_HIT, "layer" => layer).increment(1);
                debug!(%key, layer, "cache hit");
                Some(entry)
            }
            Err(err) => {
                warn!(%key, error = %err, "cache payload unreadable, dropping entry");
                counter!(METRIC_CACHE_ENTRY_DROPPED).increment(1);
                self.invalidate(key).await;
                None
            }
        }
    }

    /// Stores a payload stamped with the current instant. Persistence
    /// failures are logged and swallowed: the caller already has the data,
    /// the next read just misses.
    pub async fn put<T: Serialize>(&self, key: &CacheKey, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.put_value(key, value).await,
            Err(err) => warn!(%key, error = %err, "payload not serializable, skipping cache write"),
        }
    }

    pub async fn put_value(&self, key: &CacheKey, payload: Value) {
        let envelope = StoredEnvelope::new(payload, OffsetDateTime::now_utc());
        let raw = match serde_json::to_string(&envelope) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%key, error = %err, "envelope not serializable, skipping cache write");
                return;
            }
        };
        if let Err(err) = self.kv.set(&key.storage_key(), raw).await {
            warn!(%key, error = %err, "kv write failed, entry stays absent");
            return;
        }
        // Hot layer fills only after a durable write so it never serves
        // state the KV store does not have.
        mutex_lock(&self.hot, SOURCE, "put.hot").put(key.clone(), envelope);
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        mutex_lock(&self.hot, SOURCE, "invalidate.hot").pop(key);
        if let Err(err) = self.kv.remove(&key.storage_key()).await {
            warn!(%key, error = %err, "kv remove failed");
        }
        counter!(METRIC_CACHE_INVALIDATED).increment(1);
    }

    pub async fn invalidate_many(&self, keys: &[CacheKey]) {
        join_all(keys.iter().map(|key| self.invalidate(key))).await;
    }
}
