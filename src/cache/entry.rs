//! Persisted cache envelope and freshness math.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};

/// Wire shape of every persisted cache value: one JSON document holding the
/// payload and the instant it was stored. Replacing the document is the only
/// write, so an entry is never half-updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEnvelope {
    pub payload: Value,
    /// Unix milliseconds.
    pub stored_at_ms: i64,
}

impl StoredEnvelope {
    pub fn new(payload: Value, stored_at: OffsetDateTime) -> Self {
        Self {
            payload,
            stored_at_ms: (stored_at.unix_timestamp_nanos() / 1_000_000) as i64,
        }
    }

    pub fn stored_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.stored_at_ms) * 1_000_000)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    pub fn decode<T: DeserializeOwned>(self) -> Result<CacheEntry<T>, serde_json::Error> {
        let stored_at = self.stored_at();
        Ok(CacheEntry {
            payload: serde_json::from_value(self.payload)?,
            stored_at,
        })
    }
}

/// A decoded entry handed to the read path.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub payload: T,
    pub stored_at: OffsetDateTime,
}

impl<T> CacheEntry<T> {
    /// `stored_at + ttl > now`; an entry exactly `ttl` old is already stale.
    pub fn is_fresh(&self, ttl: Duration, now: OffsetDateTime) -> bool {
        self.stored_at + ttl > now
    }
}
