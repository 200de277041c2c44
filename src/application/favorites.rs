//! Per-user favorite sets.
//!
//! Favorites live in the KV store under a user- and tenant-scoped key and
//! never participate in TTL staleness: the set is the user's own state, not
//! remote content. Reads degrade to an empty set; only the explicit toggle
//! surfaces persistence failures, because that is the one place the caller
//! can tell the user the tap did not stick.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;

use crate::cache::{CacheKey, StoredEnvelope};
use crate::domain::types::{ContentKind, TenantCode, UserId};
use crate::infra::kv::{KvError, KvStore};

#[derive(Debug, Error)]
pub enum FavoriteError {
    #[error("favorite set not persisted: {0}")]
    Storage(#[from] KvError),
}

#[derive(Clone)]
pub struct FavoriteStore {
    kv: Arc<dyn KvStore>,
}

impl FavoriteStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// The stored id set, or empty when nothing (or nothing readable) is
    /// persisted.
    pub async fn load(
        &self,
        kind: ContentKind,
        tenant: &TenantCode,
        user: &UserId,
    ) -> HashSet<i64> {
        let key = favorites_key(kind, tenant, user);
        let raw = match self.kv.get(&key.storage_key()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return HashSet::new(),
            Err(err) => {
                warn!(%key, error = %err, "favorites unreadable, treating as empty");
                return HashSet::new();
            }
        };
        match serde_json::from_str::<StoredEnvelope>(&raw)
            .and_then(|envelope| serde_json::from_value::<Vec<i64>>(envelope.payload))
        {
            Ok(ids) => ids.into_iter().collect(),
            Err(err) => {
                warn!(%key, error = %err, "favorites malformed, treating as empty");
                HashSet::new()
            }
        }
    }

    /// Flips membership of `id` and persists the result. Returns whether the
    /// item is a favorite afterwards.
    pub async fn toggle(
        &self,
        kind: ContentKind,
        tenant: &TenantCode,
        user: &UserId,
        id: i64,
    ) -> Result<bool, FavoriteError> {
        let mut ids = self.load(kind, tenant, user).await;
        let now_favorite = ids.insert(id);
        if !now_favorite {
            ids.remove(&id);
        }

        // Sorted so the persisted document is deterministic for a given set.
        let mut sorted: Vec<i64> = ids.into_iter().collect();
        sorted.sort_unstable();
        let envelope = StoredEnvelope::new(
            serde_json::to_value(&sorted).unwrap_or_default(),
            OffsetDateTime::now_utc(),
        );
        let raw = serde_json::to_string(&envelope)
            .map_err(|err| KvError::Storage(err.to_string()))?;

        let key = favorites_key(kind, tenant, user);
        self.kv.set(&key.storage_key(), raw).await?;
        Ok(now_favorite)
    }

    pub async fn is_favorite(
        &self,
        kind: ContentKind,
        tenant: &TenantCode,
        user: &UserId,
        id: i64,
    ) -> bool {
        self.load(kind, tenant, user).await.contains(&id)
    }
}

fn favorites_key(kind: ContentKind, tenant: &TenantCode, user: &UserId) -> CacheKey {
    CacheKey::Favorites {
        kind,
        tenant: tenant.clone(),
        user: user.clone(),
    }
}

#[cfg(test)]
mod tests {
    use crate::infra::kv::MemoryKvStore;

    use super::*;

    fn store() -> (Arc<MemoryKvStore>, FavoriteStore) {
        let kv = Arc::new(MemoryKvStore::default());
        (kv.clone(), FavoriteStore::new(kv))
    }

    fn tenant() -> TenantCode {
        TenantCode::new("miuhub")
    }

    fn user() -> UserId {
        UserId::new("u-204")
    }

    #[tokio::test]
    async fn toggle_adds_then_removes() {
        let (_kv, favorites) = store();

        let added = favorites
            .toggle(ContentKind::Circle, &tenant(), &user(), 17)
            .await
            .unwrap();
        assert!(added);
        assert!(
            favorites
                .is_favorite(ContentKind::Circle, &tenant(), &user(), 17)
                .await
        );

        let removed = favorites
            .toggle(ContentKind::Circle, &tenant(), &user(), 17)
            .await
            .unwrap();
        assert!(!removed);
        assert!(
            favorites
                .load(ContentKind::Circle, &tenant(), &user())
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn double_toggle_restores_the_persisted_value() {
        let (kv, favorites) = store();
        favorites
            .toggle(ContentKind::Circle, &tenant(), &user(), 1)
            .await
            .unwrap();
        let key = favorites_key(ContentKind::Circle, &tenant(), &user()).storage_key();
        let before = kv.get(&key).await.unwrap().unwrap();

        favorites
            .toggle(ContentKind::Circle, &tenant(), &user(), 9)
            .await
            .unwrap();
        favorites
            .toggle(ContentKind::Circle, &tenant(), &user(), 9)
            .await
            .unwrap();

        let after = kv.get(&key).await.unwrap().unwrap();
        let decode = |raw: &str| {
            serde_json::from_str::<StoredEnvelope>(raw)
                .unwrap()
                .payload
        };
        assert_eq!(decode(&before), decode(&after));
    }

    #[tokio::test]
    async fn sets_are_scoped_by_kind_tenant_and_user() {
        let (_kv, favorites) = store();
        favorites
            .toggle(ContentKind::Circle, &tenant(), &user(), 5)
            .await
            .unwrap();

        assert!(
            !favorites
                .is_favorite(ContentKind::BoardPost, &tenant(), &user(), 5)
                .await
        );
        assert!(
            !favorites
                .is_favorite(ContentKind::Circle, &TenantCode::new("other"), &user(), 5)
                .await
        );
        assert!(
            !favorites
                .is_favorite(ContentKind::Circle, &tenant(), &UserId::new("u-9"), 5)
                .await
        );
    }

    #[tokio::test]
    async fn garbage_persisted_set_degrades_to_empty() {
        let (kv, favorites) = store();
        let key = favorites_key(ContentKind::Circle, &tenant(), &user()).storage_key();
        kv.set(&key, "not even json".into()).await.unwrap();

        assert!(
            favorites
                .load(ContentKind::Circle, &tenant(), &user())
                .await
                .is_empty()
        );

        // A toggle over the garbage starts a fresh set.
        favorites
            .toggle(ContentKind::Circle, &tenant(), &user(), 3)
            .await
            .unwrap();
        assert!(
            favorites
                .is_favorite(ContentKind::Circle, &tenant(), &user(), 3)
                .await
        );
    }
}
