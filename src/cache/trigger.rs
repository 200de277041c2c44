//! Invalidation hooks for write paths.
//!
//! Mutating flows call the typed method for what they changed; the trigger
//! publishes the event and applies the resulting plan before returning, so
//! the next read sees the entry as absent rather than stale-but-servable.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::types::{ContentKind, TenantCode};

use super::events::{EventKind, EventQueue};
use super::keys::CacheKey;
use super::planner::InvalidationPlan;
use super::store::CacheStore;

/// One drain processes at most this many events; a busier queue is caught
/// by the next hook.
const CONSUME_BATCH_LIMIT: usize = 64;

pub struct CacheTrigger {
    queue: Arc<EventQueue>,
    store: Arc<CacheStore>,
}

impl CacheTrigger {
    pub fn new(queue: Arc<EventQueue>, store: Arc<CacheStore>) -> Self {
        Self { queue, store }
    }

    /// Called after an item was created or edited.
    pub async fn item_upserted(&self, kind: ContentKind, id: i64, tenant: &TenantCode) {
        self.queue.publish(EventKind::ItemUpserted {
            kind,
            id,
            tenant: tenant.clone(),
        });
        self.consume().await;
    }

    /// Called after an item was deleted.
    pub async fn item_deleted(&self, kind: ContentKind, id: i64, tenant: &TenantCode) {
        self.queue.publish(EventKind::ItemDeleted {
            kind,
            id,
            tenant: tenant.clone(),
        });
        self.consume().await;
    }

    /// Called after sponsor placements changed for a content kind.
    pub async fn placements_updated(&self, kind: ContentKind, tenant: &TenantCode) {
        self.queue.publish(EventKind::PlacementsUpdated {
            kind,
            tenant: tenant.clone(),
        });
        self.consume().await;
    }

    /// Called after the remote config map changed.
    pub async fn config_updated(&self, tenant: Option<&TenantCode>) {
        self.queue.publish(EventKind::ConfigUpdated {
            tenant: tenant.cloned(),
        });
        self.consume().await;
    }

    /// Drain pending events and clear the planned keys.
    ///
    /// Returns true if any events were processed.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> bool {
        let events = self.queue.drain(CONSUME_BATCH_LIMIT);
        if events.is_empty() {
            return false;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let plan = InvalidationPlan::from_events(events);

        info!(
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            "cache invalidation starting"
        );

        let keys: Vec<CacheKey> = plan.clear.into_iter().collect();
        self.store.invalidate_many(&keys).await;

        info!(
            event_count,
            invalidated = keys.len(),
            "cache invalidation complete"
        );

        true
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use serde_json::{Value, json};

    use crate::infra::kv::MemoryKvStore;

    use super::*;

    fn trigger() -> (Arc<CacheStore>, CacheTrigger) {
        let store = Arc::new(CacheStore::new(
            Arc::new(MemoryKvStore::default()),
            NonZeroUsize::new(16).unwrap(),
        ));
        let trigger = CacheTrigger::new(Arc::new(EventQueue::new()), store.clone());
        (store, trigger)
    }

    fn tenant() -> TenantCode {
        TenantCode::new("miuhub")
    }

    #[tokio::test]
    async fn item_upsert_clears_record_body_and_list() {
        let (store, trigger) = trigger();
        let record = CacheKey::Item {
            kind: ContentKind::Circle,
            id: 17,
            tenant: tenant(),
        };
        let body = CacheKey::ItemBody {
            kind: ContentKind::Circle,
            id: 17,
            tenant: tenant(),
        };
        let list = CacheKey::List {
            kind: ContentKind::Circle,
            tenant: tenant(),
        };
        let unrelated = CacheKey::List {
            kind: ContentKind::Notice,
            tenant: tenant(),
        };
        for key in [&record, &body, &list, &unrelated] {
            store.put_value(key, json!("cached")).await;
        }

        trigger
            .item_upserted(ContentKind::Circle, 17, &tenant())
            .await;

        assert!(store.get::<Value>(&record).await.is_none());
        assert!(store.get::<Value>(&body).await.is_none());
        assert!(store.get::<Value>(&list).await.is_none());
        assert!(store.get::<Value>(&unrelated).await.is_some());
    }

    #[tokio::test]
    async fn placements_update_leaves_lists_alone() {
        let (store, trigger) = trigger();
        let placements = CacheKey::Placements {
            kind: ContentKind::BoardPost,
            tenant: tenant(),
        };
        let list = CacheKey::List {
            kind: ContentKind::BoardPost,
            tenant: tenant(),
        };
        store.put_value(&placements, json!([])).await;
        store.put_value(&list, json!([])).await;

        trigger
            .placements_updated(ContentKind::BoardPost, &tenant())
            .await;

        assert!(store.get::<Value>(&placements).await.is_none());
        assert!(store.get::<Value>(&list).await.is_some());
    }

    #[tokio::test]
    async fn config_update_clears_the_scoped_entry() {
        let (store, trigger) = trigger();
        let scoped = CacheKey::AppConfig {
            tenant: Some(tenant()),
        };
        let global = CacheKey::AppConfig { tenant: None };
        store.put_value(&scoped, json!({})).await;
        store.put_value(&global, json!({})).await;

        trigger.config_updated(Some(&tenant())).await;

        assert!(store.get::<Value>(&scoped).await.is_none());
        assert!(store.get::<Value>(&global).await.is_some());
    }

    #[tokio::test]
    async fn consume_with_nothing_pending_reports_false() {
        let (_store, trigger) = trigger();
        assert!(!trigger.consume().await);
    }
}
