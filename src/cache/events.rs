//! Cache event system.
//!
//! Defines mutation events and an in-memory queue for event-driven
//! invalidation.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::domain::types::{ContentKind, TenantCode};

use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

/// Mutation event with idempotency and ordering support.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier for idempotency (UUIDv4).
    pub id: Uuid,
    /// Monotonic epoch for ordering within this process.
    pub epoch: Epoch,
    /// The mutation that happened.
    pub kind: EventKind,
    /// When the event was created.
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Mutations that require cache entries to be cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// An item was created or edited.
    ItemUpserted {
        kind: ContentKind,
        id: i64,
        tenant: TenantCode,
    },
    /// An item was deleted.
    ItemDeleted {
        kind: ContentKind,
        id: i64,
        tenant: TenantCode,
    },
    /// Sponsor placements for a content kind changed.
    PlacementsUpdated {
        kind: ContentKind,
        tenant: TenantCode,
    },
    /// The remote config map changed.
    ConfigUpdated { tenant: Option<TenantCode> },
}

/// In-memory event queue for cache invalidation.
///
/// Events are published by write paths and drained by the trigger. A mutex
/// is enough here since contention is expected to be low.
pub struct EventQueue {
    queue: Mutex<VecDeque<CacheEvent>>,
    epoch_counter: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish an event to the queue.
    pub fn publish(&self, kind: EventKind) {
        let epoch = self.next_epoch();
        let event = CacheEvent::new(kind.clone(), epoch);

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?kind,
            "mutation event enqueued"
        );

        mutex_lock(&self.queue, SOURCE, "publish").push_back(event);
    }

    /// Drain up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<CacheEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        queue.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn tenant() -> TenantCode {
        TenantCode::new("miuhub")
    }

    #[test]
    fn event_creation() {
        let kind = EventKind::ConfigUpdated { tenant: None };
        let event = CacheEvent::new(kind.clone(), 42);

        assert_eq!(event.epoch, 42);
        assert_eq!(event.kind, kind);
        assert!(!event.id.is_nil());
    }

    #[test]
    fn epoch_monotonicity() {
        let queue = EventQueue::new();

        let e1 = queue.next_epoch();
        let e2 = queue.next_epoch();
        let e3 = queue.next_epoch();

        assert!(e1 < e2);
        assert!(e2 < e3);
    }

    #[test]
    fn publish_and_drain_in_fifo_order() {
        let queue = EventQueue::new();

        queue.publish(EventKind::ConfigUpdated { tenant: None });
        queue.publish(EventKind::PlacementsUpdated {
            kind: ContentKind::Circle,
            tenant: tenant(),
        });
        queue.publish(EventKind::ItemDeleted {
            kind: ContentKind::Notice,
            id: 9,
            tenant: tenant(),
        });

        assert_eq!(queue.len(), 3);

        let events = queue.drain(2);
        assert_eq!(events.len(), 2);
        assert_eq!(queue.len(), 1);

        assert_eq!(events[0].kind, EventKind::ConfigUpdated { tenant: None });
        assert_eq!(
            events[1].kind,
            EventKind::PlacementsUpdated {
                kind: ContentKind::Circle,
                tenant: tenant(),
            }
        );
    }

    #[test]
    fn drain_more_than_available() {
        let queue = EventQueue::new();

        queue.publish(EventKind::ConfigUpdated { tenant: None });

        let events = queue.drain(100);
        assert_eq!(events.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn event_queue_recovers_from_poisoned_lock() {
        let queue = EventQueue::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = queue.queue.lock().expect("queue lock should be acquired");
            panic!("poison queue lock");
        }));

        queue.publish(EventKind::ConfigUpdated { tenant: None });
        assert_eq!(queue.len(), 1);
    }
}
