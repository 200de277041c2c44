//! Invalidation plan generation.
//!
//! Merges drained mutation events into one deduplicated set of cache keys
//! to clear.

use std::collections::HashSet;
use std::fmt;

use super::events::{CacheEvent, EventKind};
use super::keys::CacheKey;

/// The keys a batch of events requires clearing.
///
/// An item edit must clear the item record, its body, and every list that
/// could contain it; clearing too much costs one extra fetch, clearing too
/// little leaves stale content on screen after an edit.
#[derive(Debug, Default)]
pub struct InvalidationPlan {
    pub clear: HashSet<CacheKey>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvalidationPlan {{ clear: {} }}", self.clear.len())
    }
}

impl InvalidationPlan {
    /// Merge events into a plan, deduplicating by event ID and unioning the
    /// key sets. Upserts and deletes clear the same keys: either way the
    /// next read must refetch.
    pub fn from_events(events: Vec<CacheEvent>) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events {
            if !seen_ids.insert(event.id) {
                continue;
            }
            match event.kind {
                EventKind::ItemUpserted { kind, id, tenant }
                | EventKind::ItemDeleted { kind, id, tenant } => {
                    plan.clear.insert(CacheKey::Item {
                        kind,
                        id,
                        tenant: tenant.clone(),
                    });
                    plan.clear.insert(CacheKey::ItemBody {
                        kind,
                        id,
                        tenant: tenant.clone(),
                    });
                    plan.clear.insert(CacheKey::List { kind, tenant });
                }
                EventKind::PlacementsUpdated { kind, tenant } => {
                    plan.clear.insert(CacheKey::Placements { kind, tenant });
                }
                EventKind::ConfigUpdated { tenant } => {
                    plan.clear.insert(CacheKey::AppConfig { tenant });
                }
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.clear.is_empty()
    }
}
