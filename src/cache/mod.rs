//! Campanile Cache System
//!
//! The read path every screen shares:
//!
//! - **Store**: envelope persistence over a pluggable KV store, with a
//!   small in-process hot layer in front
//! - **Loader**: stale-while-revalidate reads with per-key request dedup
//! - **Trigger**: event-driven invalidation called from write paths
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `campanile.toml`:
//!
//! ```toml
//! [cache]
//! list_ttl_secs = 300
//! asset_url_ttl_secs = 86400
//! refresh_interval_secs = 120
//! # ... see config/mod.rs for all options
//! ```

mod entry;
mod events;
mod keys;
mod loader;
mod lock;
mod planner;
mod refresh;
mod store;
mod trigger;

pub use entry::{CacheEntry, StoredEnvelope};
pub use events::{CacheEvent, Epoch, EventKind, EventQueue};
pub use keys::CacheKey;
pub use loader::{CacheLoader, Loaded, MergeFn, replace_payload};
pub use planner::InvalidationPlan;
pub use refresh::RefreshSubscription;
pub use store::CacheStore;
pub use trigger::CacheTrigger;

pub(crate) use lock::mutex_lock;
