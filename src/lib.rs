//! Campanile: the offline-tolerant content core for multi-tenant alumni
//! community apps.
//!
//! Feeds, single items, remote config, and sponsor placements are read
//! through a stale-while-revalidate cache over a pluggable KV store, composed
//! into filtered and sorted feed pages with sponsored entries spliced in, and
//! kept consistent by event-driven invalidation on writes.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
