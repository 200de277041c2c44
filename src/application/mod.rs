//! Application services: feed composition and orchestration over the cache.

pub mod compose;
pub mod favorites;
pub mod feed;
pub mod page_state;
pub mod placements;
