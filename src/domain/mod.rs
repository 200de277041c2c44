//! Domain layer types and invariants.

pub mod config;
pub mod items;
pub mod placements;
pub mod types;
