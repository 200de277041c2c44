//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod fetch;
pub mod http;
pub mod kv;
pub mod telemetry;
