//! Remote content read collaborators.
//!
//! Implementations only transport and decode; ingestion into domain types
//! happens in the application layer. Errors are cloneable so a single
//! in-flight fetch can hand its outcome to every waiting caller.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use campanile_api_types::{ItemDto, PlacementDto};

use crate::domain::types::{ContentKind, TenantCode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server answered {status}")]
    Status { status: u16 },
    #[error("response body unreadable: {0}")]
    Decode(String),
    #[error("server reported failure")]
    Rejected,
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn list_items(
        &self,
        kind: ContentKind,
        tenant: &TenantCode,
    ) -> Result<Vec<ItemDto>, FetchError>;

    async fn fetch_item(
        &self,
        kind: ContentKind,
        id: i64,
        tenant: &TenantCode,
    ) -> Result<ItemDto, FetchError>;

    async fn list_placements(
        &self,
        kind: ContentKind,
        tenant: &TenantCode,
    ) -> Result<Vec<PlacementDto>, FetchError>;

    async fn fetch_config(
        &self,
        tenant: Option<&TenantCode>,
    ) -> Result<HashMap<String, serde_json::Value>, FetchError>;

    async fn resolve_asset_url(&self, file: &str) -> Result<String, FetchError>;
}
