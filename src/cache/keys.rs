//! Cache key definitions.
//!
//! One enum spells every persisted key so the storage convention lives in a
//! single place: `{entity}_{tenant}` for lists, `{entity}_{id}_{tenant}` for
//! single records, `{entity}_content_{id}_{tenant}` for detail bodies.
//! Staleness rides inside the stored envelope, not in parallel
//! `*_timestamp` keys.

use std::fmt;

use crate::domain::types::{ContentKind, TenantCode, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Whole list feed for one content kind and tenant.
    List {
        kind: ContentKind,
        tenant: TenantCode,
    },
    /// Single content record.
    Item {
        kind: ContentKind,
        id: i64,
        tenant: TenantCode,
    },
    /// Detail body of a single record, cached apart from the record.
    ItemBody {
        kind: ContentKind,
        id: i64,
        tenant: TenantCode,
    },
    /// Active sponsor placements for one content kind and tenant.
    Placements {
        kind: ContentKind,
        tenant: TenantCode,
    },
    /// Remote config map; global or tenant-scoped.
    AppConfig { tenant: Option<TenantCode> },
    /// Resolved public URL for a stored asset file.
    AssetUrl { file: String },
    /// Per-user favorite id set. Never judged stale; stored through the same
    /// envelope so every persisted value has one shape.
    Favorites {
        kind: ContentKind,
        tenant: TenantCode,
        user: UserId,
    },
}

impl CacheKey {
    /// The string actually written to the KV store.
    pub fn storage_key(&self) -> String {
        match self {
            CacheKey::List { kind, tenant } => {
                format!("{}_{}", kind.list_prefix(), tenant)
            }
            CacheKey::Item { kind, id, tenant } => {
                format!("{}_{}_{}", kind.item_prefix(), id, tenant)
            }
            CacheKey::ItemBody { kind, id, tenant } => {
                format!("{}_content_{}_{}", kind.item_prefix(), id, tenant)
            }
            CacheKey::Placements { kind, tenant } => {
                format!("featured_{}_{}", kind.item_prefix(), tenant)
            }
            CacheKey::AppConfig { tenant: None } => "app_config".to_string(),
            CacheKey::AppConfig {
                tenant: Some(tenant),
            } => format!("app_config_{tenant}"),
            CacheKey::AssetUrl { file } => format!("asset_url_{file}"),
            CacheKey::Favorites { kind, tenant, user } => {
                format!("favorites_{}_{}_{}", kind.item_prefix(), tenant, user)
            }
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}
