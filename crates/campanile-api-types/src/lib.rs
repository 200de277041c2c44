//! Wire types for the community content API.
//!
//! Every response is wrapped in a `{ "success": bool, ... }` envelope with
//! one entity-named collection or object field. The envelopes here carry
//! serde aliases for each entity name so callers deserialize any content
//! kind into the same shape.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Marker value carried in `eventDate` when the organizer has not picked a
/// date yet. A bare `YYYY-MM-DD` value (or a date followed by this marker)
/// means the date is known but the time is not.
pub const EVENT_DATE_UNDECIDED: &str = "undecided";

/// One content record as served by the list and detail endpoints.
///
/// `eventDate` is one of: an RFC 3339 timestamp, a bare `YYYY-MM-DD` date,
/// a date followed by [`EVENT_DATE_UNDECIDED`], or the marker alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDto {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub event_date: Option<String>,
    // Older deployments leak the raw column name for this one field.
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub content: Option<String>,
}

/// One sponsor placement row from `/api/featured`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementDto {
    pub id: i64,
    pub content_id: i64,
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub category_page: Option<u32>,
    #[serde(default)]
    pub category_position: Option<u32>,
    #[serde(default)]
    pub all_page: Option<u32>,
    #[serde(default)]
    pub all_position: Option<u32>,
    pub start_date: String,
    pub end_date: String,
}

/// List responses: `{ "success": true, "circles": [...] }` and friends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemListEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(
        default,
        alias = "notices",
        alias = "lifeEvents",
        alias = "circles",
        alias = "posts"
    )]
    pub items: Vec<ItemDto>,
}

/// Detail responses: `{ "success": true, "circle": {...} }` and friends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(
        alias = "notice",
        alias = "lifeEvent",
        alias = "circle",
        alias = "post"
    )]
    pub item: ItemDto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturedEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub featured: Vec<PlacementDto>,
}

/// Remote config: a flat key/value map; values are usually strings but the
/// endpoint does not promise it, so they stay raw JSON here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetUrlEnvelope {
    #[serde(default)]
    pub success: bool,
    pub url: String,
}
