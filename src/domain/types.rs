//! Shared domain identifiers aligned with the remote content API.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four content collections served by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Notice,
    LifeEvent,
    Circle,
    BoardPost,
}

impl ContentKind {
    /// Wire token used by the placement `type` column and query parameters.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Notice => "notice",
            ContentKind::LifeEvent => "life_event",
            ContentKind::Circle => "circle",
            ContentKind::BoardPost => "post",
        }
    }

    /// Path segment of the list/detail endpoints.
    pub fn api_path(self) -> &'static str {
        match self {
            ContentKind::Notice => "notices",
            ContentKind::LifeEvent => "life-events",
            ContentKind::Circle => "circles",
            ContentKind::BoardPost => "posts",
        }
    }

    /// Cache key prefix for list entries.
    pub fn list_prefix(self) -> &'static str {
        match self {
            ContentKind::Notice => "notices",
            ContentKind::LifeEvent => "life_events",
            ContentKind::Circle => "circles",
            ContentKind::BoardPost => "posts",
        }
    }

    /// Cache key prefix for single-item entries.
    pub fn item_prefix(self) -> &'static str {
        self.as_str()
    }
}

impl TryFrom<&str> for ContentKind {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "notice" => Ok(ContentKind::Notice),
            "life_event" => Ok(ContentKind::LifeEvent),
            "circle" => Ok(ContentKind::Circle),
            "post" => Ok(ContentKind::BoardPost),
            _ => Err(()),
        }
    }
}

/// Organizational scope partitioning content and cache keys, e.g. one
/// university community. Stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantCode(String);

impl TenantCode {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Active feed tab. Category tabs narrow the pool to one category value;
/// sponsor placements also target them by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Tab {
    #[default]
    All,
    Category(String),
}

impl Tab {
    pub fn category(name: impl Into<String>) -> Self {
        Tab::Category(name.into())
    }

    /// The category this tab narrows to; `All` narrows nothing.
    pub fn category_name(&self) -> Option<&str> {
        match self {
            Tab::All => None,
            Tab::Category(name) => Some(name),
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tab::All => f.write_str("all"),
            Tab::Category(name) => f.write_str(name),
        }
    }
}

/// Feed ordering mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    /// Newest created first.
    #[default]
    Recency,
    /// Undecided dates first, then upcoming events nearest-first, then past
    /// events most-recent-first.
    SoonestUpcoming,
}

/// Local account identifier scoping favorite sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
