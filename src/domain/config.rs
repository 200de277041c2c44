//! Typed access over the remote config map.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::types::ContentKind;

/// Flat key/value configuration served by the remote API. Values are loosely
/// typed on the wire; the accessors coerce and fall back to caller defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppConfig {
    values: HashMap<String, Value>,
}

impl AppConfig {
    pub fn new(values: HashMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn str(&self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(Value::String(value)) => value.clone(),
            Some(Value::Number(value)) => value.to_string(),
            Some(Value::Bool(value)) => value.to_string(),
            _ => default.to_string(),
        }
    }

    pub fn bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(Value::Bool(value)) => *value,
            Some(Value::String(value)) => {
                matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
            }
            Some(Value::Number(value)) => value.as_f64().is_some_and(|n| n != 0.0),
            _ => default,
        }
    }

    pub fn number(&self, key: &str, default: f64) -> f64 {
        match self.values.get(key) {
            Some(Value::Number(value)) => value.as_f64().unwrap_or(default),
            Some(Value::String(value)) => value.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Page size for a content kind (`circles_items_per_page` and friends),
    /// clamped to at least one item per page.
    pub fn items_per_page(&self, kind: ContentKind, default: usize) -> usize {
        let key = format!("{}_items_per_page", kind.list_prefix());
        let value = self.number(&key, default as f64);
        if value >= 1.0 { value as usize } else { default.max(1) }
    }
}
