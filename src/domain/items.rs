//! Content records and event-date semantics.
//!
//! The wire carries `eventDate` as a string with three meanings (full
//! timestamp, bare date, undecided marker). Ingestion decides the state once
//! into [`EventDate`]; nothing downstream re-parses strings.

use serde::{Deserialize, Serialize};
use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::warn;

use campanile_api_types::{EVENT_DATE_UNDECIDED, ItemDto};

pub const WIRE_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Event schedule state, decided once at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum EventDate {
    /// Date and time both known.
    Decided(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
    /// The day is fixed, the time is not.
    DateOnly(Date),
    /// Nothing scheduled yet.
    Undecided,
}

impl EventDate {
    /// Classifies a raw wire value. Anything unreadable degrades to
    /// `Undecided` rather than failing the whole record.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return EventDate::Undecided;
        };
        let raw = raw.trim();
        if raw.is_empty() || raw == EVENT_DATE_UNDECIDED {
            return EventDate::Undecided;
        }
        if let Ok(instant) = OffsetDateTime::parse(raw, &Rfc3339) {
            return EventDate::Decided(instant);
        }
        if let Ok(date) = Date::parse(raw, WIRE_DATE_FORMAT) {
            return EventDate::DateOnly(date);
        }
        // Composite form: a date followed by the undecided marker.
        if let Some(prefix) = raw.get(..10)
            && let Ok(date) = Date::parse(prefix, WIRE_DATE_FORMAT)
            && raw[10..].trim() == EVENT_DATE_UNDECIDED
        {
            return EventDate::DateOnly(date);
        }
        warn!(value = raw, "unreadable event date, treating as undecided");
        EventDate::Undecided
    }

    pub fn is_undecided(&self) -> bool {
        matches!(self, EventDate::Undecided)
    }

    /// Comparable instant for ordering. `DateOnly` compares at midnight UTC
    /// of that day; `Undecided` has none.
    pub fn instant(&self) -> Option<OffsetDateTime> {
        match self {
            EventDate::Decided(instant) => Some(*instant),
            EventDate::DateOnly(date) => Some(date.midnight().assume_utc()),
            EventDate::Undecided => None,
        }
    }
}

/// One content record as the composition layer sees it. Detail bodies are
/// cached separately and never ride along in list payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: i64,
    pub title: String,
    pub category: Option<String>,
    pub region: Option<String>,
    pub keywords: Option<String>,
    pub event_date: EventDate,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    pub is_closed: bool,
    pub views: i64,
    pub comment_count: i64,
}

impl FeedItem {
    pub fn from_dto(dto: ItemDto) -> Self {
        let event_date = EventDate::parse(dto.event_date.as_deref());
        let created_at = dto.created_at.as_deref().and_then(|raw| {
            match OffsetDateTime::parse(raw, &Rfc3339) {
                Ok(instant) => Some(instant),
                Err(_) => {
                    warn!(item_id = dto.id, value = raw, "unreadable createdAt");
                    None
                }
            }
        });
        Self {
            id: dto.id,
            title: dto.title,
            category: dto.category,
            region: dto.region,
            keywords: dto.keywords,
            event_date,
            created_at,
            is_closed: dto.is_closed,
            views: dto.views,
            comment_count: dto.comment_count,
        }
    }

    pub fn ingest(dtos: Vec<ItemDto>) -> Vec<Self> {
        dtos.into_iter().map(Self::from_dto).collect()
    }

    /// Missing creation timestamps sort as the oldest possible record.
    pub fn created_at_or_epoch(&self) -> OffsetDateTime {
        self.created_at.unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}
