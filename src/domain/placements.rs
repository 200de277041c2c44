//! Sponsor placement records and their activity window.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime, UtcOffset};
use tracing::warn;

use campanile_api_types::PlacementDto;

use crate::domain::items::WIRE_DATE_FORMAT;
use crate::domain::types::ContentKind;

/// An externally authored instruction to show one content item at a fixed
/// page/slot while its date window is active. Page and position are 1-based;
/// a missing position makes the target exclude-only (the referenced item
/// leaves its ranked slot but nothing is inserted), matching the authoring
/// system's loose rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturedPlacement {
    pub id: i64,
    pub content_id: i64,
    pub kind: Option<ContentKind>,
    pub category: Option<String>,
    pub category_page: Option<u32>,
    pub category_position: Option<u32>,
    pub all_page: Option<u32>,
    pub all_position: Option<u32>,
    pub starts_on: Date,
    pub ends_on: Date,
}

impl FeaturedPlacement {
    /// Converts a wire row. Rows whose window cannot be read are dropped:
    /// they could never match a day anyway.
    pub fn from_dto(dto: PlacementDto) -> Option<Self> {
        let (Some(starts_on), Some(ends_on)) = (
            parse_wire_date(&dto.start_date),
            parse_wire_date(&dto.end_date),
        ) else {
            warn!(
                placement_id = dto.id,
                start = dto.start_date,
                end = dto.end_date,
                "placement window unreadable, dropping row"
            );
            return None;
        };
        Some(Self {
            id: dto.id,
            content_id: dto.content_id,
            kind: ContentKind::try_from(dto.content_type.as_str()).ok(),
            category: dto.category,
            category_page: dto.category_page,
            // Zero is not a valid 1-based slot; normalize it away.
            category_position: dto.category_position.filter(|position| *position >= 1),
            all_page: dto.all_page,
            all_position: dto.all_position.filter(|position| *position >= 1),
            starts_on,
            ends_on,
        })
    }

    pub fn ingest(dtos: Vec<PlacementDto>) -> Vec<Self> {
        dtos.into_iter().filter_map(Self::from_dto).collect()
    }

    /// Both bounds inclusive, day granularity.
    pub fn is_active_on(&self, today: Date) -> bool {
        self.starts_on <= today && today <= self.ends_on
    }
}

/// Reads the calendar day out of a wire date: either a bare `YYYY-MM-DD` or
/// the date part of a full timestamp.
fn parse_wire_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    if let Some(prefix) = raw.get(..10)
        && let Ok(date) = Date::parse(prefix, WIRE_DATE_FORMAT)
    {
        return Some(date);
    }
    OffsetDateTime::parse(raw, &Rfc3339)
        .ok()
        .map(|instant| instant.to_offset(UtcOffset::UTC).date())
}
