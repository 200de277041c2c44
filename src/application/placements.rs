//! Sponsored insertion: exclusion, fixed-size pagination, slot splicing.
//!
//! Featured items leave their ranked slot before the pool is sliced into
//! pages, then come back at their configured 1-based position on the target
//! page. Pure like the compositor; the service layer supplies the active
//! placements and "today" in the tenant's calendar.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use metrics::counter;
use time::Date;
use tracing::debug;

use crate::domain::items::FeedItem;
use crate::domain::placements::FeaturedPlacement;
use crate::domain::types::Tab;

pub(crate) const METRIC_PLACEMENT_DROPPED: &str = "campanile_placement_dropped_total";

/// One rendered feed row. A sponsored row shows the featured badge, which
/// also displaces the closed badge.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub item: FeedItem,
    pub sponsored: bool,
}

impl FeedEntry {
    pub fn ranked(item: FeedItem) -> Self {
        Self {
            item,
            sponsored: false,
        }
    }

    pub fn sponsored(item: FeedItem) -> Self {
        Self {
            item,
            sponsored: true,
        }
    }

    pub fn shows_closed_badge(&self) -> bool {
        self.item.is_closed && !self.sponsored
    }
}

/// One page of the final feed.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedEntries {
    pub entries: Vec<FeedEntry>,
    /// Page count over the pool after featured exclusion.
    pub total_pages: u32,
    /// Pool size after filtering and featured exclusion.
    pub total_items: usize,
}

/// Slices `composed` into pages of `page_size` and splices active featured
/// placements into `page` (1-based).
///
/// Placement content is looked up in `raw`, the unfiltered collection, so a
/// featured item renders even when the active filters would hide it. A
/// placement whose content id is absent from `raw`, or whose position falls
/// beyond the sliced page (appending at the very end is allowed), is dropped
/// without error.
pub fn paginate_with_featured(
    composed: &[&FeedItem],
    raw: &[FeedItem],
    placements: &[FeaturedPlacement],
    tab: &Tab,
    page: u32,
    page_size: NonZeroUsize,
    today: Date,
) -> PagedEntries {
    let active: Vec<&FeaturedPlacement> = placements
        .iter()
        .filter(|placement| placement.is_active_on(today))
        .collect();

    // Step 1: pull featured content out of the ranked pool before slicing,
    // so it cannot occupy both its natural slot and the sponsored one.
    let excluded: HashSet<i64> = active
        .iter()
        .filter(|placement| targets_page(placement, tab, page))
        .map(|placement| placement.content_id)
        .collect();
    let pool: Vec<&FeedItem> = composed
        .iter()
        .filter(|item| !excluded.contains(&item.id))
        .copied()
        .collect();

    // Step 2: fixed-size slice.
    let size = page_size.get();
    let total_pages = pool.len().div_ceil(size) as u32;
    let start = (page.max(1) as usize - 1).saturating_mul(size);
    let mut entries: Vec<FeedEntry> = pool
        .iter()
        .skip(start)
        .take(size)
        .map(|item| FeedEntry::ranked((*item).clone()))
        .collect();

    // Step 3: splice, highest position first so earlier insertions cannot
    // shift a not-yet-inserted index.
    let mut slots: Vec<(u32, i64)> = active
        .iter()
        .filter_map(|placement| {
            slot_on_page(placement, tab, page)
                .map(|position| (position, placement.content_id))
        })
        .collect();
    slots.sort_by(|a, b| b.0.cmp(&a.0));

    for (position, content_id) in slots {
        let index = position as usize - 1;
        if index > entries.len() {
            counter!(METRIC_PLACEMENT_DROPPED, "reason" => "out_of_range").increment(1);
            debug!(content_id, position, page, "placement position beyond page, dropped");
            continue;
        }
        let Some(item) = raw.iter().find(|item| item.id == content_id) else {
            counter!(METRIC_PLACEMENT_DROPPED, "reason" => "content_missing").increment(1);
            debug!(content_id, page, "placement references unknown content, dropped");
            continue;
        };
        entries.insert(index, FeedEntry::sponsored(item.clone()));
    }

    PagedEntries {
        entries,
        total_pages,
        total_items: pool.len(),
    }
}

/// Whether a placement claims space on this page: its category target (when
/// the category matches the active tab) or its all-items target. Exclusion
/// ignores positions; a page match alone pulls the item out of the pool.
fn targets_page(placement: &FeaturedPlacement, tab: &Tab, page: u32) -> bool {
    let category_hit = placement.category_page == Some(page)
        && tab
            .category_name()
            .is_some_and(|name| placement.category.as_deref() == Some(name));
    category_hit || placement.all_page == Some(page)
}

/// The 1-based slot a placement fills on this page, if any. The category
/// target wins over the all-items target so one placement never inserts
/// twice on a page.
fn slot_on_page(placement: &FeaturedPlacement, tab: &Tab, page: u32) -> Option<u32> {
    if placement.category_page == Some(page)
        && tab
            .category_name()
            .is_some_and(|name| placement.category.as_deref() == Some(name))
        && let Some(position) = placement.category_position
    {
        return Some(position);
    }
    if placement.all_page == Some(page)
        && let Some(position) = placement.all_position
    {
        return Some(position);
    }
    None
}
