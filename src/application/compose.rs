//! Pure feed composition: filter pipeline plus the two sort orders.
//!
//! No I/O here. The service layer hands in whatever collection the cache
//! returned, fresh or stale, and renders the result either way.

use std::cmp::Ordering;
use std::collections::HashSet;

use time::OffsetDateTime;

use crate::domain::items::FeedItem;
use crate::domain::types::{SortMode, Tab};

/// Predicate set applied before sorting. The default filters nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilters {
    pub tab: Tab,
    pub favorites_only: bool,
    pub region: Option<String>,
    pub keyword: Option<String>,
    pub exclude_closed: bool,
}

/// Filters, then orders, a raw collection. The caller supplies `now` so
/// future/past classification cannot drift between composition and display.
///
/// Filter order is fixed: tab, favorites, region, keyword, closed. Ties the
/// sort rules leave open keep their original relative order.
pub fn compose<'a>(
    items: &'a [FeedItem],
    filters: &FeedFilters,
    favorites: &HashSet<i64>,
    sort: SortMode,
    now: OffsetDateTime,
) -> Vec<&'a FeedItem> {
    let mut pool: Vec<&FeedItem> = items
        .iter()
        .filter(|item| matches_tab(item, &filters.tab))
        .filter(|item| !filters.favorites_only || favorites.contains(&item.id))
        .filter(|item| matches_region(item, filters.region.as_deref()))
        .filter(|item| matches_keyword(item, filters.keyword.as_deref()))
        .filter(|item| !(filters.exclude_closed && item.is_closed))
        .collect();
    match sort {
        SortMode::Recency => pool.sort_by(|a, b| recency(a, b)),
        SortMode::SoonestUpcoming => pool.sort_by(|a, b| soonest_upcoming(a, b, now)),
    }
    pool
}

fn matches_tab(item: &FeedItem, tab: &Tab) -> bool {
    match tab.category_name() {
        None => true,
        Some(name) => item.category.as_deref() == Some(name),
    }
}

fn matches_region(item: &FeedItem, region: Option<&str>) -> bool {
    match region {
        None => true,
        Some(region) => item.region.as_deref() == Some(region),
    }
}

/// The keyword field is a free-form `#tag #tag` string; a query term matches
/// when `#term` appears anywhere in it, case-insensitively. Items without a
/// keyword field never match a set query.
fn matches_keyword(item: &FeedItem, keyword: Option<&str>) -> bool {
    let Some(term) = keyword.map(str::trim).filter(|term| !term.is_empty()) else {
        return true;
    };
    let Some(field) = item.keywords.as_deref() else {
        return false;
    };
    field
        .to_lowercase()
        .contains(&format!("#{}", term.to_lowercase()))
}

/// Newest first; records without a creation timestamp sink to the bottom.
fn recency(a: &FeedItem, b: &FeedItem) -> Ordering {
    b.created_at_or_epoch().cmp(&a.created_at_or_epoch())
}

/// Three-way partition: undecided dates first (ties by recency), then future
/// events nearest-first, then past events most-recent-first. An instant equal
/// to `now` still counts as future.
fn soonest_upcoming(a: &FeedItem, b: &FeedItem, now: OffsetDateTime) -> Ordering {
    match (a.event_date.instant(), b.event_date.instant()) {
        (None, None) => recency(a, b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a_at), Some(b_at)) => match (a_at >= now, b_at >= now) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (true, true) => a_at.cmp(&b_at),
            (false, false) => b_at.cmp(&a_at),
        },
    }
}
