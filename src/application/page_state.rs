//! Per-tab pagination cursors.
//!
//! In-memory only; nothing here is persisted. A cursor survives switching
//! away and back only as long as the page-affecting predicates (favorites
//! filter, region, keyword) hold still — changing any of them resets every
//! tab, and entering a tab resets that tab's own cursor.

use std::collections::HashMap;

use crate::application::compose::FeedFilters;
use crate::domain::types::Tab;

const FIRST_PAGE: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Predicates {
    favorites_only: bool,
    region: Option<String>,
    keyword: Option<String>,
}

impl Predicates {
    fn of(filters: &FeedFilters) -> Self {
        Self {
            favorites_only: filters.favorites_only,
            region: filters.region.clone(),
            keyword: filters.keyword.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PageState {
    pages: HashMap<Tab, u32>,
    active: Option<Tab>,
    predicates: Predicates,
}

impl PageState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconciles the cursors with the active filter set and returns the
    /// current page for the filter's tab.
    pub fn sync(&mut self, filters: &FeedFilters) -> u32 {
        let predicates = Predicates::of(filters);
        if predicates != self.predicates {
            self.pages.clear();
            self.predicates = predicates;
        }
        if self.active.as_ref() != Some(&filters.tab) {
            self.pages.insert(filters.tab.clone(), FIRST_PAGE);
            self.active = Some(filters.tab.clone());
        }
        self.page(&filters.tab)
    }

    pub fn page(&self, tab: &Tab) -> u32 {
        self.pages.get(tab).copied().unwrap_or(FIRST_PAGE)
    }

    /// Moves a tab's cursor; pages are 1-based, zero clamps to the first.
    pub fn set_page(&mut self, tab: &Tab, page: u32) {
        self.pages.insert(tab.clone(), page.max(FIRST_PAGE));
    }
}
