//! Favorites view state: display-only sort, search, selection and paging
//! over the registry's live list.
//!
//! Nothing here writes to the store except [`FavoritesView::remove`], which
//! goes through the registry.

use serde::{Deserialize, Serialize};

use crate::fact::{FactRecord, newest_first, oldest_first};
use crate::registry::FavoritesRegistry;

/// Facts revealed per page by [`FavoritesView::load_more`].
pub const ITEMS_PER_PAGE: usize = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Sorted copy of `facts`, ties kept in input order.
#[must_use]
pub fn sort_by_direction(facts: &[FactRecord], direction: SortDirection) -> Vec<FactRecord> {
    let mut sorted = facts.to_vec();
    match direction {
        SortDirection::Asc => sorted.sort_by(oldest_first),
        SortDirection::Desc => sorted.sort_by(newest_first),
    }
    sorted
}

/// Case-insensitive substring filter on `text`. Empty query keeps everything.
#[must_use]
pub fn filter_by_text(facts: &[FactRecord], query: &str) -> Vec<FactRecord> {
    if query.is_empty() {
        return facts.to_vec();
    }
    let needle = query.to_lowercase();
    facts.iter().filter(|f| f.text.to_lowercase().contains(&needle)).cloned().collect()
}

#[derive(Debug, Default)]
pub struct FavoritesView {
    all: Vec<FactRecord>,
    displayed: Vec<FactRecord>,
    direction: SortDirection,
    page: usize,
    selected: Option<FactRecord>,
}

impl FavoritesView {
    #[must_use]
    pub fn new() -> Self {
        Self { page: 1, ..Self::default() }
    }

    /// Take a list emitted by the registry feed.
    pub fn apply(&mut self, favorites: &[FactRecord]) {
        self.all = sort_by_direction(favorites, self.direction);
        self.show_all();
    }

    #[must_use]
    pub fn all(&self) -> &[FactRecord] {
        &self.all
    }

    #[must_use]
    pub fn displayed(&self) -> &[FactRecord] {
        &self.displayed
    }

    #[must_use]
    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    #[must_use]
    pub fn selected(&self) -> Option<&FactRecord> {
        self.selected.as_ref()
    }

    #[must_use]
    pub fn page(&self) -> usize {
        self.page
    }

    /// Search box input. Re-entering the selected fact's exact text keeps the
    /// selection; any other text clears it and filters.
    pub fn search(&mut self, text: &str) {
        if text.is_empty() {
            self.selected = None;
            self.show_all();
            return;
        }
        if let Some(selected) = self.selected.as_ref().filter(|s| s.text == text) {
            self.displayed = vec![selected.clone()];
            return;
        }
        self.selected = None;
        self.displayed = filter_by_text(&self.all, text);
    }

    /// Autocomplete pick. `None` clears the selection.
    pub fn select(&mut self, fact: Option<FactRecord>) {
        match fact {
            None => {
                self.selected = None;
                self.show_all();
            }
            Some(fact) => {
                self.displayed = vec![fact.clone()];
                self.selected = Some(fact);
            }
        }
    }

    /// Autocomplete candidates for the search box.
    #[must_use]
    pub fn suggestions(&self, text: &str) -> Vec<FactRecord> {
        filter_by_text(&self.all, text)
    }

    pub fn set_sort(&mut self, direction: SortDirection) {
        self.direction = direction;
        self.all = sort_by_direction(&self.all, direction);
        self.show_all();
    }

    pub fn toggle_sort(&mut self) -> SortDirection {
        self.set_sort(self.direction.toggled());
        self.direction
    }

    /// Reveal the next page. Returns `false` when everything is already shown.
    pub fn load_more(&mut self) -> bool {
        if self.displayed.len() >= self.all.len() {
            return false;
        }
        self.page += 1;
        let end = (self.page * ITEMS_PER_PAGE).min(self.all.len());
        self.displayed = self.all[..end].to_vec();
        true
    }

    /// First `pages` pages of the current list.
    pub fn paginate(&mut self, pages: usize) {
        self.page = pages.max(1);
        let end = (self.page * ITEMS_PER_PAGE).min(self.all.len());
        self.displayed = self.all[..end].to_vec();
    }

    /// Unfavorite through the registry and drop it from view right away.
    pub fn remove(&mut self, registry: &FavoritesRegistry, fact: &FactRecord) {
        registry.remove(fact);
        self.all.retain(|f| f.id != fact.id);
        self.displayed.retain(|f| f.id != fact.id);
    }

    fn show_all(&mut self) {
        self.displayed.clone_from(&self.all);
    }
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
