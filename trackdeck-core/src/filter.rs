//! Filter, search and sort state for the catalog listing.
//!
//! The visible song list is always derived from the catalog plus this state;
//! it is never stored as primary truth.

use crate::song::{Song, SongId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Filter groups shown as accordions on the listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterGroup {
    Key,
    Bpm,
    Artist,
    Tag,
}

/// Value selected within a group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterValue {
    /// Case-insensitive exact match
    Exact(String),
    /// Any of a set of musical keys (e.g. a key and its relative minor)
    KeyGroup(Vec<String>),
    /// Inclusive BPM range
    BpmRange { min: u32, max: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub group: FilterGroup,
    pub value: FilterValue,
}

impl Filter {
    #[must_use]
    pub const fn new(group: FilterGroup, value: FilterValue) -> Self {
        Self { group, value }
    }

    #[must_use]
    pub fn key(key: impl Into<String>) -> Self {
        Self::new(FilterGroup::Key, FilterValue::Exact(key.into()))
    }

    #[must_use]
    pub fn key_group(keys: &[&str]) -> Self {
        Self::new(
            FilterGroup::Key,
            FilterValue::KeyGroup(keys.iter().map(|k| (*k).to_string()).collect()),
        )
    }

    #[must_use]
    pub const fn bpm(min: u32, max: u32) -> Self {
        Self::new(FilterGroup::Bpm, FilterValue::BpmRange { min, max })
    }

    #[must_use]
    pub fn artist(artist: impl Into<String>) -> Self {
        Self::new(FilterGroup::Artist, FilterValue::Exact(artist.into()))
    }

    #[must_use]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::new(FilterGroup::Tag, FilterValue::Exact(tag.into()))
    }

    /// Whether `song` satisfies this single filter
    #[must_use]
    pub fn matches(&self, song: &Song) -> bool {
        match (&self.value, self.group) {
            (FilterValue::BpmRange { min, max }, _) => {
                song.bpm.is_some_and(|bpm| (*min..=*max).contains(&bpm))
            }
            (FilterValue::KeyGroup(keys), _) => song
                .key
                .as_ref()
                .is_some_and(|k| keys.iter().any(|g| g.eq_ignore_ascii_case(k))),
            (FilterValue::Exact(value), FilterGroup::Key) => song
                .key
                .as_ref()
                .is_some_and(|k| k.eq_ignore_ascii_case(value)),
            (FilterValue::Exact(value), FilterGroup::Artist) => {
                song.artist.eq_ignore_ascii_case(value)
            }
            (FilterValue::Exact(value), FilterGroup::Tag) => {
                song.tags.iter().any(|t| t.eq_ignore_ascii_case(value))
            }
            (FilterValue::Exact(value), FilterGroup::Bpm) => value
                .trim()
                .parse::<u32>()
                .is_ok_and(|bpm| song.bpm == Some(bpm)),
        }
    }
}

/// Display order of the listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Catalog,
    Title,
    BpmAscending,
    BpmDescending,
}

/// Selected filters, search keywords and sort order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    selected: HashSet<Filter>,
    keywords: Vec<String>,
    #[serde(default)]
    sort: SortOrder,
}

impl FilterState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a filter; returns false if it was already selected
    pub fn select(&mut self, filter: Filter) -> bool {
        self.selected.insert(filter)
    }

    pub fn deselect(&mut self, filter: &Filter) -> bool {
        self.selected.remove(filter)
    }

    /// Toggle a filter; returns whether it is now selected
    pub fn toggle(&mut self, filter: Filter) -> bool {
        if self.selected.remove(&filter) {
            false
        } else {
            self.selected.insert(filter);
            true
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.keywords.clear();
    }

    /// Replace the search keywords with the whitespace-separated words of
    /// `query`, lowercased.
    pub fn set_search(&mut self, query: &str) {
        self.keywords = query.split_whitespace().map(str::to_lowercase).collect();
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        self.sort = sort;
    }

    #[must_use]
    pub const fn sort(&self) -> SortOrder {
        self.sort
    }

    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn selected(&self) -> impl Iterator<Item = &Filter> {
        self.selected.iter()
    }

    /// Whether any filter or search keyword restricts the listing
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.selected.is_empty() || !self.keywords.is_empty()
    }

    /// OR within a group, AND across groups, and every keyword must match.
    #[must_use]
    pub fn matches(&self, song: &Song) -> bool {
        let groups: HashSet<FilterGroup> = self.selected.iter().map(|f| f.group).collect();
        let filters_ok = groups.iter().all(|group| {
            self.selected
                .iter()
                .filter(|f| f.group == *group)
                .any(|f| f.matches(song))
        });
        filters_ok && self.keywords.iter().all(|k| song.matches_keyword(k))
    }

    /// Ids of songs passing the filters, in display order
    #[must_use]
    pub fn visible_song_ids(&self, catalog: &[Song]) -> Vec<SongId> {
        let visible: Vec<&Song> = catalog.iter().filter(|s| self.matches(s)).collect();
        self.sorted(visible)
    }

    /// The list next/previous navigation walks: the visible list while any
    /// filter is active, otherwise the full catalog, both in display order.
    #[must_use]
    pub fn navigation_order(&self, catalog: &[Song]) -> Vec<SongId> {
        if self.is_active() {
            self.visible_song_ids(catalog)
        } else {
            self.sorted(catalog.iter().collect())
        }
    }

    fn sorted(&self, mut songs: Vec<&Song>) -> Vec<SongId> {
        match self.sort {
            SortOrder::Catalog => {}
            SortOrder::Title => songs.sort_by_key(|s| s.title.to_lowercase()),
            SortOrder::BpmAscending => songs.sort_by_key(|s| s.bpm.unwrap_or(u32::MAX)),
            SortOrder::BpmDescending => {
                songs.sort_by_key(|s| std::cmp::Reverse(s.bpm.unwrap_or(0)));
            }
        }
        songs.into_iter().map(|s| s.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Song> {
        vec![
            Song::new("a", "Alpha", "Nova", "a.mp3").with_key("Am").with_bpm(120).with_tag("house"),
            Song::new("b", "Bravo", "Kilo", "b.mp3").with_key("C").with_bpm(90).with_tag("hiphop"),
            Song::new("c", "Charlie", "Nova", "c.mp3").with_key("F#m").with_bpm(128),
            Song::new("d", "Delta", "Lima", "d.mp3").with_key("c").with_bpm(140).with_tag("house"),
        ]
    }

    fn ids(list: &[SongId]) -> Vec<&str> {
        list.iter().map(SongId::as_str).collect()
    }

    #[test]
    fn test_inactive_state_navigates_full_catalog() {
        let state = FilterState::new();
        assert!(!state.is_active());
        assert_eq!(ids(&state.navigation_order(&catalog())), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_or_within_group_and_across_groups() {
        let mut state = FilterState::new();
        state.select(Filter::key("C"));
        state.select(Filter::key("Am"));
        assert_eq!(ids(&state.visible_song_ids(&catalog())), vec!["a", "b", "d"]);

        state.select(Filter::tag("house"));
        assert_eq!(ids(&state.visible_song_ids(&catalog())), vec!["a", "d"]);
    }

    #[test]
    fn test_key_group_and_bpm_range() {
        let mut state = FilterState::new();
        state.select(Filter::key_group(&["C", "Am"]));
        state.select(Filter::bpm(100, 130));
        assert_eq!(ids(&state.navigation_order(&catalog())), vec!["a"]);
    }

    #[test]
    fn test_search_keywords_all_must_match() {
        let mut state = FilterState::new();
        state.set_search("  NOVA  char ");
        assert_eq!(state.keywords(), &["nova".to_string(), "char".to_string()]);
        assert_eq!(ids(&state.navigation_order(&catalog())), vec!["c"]);
    }

    #[test]
    fn test_toggle_and_clear() {
        let mut state = FilterState::new();
        assert!(state.toggle(Filter::artist("nova")));
        assert_eq!(ids(&state.navigation_order(&catalog())), vec!["a", "c"]);
        assert!(!state.toggle(Filter::artist("nova")));
        assert!(!state.is_active());

        state.select(Filter::tag("house"));
        state.set_search("delta");
        state.clear();
        assert!(!state.is_active());
    }

    #[test]
    fn test_sorted_navigation_follows_display_order() {
        let mut state = FilterState::new();
        state.set_sort(SortOrder::BpmDescending);
        state.select(Filter::artist("Nova"));
        // Display order within the subset, not catalog order
        assert_eq!(ids(&state.navigation_order(&catalog())), vec!["c", "a"]);

        state.clear();
        state.set_sort(SortOrder::Title);
        assert_eq!(ids(&state.navigation_order(&catalog())), vec!["a", "b", "c", "d"]);
    }
}
