//! Client-side note list filtering (search + category + sort).

use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::Note;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoteSort {
    /// Most recently edited first.
    #[default]
    UpdatedDesc,
    CreatedDesc,
    TitleAsc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub query: String,
    pub category: Option<String>,
    pub sort: NoteSort,
}

/// Return a sorted, deduplicated category list discovered across notes.
#[must_use]
pub fn collect_categories(notes: &[Note]) -> Vec<String> {
    notes
        .iter()
        .filter_map(|note| note.category.as_deref())
        .map(str::trim)
        .filter(|category| !category.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Filter notes by case-insensitive text query and optional category, then sort.
#[must_use]
pub fn filter_notes(notes: &[Note], filter: &NoteFilter) -> Vec<Note> {
    let normalized_query = normalize_query(&filter.query);
    let normalized_category = filter
        .category
        .as_deref()
        .map(normalize_query)
        .filter(|value| !value.is_empty());

    let mut matches: Vec<Note> = notes
        .iter()
        .filter(|note| note_matches_query(note, &normalized_query))
        .filter(|note| note_matches_category(note, normalized_category.as_deref()))
        .cloned()
        .collect();
    matches.sort_by(|left, right| compare(left, right, filter.sort));
    matches
}

fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn note_matches_query(note: &Note, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    note.title.to_lowercase().contains(query) || note.content.to_lowercase().contains(query)
}

fn note_matches_category(note: &Note, category: Option<&str>) -> bool {
    let Some(category) = category else {
        return true;
    };
    note.category
        .as_deref()
        .is_some_and(|value| normalize_query(value) == category)
}

fn compare(left: &Note, right: &Note, sort: NoteSort) -> Ordering {
    match sort {
        NoteSort::UpdatedDesc => right.updated_at.cmp(&left.updated_at),
        NoteSort::CreatedDesc => right.created_at.cmp(&left.created_at),
        NoteSort::TitleAsc => left
            .title_preview()
            .to_lowercase()
            .cmp(&right.title_preview().to_lowercase()),
    }
    .then_with(|| left.id.cmp(&right.id))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;

    fn note(id: &str, title: &str, content: &str, category: Option<&str>, day: u32) -> Note {
        Note {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            category: category.map(str::to_string),
            created_at: Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 2, 29 - day, 9, 0, 0).unwrap(),
        }
    }

    fn ids(notes: &[Note]) -> Vec<&str> {
        notes.iter().map(|note| note.id.as_str()).collect()
    }

    fn sample() -> Vec<Note> {
        vec![
            note("1", "Project kickoff", "Tomorrow at nine", Some("Work"), 1),
            note("2", "Movie night", "Project the film outside", Some("personal"), 2),
            note("3", "Standup", "Daily notes", Some("work"), 3),
            note("4", "", "Loose thought", None, 4),
        ]
    }

    #[test]
    fn collects_sorted_unique_categories() {
        assert_eq!(
            collect_categories(&sample()),
            vec!["Work".to_string(), "personal".to_string(), "work".to_string()]
        );
    }

    #[test]
    fn query_matches_title_or_content_case_insensitively() {
        let filter = NoteFilter {
            query: "  PROJECT ".to_string(),
            sort: NoteSort::CreatedDesc,
            ..NoteFilter::default()
        };
        assert_eq!(ids(&filter_notes(&sample(), &filter)), vec!["2", "1"]);
    }

    #[test]
    fn category_filter_ignores_case() {
        let filter = NoteFilter {
            category: Some("WORK".to_string()),
            ..NoteFilter::default()
        };
        // Default sort puts the earliest-created sample (latest update) first.
        assert_eq!(ids(&filter_notes(&sample(), &filter)), vec!["1", "3"]);
    }

    #[test]
    fn query_and_category_combine() {
        let filter = NoteFilter {
            query: "project".to_string(),
            category: Some("personal".to_string()),
            sort: NoteSort::UpdatedDesc,
        };
        assert_eq!(ids(&filter_notes(&sample(), &filter)), vec!["2"]);
    }

    #[test]
    fn title_sort_uses_preview_for_untitled_notes() {
        let filter = NoteFilter {
            sort: NoteSort::TitleAsc,
            ..NoteFilter::default()
        };
        assert_eq!(ids(&filter_notes(&sample(), &filter)), vec!["4", "2", "1", "3"]);
    }

    #[test]
    fn blank_filter_keeps_everything() {
        assert_eq!(filter_notes(&sample(), &NoteFilter::default()).len(), 4);
    }
}
