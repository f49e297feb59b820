use chrono::{DateTime, Utc};
use quill_core::Note;
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub category: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub relative_time: String,
}

pub fn note_to_list_item(note: &Note, now: DateTime<Utc>) -> NoteListItem {
    NoteListItem {
        id: note.id.clone(),
        title: note.title_preview(),
        category: note.category.clone(),
        content: note.content.clone(),
        created_at: note.created_at,
        updated_at: note.updated_at,
        relative_time: format_relative_time(note.updated_at, now),
    }
}

pub fn format_note_lines(notes: &[Note], now: DateTime<Utc>) -> Vec<String> {
    notes
        .iter()
        .map(|note| {
            let preview = truncate(&note.title_preview(), 40);
            let relative_time = format_relative_time(note.updated_at, now);
            match note.category.as_deref() {
                Some(category) => format!(
                    "{:<8}  {preview:<40}  {relative_time:<10}  [{category}]",
                    note.id
                ),
                None => format!("{:<8}  {preview:<40}  {relative_time}", note.id),
            }
        })
        .collect()
}

pub fn format_note_detail(note: &Note) -> String {
    let mut lines = vec![
        format!("# {}", note.title_preview()),
        format!("id: {}", note.id),
    ];
    if let Some(category) = note.category.as_deref() {
        lines.push(format!("category: {category}"));
    }
    lines.push(format!("created: {}", note.created_at.to_rfc3339()));
    lines.push(format!("updated: {}", note.updated_at.to_rfc3339()));
    lines.push(String::new());
    lines.push(note.content.clone());
    lines.join("\n")
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(timestamp).num_seconds().max(0);
    let minute = 60;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    normalize_content(&content_parts.join(" ")).ok_or(CliError::EmptyContent)
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated = value
        .chars()
        .take(max_chars.saturating_sub(3))
        .collect::<String>();
    truncated.push_str("...");
    truncated
}
