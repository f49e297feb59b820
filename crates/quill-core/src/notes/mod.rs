//! Notes and categories resources.

mod filter;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use filter::{collect_categories, filter_notes, NoteFilter, NoteSort};

use crate::error::{ApiError, Result};
use crate::http::{ApiClient, ApiRequest};
use crate::util::{normalize_text_option, string_or_number};

const NOTES_PATH: &str = "/api/notes/";
const CATEGORIES_PATH: &str = "/api/categories/";
const TITLE_PREVIEW_CHARS: usize = 60;

/// A note as the backend returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Title for list views, falling back to the first content line.
    #[must_use]
    pub fn title_preview(&self) -> String {
        let source = if self.title.trim().is_empty() {
            self.content.lines().find(|line| !line.trim().is_empty()).unwrap_or("")
        } else {
            self.title.as_str()
        };
        let source = source.trim();
        if source.is_empty() {
            return "Untitled".to_string();
        }
        if source.chars().count() > TITLE_PREVIEW_CHARS {
            let truncated: String = source.chars().take(TITLE_PREVIEW_CHARS - 3).collect();
            format!("{}...", truncated.trim_end())
        } else {
            source.to_string()
        }
    }
}

/// Full note body for create and replace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub category: Option<String>,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category: None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = normalize_text_option(category);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() && self.content.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "A note needs a title or content".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update; only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl NotePatch {
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.category.is_none()
    }
}

/// Server-side list filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteQuery {
    pub search: Option<String>,
    pub category: Option<String>,
}

impl NoteQuery {
    fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(search) = normalize_text_option(self.search.clone()) {
            request = request.with_query("search", search);
        }
        if let Some(category) = normalize_text_option(self.category.clone()) {
            request = request.with_query("category", category);
        }
        request
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
}

/// List responses arrive either paginated or as a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Page { results: Vec<T> },
    Plain(Vec<T>),
}

impl<T> ListBody<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Self::Page { results } => results,
            Self::Plain(items) => items,
        }
    }
}

async fn fetch_list<T: DeserializeOwned>(
    client: &ApiClient,
    request: ApiRequest,
) -> Result<Vec<T>> {
    let body: ListBody<T> = client.request_json(request).await?;
    Ok(body.into_items())
}

fn note_path(id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() || id.contains('/') {
        return Err(ApiError::InvalidRequest(format!("Invalid note id '{id}'")));
    }
    Ok(format!("{NOTES_PATH}{id}/"))
}

/// CRUD over `/api/notes/`.
#[derive(Debug, Clone)]
pub struct NotesApi {
    client: ApiClient,
}

impl NotesApi {
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, query: &NoteQuery) -> Result<Vec<Note>> {
        let request = query.apply(ApiRequest::get(NOTES_PATH));
        let notes: Vec<Note> = fetch_list(&self.client, request).await?;
        tracing::debug!(count = notes.len(), "Fetched notes");
        Ok(notes)
    }

    pub async fn get(&self, id: &str) -> Result<Note> {
        self.client.get_json(&note_path(id)?).await
    }

    pub async fn create(&self, draft: &NoteDraft) -> Result<Note> {
        draft.validate()?;
        self.client.post_json(NOTES_PATH, draft).await
    }

    pub async fn update(&self, id: &str, draft: &NoteDraft) -> Result<Note> {
        draft.validate()?;
        self.client
            .request_json(ApiRequest::put(note_path(id)?).with_json(draft)?)
            .await
    }

    pub async fn patch(&self, id: &str, patch: &NotePatch) -> Result<Note> {
        if patch.is_empty() {
            return Err(ApiError::InvalidRequest("Nothing to update".to_string()));
        }
        self.client
            .request_json(ApiRequest::patch(note_path(id)?).with_json(patch)?)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&note_path(id)?).await?;
        Ok(())
    }
}

/// Category listing and creation over `/api/categories/`.
#[derive(Debug, Clone)]
pub struct CategoriesApi {
    client: ApiClient,
}

impl CategoriesApi {
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Category>> {
        fetch_list(&self.client, ApiRequest::get(CATEGORIES_PATH)).await
    }

    pub async fn create(&self, name: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Category name is required".to_string(),
            ));
        }
        self.client
            .post_json(CATEGORIES_PATH, &serde_json::json!({ "name": name }))
            .await
    }
}
