//! quill-core - Core library for Quill
//!
//! This crate contains the token store, the authenticated HTTP client with
//! single-flight token refresh, and the typed notes API used by every Quill
//! front end.

pub mod assist;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod notes;
pub mod tokens;
pub mod util;

pub use assist::{AssistAction, AssistApi};
pub use auth::{
    AuthService, AuthState, AuthStateHandle, AuthUser, RegisterOutcome, RegisterRequest,
    SessionGrant,
};
pub use config::ClientConfig;
pub use error::{ApiError, Result};
pub use http::{ApiClient, ApiRequest, ApiResponse};
pub use notes::{
    collect_categories, filter_notes, Category, CategoriesApi, Note, NoteDraft, NoteFilter,
    NotePatch, NoteQuery, NoteSort, NotesApi,
};
pub use tokens::{MemoryTokenStore, TokenName, TokenPair, TokenStore};
