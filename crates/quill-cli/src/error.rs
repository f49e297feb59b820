use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Api(#[from] quill_core::ApiError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("Nothing to edit; pass --title, --content or --category")]
    NothingToEdit,
    #[error("Not signed in. Run `quill auth login` first.")]
    NotSignedIn,
}

impl CliError {
    /// The stored session is gone and the user has to sign in again.
    pub const fn is_session_lost(&self) -> bool {
        match self {
            Self::Api(error) => error.is_session_lost(),
            Self::NotSignedIn => true,
            _ => false,
        }
    }
}
