pub mod assist;
pub mod auth_cmd;
pub mod common;
pub mod notes;

use std::sync::Arc;

use quill_core::{
    ApiClient, AssistApi, AuthService, AuthState, AuthStateHandle, CategoriesApi, ClientConfig,
    NotesApi, TokenStore,
};

use crate::error::CliError;

/// Services for one CLI invocation, all sharing a single client stack.
pub struct Session {
    pub config: ClientConfig,
    pub auth: AuthService,
    pub notes: NotesApi,
    pub categories: CategoriesApi,
    pub assist: AssistApi,
}

impl Session {
    pub fn open(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self, CliError> {
        let auth_state = AuthStateHandle::default();
        let client = ApiClient::new(&config, Arc::clone(&store), auth_state.clone())?;
        let auth = AuthService::new(client.clone(), store, auth_state, config.endpoints.clone());
        auth.restore();

        Ok(Self {
            notes: NotesApi::new(client.clone()),
            categories: CategoriesApi::new(client.clone()),
            assist: AssistApi::new(client),
            auth,
            config,
        })
    }

    /// Fail fast when no session is stored instead of sending an anonymous request.
    pub fn require_sign_in(&self) -> Result<(), CliError> {
        match self.auth.state().current() {
            AuthState::Authenticated { .. } => Ok(()),
            _ => Err(CliError::NotSignedIn),
        }
    }
}
