//! Account auth flows: login, registration, Google sign-in, logout, restore.

mod state;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use state::{AuthState, AuthStateHandle};

use crate::config::EndpointPaths;
use crate::error::{ApiError, Result};
use crate::http::ApiClient;
use crate::tokens::{TokenName, TokenPair, TokenStore};
use crate::util::string_or_number;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl AuthUser {
    /// Human-readable label for status output.
    pub fn label(&self) -> &str {
        self.email
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Tokens and profile returned by a successful sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub tokens: TokenPair,
    pub user: Option<AuthUser>,
}

impl fmt::Debug for SessionGrant {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionGrant")
            .field("tokens", &self.tokens)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("username", &self.username)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    SignedIn(SessionGrant),
    /// The account exists but must be verified before it can sign in.
    VerificationRequired { user: Option<AuthUser> },
}

/// Auth flows over an [`ApiClient`], persisting tokens in a [`TokenStore`] and
/// publishing [`AuthState`] transitions.
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
    store: Arc<dyn TokenStore>,
    state: AuthStateHandle,
    endpoints: EndpointPaths,
}

impl AuthService {
    pub fn new(
        client: ApiClient,
        store: Arc<dyn TokenStore>,
        state: AuthStateHandle,
        endpoints: EndpointPaths,
    ) -> Self {
        Self {
            client,
            store,
            state,
            endpoints,
        }
    }

    pub const fn state(&self) -> &AuthStateHandle {
        &self.state
    }

    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Derive the initial state from what the store holds.
    ///
    /// A store holding only one of the two tokens is cleared; an unreadable
    /// store counts as signed out.
    pub fn restore(&self) -> AuthState {
        match self.store.load_pair() {
            Ok(Some(_)) => self.state.authenticated(None),
            Ok(None) => {
                if let Err(error) = self.store.clear() {
                    tracing::warn!("Failed to clear partial session: {}", error);
                }
                self.state.signed_out();
            }
            Err(error) => {
                tracing::warn!("Failed to read stored session: {}", error);
                self.state.signed_out();
            }
        }
        self.state.current()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionGrant> {
        validate_credentials(email, password)?;
        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
        });
        let grant = self.sign_in(&self.endpoints.login, &payload).await?;
        grant.ok_or_else(|| {
            self.state.signed_out();
            ApiError::Decode("Login response did not include a session".to_string())
        })
    }

    pub async fn google_login(&self, id_token: &str) -> Result<SessionGrant> {
        let id_token = id_token.trim();
        if id_token.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Google ID token is required".to_string(),
            ));
        }
        let payload = serde_json::json!({ "id_token": id_token });
        let grant = self.sign_in(&self.endpoints.google, &payload).await?;
        grant.ok_or_else(|| {
            self.state.signed_out();
            ApiError::Decode("Google sign-in response did not include a session".to_string())
        })
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterOutcome> {
        validate_credentials(&request.email, &request.password)?;
        match self.sign_in(&self.endpoints.register, request).await? {
            Some(grant) => Ok(RegisterOutcome::SignedIn(grant)),
            None => {
                self.state.signed_out();
                Ok(RegisterOutcome::VerificationRequired { user: None })
            }
        }
    }

    /// Invalidate the session on the server and forget it locally.
    ///
    /// Local tokens are cleared even when the server call fails; server
    /// failures are logged, storage failures are returned.
    pub async fn logout(&self) -> Result<()> {
        let refresh = self.store.get(TokenName::Refresh).unwrap_or_else(|error| {
            tracing::warn!("Failed to read refresh token for logout: {}", error);
            None
        });

        if let Some(refresh) = refresh {
            let payload = serde_json::json!({ "refresh": refresh });
            match self.client.post(&self.endpoints.logout, &payload).await {
                Ok(_) => tracing::info!("Server session invalidated"),
                Err(error) if error.is_unauthorized() || error.is_session_lost() => {
                    tracing::debug!("Server session was already invalid");
                }
                Err(error) => tracing::warn!("Server logout failed: {}", error),
            }
        }

        let cleared = self.store.clear();
        self.state.signed_out();
        cleared
    }

    /// POST credentials to a public endpoint and keep the returned session.
    ///
    /// `Ok(None)` means the server accepted the call without signing in.
    async fn sign_in<B>(&self, path: &str, body: &B) -> Result<Option<SessionGrant>>
    where
        B: Serialize + ?Sized,
    {
        self.state.authenticating();

        let response = match self.client.post(path, body).await {
            Ok(response) => response,
            Err(error) => {
                self.state.signed_out();
                return Err(error);
            }
        };
        let grant = match response.into_json::<SessionResponse>().map(SessionResponse::into_grant)
        {
            Ok(Ok(grant)) => grant,
            Ok(Err(error)) | Err(error) => {
                self.state.signed_out();
                return Err(error);
            }
        };
        let Some(grant) = grant else {
            return Ok(None);
        };

        if let Err(error) = self.store.save(&grant.tokens.access, &grant.tokens.refresh) {
            tracing::warn!("Failed to persist session tokens: {}", error);
            self.state.failed(error.to_string());
            return Err(error);
        }
        self.state.authenticated(grant.user.clone());
        Ok(Some(grant))
    }
}

impl fmt::Debug for AuthService {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthService")
            .field("state", &self.state.current())
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(ApiError::InvalidRequest("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(ApiError::InvalidRequest("Password is required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default, alias = "access_token")]
    access: Option<String>,
    #[serde(default, alias = "refresh_token")]
    refresh: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
    #[serde(default)]
    tokens: Option<SessionTokens>,
}

#[derive(Debug, Deserialize)]
struct SessionTokens {
    #[serde(alias = "access_token")]
    access: Option<String>,
    #[serde(alias = "refresh_token")]
    refresh: Option<String>,
}

impl SessionResponse {
    fn into_grant(self) -> Result<Option<SessionGrant>> {
        let nested = self.tokens;
        let access = self
            .access
            .or_else(|| nested.as_ref().and_then(|tokens| tokens.access.clone()))
            .filter(|token| !token.trim().is_empty());
        let refresh = self
            .refresh
            .or_else(|| nested.and_then(|tokens| tokens.refresh))
            .filter(|token| !token.trim().is_empty());

        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(Some(SessionGrant {
                tokens: TokenPair { access, refresh },
                user: self.user,
            })),
            (None, None) => Ok(None),
            _ => Err(ApiError::Decode(
                "Auth response included only one of the access/refresh tokens".to_string(),
            )),
        }
    }
}
