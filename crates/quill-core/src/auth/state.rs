//! Observable authentication state.

use std::sync::Arc;

use tokio::sync::watch;

use super::AuthUser;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated {
        user: Option<AuthUser>,
    },
    /// Sign-in reached the server but the session could not be kept.
    Error {
        message: String,
    },
}

impl AuthState {
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    const fn label(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated { .. } => "authenticated",
            Self::Error { .. } => "error",
        }
    }
}

/// Shared publisher of [`AuthState`].
///
/// Cloning the handle shares the channel. UI layers call
/// [`AuthStateHandle::subscribe`] and react to changes, including the
/// sign-out forced by a failed token refresh.
#[derive(Debug, Clone)]
pub struct AuthStateHandle {
    sender: Arc<watch::Sender<AuthState>>,
}

impl Default for AuthStateHandle {
    fn default() -> Self {
        Self::new(AuthState::Unauthenticated)
    }
}

impl AuthStateHandle {
    pub fn new(initial: AuthState) -> Self {
        let (sender, _receiver) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> AuthState {
        self.sender.borrow().clone()
    }

    /// Publish `next`; subscribers are only woken when the state changes.
    pub fn set(&self, next: AuthState) {
        self.sender.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            tracing::debug!(from = state.label(), to = next.label(), "Auth state changed");
            *state = next;
            true
        });
    }

    pub(crate) fn authenticating(&self) {
        self.set(AuthState::Authenticating);
    }

    pub(crate) fn authenticated(&self, user: Option<AuthUser>) {
        self.set(AuthState::Authenticated { user });
    }

    pub(crate) fn signed_out(&self) {
        self.set(AuthState::Unauthenticated);
    }

    pub(crate) fn failed(&self, message: impl Into<String>) {
        self.set(AuthState::Error {
            message: message.into(),
        });
    }
}
