//! Single-flight token refresh.
//!
//! [`RefreshCoordinator`] wraps the token-attaching transport. When a
//! protected request comes back 401 it either starts a refresh cycle or, if
//! one is already running, parks the request until the cycle settles:
//!
//! ```text
//! IDLE --401--> REFRESHING --refresh ok---> replay queue, retry trigger --> IDLE
//!                          --refresh err--> reject queue, clear tokens  --> IDLE
//! ```
//!
//! Exactly one refresh call is made per cycle no matter how many requests are
//! rejected concurrently. Every parked request is settled exactly once.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::attach::PublicEndpoints;
use super::request::{ApiRequest, ApiResponse};
use super::transport::Transport;
use crate::auth::AuthStateHandle;
use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::tokens::{TokenName, TokenStore};

/// Knobs for the refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSettings {
    pub refresh_path: String,
    pub refresh_timeout: Duration,
    pub max_pending_requests: usize,
}

impl RefreshSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            refresh_path: config.endpoints.refresh.clone(),
            refresh_timeout: config.refresh_timeout(),
            max_pending_requests: config.max_pending_requests,
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

struct PendingRequest {
    request: ApiRequest,
    responder: oneshot::Sender<Result<ApiResponse>>,
}

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    /// Bumped after every successful refresh.
    generation: u64,
    pending: VecDeque<PendingRequest>,
}

enum Recovery {
    /// A refresh finished after the request was sent; its token is stale.
    Replay,
    Wait(oneshot::Receiver<Result<ApiResponse>>),
    Lead,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshGrant {
    #[serde(alias = "access_token")]
    access: String,
    #[serde(default, alias = "refresh_token")]
    refresh: Option<String>,
}

/// Response interceptor that turns a 401 into one coordinated token refresh.
///
/// The coordination state belongs to this instance; clones share it, separately
/// constructed coordinators never do.
pub struct RefreshCoordinator<T> {
    inner: Arc<T>,
    store: Arc<dyn TokenStore>,
    public: PublicEndpoints,
    auth_state: AuthStateHandle,
    settings: RefreshSettings,
    state: Arc<Mutex<RefreshState>>,
}

impl<T> Clone for RefreshCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            store: Arc::clone(&self.store),
            public: self.public.clone(),
            auth_state: self.auth_state.clone(),
            settings: self.settings.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Transport> RefreshCoordinator<T> {
    pub fn new(
        inner: T,
        store: Arc<dyn TokenStore>,
        public: PublicEndpoints,
        auth_state: AuthStateHandle,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            inner: Arc::new(inner),
            store,
            public,
            auth_state,
            settings,
            state: Arc::new(Mutex::new(RefreshState::default())),
        }
    }

    /// Whether a refresh cycle is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.lock_state().refreshing
    }

    /// Number of requests parked on the current cycle.
    pub fn pending_len(&self) -> usize {
        self.lock_state().pending.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        lock(&self.state)
    }

    fn should_refresh(&self, request: &ApiRequest, error: &ApiError) -> bool {
        error.is_unauthorized() && !request.is_retried() && !self.public.is_public(&request.path)
    }

    async fn recover(&self, request: &ApiRequest, sent_at: u64) -> Result<ApiResponse> {
        let mut retry = request.clone();
        retry.mark_retried();

        let recovery = {
            let mut state = self.lock_state();
            if state.refreshing {
                if state.pending.len() >= self.settings.max_pending_requests {
                    tracing::warn!(
                        path = %request.path,
                        pending = state.pending.len(),
                        "Refresh queue is full; rejecting request"
                    );
                    return Err(ApiError::QueueFull(state.pending.len()));
                }
                let (responder, receiver) = oneshot::channel();
                state.pending.push_back(PendingRequest {
                    request: retry.clone(),
                    responder,
                });
                Recovery::Wait(receiver)
            } else if state.generation != sent_at {
                Recovery::Replay
            } else {
                state.refreshing = true;
                Recovery::Lead
            }
        };

        match recovery {
            Recovery::Replay => {
                tracing::debug!(
                    path = %request.path,
                    "Token was rotated while in flight; replaying"
                );
                self.inner.send(&retry).await
            }
            Recovery::Wait(receiver) => {
                tracing::debug!(path = %request.path, "Waiting for in-flight token refresh");
                receiver.await.unwrap_or(Err(ApiError::RefreshAborted))
            }
            Recovery::Lead => {
                // The cycle runs as its own task so dropping this caller does
                // not strand the requests parked behind it.
                let cycle = self.clone();
                tokio::spawn(async move { cycle.run_cycle().await })
                    .await
                    .unwrap_or_else(|error| {
                        tracing::error!("Token refresh task failed: {}", error);
                        Err(ApiError::RefreshAborted)
                    })?;
                self.inner.send(&retry).await
            }
        }
    }

    async fn run_cycle(&self) -> Result<()> {
        let mut guard = CycleGuard::new(&self.state);
        tracing::info!("Access token rejected; refreshing session");

        let outcome = self
            .exchange_refresh_token()
            .await
            .map_err(|error| ApiError::RefreshFailed(Box::new(error)));
        if let Err(error) = &outcome {
            tracing::warn!("Session refresh failed: {}", error);
            self.discard_session();
        }

        let pending = {
            let mut state = self.lock_state();
            state.refreshing = false;
            if outcome.is_ok() {
                state.generation = state.generation.wrapping_add(1);
            }
            std::mem::take(&mut state.pending)
        };
        guard.disarm();

        match &outcome {
            Ok(()) => {
                tracing::info!(queued = pending.len(), "Session refreshed");
                self.replay(pending);
            }
            Err(error) => {
                for entry in pending {
                    let _ = entry.responder.send(Err(error.clone()));
                }
            }
        }
        outcome
    }

    /// Re-issue parked requests in the order they were queued. Each result
    /// goes to its own caller as soon as it is available.
    fn replay(&self, pending: VecDeque<PendingRequest>) {
        if pending.is_empty() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let replays = pending.into_iter().map(|entry| {
                let inner = Arc::clone(&inner);
                async move {
                    let result = inner.send(&entry.request).await;
                    let _ = entry.responder.send(result);
                }
            });
            futures::future::join_all(replays).await;
        });
    }

    async fn exchange_refresh_token(&self) -> Result<()> {
        let refresh_token = match self.store.get(TokenName::Refresh) {
            Ok(Some(token)) => token,
            Ok(None) => return Err(ApiError::MissingRefreshToken),
            Err(error) => {
                tracing::warn!("Failed to read refresh token: {}", error);
                return Err(ApiError::MissingRefreshToken);
            }
        };

        let request = ApiRequest::post(self.settings.refresh_path.as_str()).with_json(
            &RefreshBody {
                refresh: &refresh_token,
            },
        )?;
        let grant = tokio::time::timeout(self.settings.refresh_timeout, async {
            self.inner.send(&request).await?.json::<RefreshGrant>()
        })
        .await
        .map_err(|_| ApiError::Timeout(self.settings.refresh_timeout))??;

        if grant.access.trim().is_empty() {
            return Err(ApiError::Decode(
                "Refresh response did not include an access token".to_string(),
            ));
        }
        let refresh = grant
            .refresh
            .filter(|token| !token.trim().is_empty())
            .unwrap_or(refresh_token);
        self.store.save(&grant.access, &refresh)
    }

    fn discard_session(&self) {
        if let Err(error) = self.store.clear() {
            tracing::warn!("Failed to clear stored tokens: {}", error);
        }
        self.auth_state.signed_out();
    }
}

#[async_trait]
impl<T: Transport> Transport for RefreshCoordinator<T> {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let sent_at = self.lock_state().generation;
        match self.inner.send(request).await {
            Err(error) if self.should_refresh(request, &error) => {
                self.recover(request, sent_at).await
            }
            result => result,
        }
    }
}

/// Resets the cycle if it unwinds before settling, so parked callers are
/// never left waiting on a flag nobody will clear.
struct CycleGuard<'a> {
    state: &'a Mutex<RefreshState>,
    armed: bool,
}

impl<'a> CycleGuard<'a> {
    const fn new(state: &'a Mutex<RefreshState>) -> Self {
        Self { state, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let pending = {
            let mut state = lock(self.state);
            state.refreshing = false;
            std::mem::take(&mut state.pending)
        };
        for entry in pending {
            let _ = entry.responder.send(Err(ApiError::RefreshAborted));
        }
    }
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
