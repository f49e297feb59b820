//! Bearer token attachment.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};

use super::request::{ApiRequest, ApiResponse};
use super::transport::Transport;
use crate::config::EndpointPaths;
use crate::error::Result;
use crate::tokens::{TokenName, TokenStore};
use crate::util::normalize_path;

/// Endpoints reachable without a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicEndpoints {
    paths: Vec<String>,
}

impl PublicEndpoints {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        Self {
            paths: paths
                .into_iter()
                .map(|path| normalize_path(path.as_ref()))
                .collect(),
        }
    }

    pub fn from_endpoints(endpoints: &EndpointPaths) -> Self {
        Self::new(endpoints.public_paths())
    }

    /// Exact match, ignoring a trailing slash and the query string.
    pub fn is_public(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.paths.iter().any(|public| *public == path)
    }
}

impl Default for PublicEndpoints {
    fn default() -> Self {
        Self::from_endpoints(&EndpointPaths::default())
    }
}

/// Adds `Authorization: Bearer <access token>` to protected requests.
///
/// A missing or unreadable token never blocks the request: it goes out
/// without credentials and the server's 401 takes the normal refresh path.
pub struct AttachToken<T> {
    inner: T,
    store: Arc<dyn TokenStore>,
    public: PublicEndpoints,
}

impl<T> AttachToken<T> {
    pub fn new(inner: T, store: Arc<dyn TokenStore>, public: PublicEndpoints) -> Self {
        Self {
            inner,
            store,
            public,
        }
    }

    pub const fn public_endpoints(&self) -> &PublicEndpoints {
        &self.public
    }

    /// Set the bearer header from the store. Returns whether a token was
    /// attached.
    pub fn authorize(&self, request: &mut ApiRequest) -> bool {
        request.headers.remove(AUTHORIZATION);

        let token = match self.store.get(TokenName::Access) {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!(
                    path = %request.path,
                    "No access token stored; sending unauthenticated"
                );
                return false;
            }
            Err(error) => {
                tracing::warn!(path = %request.path, "Failed to read access token: {}", error);
                return false;
            }
        };

        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers.insert(AUTHORIZATION, value);
                true
            }
            Err(_) => {
                tracing::warn!("Stored access token is not a valid header value");
                false
            }
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for AttachToken<T> {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        if self.public.is_public(&request.path) {
            return self.inner.send(request).await;
        }

        let mut request = request.clone();
        self.authorize(&mut request);
        self.inner.send(&request).await
    }
}
