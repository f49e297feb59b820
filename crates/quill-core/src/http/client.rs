//! `ApiClient`: the entry point UI code and services call.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::attach::{AttachToken, PublicEndpoints};
use super::refresh::{RefreshCoordinator, RefreshSettings};
use super::request::{ApiRequest, ApiResponse};
use super::transport::{ReqwestTransport, Transport};
use crate::auth::AuthStateHandle;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::tokens::TokenStore;

/// Authenticated API client.
///
/// Requests flow through `RefreshCoordinator -> AttachToken -> transport`.
/// Cloning is cheap and clones share the refresh coordination state.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use quill_core::{ApiClient, AuthStateHandle, ClientConfig, MemoryTokenStore};
///
/// # async fn example() -> quill_core::Result<()> {
/// let config = ClientConfig::new("https://notes.example.com")?;
/// let client = ApiClient::new(
///     &config,
///     Arc::new(MemoryTokenStore::new()),
///     AuthStateHandle::default(),
/// )?;
///
/// let notes = client.get("/api/notes/").await?;
/// println!("{}", notes.data);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    /// Build the standard stack over a reqwest transport.
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
        auth_state: AuthStateHandle,
    ) -> Result<Self> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(transport, config, store, auth_state))
    }

    /// Build the standard stack over any bottom transport.
    pub fn with_transport<T: Transport>(
        transport: T,
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
        auth_state: AuthStateHandle,
    ) -> Self {
        let public = PublicEndpoints::from_endpoints(&config.endpoints);
        let attach = AttachToken::new(transport, Arc::clone(&store), public.clone());
        let coordinator = RefreshCoordinator::new(
            attach,
            store,
            public,
            auth_state,
            RefreshSettings::from_config(config),
        );
        Self::from_transport(coordinator)
    }

    /// Wrap an already assembled pipeline.
    pub fn from_transport<T: Transport>(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.transport.send(&request).await
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn post<B>(&self, path: &str, body: &B) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        self.request(ApiRequest::post(path).with_json(body)?).await
    }

    pub async fn put<B>(&self, path: &str, body: &B) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        self.request(ApiRequest::put(path).with_json(body)?).await
    }

    pub async fn patch<B>(&self, path: &str, body: &B) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        self.request(ApiRequest::patch(path).with_json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(ApiRequest::delete(path)).await
    }

    /// Send `request` and decode the body into `T`.
    pub async fn request_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.request(request).await?.into_json()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request_json(ApiRequest::get(path)).await
    }

    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request_json(ApiRequest::post(path).with_json(body)?)
            .await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::AuthState;
    use crate::error::ApiError;
    use crate::tokens::{MemoryTokenStore, TokenPair};

    struct Stack {
        server: MockServer,
        store: Arc<MemoryTokenStore>,
        auth_state: AuthStateHandle,
        client: ApiClient,
    }

    async fn stack() -> Stack {
        let server = MockServer::start().await;
        let config = ClientConfig::new(server.uri()).unwrap();
        let store = Arc::new(MemoryTokenStore::with_tokens("expired-access", "refresh-0"));
        let auth_state = AuthStateHandle::new(AuthState::Authenticated { user: None });
        let client = ApiClient::new(&config, store.clone(), auth_state.clone()).unwrap();
        Stack {
            server,
            store,
            auth_state,
            client,
        }
    }

    async fn mount_notes(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/notes/"))
            .and(header("authorization", "Bearer fresh-access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/notes/"))
            .and(header("authorization", "Bearer expired-access"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "detail": "Given token not valid" })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn concurrent_401s_refresh_once_over_http() {
        let stack = stack().await;
        mount_notes(&stack.server).await;
        Mock::given(method("POST"))
            .and(path("/api/refresh"))
            .and(body_json(json!({ "refresh": "refresh-0" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access": "fresh-access", "refresh": "refresh-1" }))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&stack.server)
            .await;

        let (first, second, third) = tokio::join!(
            stack.client.get("/api/notes/"),
            stack.client.get("/api/notes/"),
            stack.client.get("/api/notes/"),
        );

        for result in [first, second, third] {
            assert_eq!(result.unwrap().status, 200);
        }
        assert_eq!(
            stack.store.snapshot(),
            Some(TokenPair::new("fresh-access", "refresh-1"))
        );
        assert!(stack.auth_state.current().is_authenticated());
    }

    #[tokio::test]
    async fn rejected_refresh_signs_out_over_http() {
        let stack = stack().await;
        mount_notes(&stack.server).await;
        Mock::given(method("POST"))
            .and(path("/api/refresh"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "detail": "Token is blacklisted" })),
            )
            .expect(1)
            .mount(&stack.server)
            .await;

        let error = stack.client.get("/api/notes/").await.unwrap_err();

        assert!(error.is_session_lost());
        assert!(matches!(error, ApiError::RefreshFailed(_)));
        assert_eq!(stack.store.snapshot(), None);
        assert_eq!(stack.auth_state.current(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn typed_helpers_decode_bodies() {
        #[derive(serde::Deserialize)]
        struct Echo {
            value: u32,
        }

        let stack = stack().await;
        Mock::given(method("POST"))
            .and(path("/api/echo/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": 3 })))
            .mount(&stack.server)
            .await;

        let echo: Echo = stack
            .client
            .post_json("/api/echo/", &json!({ "value": 3 }))
            .await
            .unwrap();
        assert_eq!(echo.value, 3);
    }
}
