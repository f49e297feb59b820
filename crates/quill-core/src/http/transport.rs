//! Outbound HTTP transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;

use super::request::{ApiRequest, ApiResponse};
use crate::config::{normalize_base_url, ClientConfig};
use crate::error::{ApiError, Result};
use crate::util::compact_text;

/// One stage of the request pipeline.
///
/// The reqwest-backed transport sits at the bottom; token attachment and
/// refresh handling wrap it as decorators implementing the same trait.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        (**self).send(request).await
    }
}

/// Transport that talks to the backend over HTTP with JSON defaults.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .user_agent(format!("quill/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| {
                ApiError::Configuration(format!("Failed to construct HTTP client: {error}"))
            })?;

        Ok(Self {
            base_url,
            timeout: config.request_timeout(),
            client,
        })
    }

    /// Returns the normalized API base URL used by this transport.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn map_send_error(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else {
            ApiError::from(error)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        tracing::debug!(method = %request.method, path = %request.path, "Sending API request");

        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path))
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| self.map_send_error(error))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| self.map_send_error(error))?;

        if !status.is_success() {
            tracing::debug!(
                method = %request.method,
                path = %request.path,
                status = status.as_u16(),
                "API request failed"
            );
            return Err(http_error(status, &body));
        }

        Ok(ApiResponse::new(status.as_u16(), parse_body(&body)))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    msg: Option<String>,
}

/// Build the structured failure for a non-success response.
pub fn http_error(status: StatusCode, body: &str) -> ApiError {
    let payload = serde_json::from_str::<serde_json::Value>(body).ok();
    ApiError::Http {
        status: status.as_u16(),
        message: parse_api_error(status, body),
        payload,
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload
            .detail
            .or(payload.message)
            .or(payload.error_description)
            .or(payload.error)
            .or(payload.msg)
        {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), ToString::to_string)
    } else {
        trimmed
    }
}

fn parse_body(body: &str) -> serde_json::Value {
    if body.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::Value::String(body.to_string()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport_for(server: &MockServer) -> ReqwestTransport {
        ReqwestTransport::new(&ClientConfig::new(server.uri()).unwrap()).unwrap()
    }

    #[test]
    fn url_joins_base_and_path() {
        let transport =
            ReqwestTransport::new(&ClientConfig::new("https://api.example.com/").unwrap())
                .unwrap();
        assert_eq!(transport.base_url(), "https://api.example.com");
        assert_eq!(
            transport.url("/api/notes/"),
            "https://api.example.com/api/notes/"
        );
        assert_eq!(
            transport.url("api/notes/"),
            "https://api.example.com/api/notes/"
        );
    }

    #[test]
    fn error_message_prefers_payload_fields() {
        let error = http_error(
            StatusCode::UNAUTHORIZED,
            r#"{"detail": "Given token not valid for any token type"}"#,
        );
        let ApiError::Http {
            status,
            message,
            payload,
        } = error
        else {
            panic!("expected HTTP error");
        };
        assert_eq!(status, 401);
        assert_eq!(message, "Given token not valid for any token type");
        assert!(payload.is_some());
    }

    #[test]
    fn error_message_falls_back_to_reason_phrase() {
        let error = http_error(StatusCode::BAD_GATEWAY, "  ");
        assert_eq!(error.to_string(), "API error: Bad Gateway (502)");
    }

    #[test]
    fn body_parsing_handles_empty_and_plain_text() {
        assert_eq!(parse_body(""), serde_json::Value::Null);
        assert_eq!(parse_body("pong"), json!("pong"));
        assert_eq!(parse_body(r#"{"ok":true}"#), json!({ "ok": true }));
    }

    #[tokio::test]
    async fn sends_json_body_query_and_default_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/notes/"))
            .and(query_param("draft", "true"))
            .and(header("content-type", "application/json"))
            .and(header("accept", "application/json"))
            .and(body_json(json!({ "title": "Ideas" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
            .expect(1)
            .mount(&server)
            .await;

        let request = ApiRequest::post("/api/notes/")
            .with_json(&json!({ "title": "Ideas" }))
            .unwrap()
            .with_query("draft", "true");
        let response = transport_for(&server).send(&request).await.unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.data, json!({ "id": 7 }));
    }

    #[tokio::test]
    async fn non_success_status_becomes_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/notes/9/"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "detail": "Not found." })),
            )
            .mount(&server)
            .await;

        let error = transport_for(&server)
            .send(&ApiRequest::get("/api/notes/9/"))
            .await
            .unwrap_err();
        assert_eq!(error.status(), Some(404));
        assert_eq!(error.to_string(), "API error: Not found. (404)");
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let config = ClientConfig::new("http://127.0.0.1:9").unwrap();
        let error = ReqwestTransport::new(&config)
            .unwrap()
            .send(&ApiRequest::get("/api/notes/"))
            .await
            .unwrap_err();
        assert!(matches!(error, ApiError::Network(_) | ApiError::Timeout(_)));
        assert!(!error.is_unauthorized());
    }
}
