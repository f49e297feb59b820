//! Request and response descriptors passed through the transport stack.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ApiError, Result};

/// One outgoing API call, relative to the client's base URL.
///
/// Descriptors are cheap to clone; the transport stack clones them when it
/// has to attach credentials or replay a call after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serialize `body` as the JSON payload.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body).map_err(|error| {
            ApiError::InvalidRequest(format!("Failed to serialize request body: {error}"))
        })?);
        Ok(self)
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|error| ApiError::InvalidRequest(format!("Invalid header name: {error}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|error| ApiError::InvalidRequest(format!("Invalid header value: {error}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Whether this call is already the replay that follows a token refresh.
    pub const fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// A successful API answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// JSON body; `Null` for empty bodies, a JSON string for non-JSON text.
    pub data: serde_json::Value,
}

impl ApiResponse {
    pub const fn new(status: u16, data: serde_json::Value) -> Self {
        Self { status, data }
    }

    /// Decode the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.data).map_err(|error| ApiError::Decode(error.to_string()))
    }

    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.data).map_err(|error| ApiError::Decode(error.to_string()))
    }
}
