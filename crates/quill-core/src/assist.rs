//! Server-side AI assist actions over note text.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::http::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssistAction {
    Summarize,
    Extract,
    Polish,
}

impl AssistAction {
    pub const ALL: [Self; 3] = [Self::Summarize, Self::Extract, Self::Polish];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Extract => "extract",
            Self::Polish => "polish",
        }
    }

    fn path(self) -> String {
        format!("/api/assist/{}/", self.as_str())
    }
}

impl fmt::Display for AssistAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssistAction {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| ApiError::InvalidRequest(format!("Unknown assist action '{value}'")))
    }
}

#[derive(Debug, Deserialize)]
struct AssistResponse {
    result: String,
}

#[derive(Debug, Clone)]
pub struct AssistApi {
    client: ApiClient,
}

impl AssistApi {
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Run `action` over `text` and return the generated text.
    pub async fn run(&self, action: AssistAction, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "Assist needs some text to work on".to_string(),
            ));
        }
        tracing::debug!(action = action.as_str(), chars = text.chars().count(), "Running assist");
        let response: AssistResponse = self
            .client
            .post_json(&action.path(), &serde_json::json!({ "text": text }))
            .await?;
        Ok(response.result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::AuthStateHandle;
    use crate::config::ClientConfig;
    use crate::tokens::MemoryTokenStore;

    #[test]
    fn parses_action_names() {
        assert_eq!("Polish".parse::<AssistAction>().unwrap(), AssistAction::Polish);
        assert!("translate".parse::<AssistAction>().is_err());
    }

    #[tokio::test]
    async fn run_posts_text_and_returns_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/assist/summarize/"))
            .and(body_json(json!({ "text": "A long meeting transcript" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "result": "Short summary" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig::new(server.uri()).unwrap();
        let client = ApiClient::new(
            &config,
            Arc::new(MemoryTokenStore::with_tokens("access", "refresh")),
            AuthStateHandle::default(),
        )
        .unwrap();

        let summary = AssistApi::new(client)
            .run(AssistAction::Summarize, "A long meeting transcript")
            .await
            .unwrap();
        assert_eq!(summary, "Short summary");
    }
}
