//! HTTP client for an Anthropic-style messages endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::generator::{ContentGenerator, GenerationRequest};
use crate::result::AiError;

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct HttpGeneratorConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Upper bound for a single HTTP request. Callers usually apply a tighter
    /// per-call bound through [`crate::generate_within`].
    pub request_timeout: Duration,
}

impl HttpGeneratorConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(180),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

pub struct HttpContentGenerator {
    client: Client,
    config: HttpGeneratorConfig,
}

impl HttpContentGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, AiError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: request.max_tokens,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
            system: request.system.as_deref(),
        };

        debug!(model = %self.config.model, max_tokens = request.max_tokens, "calling AI generator");

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout(self.config.request_timeout)
                } else {
                    AiError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!(status = status.as_u16(), "AI generator returned an error");
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AiError::Malformed(e.to_string()))?;

        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| AiError::Malformed("no text content block".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn generator(server: &MockServer) -> HttpContentGenerator {
        let config = HttpGeneratorConfig::new(format!("{}/v1/messages", server.uri()), "test-key")
            .with_model("test-model");
        HttpContentGenerator::new(config).unwrap()
    }

    #[tokio::test]
    async fn returns_first_text_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "content": [{ "type": "text", "text": "Summary line\nExperience line" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = generator(&server)
            .await
            .generate(&GenerationRequest::new("write a resume"))
            .await
            .unwrap();
        assert_eq!(text, "Summary line\nExperience line");
    }

    #[tokio::test]
    async fn error_status_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = generator(&server)
            .await
            .generate(&GenerationRequest::new("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Api { status: 529, ref message } if message == "overloaded"));
    }

    #[tokio::test]
    async fn missing_text_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": [] })))
            .mount(&server)
            .await;

        let err = generator(&server)
            .await
            .generate(&GenerationRequest::new("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));
    }
}
