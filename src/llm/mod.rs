//! Chat-completion access to the remote language-model provider.
//!
//! Summarization and question answering share one request shape: a system instruction, one user
//! message, and an output-token cap. [`ChatCompletion`] is that capability; [`HttpChatClient`]
//! speaks it over HTTP to either Azure OpenAI or the public OpenAI API, and the thin callers in
//! [`assistant`] build the prompts.

pub mod assistant;

use crate::config::{ConfigError, LlmConfig, LlmProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use assistant::{QuestionAnsweringClient, SummarizationClient};

/// Failure talking to the remote text-generation service.
#[derive(Debug, Error)]
pub enum RemoteServiceError {
    /// The provider could not be reached. The address and transport error are logged only.
    #[error("AI provider unreachable")]
    Unreachable,
    /// The provider did not answer within the configured timeout.
    #[error("AI provider did not respond within {0}s")]
    Timeout(u64),
    /// The provider answered with an error status.
    #[error("{message}")]
    Provider {
        /// HTTP status returned by the provider.
        status: u16,
        /// Provider-supplied message, or the status line when none was sent.
        message: String,
    },
    /// The provider answered successfully but without usable content.
    #[error("AI provider returned an unusable response")]
    InvalidResponse,
}

/// One system-plus-user exchange sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Instruction fixing the assistant's behavior.
    pub system_prompt: String,
    /// The user turn: prompt plus document text.
    pub user_content: String,
    /// Output-length cap for the reply.
    pub max_tokens: u32,
}

/// Capability to turn a [`ChatRequest`] into the assistant's reply text.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Send the request and return the trimmed reply.
    async fn complete(&self, request: ChatRequest) -> Result<String, RemoteServiceError>;
}

#[derive(Debug, Clone)]
enum Route {
    Azure { url: String, api_version: String },
    OpenAI { url: String, model: String },
}

/// [`ChatCompletion`] over the provider's HTTP chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    http: Client,
    api_key: String,
    route: Route,
    timeout_secs: u64,
}

impl HttpChatClient {
    /// Build a client from resolved provider settings.
    pub fn new(config: &LlmConfig) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint.trim_end_matches('/');
        let route = match config.provider {
            LlmProvider::Azure => {
                let deployment = config.deployment.as_deref().ok_or_else(|| {
                    ConfigError::MissingVariable("AZURE_OPENAI_DEPLOYMENT_NAME".into())
                })?;
                let api_version = config.api_version.clone().ok_or_else(|| {
                    ConfigError::MissingVariable("AZURE_OPENAI_API_VERSION".into())
                })?;
                Route::Azure {
                    url: format!("{endpoint}/openai/deployments/{deployment}/chat/completions"),
                    api_version,
                }
            }
            LlmProvider::OpenAI => Route::OpenAI {
                url: format!("{endpoint}/chat/completions"),
                model: config
                    .model
                    .clone()
                    .ok_or_else(|| ConfigError::MissingVariable("OPENAI_MODEL".into()))?,
            },
        };

        let timeout_secs = config.timeout_secs.max(1);
        let http = Client::builder()
            .user_agent(concat!("docmind/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| ConfigError::InvalidValue {
                key: "LLM_TIMEOUT_SECS".into(),
                reason: format!("failed to build HTTP client: {err}"),
            })?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            route,
            timeout_secs,
        })
    }

    fn url(&self) -> &str {
        match &self.route {
            Route::Azure { url, .. } | Route::OpenAI { url, .. } => url,
        }
    }

    fn transport_error(&self, err: &reqwest::Error) -> RemoteServiceError {
        if err.is_timeout() {
            tracing::warn!(url = self.url(), timeout_secs = self.timeout_secs, "AI provider timed out");
            RemoteServiceError::Timeout(self.timeout_secs)
        } else {
            tracing::warn!(url = self.url(), error = %err, "Failed to reach AI provider");
            RemoteServiceError::Unreachable
        }
    }
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: [Message<'a>; 2],
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[async_trait]
impl ChatCompletion for HttpChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, RemoteServiceError> {
        let model = match &self.route {
            Route::OpenAI { model, .. } => Some(model.as_str()),
            Route::Azure { .. } => None,
        };
        let payload = CompletionPayload {
            model,
            messages: [
                Message {
                    role: "system",
                    content: &request.system_prompt,
                },
                Message {
                    role: "user",
                    content: &request.user_content,
                },
            ],
            max_tokens: request.max_tokens,
        };

        let builder = match &self.route {
            Route::Azure { url, api_version } => self
                .http
                .post(url)
                .query(&[("api-version", api_version.as_str())])
                .header("api-key", &self.api_key),
            Route::OpenAI { url, .. } => self.http.post(url).bearer_auth(&self.api_key),
        };

        let response = builder
            .json(&payload)
            .send()
            .await
            .map_err(|err| self.transport_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| format!("AI provider returned HTTP {status}"));
            tracing::warn!(status = status.as_u16(), %message, "AI provider rejected request");
            return Err(RemoteServiceError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: CompletionResponse = response.json().await.map_err(|err| {
            if err.is_timeout() {
                self.transport_error(&err)
            } else {
                tracing::warn!(url = self.url(), error = %err, "Malformed AI provider response");
                RemoteServiceError::InvalidResponse
            }
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                tracing::warn!(url = self.url(), "AI provider returned no completion choices");
                RemoteServiceError::InvalidResponse
            })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn azure_config(endpoint: String) -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::Azure,
            api_key: "azure-key".into(),
            endpoint,
            deployment: Some("gpt-deploy".into()),
            api_version: Some("2023-07-01-preview".into()),
            model: None,
            timeout_secs: 5,
        }
    }

    fn openai_config(endpoint: String) -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::OpenAI,
            api_key: "sk-test".into(),
            endpoint,
            deployment: None,
            api_version: None,
            model: Some("gpt-3.5-turbo".into()),
            timeout_secs: 5,
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            system_prompt: "Be brief.".into(),
            user_content: "Summarize this.".into(),
            max_tokens: 150,
        }
    }

    #[tokio::test]
    async fn azure_requests_use_deployment_path_and_api_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/openai/deployments/gpt-deploy/chat/completions")
                    .query_param("api-version", "2023-07-01-preview")
                    .header("api-key", "azure-key")
                    .json_body(json!({
                        "messages": [
                            {"role": "system", "content": "Be brief."},
                            {"role": "user", "content": "Summarize this."}
                        ],
                        "max_tokens": 150
                    }));
                then.status(200).json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": "  A summary. "}}]
                }));
            })
            .await;

        let client = HttpChatClient::new(&azure_config(server.base_url())).expect("client");
        let reply = client.complete(request()).await.expect("reply");

        mock.assert_async().await;
        assert_eq!(reply, "A summary.");
    }

    #[tokio::test]
    async fn openai_requests_send_model_and_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(r#"{"model": "gpt-3.5-turbo", "max_tokens": 150}"#);
                then.status(200).json_body(json!({
                    "choices": [{"message": {"content": "Done"}}]
                }));
            })
            .await;

        let client =
            HttpChatClient::new(&openai_config(format!("{}/v1/", server.base_url())))
                .expect("client");
        let reply = client.complete(request()).await.expect("reply");

        mock.assert_async().await;
        assert_eq!(reply, "Done");
    }

    #[tokio::test]
    async fn provider_error_message_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(429).json_body(json!({
                    "error": {"message": "Rate limit reached", "type": "requests"}
                }));
            })
            .await;

        let client = HttpChatClient::new(&azure_config(server.base_url())).expect("client");
        let error = client.complete(request()).await.expect_err("rate limited");

        assert!(matches!(
            &error,
            RemoteServiceError::Provider { status: 429, message } if message == "Rate limit reached"
        ));
        assert_eq!(error.to_string(), "Rate limit reached");
    }

    #[tokio::test]
    async fn non_json_error_body_falls_back_to_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(502).body("bad gateway");
            })
            .await;

        let client = HttpChatClient::new(&azure_config(server.base_url())).expect("client");
        let error = client.complete(request()).await.expect_err("bad gateway");
        assert!(error.to_string().contains("502"));
    }

    #[tokio::test]
    async fn empty_choices_are_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({"choices": []}));
            })
            .await;

        let client = HttpChatClient::new(&azure_config(server.base_url())).expect("client");
        let error = client.complete(request()).await.expect_err("no choices");
        assert!(matches!(error, RemoteServiceError::InvalidResponse));
    }

    #[tokio::test]
    async fn unreachable_provider_does_not_reveal_its_address() {
        let client =
            HttpChatClient::new(&azure_config("http://127.0.0.1:9".into())).expect("client");
        let error = client.complete(request()).await.expect_err("unreachable");
        assert!(matches!(
            error,
            RemoteServiceError::Unreachable | RemoteServiceError::Timeout(_)
        ));
        let message = error.to_string();
        assert!(!message.contains("127.0.0.1"), "{message}");
        assert!(!message.contains("gpt-deploy"), "{message}");
    }

    #[tokio::test]
    async fn hung_provider_is_cut_off_by_the_request_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200)
                    .delay(Duration::from_secs(3))
                    .json_body(json!({"choices": [{"message": {"content": "too late"}}]}));
            })
            .await;

        let mut config = azure_config(server.base_url());
        config.timeout_secs = 1;
        let client = HttpChatClient::new(&config).expect("client");
        let error = client.complete(request()).await.expect_err("timed out");

        assert!(matches!(error, RemoteServiceError::Timeout(1)), "{error:?}");
        assert_eq!(error.to_string(), "AI provider did not respond within 1s");
    }

    #[test]
    fn azure_without_deployment_is_a_configuration_error() {
        let mut config = azure_config("https://example.openai.azure.com".into());
        config.deployment = None;
        let error = HttpChatClient::new(&config).expect_err("missing deployment");
        assert!(
            matches!(error, ConfigError::MissingVariable(key) if key == "AZURE_OPENAI_DEPLOYMENT_NAME")
        );
    }
}
