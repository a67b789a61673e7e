use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use scholar_core::config::{LlmConfig, LlmProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self { max_tokens: 4096, temperature: 0.7 }
    }
}

impl From<&LlmConfig> for CompletionOptions {
    fn from(config: &LlmConfig) -> Self {
        Self { max_tokens: config.max_tokens, temperature: config.temperature }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("completion transport failed: {0}")]
    Transport(String),
    #[error("completion service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response could not be decoded: {0}")]
    Decode(String),
    #[error("completion service returned no choices")]
    Empty,
    #[error("completion timed out after {0:?}")]
    TimedOut(Duration),
    #[error("scripted completion queue is exhausted")]
    Exhausted,
}

/// Text-in/text-out completion service.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError>;
}

/// Builds the HTTP client for the configured provider.
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, CompletionError> {
    let http = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|error| CompletionError::Transport(error.to_string()))?;
    let endpoint = config.endpoint().to_owned();
    let model = config.model.clone();

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAiClient {
            http,
            endpoint,
            model,
            api_key: config.api_key.clone(),
        }),
        LlmProvider::Anthropic => Arc::new(AnthropicClient {
            http,
            endpoint,
            model,
            api_key: config.api_key.clone(),
        }),
        LlmProvider::Ollama => Arc::new(OllamaClient { http, endpoint, model }),
    };
    Ok(client)
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, CompletionError> {
    let response =
        request.send().await.map_err(|error| CompletionError::Transport(error.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CompletionError::Status { status: status.as_u16(), body });
    }
    response.json::<T>().await.map_err(|error| CompletionError::Decode(error.to_string()))
}

/// A blank reply is still content; only a missing choice is an error.
fn first_choice(text: Option<String>) -> Result<String, CompletionError> {
    text.ok_or(CompletionError::Empty)
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

fn user_message(prompt: &str) -> Vec<ChatMessage> {
    vec![ChatMessage { role: "user".to_owned(), content: prompt.to_owned() }]
}

pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let body = OpenAiRequest {
            model: self.model.clone(),
            messages: user_message(prompt),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };
        let mut request = self.http.post(format!("{}/chat/completions", self.endpoint)).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response: OpenAiResponse = send_json(request).await?;
        first_choice(response.choices.into_iter().next().map(|choice| choice.message.content))
    }
}

pub struct AnthropicClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            messages: user_message(prompt),
        };
        let mut request = self
            .http
            .post(format!("{}/messages", self.endpoint))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.header("x-api-key", api_key.expose_secret());
        }

        let response: AnthropicResponse = send_json(request).await?;
        let text = response.content.into_iter().filter_map(|block| block.text).collect::<String>();
        Ok(text)
    }
}

pub struct OllamaClient {
    http: Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let body = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_owned(),
            stream: false,
            options: OllamaOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
            },
        };
        let request = self.http.post(format!("{}/api/generate", self.endpoint)).json(&body);

        let response: OllamaResponse = send_json(request).await?;
        Ok(response.response)
    }
}

/// Replays queued completions in order and records every prompt it receives.
#[derive(Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    prompts: Mutex<Vec<String>>,
    latency: Option<Duration>,
}

impl ScriptedLlmClient {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, CompletionError>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().await.push_back(Ok(reply.into()));
    }

    pub async fn push_error(&self, error: CompletionError) {
        self.replies.lock().await.push_back(Err(error));
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    pub async fn remaining(&self) -> usize {
        self.replies.lock().await.len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        self.prompts.lock().await.push(prompt.to_owned());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.replies.lock().await.pop_front().unwrap_or(Err(CompletionError::Exhausted))
    }
}

#[cfg(test)]
mod tests {
    use scholar_core::config::{AppConfig, LlmProvider};

    use super::{
        client_from_config, first_choice, CompletionError, CompletionOptions, LlmClient,
        ScriptedLlmClient,
    };

    #[test]
    fn blank_reply_is_content_but_missing_choice_is_not() {
        assert_eq!(first_choice(Some(String::new())), Ok(String::new()));
        assert_eq!(first_choice(Some("  ".to_owned())), Ok("  ".to_owned()));
        assert_eq!(first_choice(None), Err(CompletionError::Empty));
    }

    #[tokio::test]
    async fn scripted_client_replays_in_order_then_exhausts() {
        let client = ScriptedLlmClient::new([
            Ok("first".to_owned()),
            Err(CompletionError::Transport("connection reset".to_owned())),
        ]);
        let options = CompletionOptions::default();

        assert_eq!(client.complete("p1", &options).await, Ok("first".to_owned()));
        assert!(matches!(
            client.complete("p2", &options).await,
            Err(CompletionError::Transport(_))
        ));
        assert_eq!(client.complete("p3", &options).await, Err(CompletionError::Exhausted));
        assert_eq!(client.prompts().await, vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn scripted_client_accepts_late_replies() {
        let client = ScriptedLlmClient::default();
        client.push_reply("queued later").await;

        let reply = client.complete("prompt", &CompletionOptions::default()).await;

        assert_eq!(reply, Ok("queued later".to_owned()));
        assert_eq!(client.remaining().await, 0);
    }

    #[test]
    fn options_follow_llm_config() {
        let mut config = AppConfig::default();
        config.llm.max_tokens = 512;
        config.llm.temperature = 0.2;

        let options = CompletionOptions::from(&config.llm);

        assert_eq!(options, CompletionOptions { max_tokens: 512, temperature: 0.2 });
    }

    #[test]
    fn http_clients_build_for_every_provider() {
        for provider in [LlmProvider::OpenAi, LlmProvider::Anthropic, LlmProvider::Ollama] {
            let mut config = AppConfig::default();
            config.llm.provider = provider;
            assert!(client_from_config(&config.llm).is_ok());
        }
    }
}
