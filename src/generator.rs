//! Plan generator backends
//!
//! A [`PlanGenerator`] takes a list of chat messages and returns the raw text
//! of the reply. [`HttpGenerator`] talks to an OpenAI-compatible chat
//! completions endpoint. [`OfflineGenerator`] is used when no usable API key
//! is configured and fails every call, which makes callers fall back to the
//! template plan.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Error as ReqwestError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://router.requesty.ai/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-exp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One request to the generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    /// A system prompt followed by a single user message
    pub fn prompt(system: &str, user: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
        }
    }
}

/// Generator errors
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] ReqwestError),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("No content received from the generator")]
    EmptyResponse,

    #[error("Generator is not configured: {0}")]
    NotConfigured(String),
}

impl GenerationError {
    /// Explanation suitable for showing to the user
    pub fn user_message(&self) -> String {
        let (status, detail) = match self {
            GenerationError::NotConfigured(_) => {
                return "No valid API key is configured, so the plan could not be generated."
                    .to_string()
            }
            GenerationError::EmptyResponse => {
                return "The AI service returned an empty response.".to_string()
            }
            GenerationError::Api { status, message } => (Some(*status), message.as_str()),
            GenerationError::Http(e) => (e.status().map(|s| s.as_u16()), ""),
        };

        if status == Some(401) || detail.contains("API key") {
            "Invalid API key. Please check your API key settings.".to_string()
        } else if status == Some(429) || detail.contains("quota") {
            "API quota exceeded. Please try again later or check your usage limits.".to_string()
        } else if status == Some(403) || detail.contains("PERMISSION_DENIED") {
            "API key permission denied. Your API key may not have access to this model."
                .to_string()
        } else if status == Some(404) || detail.contains("not found") {
            "Model not found. The model name may have changed.".to_string()
        } else {
            "Failed to connect to the AI service. Please check your API key.".to_string()
        }
    }
}

/// Something that can turn a conversation into a reply
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

/// Generator configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl GeneratorConfig {
    /// The configured key, unless it is missing or an obvious placeholder
    pub fn usable_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| key.len() > 10 && *key != "demo-key")
    }
}

/// Picks the HTTP generator when a usable key is configured, the offline one otherwise
pub fn from_config(config: GeneratorConfig) -> Arc<dyn PlanGenerator> {
    if config.usable_key().is_some() {
        info!("Using generator {} at {}", config.model, config.base_url);
        Arc::new(HttpGenerator::new(config))
    } else {
        info!("No usable API key configured, plans will use the built-in template");
        Arc::new(OfflineGenerator)
    }
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    http_client: Arc<ReqwestClient>,
    config: GeneratorConfig,
}

impl HttpGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            http_client: Arc::new(ReqwestClient::new()),
            config,
        }
    }
}

#[async_trait]
impl PlanGenerator for HttpGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let key = self
            .config
            .usable_key()
            .ok_or_else(|| GenerationError::NotConfigured("missing API key".to_string()))?;

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = ChatCompletionBody {
            model: &self.config.model,
            messages: &request.messages,
        };

        debug!("Sending {} messages to {}", request.messages.len(), url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

/// Generator used without an API key
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGenerator;

#[async_trait]
impl PlanGenerator for OfflineGenerator {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, GenerationError> {
        Err(GenerationError::NotConfigured(
            "no API key provided".to_string(),
        ))
    }
}

/// Replays canned replies in order and records every request
///
/// Once the script runs out every call fails with an empty response.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerator {
    replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful reply
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queues a failing call; the message becomes an API error with status 500
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    fn push(&self, reply: Result<String, String>) {
        let mut replies = match self.replies.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        replies.push_back(reply);
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl PlanGenerator for ScriptedGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        match self.requests.lock() {
            Ok(mut guard) => guard.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }

        let next = match self.replies.lock() {
            Ok(mut guard) => guard.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };

        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(GenerationError::Api {
                status: 500,
                message,
            }),
            None => Err(GenerationError::EmptyResponse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_classification() {
        let api = |status: u16, message: &str| GenerationError::Api {
            status,
            message: message.to_string(),
        };

        assert!(api(400, "API key not valid")
            .user_message()
            .starts_with("Invalid API key"));
        assert!(api(429, "").user_message().contains("quota"));
        assert!(api(500, "Resource has been exhausted (e.g. check quota).")
            .user_message()
            .contains("quota"));
        assert!(api(403, "").user_message().contains("permission denied"));
        assert!(api(404, "").user_message().starts_with("Model not found"));
        assert!(api(500, "boom")
            .user_message()
            .starts_with("Failed to connect"));
        assert!(GenerationError::NotConfigured("x".to_string())
            .user_message()
            .contains("No valid API key"));
    }

    #[test]
    fn test_usable_key() {
        let mut config = GeneratorConfig::default();
        assert_eq!(config.usable_key(), None);

        config.api_key = Some("demo-key".to_string());
        assert_eq!(config.usable_key(), None);

        config.api_key = Some("short".to_string());
        assert_eq!(config.usable_key(), None);

        config.api_key = Some(" sk-0123456789abcdef ".to_string());
        assert_eq!(config.usable_key(), Some("sk-0123456789abcdef"));
    }

    #[tokio::test]
    async fn test_offline_generator_always_fails() {
        let result = OfflineGenerator
            .complete(&CompletionRequest::prompt("sys", "hi"))
            .await;
        assert!(matches!(result, Err(GenerationError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_scripted_generator_replays_in_order() {
        let generator = ScriptedGenerator::new().reply("one").fail("nope");
        let request = CompletionRequest::prompt("sys", "hi");

        assert_eq!(generator.complete(&request).await.unwrap(), "one");
        assert!(generator.complete(&request).await.is_err());
        assert!(matches!(
            generator.complete(&request).await,
            Err(GenerationError::EmptyResponse)
        ));
        assert_eq!(generator.requests().len(), 3);
    }
}
