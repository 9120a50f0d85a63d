//! Text-completion client.
//!
//! Talks to an OpenAI-compatible chat-completion endpoint: one user message in,
//! the first choice's content out.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CockpitError, Result};

pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_COMPLETION_MODEL: &str = "llama3-8b-8192";

/// Anything that turns a prompt into a generated document.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        CompletionConfig {
            endpoint: std::env::var("COMPLETION_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_COMPLETION_ENDPOINT.to_string()),
            model: std::env::var("GROQ_MODEL")
                .unwrap_or_else(|_| DEFAULT_COMPLETION_MODEL.to_string()),
            api_key: std::env::var("GROQ_API_KEY").ok(),
        }
    }
}

impl CompletionConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn new(endpoint: &str, model: &str) -> Self {
        CompletionConfig {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize, PartialEq)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

impl<'a> ChatRequest<'a> {
    fn user(model: &'a str, prompt: &'a str) -> Self {
        ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Pull the first choice's content out of a raw response body.
fn first_choice_content(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| CockpitError::Completion {
            status: 200,
            body: "response contained no choices".to_string(),
        })
}

/// HTTP chat-completion client.
pub struct ChatCompletionClient {
    config: CompletionConfig,
    http_client: reqwest::Client,
}

impl ChatCompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("gitops-cockpit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(ChatCompletionClient {
            config,
            http_client,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(CompletionConfig::from_env())
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CockpitError::Config("GROQ_API_KEY is not set".to_string()))?;

        info!(model = %self.config.model, prompt_chars = prompt.len(), "requesting completion");
        let response = self
            .http_client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&ChatRequest::user(&self.config.model, prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != reqwest::StatusCode::OK {
            return Err(CockpitError::Completion {
                status: status.as_u16(),
                body,
            });
        }
        debug!(bytes = body.len(), "completion received");
        first_choice_content(&body)
    }
}

/// Completion client returning scripted documents (testing only).
#[derive(Debug, Default)]
pub struct CannedCompletion {
    responses: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl CannedCompletion {
    /// Responses are handed out in order; the last one repeats.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for CannedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut responses = self.responses.lock().unwrap();
        match responses.len() {
            0 => Err(CockpitError::Completion {
                status: 503,
                body: "no canned response".to_string(),
            }),
            1 => Ok(responses[0].clone()),
            _ => Ok(responses.remove(0)),
        }
    }
}
