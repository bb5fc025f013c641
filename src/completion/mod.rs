pub mod types;

use crate::completion::types::{CompletionRequest, CompletionResponse, ConversationTurn};
use crate::config::CompletionConfig;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Shown to the chat user whenever a completion could not be produced.
pub const FALLBACK_REPLY: &str =
    "I'm experiencing technical difficulties. Please try again later.";

#[derive(thiserror::Error, Debug)]
pub enum CompletionError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Completion API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Malformed completion response: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("No choices in completion response")]
    NoChoices,
    #[error("First choice has no message content")]
    MissingContent,
}

#[derive(Clone)]
pub struct CompletionClient {
    http_client: Client,
    config: Arc<CompletionConfig>,
    api_key: Option<Arc<str>>,
}
impl CompletionClient {
    pub fn new(config: CompletionConfig, api_key: Option<String>) -> reqwest::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            config: Arc::new(config),
            api_key: api_key.map(Arc::from),
        })
    }

    /// Get a displayable reply for `user_message`. Failures are logged and
    /// replaced with [`FALLBACK_REPLY`], so this never errors.
    pub async fn get_completion(
        &self,
        user_message: &str,
        history: Vec<ConversationTurn>,
    ) -> String {
        match self.request_completion(user_message, history).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Completion request failed: {e}");
                FALLBACK_REPLY.to_string()
            }
        }
    }

    #[instrument(skip_all, fields(model = %self.config.model, history = history.len()))]
    pub async fn request_completion(
        &self,
        user_message: &str,
        history: Vec<ConversationTurn>,
    ) -> Result<String, CompletionError> {
        let request_body = CompletionRequest {
            model: &self.config.model,
            messages: self.build_messages(user_message, history),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            stream: false,
        };

        let mut builder = self
            .http_client
            .post(&self.config.endpoint)
            .header(ACCEPT, "application/json")
            .json(&request_body);

        if let Some(api_key) = &self.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {api_key}"));
        }

        debug!("Sending request to completion API");
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CompletionError::Status { status, body });
        }

        let completion: CompletionResponse = serde_json::from_str(&body)?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::NoChoices)?;

        debug!("Successfully received completion response");
        choice.message.content.ok_or(CompletionError::MissingContent)
    }

    /// Optional system prompt, then history, then the new user turn.
    fn build_messages(
        &self,
        user_message: &str,
        history: Vec<ConversationTurn>,
    ) -> Vec<ConversationTurn> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(system_prompt) = &self.config.system_prompt {
            messages.push(ConversationTurn::system(system_prompt.as_str()));
        }
        messages.extend(history);
        messages.push(ConversationTurn::user(user_message));
        messages
    }
}
