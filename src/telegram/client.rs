use crate::config::TelegramConfig;
use crate::telegram::types::{ApiResponse, SendMessageRequest, SetWebhookRequest};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(thiserror::Error, Debug)]
pub enum TelegramError {
    #[error("Missing required TELEGRAM_BOT_TOKEN environment variable!")]
    MissingToken,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Bot API returned {status} without a valid response body")]
    Status { status: StatusCode },
    #[error("Bot API error {}: {description}", .code.unwrap_or_default())]
    Api {
        code: Option<i64>,
        description: String,
    },
}

#[derive(Clone)]
pub struct TelegramClient {
    http_client: Client,
    api_base: Arc<str>,
    bot_token: Option<Arc<str>>,
}
impl TelegramClient {
    pub fn new(config: &TelegramConfig, bot_token: Option<String>) -> reqwest::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            api_base: Arc::from(config.api_base.trim_end_matches('/')),
            bot_token: bot_token.map(Arc::from),
        })
    }

    #[instrument(skip(self, text), fields(text_length = text.len()))]
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.call::<_, serde_json::Value>("sendMessage", &SendMessageRequest { chat_id, text })
            .await?;

        debug!("Successfully sent message to chat {chat_id}");
        Ok(())
    }

    /// Registers the webhook URL, returning the `result` flag reported by the Bot API.
    #[instrument(skip(self, secret_token))]
    pub async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&str>,
    ) -> Result<bool, TelegramError> {
        self.call("setWebhook", &SetWebhookRequest { url, secret_token })
            .await
            .map(|result: Option<bool>| result.unwrap_or(false))
    }

    async fn call<P, R>(&self, method: &str, payload: &P) -> Result<Option<R>, TelegramError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let bot_token = self.bot_token.as_ref().ok_or(TelegramError::MissingToken)?;
        let url = format!("{}/bot{bot_token}/{method}", self.api_base);

        // The request URL embeds the bot token, so strip it from transport errors.
        let response = self
            .http_client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let body = response.bytes().await.map_err(reqwest::Error::without_url)?;
        let api_response: ApiResponse<R> = match serde_json::from_slice(&body) {
            Ok(api_response) => api_response,
            Err(_) => return Err(TelegramError::Status { status }),
        };

        if !api_response.ok {
            return Err(TelegramError::Api {
                code: api_response.error_code,
                description: api_response
                    .description
                    .unwrap_or_else(|| format!("Unsuccessful status {status}")),
            });
        }

        Ok(api_response.result)
    }
}
