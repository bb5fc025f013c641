use crate::completion::CompletionClient;
use crate::telegram::{split_message, TelegramClient, TelegramError};
use tracing::{info, instrument, warn};

/// Forwards one chat message to the completion endpoint and sends the reply back.
#[derive(Clone)]
pub struct Relay {
    completion: CompletionClient,
    telegram: TelegramClient,
    max_message_length: usize,
}
impl Relay {
    pub fn new(
        completion: CompletionClient,
        telegram: TelegramClient,
        max_message_length: usize,
    ) -> Self {
        Self {
            completion,
            telegram,
            max_message_length,
        }
    }

    pub fn telegram(&self) -> &TelegramClient {
        &self.telegram
    }

    #[instrument(skip(self, text))]
    pub async fn handle_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        info!("Received message from {chat_id}: {text}");

        // Each message is answered on its own, no history is carried between requests.
        let reply = self.completion.get_completion(text, Vec::new()).await;

        let chunks: Vec<String> = split_message(&reply, self.max_message_length)
            .into_iter()
            .filter(|chunk| !chunk.trim().is_empty())
            .collect();

        if chunks.is_empty() {
            warn!("Completion reply for chat {chat_id} is empty, nothing to send");
            return Ok(());
        }

        for chunk in &chunks {
            self.telegram.send_message(chat_id, chunk).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::FALLBACK_REPLY;
    use crate::config::{CompletionConfig, TelegramConfig};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_relay(completion: &MockServer, telegram: &MockServer, max_length: usize) -> Relay {
        let completion_config = CompletionConfig {
            endpoint: format!("{}/v1/chat/completions", completion.uri()),
            ..CompletionConfig::default()
        };
        let telegram_config = TelegramConfig {
            api_base: telegram.uri(),
            ..TelegramConfig::default()
        };

        Relay::new(
            CompletionClient::new(completion_config, Some("key".to_string())).unwrap(),
            TelegramClient::new(&telegram_config, Some("TOKEN".to_string())).unwrap(),
            max_length,
        )
    }

    async fn mount_completion(server: &MockServer, content: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }]
            })))
            .mount(server)
            .await;
    }

    fn sent_ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} }))
    }

    #[tokio::test]
    async fn test_relays_reply_to_same_chat() {
        let completion = MockServer::start().await;
        let telegram = MockServer::start().await;
        mount_completion(&completion, "hi there").await;

        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_json(json!({ "chat_id": 42, "text": "hi there" })))
            .respond_with(sent_ok())
            .expect(1)
            .mount(&telegram)
            .await;

        let relay = test_relay(&completion, &telegram, 4096);
        relay.handle_message(42, "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_sends_fallback_when_completion_fails() {
        let completion = MockServer::start().await;
        let telegram = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&completion)
            .await;

        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_json(json!({ "chat_id": 7, "text": FALLBACK_REPLY })))
            .respond_with(sent_ok())
            .expect(1)
            .mount(&telegram)
            .await;

        let relay = test_relay(&completion, &telegram, 4096);
        relay.handle_message(7, "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_long_reply_is_sent_in_chunks() {
        let completion = MockServer::start().await;
        let telegram = MockServer::start().await;
        mount_completion(&completion, "first part\nsecond part").await;

        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_json(json!({ "chat_id": 1, "text": "first part\n" })))
            .respond_with(sent_ok())
            .expect(1)
            .mount(&telegram)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_json(json!({ "chat_id": 1, "text": "second part" })))
            .respond_with(sent_ok())
            .expect(1)
            .mount(&telegram)
            .await;

        let relay = test_relay(&completion, &telegram, 15);
        relay.handle_message(1, "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_reply_is_not_sent() {
        let completion = MockServer::start().await;
        let telegram = MockServer::start().await;
        mount_completion(&completion, "  \n ").await;

        Mock::given(method("POST"))
            .respond_with(sent_ok())
            .expect(0)
            .mount(&telegram)
            .await;

        let relay = test_relay(&completion, &telegram, 4096);
        relay.handle_message(1, "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_failure_is_returned() {
        let completion = MockServer::start().await;
        let telegram = MockServer::start().await;
        mount_completion(&completion, "hi").await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            })))
            .expect(1)
            .mount(&telegram)
            .await;

        let relay = test_relay(&completion, &telegram, 4096);
        assert!(matches!(
            relay.handle_message(1, "hello").await,
            Err(TelegramError::Api { code: Some(403), .. })
        ));
    }
}
