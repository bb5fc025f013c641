use serde::{Deserialize, Serialize};

/// Inbound webhook payload. Only the fields the relay reads are modelled,
/// everything else the Bot API sends is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: Option<i64>,

    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub chat: Option<Chat>,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}
impl Message {
    /// A bot command is a `bot_command` entity at the very start of the text.
    /// Text starting with a slash is treated the same when entities are absent.
    pub fn is_command(&self) -> bool {
        match self.entities.first() {
            Some(entity) => entity.kind == "bot_command" && entity.offset == 0,
            None => self
                .text
                .as_deref()
                .is_some_and(|text| text.starts_with('/')),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SetWebhookRequest<'a> {
    pub url: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<&'a str>,
}

/// Envelope shared by every Bot API method response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,

    pub result: Option<T>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub error_code: Option<i64>,
}
