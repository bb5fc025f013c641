pub mod client;
pub mod types;

use crate::telegram::types::Update;

pub use client::{TelegramClient, TelegramError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    /// Plain text message that should be relayed.
    Text { chat_id: i64, text: String },

    /// Bot command such as `/start`, acknowledged but not relayed.
    Command { chat_id: i64, command: String },

    /// Edits, media, service messages and anything missing a chat or text.
    Other,
}

/// Decide what an inbound update is. Only new messages are considered,
/// edited messages and every other update type fall through to `Other`.
pub fn classify(update: &Update) -> UpdateKind {
    let Some(message) = &update.message else {
        return UpdateKind::Other;
    };
    let (Some(chat), Some(text)) = (&message.chat, &message.text) else {
        return UpdateKind::Other;
    };
    if text.trim().is_empty() {
        return UpdateKind::Other;
    }

    if message.is_command() {
        let command = text.split_whitespace().next().unwrap_or_default();
        return UpdateKind::Command {
            chat_id: chat.id,
            command: command.to_string(),
        };
    }

    UpdateKind::Text {
        chat_id: chat.id,
        text: text.clone(),
    }
}

/// Split `text` into chunks of at most `max_chars` characters, breaking after
/// the last newline inside each window where there is one.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let end = match rest.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(rest.to_string());
                break;
            }
        };

        let window = &rest[..end];
        let split = match window.rfind('\n') {
            Some(idx) if idx > 0 => idx + 1,
            _ => end,
        };

        chunks.push(window[..split].to_string());
        rest = &rest[split..];
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_classify_text() {
        let update = parse(r#"{"message":{"text":"hello","chat":{"id":42}}}"#);
        assert_eq!(
            classify(&update),
            UpdateKind::Text {
                chat_id: 42,
                text: "hello".to_string()
            }
        );

        // Full Bot API shape, with fields the relay does not model.
        let update = parse(
            r#"{
                "update_id": 10000,
                "message": {
                    "message_id": 1365,
                    "date": 1441645532,
                    "from": {"id": 1111111, "is_bot": false, "first_name": "Test"},
                    "chat": {"id": -1001234567890, "type": "supergroup", "title": "Group"},
                    "text": "what is rust?",
                    "entities": [{"type": "bold", "offset": 0, "length": 4}]
                }
            }"#,
        );
        assert_eq!(
            classify(&update),
            UpdateKind::Text {
                chat_id: -1001234567890,
                text: "what is rust?".to_string()
            }
        );
    }

    #[test]
    fn test_classify_command() {
        let update = parse(
            r#"{"message":{"text":"/start now","chat":{"id":42},
                "entities":[{"type":"bot_command","offset":0,"length":6}]}}"#,
        );
        assert_eq!(
            classify(&update),
            UpdateKind::Command {
                chat_id: 42,
                command: "/start".to_string()
            }
        );

        // No entities, but still a leading slash.
        let update = parse(r#"{"message":{"text":"/help","chat":{"id":42}}}"#);
        assert!(matches!(classify(&update), UpdateKind::Command { .. }));

        // Command entity not at the start is a normal text message.
        let update = parse(
            r#"{"message":{"text":"try /help","chat":{"id":42},
                "entities":[{"type":"bot_command","offset":4,"length":5}]}}"#,
        );
        assert!(matches!(classify(&update), UpdateKind::Text { .. }));
    }

    #[test]
    fn test_classify_other() {
        let cases = [
            r#"{"update_id": 1}"#,
            r#"{"message":{"chat":{"id":42},"photo":[{"file_id":"abc"}]}}"#,
            r#"{"message":{"chat":{"id":42},"sticker":{"file_id":"abc"}}}"#,
            r#"{"message":{"text":"hello"}}"#,
            r#"{"message":{"text":"   ","chat":{"id":42}}}"#,
            r#"{"edited_message":{"text":"hello","chat":{"id":42}}}"#,
            r#"{"callback_query":{"id":"1","data":"x"}}"#,
        ];

        for case in cases {
            assert_eq!(classify(&parse(case)), UpdateKind::Other, "case: {case}");
        }
    }

    #[test]
    fn test_split_short_message() {
        assert_eq!(split_message("hi there", 4096), vec!["hi there"]);
        assert!(split_message("", 4096).is_empty());
    }

    #[test]
    fn test_split_hard_limit() {
        let text = "a".repeat(10);
        assert_eq!(split_message(&text, 4), vec!["aaaa", "aaaa", "aa"]);

        let text = "b".repeat(8);
        assert_eq!(split_message(&text, 4), vec!["bbbb", "bbbb"]);
    }

    #[test]
    fn test_split_prefers_newlines() {
        let chunks = split_message("first line\nsecond line", 15);
        assert_eq!(chunks, vec!["first line\n", "second line"]);

        // Leading newline in the window is not used as a break.
        let chunks = split_message("\nabcdef", 4);
        assert_eq!(chunks, vec!["\nabc", "def"]);
    }

    #[test]
    fn test_split_multibyte() {
        let text = "héllo wörld 🚀🚀";
        let chunks = split_message(text, 5);
        assert_eq!(chunks, vec!["héllo", " wörl", "d 🚀🚀"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
        assert_eq!(chunks.concat(), text);
    }
}
