pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use teloxide::types::ChatId;

/// An update delivered to the webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A user wrote text in a chat we can answer
    TextMessage { chat_id: ChatId, text: String },
    /// Edits, joins, callbacks, stickers... acknowledged and ignored
    Other,
}

impl InboundEvent {
    /// Read `message.text` and `message.chat.id` without trusting the payload
    /// shape; anything missing, empty or mistyped becomes `Other`.
    pub fn from_json(payload: &Value) -> Self {
        let message = payload.get("message");
        let text = message
            .and_then(|m| m.get("text"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty());
        let chat_id = message
            .and_then(|m| m.get("chat"))
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)
            .filter(|id| *id != 0);

        match (text, chat_id) {
            (Some(text), Some(id)) => InboundEvent::TextMessage {
                chat_id: ChatId(id),
                text: text.to_string(),
            },
            _ => InboundEvent::Other,
        }
    }
}

/// Delivers a reply to a chat
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()>;
}
