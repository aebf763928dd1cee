use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::info;

use super::ReplySender;

/// Sends replies through the Bot API `sendMessage` method.
pub struct TelegramSender {
    bot: Bot,
}

impl TelegramSender {
    pub fn new(bot_token: &str, api_url: Option<Url>) -> Self {
        let bot = Bot::new(bot_token);
        let bot = match api_url {
            Some(url) => {
                info!("Using Telegram Bot API at {}", url);
                bot.set_api_url(url)
            }
            None => bot,
        };
        Self { bot }
    }
}

#[async_trait]
impl ReplySender for TelegramSender {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.bot
            .send_message(chat_id, text.to_string())
            .await
            .with_context(|| format!("Failed to send Telegram message to chat {}", chat_id.0))?;
        Ok(())
    }
}
