use std::fmt;
use std::sync::Arc;

use teloxide::types::ChatId;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, Settings};
use crate::lookup::{self, LookupError, LookupSource};
use crate::platform::telegram::TelegramSender;
use crate::platform::{InboundEvent, ReplySender};
use crate::query::ParsedQuery;
use crate::reply::{self, ReplyStyle};

/// How a webhook event was answered. Every variant is a successful
/// acknowledgment towards the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a user text message, nothing sent
    Ignored,
    /// Text did not parse, usage help sent
    Usage,
    /// Lookup succeeded with no packages
    NotFound,
    /// Lookup succeeded, listing with this many packages sent
    Listed(usize),
    /// Lookup service unreachable
    BackendUnavailable,
    /// Lookup service answered with something unusable
    InvalidResponse,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ignored => write!(f, "ignored"),
            Outcome::Usage => write!(f, "usage help"),
            Outcome::NotFound => write!(f, "not found"),
            Outcome::Listed(count) => write!(f, "listed {} packages", count),
            Outcome::BackendUnavailable => write!(f, "lookup unavailable"),
            Outcome::InvalidResponse => write!(f, "invalid lookup response"),
        }
    }
}

/// Answers package queries: parse, look up, format, reply.
pub struct QueryBot {
    lookup: Arc<dyn LookupSource>,
    sender: Arc<dyn ReplySender>,
    style: ReplyStyle,
}

impl QueryBot {
    pub fn new(
        lookup: Arc<dyn LookupSource>,
        sender: Arc<dyn ReplySender>,
        style: ReplyStyle,
    ) -> Self {
        Self {
            lookup,
            sender,
            style,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let lookup = lookup::from_settings(&settings.lookup, reqwest::Client::new())?;
        let sender = Arc::new(TelegramSender::new(
            &settings.bot_token,
            settings.telegram_api_url.clone(),
        ));
        Ok(Self::new(lookup, sender, settings.reply_style))
    }

    /// Process one event. Sends at most one reply and never fails: lookup
    /// problems become chat messages, delivery problems are logged.
    pub async fn handle(&self, event: InboundEvent) -> Outcome {
        let (chat_id, text) = match event {
            InboundEvent::TextMessage { chat_id, text } => (chat_id, text),
            InboundEvent::Other => {
                debug!("Ignoring update without a text message");
                return Outcome::Ignored;
            }
        };

        info!("Telegram message from chat {}: {}", chat_id.0, text);

        let Some(query) = ParsedQuery::parse(&text) else {
            info!("Message from chat {} is not a query, sending usage help", chat_id.0);
            self.reply(chat_id, reply::HELP_TEXT).await;
            return Outcome::Usage;
        };

        info!("Parsed query: days={} area='{}'", query.days, query.area);

        let (outcome, message) = match self.lookup.lookup(&query).await {
            Ok(packages) if packages.is_empty() => {
                info!("No packages for '{}'", query);
                (Outcome::NotFound, reply::not_found(&query))
            }
            Ok(packages) => {
                info!("Found {} packages for '{}'", packages.len(), query);
                (
                    Outcome::Listed(packages.len()),
                    reply::package_list(&query, &packages, self.style),
                )
            }
            Err(LookupError::Transport(e)) => {
                warn!("Lookup for '{}' failed: {}", query, e);
                (
                    Outcome::BackendUnavailable,
                    reply::CONNECTION_ERROR_TEXT.to_string(),
                )
            }
            Err(LookupError::Contract(e)) => {
                warn!("Lookup for '{}' returned an invalid response: {}", query, e);
                (
                    Outcome::InvalidResponse,
                    reply::INVALID_RESPONSE_TEXT.to_string(),
                )
            }
        };

        self.reply(chat_id, &message).await;
        outcome
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        match self.sender.send_message(chat_id, text).await {
            Ok(()) => debug!("Reply sent to chat {}", chat_id.0),
            Err(e) => error!("Failed to deliver reply to chat {}: {:#}", chat_id.0, e),
        }
    }
}
