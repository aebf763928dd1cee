//! Test doubles shared by the unit tests.

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use reqwest::Url;
use teloxide::types::ChatId;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::lookup::{LookupError, LookupSource, Package};
use crate::platform::ReplySender;
use crate::query::ParsedQuery;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}", addr)).unwrap()
}

/// A local URL with nothing listening behind it.
pub async fn closed_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{}", addr)).unwrap()
}

/// Lookup source with a canned answer that records every keyword it sees.
pub struct StubLookup {
    answer: Result<Vec<Package>, LookupError>,
    pub keywords: Mutex<Vec<String>>,
}

impl StubLookup {
    pub fn found(packages: Vec<Package>) -> Self {
        Self {
            answer: Ok(packages),
            keywords: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: LookupError) -> Self {
        Self {
            answer: Err(error),
            keywords: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LookupSource for StubLookup {
    async fn lookup(&self, query: &ParsedQuery) -> Result<Vec<Package>, LookupError> {
        self.keywords.lock().await.push(query.keyword());
        self.answer.clone()
    }
}

/// Sender that records messages instead of delivering them.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(ChatId, String)>>,
    fail: bool,
}

impl RecordingSender {
    /// Records the attempt, then reports a delivery failure.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl ReplySender for RecordingSender {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.sent.lock().await.push((chat_id, text.to_string()));
        if self.fail {
            anyhow::bail!("Telegram API error (502): Bad Gateway");
        }
        Ok(())
    }
}
