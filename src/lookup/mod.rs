pub mod google_auth;
pub mod http;
pub mod sheet;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ConfigError, LookupSettings};
use crate::query::ParsedQuery;

pub use http::KeywordLookup;
pub use sheet::SheetLookup;

/// One entry of a lookup result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub product: String,
    pub price: f64,
}

/// Why a lookup produced no usable result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    /// The service could not be reached or the body could not be read
    #[error("lookup service unreachable: {0}")]
    Transport(String),
    /// The service answered with something other than the expected JSON
    #[error("unexpected lookup response: {0}")]
    Contract(String),
}

/// A data source that answers "<days> <area>" queries.
#[async_trait]
pub trait LookupSource: Send + Sync {
    /// Packages in the order the source returned them; empty means no match.
    async fn lookup(&self, query: &ParsedQuery) -> Result<Vec<Package>, LookupError>;
}

/// Build the configured source. Both sources share `client`.
pub fn from_settings(
    settings: &LookupSettings,
    client: reqwest::Client,
) -> Result<Arc<dyn LookupSource>, ConfigError> {
    let source: Arc<dyn LookupSource> = match settings {
        LookupSettings::Http { base_url } => Arc::new(KeywordLookup::new(client, base_url.clone())),
        LookupSettings::Sheet {
            sheets_api_url,
            sheet_id,
            range,
            credentials,
        } => Arc::new(SheetLookup::new(
            client,
            sheets_api_url.clone(),
            sheet_id,
            range,
            credentials,
        )?),
    };
    Ok(source)
}

/// Check status and content type, then decode the body as `T`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, LookupError> {
    let status = response.status();
    if !status.is_success() {
        return Err(LookupError::Contract(format!("HTTP status {}", status)));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !content_type.contains("application/json") {
        return Err(LookupError::Contract(format!(
            "content type '{}' is not JSON",
            content_type
        )));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| LookupError::Transport(e.to_string()))?;
    serde_json::from_slice(&body)
        .map_err(|e| LookupError::Contract(format!("malformed body: {}", e)))
}
