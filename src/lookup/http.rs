use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use super::{read_json, LookupError, LookupSource, Package};
use crate::query::ParsedQuery;

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    result: Option<Vec<Package>>,
}

/// Looks packages up with `GET <base_url>?keyword=<days> <area>`.
pub struct KeywordLookup {
    client: reqwest::Client,
    base_url: Url,
}

impl KeywordLookup {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl LookupSource for KeywordLookup {
    async fn lookup(&self, query: &ParsedQuery) -> Result<Vec<Package>, LookupError> {
        let keyword = query.keyword();
        debug!("Querying lookup service {} with keyword '{}'", self.base_url, keyword);

        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[("keyword", keyword.as_str())])
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let body: KeywordResponse = read_json(response).await?;
        Ok(body.result.unwrap_or_default())
    }
}
