//! Google Sheets backend: reads the package table straight from the sheet and
//! filters it locally.
//!
//! Expected columns: A product, B day count, C area, D price.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::google_auth::ServiceAccount;
use super::{read_json, LookupError, LookupSource, Package};
use crate::config::{ConfigError, SheetCredentials};
use crate::query::ParsedQuery;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

enum SheetAuth {
    ApiKey(String),
    ServiceAccount(ServiceAccount),
}

pub struct SheetLookup {
    client: reqwest::Client,
    values_url: Url,
    auth: SheetAuth,
}

impl SheetLookup {
    pub fn new(
        client: reqwest::Client,
        api_url: Url,
        sheet_id: &str,
        range: &str,
        credentials: &SheetCredentials,
    ) -> Result<Self, ConfigError> {
        let mut values_url = api_url.clone();
        values_url
            .path_segments_mut()
            .map_err(|_| ConfigError::InvalidUrl {
                field: "lookup.sheets_api_url",
                value: api_url.to_string(),
            })?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", sheet_id, "values", range]);

        let auth = match credentials {
            SheetCredentials::ApiKey(key) => SheetAuth::ApiKey(key.clone()),
            SheetCredentials::ServiceAccount {
                client_email,
                private_key,
                token_url,
            } => SheetAuth::ServiceAccount(ServiceAccount::new(
                client_email,
                private_key,
                token_url.clone(),
            )?),
        };

        Ok(Self {
            client,
            values_url,
            auth,
        })
    }
}

#[async_trait]
impl LookupSource for SheetLookup {
    async fn lookup(&self, query: &ParsedQuery) -> Result<Vec<Package>, LookupError> {
        debug!("Reading sheet values from {}", self.values_url);

        let mut request = self
            .client
            .get(self.values_url.clone())
            .query(&[("valueRenderOption", "UNFORMATTED_VALUE")]);
        request = match &self.auth {
            SheetAuth::ApiKey(key) => request.query(&[("key", key)]),
            SheetAuth::ServiceAccount(account) => {
                request.bearer_auth(account.access_token(&self.client).await?)
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let range: ValueRange = read_json(response).await?;
        debug!("Sheet returned {} rows", range.values.len());
        Ok(select_packages(&range.values, query))
    }
}

/// Rows whose day count equals the query and whose area column contains the
/// queried area, case-insensitively.
fn select_packages(rows: &[Vec<Value>], query: &ParsedQuery) -> Vec<Package> {
    let Some(days) = query.day_count() else {
        return Vec::new();
    };
    let area = query.area.to_lowercase();
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| package_from_row(index, row, days, &area))
        .collect()
}

fn package_from_row(index: usize, row: &[Value], days: i64, area: &str) -> Option<Package> {
    if row.len() < 4 {
        debug!("Skipping sheet row {}: only {} columns", index, row.len());
        return None;
    }
    if leading_integer(&cell_text(&row[1])) != Some(days) {
        return None;
    }
    if !cell_text(&row[2]).to_lowercase().contains(area) {
        return None;
    }
    let Some(price) = cell_number(&row[3]) else {
        debug!("Skipping sheet row {}: price {} is not numeric", index, row[3]);
        return None;
    };
    Some(Package {
        product: cell_text(&row[0]),
        price,
    })
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn cell_number(cell: &Value) -> Option<f64> {
    let number = match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Integer prefix of a cell, so "5 ngày" and "5.0" both read as 5.
fn leading_integer(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse::<i64>().ok().map(|n| sign * n)
}
