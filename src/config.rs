use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::reply::ReplyStyle;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LookupSourceKind {
    /// Keyword endpoint: `GET <base_url>?keyword=<days> <area>`
    #[default]
    Http,
    /// Google Sheet read through the Sheets API
    Sheet,
}

impl std::fmt::Display for LookupSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupSourceKind::Http => write!(f, "http"),
            LookupSourceKind::Sheet => write!(f, "sheet"),
        }
    }
}

impl FromStr for LookupSourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "sheet" => Ok(Self::Sheet),
            _ => Err(ConfigError::UnknownSource(s.to_string())),
        }
    }
}

/// Settings as read from `config.toml` and the environment, before validation.
/// Every credential may be empty here; `validate` decides what is required.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default = "default_lookup_config")]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub reply: ReplyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Alternative Bot API server (local bot-api or a test double)
    #[serde(default)]
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LookupConfig {
    #[serde(default)]
    pub source: LookupSourceKind,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub sheet_id: String,
    /// Service account email; together with `private_key` it takes
    /// precedence over `api_key`
    #[serde(default)]
    pub client_email: String,
    /// PEM private key of the service account, `\n` escapes allowed
    #[serde(default)]
    pub private_key: String,
    /// API key, only enough for publicly shared sheets
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_range")]
    pub range: String,
    #[serde(default = "default_sheets_api_url")]
    pub sheets_api_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReplyConfig {
    #[serde(default)]
    pub style: ReplyStyle,
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_range() -> String {
    "Sheet1!A2:E".to_string()
}

fn default_sheets_api_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        bind: default_bind(),
    }
}

fn default_lookup_config() -> LookupConfig {
    LookupConfig {
        source: LookupSourceKind::default(),
        base_url: String::new(),
        sheet_id: String::new(),
        client_email: String::new(),
        private_key: String::new(),
        api_key: String::new(),
        range: default_range(),
        sheets_api_url: default_sheets_api_url(),
        token_url: default_token_url(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server_config(),
            telegram: TelegramConfig::default(),
            lookup: default_lookup_config(),
            reply: ReplyConfig::default(),
        }
    }
}

/// A required setting is absent or unusable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Telegram bot token is not configured (set TELEGRAM_BOT_TOKEN)")]
    MissingBotToken,
    #[error("lookup service URL is not configured (set LOOKUP_API_URL)")]
    MissingLookupUrl,
    #[error("Google Sheet id is not configured (set GOOGLE_SHEET_ID)")]
    MissingSheetId,
    #[error("no Google credentials configured (set GOOGLE_CLIENT_EMAIL and GOOGLE_PRIVATE_KEY, or GOOGLE_API_KEY)")]
    MissingSheetCredentials,
    #[error("service account email is not configured (set GOOGLE_CLIENT_EMAIL)")]
    MissingClientEmail,
    #[error("service account private key is not configured (set GOOGLE_PRIVATE_KEY)")]
    MissingPrivateKey,
    #[error("service account private key is not a valid RSA PEM key")]
    InvalidPrivateKey,
    #[error("invalid URL for {field}: '{value}'")]
    InvalidUrl { field: &'static str, value: String },
    #[error("unknown lookup source '{0}' (expected \"http\" or \"sheet\")")]
    UnknownSource(String),
    #[error("unknown reply style '{0}' (expected \"plain\" or \"header\")")]
    UnknownReplyStyle(String),
}

/// Validated settings the webhook runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    pub telegram_api_url: Option<Url>,
    pub lookup: LookupSettings,
    pub reply_style: ReplyStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupSettings {
    Http {
        base_url: Url,
    },
    Sheet {
        sheets_api_url: Url,
        sheet_id: String,
        range: String,
        credentials: SheetCredentials,
    },
}

/// How Sheets API requests are authorised.
#[derive(Clone, PartialEq)]
pub enum SheetCredentials {
    /// OAuth2 bearer token minted from a service account key
    ServiceAccount {
        client_email: String,
        private_key: String,
        token_url: Url,
    },
    /// `key=` query parameter
    ApiKey(String),
}

// Keeps key material out of logs.
impl std::fmt::Debug for SheetCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetCredentials::ServiceAccount {
                client_email,
                token_url,
                ..
            } => f
                .debug_struct("ServiceAccount")
                .field("client_email", client_email)
                .field("token_url", &token_url.as_str())
                .finish_non_exhaustive(),
            SheetCredentials::ApiKey(_) => f.write_str("ApiKey(..)"),
        }
    }
}

impl LookupSettings {
    pub fn describe(&self) -> String {
        match self {
            LookupSettings::Http { base_url } => format!("http ({})", base_url),
            LookupSettings::Sheet {
                sheet_id,
                range,
                credentials,
                ..
            } => {
                let auth = match credentials {
                    SheetCredentials::ServiceAccount { client_email, .. } => {
                        format!("service account {}", client_email)
                    }
                    SheetCredentials::ApiKey(_) => "API key".to_string(),
                };
                format!("sheet ({} {}, {})", sheet_id, range, auth)
            }
        }
    }
}

fn required(value: &str, missing: ConfigError) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        Err(missing)
    } else {
        Ok(value.to_string())
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })
}

impl Config {
    /// Load `path` if it exists; a missing file yields the defaults so the
    /// service can be configured from the environment alone.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML")
    }

    /// Apply environment overrides. `lookup_var` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_overrides<F>(&mut self, lookup_var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides: [(&str, &mut String); 7] = [
            ("BIND_ADDR", &mut self.server.bind),
            ("TELEGRAM_BOT_TOKEN", &mut self.telegram.bot_token),
            ("LOOKUP_API_URL", &mut self.lookup.base_url),
            ("GOOGLE_SHEET_ID", &mut self.lookup.sheet_id),
            ("GOOGLE_CLIENT_EMAIL", &mut self.lookup.client_email),
            ("GOOGLE_PRIVATE_KEY", &mut self.lookup.private_key),
            ("GOOGLE_API_KEY", &mut self.lookup.api_key),
        ];
        for (key, slot) in overrides {
            if let Some(value) = lookup_var(key) {
                *slot = value;
            }
        }
        if let Some(url) = lookup_var("TELEGRAM_API_URL") {
            self.telegram.api_url = Some(url);
        }
        if let Some(source) = lookup_var("LOOKUP_SOURCE") {
            self.lookup.source = source.parse()?;
        }
        if let Some(style) = lookup_var("REPLY_STYLE") {
            self.reply.style = style.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let bot_token = required(&self.telegram.bot_token, ConfigError::MissingBotToken)?;

        let telegram_api_url = match self.telegram.api_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Some(parse_url("telegram.api_url", url)?),
            _ => None,
        };

        let lookup = match self.lookup.source {
            LookupSourceKind::Http => {
                let base_url = required(&self.lookup.base_url, ConfigError::MissingLookupUrl)?;
                LookupSettings::Http {
                    base_url: parse_url("lookup.base_url", &base_url)?,
                }
            }
            LookupSourceKind::Sheet => LookupSettings::Sheet {
                sheet_id: required(&self.lookup.sheet_id, ConfigError::MissingSheetId)?,
                credentials: self.sheet_credentials()?,
                range: self.lookup.range.trim().to_string(),
                sheets_api_url: parse_url("lookup.sheets_api_url", &self.lookup.sheets_api_url)?,
            },
        };

        Ok(Settings {
            bot_token,
            telegram_api_url,
            lookup,
            reply_style: self.reply.style,
        })
    }

    /// A service account wins as soon as either half of it is set; the API
    /// key is the fallback for public sheets.
    fn sheet_credentials(&self) -> Result<SheetCredentials, ConfigError> {
        let lookup = &self.lookup;
        if !lookup.client_email.trim().is_empty() || !lookup.private_key.trim().is_empty() {
            let client_email = required(&lookup.client_email, ConfigError::MissingClientEmail)?;
            // Keys pasted into env vars usually carry literal "\n" sequences.
            let private_key = required(
                &lookup.private_key.replace("\\n", "\n"),
                ConfigError::MissingPrivateKey,
            )?;
            return Ok(SheetCredentials::ServiceAccount {
                client_email,
                private_key,
                token_url: parse_url("lookup.token_url", &lookup.token_url)?,
            });
        }

        let api_key = required(&lookup.api_key, ConfigError::MissingSheetCredentials)?;
        Ok(SheetCredentials::ApiKey(api_key))
    }
}
