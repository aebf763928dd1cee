//! Service account access tokens (OAuth2 JWT bearer grant).

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{read_json, LookupError};
use crate::config::ConfigError;

pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;

/// Claims of the signed assertion exchanged for an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct ServiceAccount {
    client_email: String,
    key: EncodingKey,
    token_url: Url,
}

impl ServiceAccount {
    pub fn new(client_email: &str, private_key: &str, token_url: Url) -> Result<Self, ConfigError> {
        let key = EncodingKey::from_rsa_pem(private_key.as_bytes())
            .map_err(|_| ConfigError::InvalidPrivateKey)?;
        Ok(Self {
            client_email: client_email.to_string(),
            key,
            token_url,
        })
    }

    /// RS256 assertion valid for one hour from now.
    pub fn assertion(&self) -> Result<String, LookupError> {
        let now = Utc::now();
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: SHEETS_READONLY_SCOPE.to_string(),
            aud: self.token_url.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECONDS)).timestamp(),
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| LookupError::Contract(format!("cannot sign token request: {}", e)))
    }

    /// Exchange a fresh assertion for an access token. Nothing is cached: the
    /// webhook keeps no state between updates.
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<String, LookupError> {
        let assertion = self.assertion()?;
        debug!("Requesting access token for {}", self.client_email);

        let response = client
            .post(self.token_url.clone())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let token: TokenResponse = read_json(response).await?;
        Ok(token.access_token)
    }
}
