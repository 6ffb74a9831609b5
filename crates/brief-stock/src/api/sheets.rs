//! Google Sheets values API with service-account authentication

use crate::error::{Result, StockError};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/";
const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a service-account key file we need
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Read-only Sheets client
pub struct SheetsClient {
    client: Client,
    key: ServiceAccountKey,
    api_base: String,
}

impl SheetsClient {
    /// Create a client from the service-account JSON blob
    pub fn from_json(service_account_json: &str, timeout: Duration) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(service_account_json)
            .map_err(|e| StockError::SheetError(format!("invalid service account JSON: {e}")))?;

        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            key,
            api_base: SHEETS_API_BASE.to_string(),
        })
    }

    /// Signed RS256 assertion for the token exchange
    fn assertion(&self, now: i64) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SHEETS_READONLY_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| StockError::SheetError(format!("invalid private key: {e}")))?;

        encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| StockError::SheetError(format!("failed to sign assertion: {e}")))
    }

    async fn access_token(&self) -> Result<String> {
        let assertion = self.assertion(Utc::now().timestamp())?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StockError::SheetError(format!(
                "token exchange HTTP {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| StockError::SheetError(format!("invalid API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| StockError::SheetError("API base cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range]);
        Ok(url)
    }

    /// Every row of a range (a worksheet title reads the whole sheet)
    #[instrument(skip(self))]
    pub async fn values(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let token = self.access_token().await?;
        let url = self.values_url(spreadsheet_id, range)?;

        let response = self.client.get(url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StockError::SheetError(format!(
                "values HTTP {status}: {body}"
            )));
        }

        let range: ValueRange = response.json().await?;
        debug!("Read {} sheet rows", range.values.len());
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
