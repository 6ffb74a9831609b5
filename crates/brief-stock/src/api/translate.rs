//! Google Cloud Translation (v2) client

use crate::error::{Result, StockError, is_quota_message};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

const TRANSLATE_ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

/// Translation API client
pub struct TranslateClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl TranslateClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.into(),
            endpoint: TRANSLATE_ENDPOINT.to_string(),
        })
    }

    /// Translate each text into `target` (ISO 639-1), preserving order
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    pub async fn translate(&self, texts: &[String], target: &str) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = TranslateRequest {
            q: texts,
            target,
            format: "text",
        };
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        parse_response(status, &body, texts.len())
    }
}

fn parse_response(status: u16, body: &str, expected: usize) -> Result<Vec<String>> {
    if status >= 400 {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        if status == 429 || is_quota_message(&message) {
            return Err(StockError::QuotaExceeded {
                provider: "google-translate".to_string(),
            });
        }
        return Err(StockError::ApiError(format!(
            "Translate HTTP {status}: {message}"
        )));
    }

    let parsed: TranslateResponse = serde_json::from_str(body)?;
    let translations: Vec<String> = parsed
        .data
        .translations
        .into_iter()
        .map(|t| t.translated_text)
        .collect();

    if translations.len() != expected {
        return Err(StockError::ApiError(format!(
            "Translate returned {} texts for {expected}",
            translations.len()
        )));
    }
    Ok(translations)
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a [String],
    target: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}
