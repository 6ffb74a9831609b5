//! newsapi.org client for English market news

use crate::error::{Result, StockError, is_quota_message};
use crate::model::NewsItem;
use crate::news::{NewsQuery, NewsSource};
use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const NEWS_API_BASE: &str = "https://newsapi.org/v2";
const USER_AGENT: &str = "market-brief/0.1";
/// Extra articles requested to make up for `[Removed]` entries
const PAGE_SURPLUS: usize = 5;
const MAX_PAGE_SIZE: usize = 100;

/// NewsAPI `everything` search client
pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl NewsApiClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `api_key` - newsapi.org key, sent as `X-Api-Key`
    /// * `timeout` - per-request timeout
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: NEWS_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// `pageSize` to request for `limit` kept articles
pub fn page_size(limit: usize) -> usize {
    limit.saturating_add(PAGE_SURPLUS).min(MAX_PAGE_SIZE)
}

/// First day of the search window
pub fn window_start(today: NaiveDate, lookback_days: i64) -> NaiveDate {
    let days = u64::try_from(lookback_days).unwrap_or(0);
    today.checked_sub_days(Days::new(days)).unwrap_or(today)
}

#[async_trait]
impl NewsSource for NewsApiClient {
    #[instrument(skip(self, query), fields(symbol = %query.symbol))]
    async fn search(&self, query: &NewsQuery) -> Result<Vec<NewsItem>> {
        let from = window_start(Local::now().date_naive(), query.lookback_days)
            .format("%Y-%m-%d")
            .to_string();
        let page = page_size(query.limit).to_string();

        let response = self
            .client
            .get(format!("{}/everything", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", query.symbol.as_str()),
                ("from", from.as_str()),
                ("language", "en"),
                ("sortBy", "relevancy"),
                ("pageSize", page.as_str()),
            ])
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        let items = parse_response(status, &body)?;
        debug!("NewsAPI returned {} articles for {}", items.len(), query.symbol);

        Ok(items.into_iter().take(query.limit).collect())
    }
}

fn parse_response(status: u16, body: &str) -> Result<Vec<NewsItem>> {
    let parsed: NewsApiResponse = serde_json::from_str(body).map_err(|e| {
        if status >= 400 {
            StockError::ApiError(format!("NewsAPI HTTP {status}: {body}"))
        } else {
            StockError::JsonError(e)
        }
    })?;

    if status == 429 || parsed.status == "error" {
        let code = parsed.code.unwrap_or_default();
        let message = parsed.message.unwrap_or_default();
        if status == 429 || is_quota_message(&code) || is_quota_message(&message) {
            return Err(StockError::QuotaExceeded {
                provider: "newsapi".to_string(),
            });
        }
        return Err(StockError::ApiError(format!(
            "NewsAPI HTTP {status}: {code}: {message}"
        )));
    }

    Ok(parsed
        .articles
        .into_iter()
        .filter(|a| a.title.as_deref().is_some_and(|t| t != "[Removed]"))
        .map(|a| NewsItem {
            title: a.title.unwrap_or_default(),
            url: a.url.unwrap_or_default(),
            source: a.source.and_then(|s| s.name),
            description: a.description,
            translated_title: None,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    #[serde(default)]
    source: Option<NewsApiSource>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    #[serde(default)]
    name: Option<String>,
}
