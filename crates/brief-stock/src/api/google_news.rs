//! Google News RSS search (Korean edition)

use crate::error::{Result, StockError};
use crate::model::NewsItem;
use crate::news::{NewsQuery, NewsSource};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const GOOGLE_NEWS_RSS: &str = "https://news.google.com/rss/search";

/// Headlines kept per stock
pub const MAX_HEADLINES: usize = 3;

/// Google News RSS client
pub struct GoogleNewsClient {
    client: Client,
    base_url: String,
    hangul: Regex,
}

impl GoogleNewsClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let hangul = Regex::new("[가-힣]")
            .map_err(|e| StockError::ConfigError(format!("hangul pattern: {e}")))?;

        Ok(Self {
            client,
            base_url: GOOGLE_NEWS_RSS.to_string(),
            hangul,
        })
    }

    /// Point the client at another feed endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_feed(&self, search: &str) -> Result<Vec<NewsItem>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", search),
                ("hl", "ko"),
                ("gl", "KR"),
                ("ceid", "KR:ko"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(StockError::QuotaExceeded {
                provider: "google-news".to_string(),
            });
        }
        if !status.is_success() {
            return Err(StockError::ApiError(format!(
                "Google News HTTP {}",
                status.as_u16()
            )));
        }

        let body = response.text().await?;
        parse_feed(&body)
    }
}

/// Closing-price news from the last day
pub fn primary_query(name: &str) -> String {
    format!("{name} 주식 (마감 OR 종가 OR 속보) when:1d")
}

/// Broader analysis news, used when the primary search has no Korean titles
pub fn fallback_query(name: &str) -> String {
    format!("{name} 주식 분석 when:1d")
}

/// Keep up to `limit` items whose title contains Hangul
fn select_korean(items: Vec<NewsItem>, hangul: &Regex, limit: usize) -> Vec<NewsItem> {
    items
        .into_iter()
        .filter(|item| hangul.is_match(&item.title))
        .take(limit)
        .collect()
}

#[async_trait]
impl NewsSource for GoogleNewsClient {
    #[instrument(skip(self, query), fields(symbol = %query.symbol))]
    async fn search(&self, query: &NewsQuery) -> Result<Vec<NewsItem>> {
        let limit = query.limit.min(MAX_HEADLINES);

        let items = self.fetch_feed(&primary_query(&query.name)).await?;
        let selected = select_korean(items, &self.hangul, limit);
        if !selected.is_empty() {
            return Ok(selected);
        }

        debug!("No Korean closing news for {}, trying analysis query", query.name);
        let mut fallback = self.fetch_feed(&fallback_query(&query.name)).await?;
        fallback.truncate(limit);
        Ok(fallback)
    }
}

fn parse_feed(xml: &str) -> Result<Vec<NewsItem>> {
    let rss: Rss = quick_xml::de::from_str(xml)
        .map_err(|e| StockError::FeedError(format!("invalid RSS: {e}")))?;

    Ok(rss
        .channel
        .items
        .into_iter()
        .map(|item| NewsItem {
            title: item.title,
            url: item.link,
            source: item.source.map(|s| s.name).filter(|s| !s.is_empty()),
            description: None,
            translated_title: None,
        })
        .collect())
}

// ============================================================================
// RSS document types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    source: Option<RssSource>,
}

#[derive(Debug, Deserialize)]
struct RssSource {
    #[serde(rename = "$text", default)]
    name: String,
}
