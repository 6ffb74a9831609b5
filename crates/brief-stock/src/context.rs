//! Per-run state: pacing, retries and quota switches
//!
//! One [`RunContext`] lives for exactly one run and is passed by `&mut`
//! through the pipeline. Each external stage has its own token bucket and
//! its own quota switch; once a switch is set, later calls for that stage
//! return immediately without touching the provider.

use crate::config::BriefConfig;
use crate::enrich::{Enricher, Enrichment};
use crate::error::{FailureKind, Result};
use crate::market::MarketDataSource;
use crate::model::{IndexReading, Instrument, NewsItem, RosterEntry};
use crate::news::{NewsOutcome, NewsQuery, NewsSource};
use crate::retry::RetryPolicy;
use crate::throttle::{RateLimit, Throttle};
use chrono::{Local, NaiveDate};
use tracing::{info, warn};

/// Result of asking the run context to enrich articles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    Enriched(Enrichment),
    /// Enrichment quota is exhausted for the rest of the run
    QuotaExceeded,
    /// Enricher failed after retries
    Failed(String),
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Calls that reached the news provider
    pub news_requests: u32,
    /// Calls answered from the quota switch
    pub news_short_circuits: u32,
    pub enrich_requests: u32,
    pub enrich_short_circuits: u32,
    /// Entries left out of the report
    pub skipped: Vec<String>,
    /// Stages that fell back to placeholder content
    pub degraded: u32,
}

/// State threaded through one run
#[derive(Debug)]
pub struct RunContext {
    today: NaiveDate,
    retry: RetryPolicy,
    market_throttle: Throttle,
    news_throttle: Throttle,
    enrich_throttle: Throttle,
    news_quota_exceeded: bool,
    enrich_quota_exceeded: bool,
    stats: RunStats,
}

impl RunContext {
    pub fn new(retry: RetryPolicy, rate_limit: RateLimit, today: NaiveDate) -> Self {
        Self {
            today,
            retry,
            market_throttle: Throttle::new("market", rate_limit),
            news_throttle: Throttle::new("news", rate_limit),
            enrich_throttle: Throttle::new("enrichment", rate_limit),
            news_quota_exceeded: false,
            enrich_quota_exceeded: false,
            stats: RunStats::default(),
        }
    }

    /// Context for today with the configured retry and rate limit
    pub fn from_config(config: &BriefConfig) -> Self {
        Self::new(
            RetryPolicy::new(config.max_retries, config.retry_step),
            config.rate_limit,
            Local::now().date_naive(),
        )
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn news_quota_exceeded(&self) -> bool {
        self.news_quota_exceeded
    }

    pub fn enrich_quota_exceeded(&self) -> bool {
        self.enrich_quota_exceeded
    }

    /// Record a failure handled by its policy
    pub fn record(&mut self, kind: FailureKind, entry: Option<&RosterEntry>, reason: &str) {
        let subject = entry.map_or("run", |e| e.symbol.as_str());
        warn!(?kind, policy = ?kind.policy(), "{subject}: {reason}");
        match kind.policy() {
            crate::error::FailurePolicy::SkipItem => {
                if let Some(entry) = entry {
                    self.stats.skipped.push(entry.symbol.clone());
                }
            }
            crate::error::FailurePolicy::Degrade => self.stats.degraded += 1,
            crate::error::FailurePolicy::AbortRun => {}
        }
    }

    /// Paced, retried instrument fetch
    pub async fn fetch_instrument(
        &mut self,
        source: &dyn MarketDataSource,
        entry: &RosterEntry,
    ) -> Result<Instrument> {
        let throttle = &self.market_throttle;
        self.retry
            .execute(&format!("instrument {}", entry.symbol), move || async move {
                throttle.acquire().await;
                source.instrument(entry).await
            })
            .await
    }

    /// Paced, retried index fetch
    pub async fn fetch_index(
        &mut self,
        source: &dyn MarketDataSource,
        label: &str,
        symbol: &str,
    ) -> Result<IndexReading> {
        let throttle = &self.market_throttle;
        self.retry
            .execute(&format!("index {symbol}"), move || async move {
                throttle.acquire().await;
                source.index(label, symbol).await
            })
            .await
    }

    /// Fetch news, honouring the news quota switch
    pub async fn fetch_news(&mut self, source: &dyn NewsSource, query: &NewsQuery) -> NewsOutcome {
        if self.news_quota_exceeded {
            self.stats.news_short_circuits += 1;
            return NewsOutcome::QuotaExceeded;
        }

        self.stats.news_requests += 1;
        let throttle = &self.news_throttle;
        let result = self
            .retry
            .execute(&format!("news {}", query.symbol), move || async move {
                throttle.acquire().await;
                source.search(query).await
            })
            .await;

        match result {
            Ok(items) => NewsOutcome::Articles(items),
            Err(e) if e.is_quota() => {
                info!("News quota exhausted ({e}); skipping news for the rest of the run");
                self.news_quota_exceeded = true;
                NewsOutcome::QuotaExceeded
            }
            Err(e) => NewsOutcome::TransientError(e.to_string()),
        }
    }

    /// Enrich articles, honouring the enrichment quota switch
    pub async fn enrich(
        &mut self,
        enricher: &dyn Enricher,
        entry: &RosterEntry,
        items: &[NewsItem],
    ) -> EnrichOutcome {
        if self.enrich_quota_exceeded {
            self.stats.enrich_short_circuits += 1;
            return EnrichOutcome::QuotaExceeded;
        }

        self.stats.enrich_requests += 1;
        let throttle = &self.enrich_throttle;
        let result = self
            .retry
            .execute(&format!("enrich {}", entry.symbol), move || async move {
                throttle.acquire().await;
                enricher.enrich(entry, items).await
            })
            .await;

        match result {
            Ok(enrichment) => EnrichOutcome::Enriched(enrichment),
            Err(e) if e.is_quota() => {
                info!("Enrichment quota exhausted ({e}); keeping raw articles from now on");
                self.enrich_quota_exceeded = true;
                EnrichOutcome::QuotaExceeded
            }
            Err(e) => EnrichOutcome::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::MockEnricher;
    use crate::error::StockError;
    use crate::news::MockNewsSource;

    fn context() -> RunContext {
        RunContext::new(
            RetryPolicy::fast(),
            RateLimit::new(100, 60_000),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        )
    }

    fn query(symbol: &str) -> NewsQuery {
        NewsQuery::for_entry(&RosterEntry::new(symbol, symbol), 5, 3)
    }

    #[tokio::test]
    async fn test_quota_short_circuits_later_calls() {
        let mut source = MockNewsSource::new();
        source.expect_search().times(1).returning(|_| {
            Err(StockError::QuotaExceeded {
                provider: "newsapi".into(),
            })
        });

        let mut ctx = context();
        for symbol in ["AAPL", "MSFT", "NVDA", "TSLA"] {
            let outcome = ctx.fetch_news(&source, &query(symbol)).await;
            assert_eq!(outcome, NewsOutcome::QuotaExceeded);
        }

        assert!(ctx.news_quota_exceeded());
        assert_eq!(ctx.stats().news_requests, 1);
        assert_eq!(ctx.stats().news_short_circuits, 3);
    }

    #[tokio::test]
    async fn test_transient_news_error_is_retried_then_reported() {
        let mut source = MockNewsSource::new();
        source
            .expect_search()
            .times(3)
            .returning(|_| Err(StockError::FeedError("connection reset".into())));

        let mut ctx = context();
        let outcome = ctx.fetch_news(&source, &query("AAPL")).await;
        assert!(matches!(outcome, NewsOutcome::TransientError(_)));
        assert!(!ctx.news_quota_exceeded());
    }

    #[tokio::test]
    async fn test_articles_pass_through() {
        let mut source = MockNewsSource::new();
        source
            .expect_search()
            .withf(|q| q.symbol == "AAPL" && q.limit == 5)
            .times(1)
            .returning(|_| Ok(vec![NewsItem::new("Apple up", "https://a")]));

        let mut ctx = context();
        let outcome = ctx.fetch_news(&source, &query("AAPL")).await;
        assert_eq!(outcome, NewsOutcome::Articles(vec![NewsItem::new("Apple up", "https://a")]));
    }

    #[tokio::test]
    async fn test_enrichment_quota_is_separate_from_news() {
        let mut enricher = MockEnricher::new();
        enricher.expect_enrich().times(1).returning(|_, _| {
            Err(StockError::LlmError(brief_llm::LLMError::RateLimitExceeded(
                "429".into(),
            )))
        });

        let mut ctx = context();
        let entry = RosterEntry::new("AAPL", "애플");
        let items = vec![NewsItem::new("Apple up", "https://a")];

        assert_eq!(ctx.enrich(&enricher, &entry, &items).await, EnrichOutcome::QuotaExceeded);
        assert_eq!(ctx.enrich(&enricher, &entry, &items).await, EnrichOutcome::QuotaExceeded);
        assert!(ctx.enrich_quota_exceeded());
        assert!(!ctx.news_quota_exceeded());
        assert_eq!(ctx.stats().enrich_short_circuits, 1);
    }

    #[test]
    fn test_record_applies_policy() {
        let mut ctx = context();
        let entry = RosterEntry::new("AAPL", "애플");
        ctx.record(FailureKind::InstrumentFetch, Some(&entry), "timeout");
        ctx.record(FailureKind::NewsTransient, Some(&entry), "reset");
        assert_eq!(ctx.stats().skipped, vec!["AAPL".to_string()]);
        assert_eq!(ctx.stats().degraded, 1);
    }
}
