//! The report pipeline
//!
//! roster → (market data → classify) → news → enrichment, once per entry
//! and strictly in roster order, then render and deliver once. Failures are
//! handled through [`FailureKind::policy`].

use crate::api::{
    GoogleNewsClient, NewsApiClient, SheetsClient, TranslateClient, YahooFinanceClient,
};
use crate::classifier::{Thresholds, YieldUnit, assess};
use crate::config::{BriefConfig, EnrichmentMode, LlmBackend, NewsProvider, ReportKind, RosterKind};
use crate::context::{EnrichOutcome, RunContext};
use crate::enrich::{
    ApiTranslator, DIGEST_APOLOGY, DIGEST_QUOTA_NOTICE, Enricher, LlmDigest, LlmTranslator,
};
use crate::error::{FailureKind, Result, StockError};
use crate::mailer::{ConsoleMailer, Mailer, SmtpMailer};
use crate::market::{IndexSnapshot, MARKET_INDICES, MarketDataSource};
use crate::model::{NewsItem, RosterEntry};
use crate::news::{NewsOutcome, NewsQuery, NewsSource};
use crate::render::{HtmlRenderer, ReportRenderer, TextRenderer};
use crate::report::{NewsBlock, Report, ReportSection};
use crate::roster::{RosterSource, SheetRoster, StaticRoster};
use brief_llm::LLMProvider;
use brief_llm::providers::{GeminiConfig, GeminiProvider, OpenAIConfig, OpenAIProvider};
use chrono::Local;
use tracing::{debug, info, instrument};

/// What a finished run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub subject: String,
    /// Sections in the sent report
    pub sections: usize,
    /// Symbols left out of the report
    pub skipped: Vec<String>,
    /// Stages that fell back to placeholder content
    pub degraded: u32,
}

/// One configured report pipeline
pub struct Pipeline {
    kind: ReportKind,
    enrichment: EnrichmentMode,
    thresholds: Thresholds,
    yield_unit: Option<YieldUnit>,
    news_limit: usize,
    news_lookback_days: i64,
    roster: Box<dyn RosterSource>,
    market: Option<Box<dyn MarketDataSource>>,
    news: Box<dyn NewsSource>,
    enricher: Option<Box<dyn Enricher>>,
    renderer: Box<dyn ReportRenderer>,
    mailer: Box<dyn Mailer>,
}

impl Pipeline {
    /// Pipeline with the given strategies and no market data or enrichment
    pub fn new(
        config: &BriefConfig,
        roster: Box<dyn RosterSource>,
        news: Box<dyn NewsSource>,
        renderer: Box<dyn ReportRenderer>,
        mailer: Box<dyn Mailer>,
    ) -> Self {
        Self {
            kind: config.report,
            enrichment: config.enrichment,
            thresholds: config.thresholds.clone(),
            yield_unit: config.yield_unit,
            news_limit: config.news_limit,
            news_lookback_days: config.news_lookback_days,
            roster,
            market: None,
            news,
            enricher: None,
            renderer,
            mailer,
        }
    }

    pub fn with_market(mut self, market: Box<dyn MarketDataSource>) -> Self {
        self.market = Some(market);
        self
    }

    pub fn with_enricher(mut self, enricher: Box<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Wire the concrete clients the configuration selects
    pub fn from_config(config: &BriefConfig) -> Result<Self> {
        let timeout = config.request_timeout;

        let roster: Box<dyn RosterSource> = match config.roster {
            RosterKind::Static => Box::new(StaticRoster::default()),
            RosterKind::Sheet => {
                let json = require(config.service_account_json.as_deref(), "SERVICE_ACCOUNT_JSON")?;
                let id = require(config.spreadsheet_id.as_deref(), "BRIEF_SPREADSHEET_ID")?;
                Box::new(SheetRoster::new(
                    SheetsClient::from_json(json, timeout)?,
                    id,
                    config.worksheet.clone(),
                ))
            }
        };

        let news: Box<dyn NewsSource> = match config.news_provider {
            NewsProvider::GoogleNews => Box::new(GoogleNewsClient::new(timeout)?),
            NewsProvider::NewsApi => {
                let key = require(config.news_api_key.as_deref(), "NEWS_API_KEY")?;
                Box::new(NewsApiClient::new(key, timeout)?)
            }
        };

        let renderer: Box<dyn ReportRenderer> = match config.report {
            ReportKind::StockBrief => Box::new(HtmlRenderer::new()?),
            ReportKind::NewsDigest => Box::new(TextRenderer::new()?),
        };

        let mailer: Box<dyn Mailer> = if config.dry_run {
            Box::new(ConsoleMailer)
        } else {
            Box::new(SmtpMailer::from_settings(&config.mail)?)
        };

        let mut pipeline = Self::new(config, roster, news, renderer, mailer);
        if config.report == ReportKind::StockBrief {
            pipeline = pipeline.with_market(Box::new(YahooFinanceClient::new(timeout)?));
        }
        if let Some(enricher) = build_enricher(config)? {
            pipeline = pipeline.with_enricher(enricher);
        }
        Ok(pipeline)
    }

    /// Build, render and deliver one report
    #[instrument(skip(self, ctx), fields(report = ?self.kind))]
    pub async fn run(&self, ctx: &mut RunContext) -> Result<RunSummary> {
        let report = self.build_report(ctx).await?;

        let rendered = self.renderer.render(&report).inspect_err(|e| {
            ctx.record(FailureKind::Render, None, &e.to_string());
        })?;

        if let Err(e) = self.mailer.send(&rendered).await {
            ctx.record(FailureKind::Delivery, None, &e.to_string());
            return Err(e);
        }

        let stats = ctx.stats();
        let summary = RunSummary {
            subject: rendered.subject,
            sections: report.sections.len(),
            skipped: stats.skipped.clone(),
            degraded: stats.degraded,
        };
        info!(
            "Report delivered: {} sections, {} skipped, {} degraded",
            summary.sections,
            summary.skipped.len(),
            summary.degraded
        );
        Ok(summary)
    }

    /// Assemble the report without rendering or sending it
    pub async fn build_report(&self, ctx: &mut RunContext) -> Result<Report> {
        let entries = match self.roster.load().await {
            Ok(entries) if entries.is_empty() => {
                let err = StockError::ConfigError("roster has no active entries".to_string());
                ctx.record(FailureKind::RosterLoad, None, &err.to_string());
                return Err(err);
            }
            Ok(entries) => entries,
            Err(e) => {
                ctx.record(FailureKind::RosterLoad, None, &e.to_string());
                return Err(e);
            }
        };
        info!("Building {:?} for {} tickers", self.kind, entries.len());

        let mut report = Report::new(self.kind, Local::now());
        if let Some(market) = &self.market {
            report.market = self.market_summary(ctx, market.as_ref()).await;
        }

        for entry in &entries {
            if let Some(section) = self.section(ctx, entry).await {
                report.sections.push(section);
            }
        }
        Ok(report)
    }

    /// Index header; any failure leaves it empty
    async fn market_summary(
        &self,
        ctx: &mut RunContext,
        market: &dyn MarketDataSource,
    ) -> Vec<IndexSnapshot> {
        let mut snapshots = Vec::with_capacity(MARKET_INDICES.len());
        for (label, symbol) in MARKET_INDICES {
            match ctx.fetch_index(market, label, symbol).await {
                Ok(reading) => snapshots.push(IndexSnapshot::new(reading, &self.thresholds)),
                Err(e) => {
                    ctx.record(FailureKind::MarketSummary, None, &e.to_string());
                    return Vec::new();
                }
            }
        }
        snapshots
    }

    /// One section, or `None` when the entry is skipped
    async fn section(&self, ctx: &mut RunContext, entry: &RosterEntry) -> Option<ReportSection> {
        let quote = match &self.market {
            Some(market) => match ctx.fetch_instrument(market.as_ref(), entry).await {
                Ok(instrument) => {
                    let unit = self.yield_unit.unwrap_or_else(|| market.yield_unit());
                    let assessment = assess(&instrument, &self.thresholds, unit, ctx.today());
                    Some((instrument, assessment))
                }
                Err(e) => {
                    ctx.record(FailureKind::InstrumentFetch, Some(entry), &e.to_string());
                    return None;
                }
            },
            None => None,
        };

        let news = self.news_block(ctx, entry).await;
        debug!("Section ready for {}", entry.symbol);
        Some(ReportSection {
            entry: entry.clone(),
            quote,
            news,
        })
    }

    async fn news_block(&self, ctx: &mut RunContext, entry: &RosterEntry) -> NewsBlock {
        let query = NewsQuery::for_entry(entry, self.news_limit, self.news_lookback_days);
        match ctx.fetch_news(self.news.as_ref(), &query).await {
            NewsOutcome::Articles(items) if items.is_empty() => NewsBlock::Empty,
            NewsOutcome::Articles(mut items) => {
                let digest = self.enrich(ctx, entry, &mut items).await;
                NewsBlock::Articles { items, digest }
            }
            NewsOutcome::QuotaExceeded => {
                ctx.record(FailureKind::NewsQuota, Some(entry), "news quota exceeded");
                NewsBlock::QuotaExceeded
            }
            NewsOutcome::TransientError(reason) => {
                ctx.record(FailureKind::NewsTransient, Some(entry), &reason);
                NewsBlock::Unavailable
            }
        }
    }

    /// Apply the enricher; returns the digest text to show, if any
    async fn enrich(
        &self,
        ctx: &mut RunContext,
        entry: &RosterEntry,
        items: &mut [NewsItem],
    ) -> Option<String> {
        let enricher = self.enricher.as_deref()?;
        match ctx.enrich(enricher, entry, items).await {
            EnrichOutcome::Enriched(enrichment) => enrichment.apply(items),
            EnrichOutcome::QuotaExceeded => {
                ctx.record(FailureKind::Enrichment, Some(entry), "enrichment quota exceeded");
                self.digest_fallback(DIGEST_QUOTA_NOTICE)
            }
            EnrichOutcome::Failed(reason) => {
                ctx.record(FailureKind::Enrichment, Some(entry), &reason);
                self.digest_fallback(DIGEST_APOLOGY)
            }
        }
    }

    /// Translations fall back to the original titles, digests to a notice
    fn digest_fallback(&self, notice: &str) -> Option<String> {
        (self.enrichment == EnrichmentMode::Digest).then(|| notice.to_string())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("kind", &self.kind)
            .field("enrichment", &self.enrichment)
            .field("market", &self.market.is_some())
            .finish_non_exhaustive()
    }
}

fn require<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    value.ok_or_else(|| StockError::ConfigError(format!("{name} is not set")))
}

fn build_llm(config: &BriefConfig) -> Result<Box<dyn LLMProvider>> {
    let timeout = config.request_timeout.as_secs().max(30);
    match config.llm_backend {
        LlmBackend::Gemini => {
            let key = require(config.gemini_api_key.as_deref(), "GEMINI_API_KEY")?;
            let provider = GeminiProvider::with_config(GeminiConfig::new(key).with_timeout(timeout))?;
            Ok(Box::new(provider))
        }
        LlmBackend::OpenAi => {
            let key = require(config.openai_api_key.as_deref(), "OPENAI_API_KEY")?;
            let mut llm_config = OpenAIConfig::new(key).with_timeout(timeout);
            if let Some(base) = &config.openai_api_base {
                llm_config = llm_config.with_api_base(base.clone());
            }
            Ok(Box::new(OpenAIProvider::with_config(llm_config)?))
        }
    }
}

fn build_enricher(config: &BriefConfig) -> Result<Option<Box<dyn Enricher>>> {
    let enricher: Box<dyn Enricher> = match config.enrichment {
        EnrichmentMode::None => return Ok(None),
        EnrichmentMode::Digest => Box::new(LlmDigest::new(build_llm(config)?, &config.llm_model)),
        EnrichmentMode::Translate => {
            Box::new(LlmTranslator::new(build_llm(config)?, &config.llm_model))
        }
        EnrichmentMode::TranslateApi => {
            let key = require(config.translate_api_key.as_deref(), "GOOGLE_TRANSLATE_API_KEY")?;
            Box::new(ApiTranslator::new(TranslateClient::new(key, config.request_timeout)?))
        }
    };
    Ok(Some(enricher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::enrich::{Enrichment, MockEnricher};
    use crate::mailer::MockMailer;
    use crate::market::MockMarketDataSource;
    use crate::model::{IndexReading, Instrument, Recommendation};
    use crate::news::MockNewsSource;
    use crate::render::BodyFormat;
    use crate::retry::RetryPolicy;
    use crate::roster::MockRosterSource;
    use crate::throttle::RateLimit;
    use chrono::NaiveDate;

    fn config(kind: ReportKind) -> BriefConfig {
        let mut config = BriefConfig::for_report(kind);
        config.dry_run = true;
        config
    }

    fn context() -> RunContext {
        RunContext::new(
            RetryPolicy::fast(),
            RateLimit::new(100, 60_000),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        )
    }

    fn roster(symbols: &[(&'static str, &'static str)]) -> Box<MockRosterSource> {
        let entries: Vec<RosterEntry> =
            symbols.iter().map(|(s, n)| RosterEntry::new(*s, *n)).collect();
        let mut roster = MockRosterSource::new();
        roster.expect_load().times(1).returning(move || Ok(entries.clone()));
        Box::new(roster)
    }

    fn instrument(entry: &RosterEntry) -> Instrument {
        Instrument {
            symbol: entry.symbol.clone(),
            name: entry.name.clone(),
            price: 100.0,
            previous_close: 98.0,
            year_high: 130.0,
            year_low: 80.0,
            market_cap: Some(1.2e12),
            trailing_pe: Some(22.0),
            target_price: Some(120.0),
            dividend_yield: Some(0.012),
            earnings_date: None,
            recommendation: Some(Recommendation::StrongBuy),
        }
    }

    fn market_failing_for(symbol: &'static str) -> Box<MockMarketDataSource> {
        let mut market = MockMarketDataSource::new();
        market.expect_instrument().returning(move |entry| {
            if entry.symbol == symbol {
                Err(StockError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: "no chart data".to_string(),
                })
            } else {
                Ok(instrument(entry))
            }
        });
        market.expect_index().returning(|label, symbol| {
            Ok(IndexReading {
                label: label.to_string(),
                symbol: symbol.to_string(),
                level: 100.0,
                previous_close: 99.0,
            })
        });
        market.expect_yield_unit().return_const(YieldUnit::Fraction);
        Box::new(market)
    }

    fn news_with_headline() -> Box<MockNewsSource> {
        let mut news = MockNewsSource::new();
        news.expect_search().returning(|q| {
            Ok(vec![NewsItem::new(
                format!("{} 종가 마감 소식", q.name),
                format!("https://news.example/{}", q.symbol),
            )])
        });
        Box::new(news)
    }

    #[tokio::test]
    async fn test_failed_instrument_is_skipped_and_report_still_sent() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|r| {
                r.format == BodyFormat::Html
                    && r.body.contains("AAPL")
                    && r.body.contains("NVDA")
                    && !r.body.contains("MSFT")
                    && r.body.find("AAPL") < r.body.find("NVDA")
            })
            .times(1)
            .returning(|_| Ok(()));

        let pipeline = Pipeline::new(
            &config(ReportKind::StockBrief),
            roster(&[("AAPL", "애플"), ("MSFT", "마이크로소프트"), ("NVDA", "엔비디아")]),
            news_with_headline(),
            Box::new(HtmlRenderer::new().unwrap()),
            Box::new(mailer),
        )
        .with_market(market_failing_for("MSFT"));

        let mut ctx = context();
        let summary = pipeline.run(&mut ctx).await.unwrap();
        assert_eq!(summary.sections, 2);
        assert_eq!(summary.skipped, vec!["MSFT".to_string()]);
    }

    #[tokio::test]
    async fn test_report_sections_follow_roster_order() {
        let pipeline = Pipeline::new(
            &config(ReportKind::StockBrief),
            roster(&[("NVDA", "엔비디아"), ("AAPL", "애플"), ("MSFT", "마이크로소프트")]),
            news_with_headline(),
            Box::new(HtmlRenderer::new().unwrap()),
            Box::new(MockMailer::new()),
        )
        .with_market(market_failing_for("none"));

        let report = pipeline.build_report(&mut context()).await.unwrap();
        assert_eq!(report.symbols(), vec!["NVDA", "AAPL", "MSFT"]);
        assert_eq!(report.market.len(), 3);
        assert!(report.market[2].fear.is_some());
    }

    #[tokio::test]
    async fn test_news_quota_short_circuits_for_rest_of_run() {
        let mut news = MockNewsSource::new();
        news.expect_search().times(1).returning(|_| {
            Err(StockError::QuotaExceeded {
                provider: "newsapi".into(),
            })
        });

        let pipeline = Pipeline::new(
            &config(ReportKind::NewsDigest),
            roster(&[("AAPL", "애플"), ("MSFT", "마이크로소프트"), ("NVDA", "엔비디아")]),
            Box::new(news),
            Box::new(TextRenderer::new().unwrap()),
            Box::new(MockMailer::new()),
        );

        let mut ctx = context();
        let report = pipeline.build_report(&mut ctx).await.unwrap();
        assert_eq!(report.sections.len(), 3);
        assert!(report.sections.iter().all(|s| s.news == NewsBlock::QuotaExceeded));
        assert!(report.sections.iter().all(|s| s.quote.is_none()));
        assert_eq!(ctx.stats().news_short_circuits, 2);
    }

    #[tokio::test]
    async fn test_failed_digest_degrades_to_apology() {
        let mut enricher = MockEnricher::new();
        enricher
            .expect_enrich()
            .returning(|entry, _| {
                if entry.symbol == "AAPL" {
                    Ok(Enrichment::Digest("1. 실적 호조".into()))
                } else {
                    Err(StockError::ApiError("empty digest".into()))
                }
            });

        let pipeline = Pipeline::new(
            &config(ReportKind::NewsDigest),
            roster(&[("AAPL", "애플"), ("MSFT", "마이크로소프트")]),
            news_with_headline(),
            Box::new(TextRenderer::new().unwrap()),
            Box::new(MockMailer::new()),
        )
        .with_enricher(Box::new(enricher));

        let report = pipeline.build_report(&mut context()).await.unwrap();
        let digests: Vec<Option<&str>> = report
            .sections
            .iter()
            .map(|s| match &s.news {
                NewsBlock::Articles { digest, .. } => digest.as_deref(),
                _ => None,
            })
            .collect();
        assert_eq!(digests, vec![Some("1. 실적 호조"), Some(DIGEST_APOLOGY)]);
    }

    #[tokio::test]
    async fn test_empty_news_and_market_failure_degrade() {
        let mut news = MockNewsSource::new();
        news.expect_search().returning(|_| Ok(Vec::new()));

        let mut market = MockMarketDataSource::new();
        market.expect_instrument().returning(|e| Ok(instrument(e)));
        market
            .expect_index()
            .returning(|_, s| Err(StockError::DataUnavailable {
                symbol: s.to_string(),
                reason: "closed".to_string(),
            }));
        market.expect_yield_unit().return_const(YieldUnit::Fraction);

        let pipeline = Pipeline::new(
            &config(ReportKind::StockBrief),
            roster(&[("AAPL", "애플")]),
            Box::new(news),
            Box::new(HtmlRenderer::new().unwrap()),
            Box::new(MockMailer::new()),
        )
        .with_market(Box::new(market));

        let report = pipeline.build_report(&mut context()).await.unwrap();
        assert!(report.market.is_empty());
        assert_eq!(report.sections[0].news, NewsBlock::Empty);
        assert!(report.sections[0].quote.is_some());
    }

    #[tokio::test]
    async fn test_delivery_failure_aborts() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(1)
            .returning(|_| Err(StockError::MailError("535 authentication failed".into())));

        let pipeline = Pipeline::new(
            &config(ReportKind::NewsDigest),
            roster(&[("AAPL", "애플")]),
            news_with_headline(),
            Box::new(TextRenderer::new().unwrap()),
            Box::new(mailer),
        );

        let result = pipeline.run(&mut context()).await;
        assert!(matches!(result, Err(StockError::MailError(_))));
    }

    #[tokio::test]
    async fn test_empty_roster_aborts() {
        let mut empty = MockRosterSource::new();
        empty.expect_load().returning(|| Ok(Vec::new()));

        let pipeline = Pipeline::new(
            &config(ReportKind::NewsDigest),
            Box::new(empty),
            Box::new(MockNewsSource::new()),
            Box::new(TextRenderer::new().unwrap()),
            Box::new(MockMailer::new()),
        );
        assert!(pipeline.run(&mut context()).await.is_err());
    }
}
