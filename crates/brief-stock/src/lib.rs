//! Daily stock brief and news digest
//!
//! This crate builds one e-mail report per run from a roster of tickers. It
//! includes:
//!
//! - Roster sources (built-in list, Google Sheets worksheet)
//! - Market data and index levels from Yahoo Finance
//! - News from Google News RSS or NewsAPI
//! - Optional LLM digests or translations of the headlines
//! - Threshold classification of valuation metrics
//! - HTML and plain-text rendering, SMTP delivery
//!
//! # Architecture
//!
//! A [`Pipeline`] holds one implementation of each stage trait
//! ([`RosterSource`], [`MarketDataSource`], [`NewsSource`], [`Enricher`],
//! [`ReportRenderer`], [`Mailer`]). A [`RunContext`] carries the per-run
//! state: retry policy, per-stage rate limits and quota switches, and the
//! counters reported at the end.
//!
//! # Example
//!
//! ```rust,ignore
//! use brief_stock::{BriefConfig, Pipeline, RunContext};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BriefConfig::from_env()?;
//!     let pipeline = Pipeline::from_config(&config)?;
//!     let mut ctx = RunContext::from_config(&config);
//!
//!     let summary = pipeline.run(&mut ctx).await?;
//!     println!("sent {}", summary.subject);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod classifier;
pub mod config;
pub mod context;
pub mod enrich;
pub mod error;
pub mod mailer;
pub mod market;
pub mod model;
pub mod news;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod report;
pub mod retry;
pub mod roster;
pub mod throttle;

// Re-export main types for convenience
pub use classifier::{Assessment, Thresholds, YieldUnit};
pub use config::{BriefConfig, EnrichmentMode, NewsProvider, ReportKind, RosterKind};
pub use context::{RunContext, RunStats};
pub use enrich::{Enricher, Enrichment};
pub use error::{FailureKind, FailurePolicy, Result, StockError};
pub use mailer::{ConsoleMailer, Mailer, SmtpMailer};
pub use market::MarketDataSource;
pub use model::{Instrument, NewsItem, RosterEntry};
pub use news::{NewsOutcome, NewsSource};
pub use pipeline::{Pipeline, RunSummary};
pub use render::{HtmlRenderer, RenderedReport, ReportRenderer, TextRenderer};
pub use report::Report;
pub use roster::RosterSource;
