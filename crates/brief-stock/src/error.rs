//! Error types and failure policy for report runs

use thiserror::Error;

/// Report pipeline errors
#[derive(Debug, Error)]
pub enum StockError {
    /// API request failed
    #[error("API error: {0}")]
    ApiError(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Provider reported that the usage quota is exhausted
    #[error("Quota exceeded for {provider}")]
    QuotaExceeded { provider: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// RSS/XML parsing error
    #[error("Feed error: {0}")]
    FeedError(String),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// LLM provider error
    #[error("LLM error: {0}")]
    LlmError(#[from] brief_llm::LLMError),

    /// Spreadsheet roster error
    #[error("Sheet error: {0}")]
    SheetError(String),

    /// Template rendering error
    #[error("Render error: {0}")]
    RenderError(#[from] minijinja::Error),

    /// Mail composition or delivery error
    #[error("Mail error: {0}")]
    MailError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for report operations
pub type Result<T> = std::result::Result<T, StockError>;

impl From<brief_utils::EnvError> for StockError {
    fn from(err: brief_utils::EnvError) -> Self {
        StockError::ConfigError(err.to_string())
    }
}

impl From<lettre::error::Error> for StockError {
    fn from(err: lettre::error::Error) -> Self {
        StockError::MailError(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for StockError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        StockError::MailError(err.to_string())
    }
}

impl From<lettre::address::AddressError> for StockError {
    fn from(err: lettre::address::AddressError) -> Self {
        StockError::ConfigError(format!("invalid mail address: {err}"))
    }
}

/// Case-insensitive markers that providers put in quota/rate-limit errors
const QUOTA_MARKERS: &[&str] = &[
    "ratelimited",
    "rate limit",
    "too many requests",
    "quota",
    "resource_exhausted",
    "maximumresultsreached",
];

/// Whether a provider error message reports an exhausted quota
pub fn is_quota_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    QUOTA_MARKERS.iter().any(|marker| lowered.contains(marker))
}

impl StockError {
    /// Whether this error means the provider refuses further calls this run
    pub fn is_quota(&self) -> bool {
        match self {
            StockError::QuotaExceeded { .. } => true,
            StockError::LlmError(brief_llm::LLMError::RateLimitExceeded(_)) => true,
            StockError::ApiError(msg) | StockError::LlmError(brief_llm::LLMError::RequestFailed(msg)) => {
                is_quota_message(msg)
            }
            _ => false,
        }
    }

    /// Whether retrying the same call could succeed
    pub fn is_transient(&self) -> bool {
        if self.is_quota() {
            return false;
        }
        match self {
            StockError::NetworkError(_) | StockError::FeedError(_) => true,
            StockError::ApiError(msg) => msg.contains("HTTP 5") || msg.contains("timed out"),
            StockError::LlmError(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Pipeline stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Loading the ticker roster
    RosterLoad,
    /// Fetching one instrument's market data
    InstrumentFetch,
    /// Fetching the index header
    MarketSummary,
    /// News provider quota exhausted
    NewsQuota,
    /// News provider failed after retries
    NewsTransient,
    /// Summarisation or translation failed
    Enrichment,
    /// Turning the report into a document
    Render,
    /// Sending the e-mail
    Delivery,
}

/// What the run does about a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Leave the item out of the report and continue
    SkipItem,
    /// Keep the item with placeholder content and continue
    Degrade,
    /// Stop the run with an error
    AbortRun,
}

impl FailureKind {
    /// Policy table for the pipeline
    pub const fn policy(self) -> FailurePolicy {
        match self {
            FailureKind::InstrumentFetch => FailurePolicy::SkipItem,
            FailureKind::MarketSummary
            | FailureKind::NewsQuota
            | FailureKind::NewsTransient
            | FailureKind::Enrichment => FailurePolicy::Degrade,
            FailureKind::RosterLoad | FailureKind::Render | FailureKind::Delivery => {
                FailurePolicy::AbortRun
            }
        }
    }
}
