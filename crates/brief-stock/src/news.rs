//! News strategy and the outcome of a news fetch

use crate::error::Result;
use crate::model::{NewsItem, RosterEntry};
use async_trait::async_trait;

/// What to search for one roster entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub symbol: String,
    /// Display name; Korean feeds search by name, English feeds by symbol
    pub name: String,
    /// Articles to keep
    pub limit: usize,
    /// Oldest article age in days
    pub lookback_days: i64,
}

impl NewsQuery {
    pub fn for_entry(entry: &RosterEntry, limit: usize, lookback_days: i64) -> Self {
        Self {
            symbol: entry.symbol.clone(),
            name: entry.name.clone(),
            limit,
            lookback_days,
        }
    }
}

/// News provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Articles for the query, at most `query.limit`
    ///
    /// Quota exhaustion must surface as an error whose
    /// [`crate::StockError::is_quota`] is true.
    async fn search(&self, query: &NewsQuery) -> Result<Vec<NewsItem>>;
}

/// Result of asking the run context for news
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsOutcome {
    /// Provider answered; may be empty
    Articles(Vec<NewsItem>),
    /// Provider quota is exhausted for the rest of the run
    QuotaExceeded,
    /// Provider failed after retries
    TransientError(String),
}
