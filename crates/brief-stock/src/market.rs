//! Market data strategy

use crate::classifier::{FearLevel, Thresholds, YieldUnit, classify_fear, pct_change};
use crate::error::Result;
use crate::model::{IndexReading, Instrument, RosterEntry};
use async_trait::async_trait;
use serde::Serialize;

/// Indices shown in the report header, in display order
pub const MARKET_INDICES: &[(&str, &str)] = &[
    ("나스닥", "^IXIC"),
    ("S&P500", "^GSPC"),
    ("공포지수(VIX)", "^VIX"),
];

/// Symbol read as a fear gauge rather than a price index
pub const VOLATILITY_INDEX: &str = "^VIX";

/// Source of per-instrument snapshots and index levels
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Snapshot of one roster entry; any error skips the entry
    async fn instrument(&self, entry: &RosterEntry) -> Result<Instrument>;

    /// Current level of one index
    async fn index(&self, label: &str, symbol: &str) -> Result<IndexReading>;

    /// Unit of [`Instrument::dividend_yield`] values this source returns
    fn yield_unit(&self) -> YieldUnit;
}

/// Index reading with its derived figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSnapshot {
    pub reading: IndexReading,
    pub pct_change: f64,
    /// Set for the volatility index only
    pub fear: Option<FearLevel>,
}

impl IndexSnapshot {
    pub fn new(reading: IndexReading, thresholds: &Thresholds) -> Self {
        let pct = pct_change(reading.level, reading.previous_close);
        let fear =
            (reading.symbol == VOLATILITY_INDEX).then(|| classify_fear(reading.level, thresholds));
        Self {
            reading,
            pct_change: pct,
            fear,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(symbol: &str, level: f64, previous_close: f64) -> IndexReading {
        IndexReading {
            label: symbol.to_string(),
            symbol: symbol.to_string(),
            level,
            previous_close,
        }
    }

    #[test]
    fn test_index_snapshot_change() {
        let snap = IndexSnapshot::new(reading("^GSPC", 5050.0, 5000.0), &Thresholds::default());
        assert!((snap.pct_change - 1.0).abs() < 1e-9);
        assert_eq!(snap.fear, None);
    }

    #[test]
    fn test_vix_snapshot_has_fear_level() {
        let t = Thresholds::default();
        assert_eq!(
            IndexSnapshot::new(reading("^VIX", 14.2, 15.0), &t).fear,
            Some(FearLevel::Calm)
        );
        assert_eq!(
            IndexSnapshot::new(reading("^VIX", 31.0, 25.0), &t).fear,
            Some(FearLevel::Alarm)
        );
    }
}
