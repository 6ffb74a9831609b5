//! Snapshot types fetched once per run

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the ticker roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Ticker symbol, e.g. `AAPL` or `BRK-B`
    pub symbol: String,
    /// Display name used in the report and in news queries
    pub name: String,
    /// Inactive rows are dropped before the run starts
    pub active: bool,
}

impl RosterEntry {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            active: true,
        }
    }
}

/// Analyst consensus recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    Underperform,
    Sell,
    StrongSell,
}

impl Recommendation {
    /// Parse a provider key such as `strong_buy`
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "strong_buy" => Some(Self::StrongBuy),
            "buy" => Some(Self::Buy),
            "hold" => Some(Self::Hold),
            "underperform" => Some(Self::Underperform),
            "sell" => Some(Self::Sell),
            "strong_sell" => Some(Self::StrongSell),
            _ => None,
        }
    }

    /// Korean label shown in the report
    pub fn label(self) -> &'static str {
        match self {
            Self::StrongBuy => "강력 매수",
            Self::Buy => "매수",
            Self::Hold => "보유(중립)",
            Self::Underperform => "수익률 하회",
            Self::Sell => "매도",
            Self::StrongSell => "강력 매도",
        }
    }
}

/// Label for an optional recommendation
pub fn recommendation_label(rec: Option<Recommendation>) -> &'static str {
    rec.map_or("의견 없음", Recommendation::label)
}

/// Market snapshot of one stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub previous_close: f64,
    pub year_high: f64,
    pub year_low: f64,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub target_price: Option<f64>,
    /// Raw provider value; see [`crate::classifier::YieldUnit`]
    pub dividend_yield: Option<f64>,
    pub earnings_date: Option<NaiveDate>,
    pub recommendation: Option<Recommendation>,
}

/// Index level shown in the report header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexReading {
    pub label: String,
    pub symbol: String,
    pub level: f64,
    pub previous_close: f64,
}

/// A fetched news article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub source: Option<String>,
    pub description: Option<String>,
    /// Filled in by a translating enricher
    pub translated_title: Option<String>,
}

impl NewsItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            source: None,
            description: None,
            translated_title: None,
        }
    }

    /// Title to show: the translation when present
    pub fn display_title(&self) -> &str {
        self.translated_title.as_deref().unwrap_or(&self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_labels() {
        assert_eq!(Recommendation::from_key("STRONG_BUY"), Some(Recommendation::StrongBuy));
        assert_eq!(Recommendation::from_key("none"), None);
        assert_eq!(recommendation_label(Some(Recommendation::Hold)), "보유(중립)");
        assert_eq!(recommendation_label(None), "의견 없음");
    }

    #[test]
    fn test_display_title_prefers_translation() {
        let mut item = NewsItem::new("Apple beats estimates", "https://example.com/a");
        assert_eq!(item.display_title(), "Apple beats estimates");

        item.translated_title = Some("애플, 예상치 상회".to_string());
        assert_eq!(item.display_title(), "애플, 예상치 상회");
    }
}
