//! The assembled report, independent of its output format

use crate::classifier::Assessment;
use crate::config::ReportKind;
use crate::market::IndexSnapshot;
use crate::model::{Instrument, NewsItem, RosterEntry};
use chrono::{DateTime, Local};
use serde::Serialize;

/// News shown under one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NewsBlock {
    /// Articles, with the digest or its fallback text when enrichment ran
    Articles {
        items: Vec<NewsItem>,
        digest: Option<String>,
    },
    /// Provider answered with nothing
    Empty,
    /// Provider quota exhausted earlier in the run
    QuotaExceeded,
    /// Provider failed after retries
    Unavailable,
}

/// One roster entry in the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    pub entry: RosterEntry,
    /// Absent when the report has no market data stage
    pub quote: Option<(Instrument, Assessment)>,
    pub news: NewsBlock,
}

/// Everything a renderer needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub kind: ReportKind,
    pub title: String,
    pub generated_at: DateTime<Local>,
    /// Empty when the header could not be fetched or is not shown
    pub market: Vec<IndexSnapshot>,
    /// In roster order
    pub sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(kind: ReportKind, generated_at: DateTime<Local>) -> Self {
        Self {
            kind,
            title: default_title(kind).to_string(),
            generated_at,
            market: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// Mail subject with the run date
    pub fn subject(&self) -> String {
        match self.kind {
            ReportKind::StockBrief => format!(
                "[{}] 🏛️ {}",
                self.generated_at.format("%m/%d"),
                self.title
            ),
            ReportKind::NewsDigest => format!(
                "[{}] {} 🇺🇸",
                self.generated_at.format("%Y-%m-%d"),
                self.title
            ),
        }
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.entry.symbol.as_str()).collect()
    }
}

fn default_title(kind: ReportKind) -> &'static str {
    match kind {
        ReportKind::StockBrief => "VIP 주식 전략 리포트",
        ReportKind::NewsDigest => "월스트리트 현지 뉴스 요약",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 2, 7, 30, 0).unwrap()
    }

    #[test]
    fn test_subjects_carry_date() {
        let brief = Report::new(ReportKind::StockBrief, at());
        assert_eq!(brief.subject(), "[03/02] 🏛️ VIP 주식 전략 리포트");

        let digest = Report::new(ReportKind::NewsDigest, at());
        assert_eq!(digest.subject(), "[2026-03-02] 월스트리트 현지 뉴스 요약 🇺🇸");
    }

    #[test]
    fn test_news_block_serializes_state() {
        let json = serde_json::to_value(NewsBlock::QuotaExceeded).unwrap();
        assert_eq!(json["state"], "quota_exceeded");

        let json = serde_json::to_value(NewsBlock::Articles {
            items: vec![],
            digest: Some("요약".into()),
        })
        .unwrap();
        assert_eq!(json["state"], "articles");
        assert_eq!(json["digest"], "요약");
    }
}
