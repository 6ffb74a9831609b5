//! Report renderers
//!
//! Renderers work from view structs built here, so the templates only
//! place strings; every number is formatted and every colour picked in Rust.

mod html;
mod text;

pub use html::HtmlRenderer;
pub use text::TextRenderer;

use crate::classifier::{
    ClassifiedMetric, MetricKind, change_background, change_color, format_market_cap, format_price,
};
use crate::error::Result;
use crate::market::IndexSnapshot;
use crate::model::recommendation_label;
use crate::report::{NewsBlock, Report, ReportSection};
use serde::Serialize;

/// Header text when the index snapshot is missing
pub const MARKET_PLACEHOLDER: &str = "시장 데이터 로딩 중...";
/// News text when the provider had nothing
pub const NO_NEWS: &str = "최근 뉴스가 없습니다.";
/// News text when the provider failed
pub const NEWS_UNAVAILABLE: &str = "오늘의 분석 뉴스를 불러오지 못했습니다.";
/// News text once the provider quota is gone
pub const NEWS_QUOTA_EXCEEDED: &str = "⚠️ 뉴스 조회 한도를 초과해 오늘은 뉴스를 생략합니다.";

/// Body encoding of a rendered report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Html,
    Text,
}

/// A finished document ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub subject: String,
    pub body: String,
    pub format: BodyFormat,
}

/// Turns a report into a document
pub trait ReportRenderer: Send + Sync {
    fn render(&self, report: &Report) -> Result<RenderedReport>;
}

// ============================================================================
// View structs
// ============================================================================

#[derive(Debug, Serialize)]
struct ReportView {
    title: String,
    subject: String,
    generated: String,
    show_legend: bool,
    market: Vec<IndexView>,
    market_placeholder: &'static str,
    sections: Vec<SectionView>,
}

#[derive(Debug, Serialize)]
struct IndexView {
    label: String,
    text: String,
    color: &'static str,
}

#[derive(Debug, Serialize)]
struct MetricView {
    text: String,
    color: &'static str,
}

#[derive(Debug, Serialize)]
struct QuoteView {
    pct: String,
    price: String,
    color: &'static str,
    background: &'static str,
    flags: String,
    upside: MetricView,
    low_distance: MetricView,
    price_earnings: MetricView,
    dividend: MetricView,
    opinion: &'static str,
    market_cap: String,
}

#[derive(Debug, Serialize)]
struct NewsItemView {
    title: String,
    /// Only http(s) links are rendered
    url: Option<String>,
    source: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewsView {
    items: Vec<NewsItemView>,
    digest: Option<String>,
    notice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct SectionView {
    symbol: String,
    name: String,
    quote: Option<QuoteView>,
    news: NewsView,
}

fn index_view(snapshot: &IndexSnapshot) -> IndexView {
    match snapshot.fear {
        Some(fear) => IndexView {
            label: snapshot.reading.label.clone(),
            text: format!("{:.2}", snapshot.reading.level),
            color: fear.color(),
        },
        None => IndexView {
            label: snapshot.reading.label.clone(),
            text: format!("{:+.2}%", snapshot.pct_change),
            color: change_color(snapshot.pct_change),
        },
    }
}

fn metric_view(metric: &ClassifiedMetric) -> MetricView {
    let mut text = metric.display();
    if metric.kind == MetricKind::PriceEarnings && metric.value.is_some() {
        text.push('배');
    }
    MetricView {
        text,
        color: metric.color(),
    }
}

fn link_target(url: &str) -> Option<String> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    (lower.starts_with("https://") || lower.starts_with("http://")).then(|| url.to_string())
}

fn news_view(block: &NewsBlock) -> NewsView {
    let notice = |text| NewsView {
        items: Vec::new(),
        digest: None,
        notice: Some(text),
    };
    match block {
        NewsBlock::Articles { items, digest } => NewsView {
            items: items
                .iter()
                .map(|item| NewsItemView {
                    title: item.display_title().to_string(),
                    url: link_target(&item.url),
                    source: item.source.clone(),
                })
                .collect(),
            digest: digest.clone(),
            notice: None,
        },
        NewsBlock::Empty => notice(NO_NEWS),
        NewsBlock::QuotaExceeded => notice(NEWS_QUOTA_EXCEEDED),
        NewsBlock::Unavailable => notice(NEWS_UNAVAILABLE),
    }
}

fn section_view(section: &ReportSection) -> SectionView {
    let quote = section.quote.as_ref().map(|(instrument, assessment)| QuoteView {
        pct: format!("{:+.2}%", assessment.pct_change),
        price: format_price(instrument.price),
        color: change_color(assessment.pct_change),
        background: change_background(assessment.pct_change),
        flags: assessment.flag_icons(),
        upside: metric_view(&assessment.upside),
        low_distance: metric_view(&assessment.low_distance),
        price_earnings: metric_view(&assessment.price_earnings),
        dividend: metric_view(&assessment.dividend_yield),
        opinion: recommendation_label(instrument.recommendation),
        market_cap: format_market_cap(instrument.market_cap),
    });

    SectionView {
        symbol: section.entry.symbol.clone(),
        name: section.entry.name.clone(),
        quote,
        news: news_view(&section.news),
    }
}

fn report_view(report: &Report, show_legend: bool) -> ReportView {
    ReportView {
        title: report.title.clone(),
        subject: report.subject(),
        generated: report.generated_at.format("%Y-%m-%d %H:%M").to_string(),
        show_legend,
        market: report.market.iter().map(index_view).collect(),
        market_placeholder: MARKET_PLACEHOLDER,
        sections: report.sections.iter().map(section_view).collect(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::classifier::{Thresholds, YieldUnit, assess};
    use crate::config::ReportKind;
    use crate::market::IndexSnapshot;
    use crate::model::{IndexReading, Instrument, NewsItem, Recommendation, RosterEntry};
    use crate::report::{NewsBlock, Report, ReportSection};
    use chrono::{Local, NaiveDate, TimeZone};

    pub fn instrument(symbol: &str, name: &str) -> Instrument {
        Instrument {
            symbol: symbol.to_string(),
            name: name.to_string(),
            price: 1236.0,
            previous_close: 1200.0,
            year_high: 1250.0,
            year_low: 900.0,
            market_cap: Some(3.46e12),
            trailing_pe: Some(31.2),
            target_price: Some(1500.0),
            dividend_yield: Some(0.0044),
            earnings_date: None,
            recommendation: Some(Recommendation::Buy),
        }
    }

    pub fn section(symbol: &str, name: &str, news: NewsBlock) -> ReportSection {
        let inst = instrument(symbol, name);
        let assessment = assess(
            &inst,
            &Thresholds::default(),
            YieldUnit::Fraction,
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        );
        ReportSection {
            entry: RosterEntry::new(symbol, name),
            quote: Some((inst, assessment)),
            news,
        }
    }

    pub fn report(kind: ReportKind) -> Report {
        let mut report = Report::new(kind, Local.with_ymd_and_hms(2026, 3, 2, 7, 30, 0).unwrap());
        report.market = vec![
            IndexSnapshot::new(
                IndexReading {
                    label: "나스닥".into(),
                    symbol: "^IXIC".into(),
                    level: 18_100.0,
                    previous_close: 18_000.0,
                },
                &Thresholds::default(),
            ),
            IndexSnapshot::new(
                IndexReading {
                    label: "공포지수(VIX)".into(),
                    symbol: "^VIX".into(),
                    level: 22.5,
                    previous_close: 21.0,
                },
                &Thresholds::default(),
            ),
        ];
        report.sections = vec![
            section(
                "AAPL",
                "애플",
                NewsBlock::Articles {
                    items: vec![NewsItem::new("애플 사상 최고가 마감", "https://news.example/aapl")],
                    digest: None,
                },
            ),
            section("MSFT", "마이크로소프트", NewsBlock::QuotaExceeded),
        ];
        report
    }
}
