//! Yahoo Finance client
//!
//! Price history comes from the chart endpoint through `yahoo_finance_api`;
//! fundamentals (target price, P/E, dividend yield, market cap, earnings
//! date, recommendation) come from the quote-summary endpoint, which only
//! answers requests carrying a session cookie and its matching crumb.

use crate::classifier::YieldUnit;
use crate::error::{Result, StockError};
use crate::market::MarketDataSource;
use crate::model::{Instrument, IndexReading, Recommendation, RosterEntry};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::redirect::Policy;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use yahoo_finance_api as yahoo;

const QUOTE_SUMMARY_BASE: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const SUMMARY_MODULES: &str = "financialData,summaryDetail,calendarEvents";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query2.finance.yahoo.com/v1/test/getcrumb";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; market-brief/0.1)";

/// Yahoo Finance client
pub struct YahooFinanceClient {
    connector: yahoo::YahooConnector,
    client: Client,
    summary_base: String,
    cookie_url: String,
    crumb_url: String,
    /// Reused for the whole run; dropped when Yahoo rejects it
    session: Mutex<Option<Session>>,
}

/// Cookie and crumb for quote-summary requests
#[derive(Debug, Clone, PartialEq, Eq)]
struct Session {
    cookie: String,
    crumb: String,
}

/// High/low/close of one daily bar
#[derive(Debug, Clone, Copy, PartialEq)]
struct PriceBar {
    high: f64,
    low: f64,
    close: f64,
}

/// Price figures derived from a year of daily bars
#[derive(Debug, Clone, Copy, PartialEq)]
struct PriceHistory {
    price: f64,
    previous_close: f64,
    year_high: f64,
    year_low: f64,
}

/// Fundamentals from the quote-summary endpoint
#[derive(Debug, Clone, Default, PartialEq)]
struct Fundamentals {
    market_cap: Option<f64>,
    trailing_pe: Option<f64>,
    target_price: Option<f64>,
    dividend_yield: Option<f64>,
    earnings_date: Option<NaiveDate>,
    recommendation: Option<Recommendation>,
}

impl YahooFinanceClient {
    /// Create a new Yahoo Finance client
    pub fn new(timeout: Duration) -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;
        // Cookies must be read from the first response, not a redirect target
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            connector,
            client,
            summary_base: QUOTE_SUMMARY_BASE.to_string(),
            cookie_url: COOKIE_URL.to_string(),
            crumb_url: CRUMB_URL.to_string(),
            session: Mutex::new(None),
        })
    }

    /// Point the quote-summary calls at other endpoints
    pub fn with_summary_endpoints(
        mut self,
        cookie_url: impl Into<String>,
        crumb_url: impl Into<String>,
        summary_base: impl Into<String>,
    ) -> Self {
        self.cookie_url = cookie_url.into();
        self.crumb_url = crumb_url.into();
        self.summary_base = summary_base.into();
        self
    }

    async fn bars(&self, symbol: &str, range: &str) -> Result<Vec<PriceBar>> {
        let response = self
            .connector
            .get_quote_range(symbol, "1d", range)
            .await
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;

        Ok(quotes
            .iter()
            .map(|q| PriceBar {
                high: q.high,
                low: q.low,
                close: q.close,
            })
            .collect())
    }

    /// Price, previous close and 52-week range for a symbol
    async fn price_history(&self, symbol: &str) -> Result<PriceHistory> {
        let bars = self.bars(symbol, "1y").await?;
        summarize_bars(&bars).ok_or_else(|| StockError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "fewer than two daily bars".to_string(),
        })
    }

    /// Current session, establishing one if needed
    async fn session(&self) -> Result<Session> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }
        let session = self.handshake().await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn handshake(&self) -> Result<Session> {
        let response = self.client.get(&self.cookie_url).send().await?;
        let cookie = cookie_header(
            response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );
        if cookie.is_empty() {
            return Err(StockError::FeedError(
                "Yahoo did not set a session cookie".to_string(),
            ));
        }

        let response = self
            .client
            .get(&self.crumb_url)
            .header(COOKIE, &cookie)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        let crumb = parse_crumb(status, &body)?;

        debug!("Yahoo session established");
        Ok(Session { cookie, crumb })
    }

    async fn fundamentals(&self, symbol: &str) -> Result<Fundamentals> {
        let session = self.session().await?;
        let url = format!("{}/{}", self.summary_base, symbol);
        let response = self
            .client
            .get(&url)
            .header(COOKIE, &session.cookie)
            .query(&[("modules", SUMMARY_MODULES), ("crumb", session.crumb.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            if matches!(status, 401 | 403) {
                warn!("Yahoo rejected the session (HTTP {status}); it will be renewed");
                *self.session.lock().await = None;
            }
            return Err(summary_status_error(symbol, status, &body));
        }

        let envelope: SummaryEnvelope = response.json().await?;
        parse_fundamentals(symbol, envelope)
    }
}

#[async_trait]
impl MarketDataSource for YahooFinanceClient {
    #[instrument(skip(self, entry), fields(symbol = %entry.symbol))]
    async fn instrument(&self, entry: &RosterEntry) -> Result<Instrument> {
        let history = self.price_history(&entry.symbol).await?;
        let fundamentals = self.fundamentals(&entry.symbol).await?;
        debug!("Fetched {} at {:.2}", entry.symbol, history.price);

        Ok(Instrument {
            symbol: entry.symbol.clone(),
            name: entry.name.clone(),
            price: history.price,
            previous_close: history.previous_close,
            year_high: history.year_high,
            year_low: history.year_low,
            market_cap: fundamentals.market_cap,
            trailing_pe: fundamentals.trailing_pe,
            target_price: fundamentals.target_price,
            dividend_yield: fundamentals.dividend_yield,
            earnings_date: fundamentals.earnings_date,
            recommendation: fundamentals.recommendation,
        })
    }

    #[instrument(skip(self))]
    async fn index(&self, label: &str, symbol: &str) -> Result<IndexReading> {
        let bars = self.bars(symbol, "5d").await?;
        let history = summarize_bars(&bars).ok_or_else(|| StockError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "fewer than two daily bars".to_string(),
        })?;

        Ok(IndexReading {
            label: label.to_string(),
            symbol: symbol.to_string(),
            level: history.price,
            previous_close: history.previous_close,
        })
    }

    fn yield_unit(&self) -> YieldUnit {
        YieldUnit::Fraction
    }
}

/// Last close, the close before it, and the high/low over all bars
fn summarize_bars(bars: &[PriceBar]) -> Option<PriceHistory> {
    let valid: Vec<&PriceBar> = bars.iter().filter(|b| b.close > 0.0).collect();
    let [.., previous, last] = valid.as_slice() else {
        return None;
    };

    let year_high = valid.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let year_low = valid
        .iter()
        .map(|b| b.low)
        .filter(|l| *l > 0.0)
        .reduce(f64::min)
        .unwrap_or(0.0);

    Some(PriceHistory {
        price: last.close,
        previous_close: previous.close,
        year_high,
        year_low,
    })
}

/// `Cookie` header value from `Set-Cookie` lines
fn cookie_header<'a>(set_cookies: impl IntoIterator<Item = &'a str>) -> String {
    set_cookies
        .into_iter()
        .filter_map(|line| line.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect::<Vec<_>>()
        .join("; ")
}

fn parse_crumb(status: u16, body: &str) -> Result<String> {
    let crumb = body.trim();
    if status == 429 {
        return Err(StockError::ApiError(
            "Yahoo crumb HTTP 429: Too Many Requests".to_string(),
        ));
    }
    if !(200..300).contains(&status)
        || crumb.is_empty()
        || crumb.contains(char::is_whitespace)
        || crumb.contains('<')
    {
        return Err(StockError::FeedError(format!(
            "Yahoo crumb unavailable (HTTP {status})"
        )));
    }
    Ok(crumb.to_string())
}

/// Rejected sessions are retryable; the next attempt renews the session
fn summary_status_error(symbol: &str, status: u16, body: &str) -> StockError {
    match status {
        401 | 403 => StockError::FeedError(format!(
            "Yahoo quote summary HTTP {status} for {symbol}: session rejected"
        )),
        404 => StockError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "quote summary not found".to_string(),
        },
        _ => StockError::ApiError(format!("Yahoo quote summary HTTP {status}: {body}")),
    }
}

fn parse_fundamentals(symbol: &str, envelope: SummaryEnvelope) -> Result<Fundamentals> {
    if let Some(error) = envelope.quote_summary.error {
        return Err(StockError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: error.description.unwrap_or_else(|| "quote summary error".to_string()),
        });
    }

    let result = envelope
        .quote_summary
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| StockError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "empty quote summary".to_string(),
        })?;

    let financial = result.financial_data.unwrap_or_default();
    let detail = result.summary_detail.unwrap_or_default();
    let earnings_date = result
        .calendar_events
        .and_then(|c| c.earnings)
        .and_then(|e| e.earnings_date.into_iter().find_map(|d| d.raw))
        .and_then(|ts| DateTime::from_timestamp(ts as i64, 0))
        .map(|dt| dt.date_naive());

    Ok(Fundamentals {
        market_cap: detail.market_cap.raw,
        trailing_pe: detail.trailing_pe.raw,
        target_price: financial.target_mean_price.raw,
        dividend_yield: detail.dividend_yield.raw,
        earnings_date,
        recommendation: financial
            .recommendation_key
            .as_deref()
            .and_then(Recommendation::from_key),
    })
}

// ============================================================================
// Quote-summary response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryEnvelope {
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    #[serde(default)]
    result: Option<Vec<SummaryResult>>,
    #[serde(default)]
    error: Option<SummaryError>,
}

#[derive(Debug, Deserialize)]
struct SummaryError {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    #[serde(default)]
    financial_data: Option<FinancialData>,
    #[serde(default)]
    summary_detail: Option<SummaryDetail>,
    #[serde(default)]
    calendar_events: Option<CalendarEvents>,
}

/// `{"raw": 1.23, "fmt": "1.23"}`; Yahoo sends `{}` when the value is missing
#[derive(Debug, Default, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    #[serde(default)]
    target_mean_price: RawValue,
    #[serde(default)]
    recommendation_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    #[serde(default, rename = "trailingPE")]
    trailing_pe: RawValue,
    #[serde(default)]
    dividend_yield: RawValue,
    #[serde(default)]
    market_cap: RawValue,
}

#[derive(Debug, Deserialize)]
struct CalendarEvents {
    #[serde(default)]
    earnings: Option<EarningsEvents>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarningsEvents {
    #[serde(default)]
    earnings_date: Vec<RawValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar { high, low, close }
    }

    #[test]
    fn test_summarize_bars() {
        let bars = vec![
            bar(110.0, 90.0, 100.0),
            bar(130.0, 95.0, 120.0),
            bar(125.0, 85.0, 118.0),
            bar(0.0, 0.0, 0.0),
        ];
        let history = summarize_bars(&bars).unwrap();
        assert_eq!(history.price, 118.0);
        assert_eq!(history.previous_close, 120.0);
        assert_eq!(history.year_high, 130.0);
        assert_eq!(history.year_low, 85.0);
    }

    #[test]
    fn test_summarize_needs_two_bars() {
        assert!(summarize_bars(&[bar(1.0, 1.0, 1.0)]).is_none());
        assert!(summarize_bars(&[]).is_none());
    }

    #[test]
    fn test_parse_fundamentals() {
        let raw = r#"{
            "quoteSummary": {
                "result": [{
                    "financialData": {
                        "targetMeanPrice": {"raw": 245.5, "fmt": "245.50"},
                        "recommendationKey": "buy"
                    },
                    "summaryDetail": {
                        "trailingPE": {"raw": 31.2, "fmt": "31.20"},
                        "dividendYield": {"raw": 0.0044, "fmt": "0.44%"},
                        "marketCap": {"raw": 3460000000000.0, "fmt": "3.46T"}
                    },
                    "calendarEvents": {
                        "earnings": {"earningsDate": [{"raw": 1761854400, "fmt": "2025-10-30"}]}
                    }
                }],
                "error": null
            }
        }"#;
        let envelope: SummaryEnvelope = serde_json::from_str(raw).unwrap();
        let f = parse_fundamentals("AAPL", envelope).unwrap();

        assert_eq!(f.target_price, Some(245.5));
        assert_eq!(f.trailing_pe, Some(31.2));
        assert_eq!(f.dividend_yield, Some(0.0044));
        assert_eq!(f.market_cap, Some(3.46e12));
        assert_eq!(f.recommendation, Some(Recommendation::Buy));
        assert_eq!(f.earnings_date, NaiveDate::from_ymd_opt(2025, 10, 30));
    }

    #[test]
    fn test_parse_fundamentals_missing_values() {
        let raw = r#"{
            "quoteSummary": {
                "result": [{
                    "financialData": {"targetMeanPrice": {}, "recommendationKey": "none"},
                    "summaryDetail": {"trailingPE": {}, "dividendYield": {}}
                }],
                "error": null
            }
        }"#;
        let envelope: SummaryEnvelope = serde_json::from_str(raw).unwrap();
        let f = parse_fundamentals("PLTR", envelope).unwrap();
        assert_eq!(f, Fundamentals::default());
    }

    #[test]
    fn test_parse_fundamentals_error() {
        let raw = r#"{
            "quoteSummary": {
                "result": null,
                "error": {"code": "Not Found", "description": "Quote not found for symbol: ZZZZ"}
            }
        }"#;
        let envelope: SummaryEnvelope = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            parse_fundamentals("ZZZZ", envelope),
            Err(StockError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn test_cookie_header() {
        let header = cookie_header([
            "A3=d=AQABBK8; Expires=Sat, 17 Oct 2027 07:30:00 GMT; Domain=.yahoo.com; Path=/; Secure",
            "A1S=d=AQABBK8&j=WORLD; Domain=.yahoo.com; Path=/",
            "garbage",
        ]);
        assert_eq!(header, "A3=d=AQABBK8; A1S=d=AQABBK8&j=WORLD");
    }

    #[test]
    fn test_parse_crumb() {
        assert_eq!(parse_crumb(200, "sGzvD0vWFrl\n").unwrap(), "sGzvD0vWFrl");
        assert!(matches!(parse_crumb(401, "Unauthorized"), Err(StockError::FeedError(_))));
        assert!(matches!(parse_crumb(200, "<html>"), Err(StockError::FeedError(_))));
        assert!(parse_crumb(429, "Too Many Requests").unwrap_err().is_quota());
    }

    #[test]
    fn test_unauthorized_summary_is_retryable() {
        let err = summary_status_error(
            "AAPL",
            401,
            r#"{"finance":{"result":null,"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#,
        );
        assert!(err.is_transient());
        assert!(!err.is_quota());
        assert!(matches!(
            summary_status_error("ZZZZ", 404, ""),
            StockError::DataUnavailable { .. }
        ));
    }

    const SUMMARY_BODY: &str = r#"{
        "quoteSummary": {
            "result": [{
                "financialData": {"targetMeanPrice": {"raw": 245.5}, "recommendationKey": "buy"},
                "summaryDetail": {"trailingPE": {"raw": 31.2}, "dividendYield": {"raw": 0.0044}}
            }],
            "error": null
        }
    }"#;

    fn stub_client(server: &mockito::ServerGuard) -> YahooFinanceClient {
        let base = server.url();
        YahooFinanceClient::new(Duration::from_secs(5))
            .unwrap()
            .with_summary_endpoints(
                format!("{base}/"),
                format!("{base}/v1/test/getcrumb"),
                format!("{base}/v10/finance/quoteSummary"),
            )
    }

    async fn mock_handshake(server: &mut mockito::ServerGuard, hits: usize) -> (mockito::Mock, mockito::Mock) {
        let cookie = server
            .mock("GET", "/")
            .with_status(404)
            .with_header("set-cookie", "A3=d=AQABBK8; Domain=.yahoo.com; Path=/; Secure")
            .expect(hits)
            .create_async()
            .await;
        let crumb = server
            .mock("GET", "/v1/test/getcrumb")
            .match_header("cookie", "A3=d=AQABBK8")
            .with_status(200)
            .with_body("sGzvD0vWFrl")
            .expect(hits)
            .create_async()
            .await;
        (cookie, crumb)
    }

    #[tokio::test]
    async fn test_fundamentals_send_cookie_and_crumb() {
        let mut server = mockito::Server::new_async().await;
        let (cookie, crumb) = mock_handshake(&mut server, 1).await;
        let summary = server
            .mock("GET", "/v10/finance/quoteSummary/AAPL")
            .match_header("cookie", "A3=d=AQABBK8")
            .match_query(mockito::Matcher::UrlEncoded("crumb".into(), "sGzvD0vWFrl".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SUMMARY_BODY)
            .expect(2)
            .create_async()
            .await;

        let client = stub_client(&server);
        let first = client.fundamentals("AAPL").await.unwrap();
        let second = client.fundamentals("AAPL").await.unwrap();

        assert_eq!(first.target_price, Some(245.5));
        assert_eq!(first.recommendation, Some(Recommendation::Buy));
        assert_eq!(first, second);
        cookie.assert_async().await;
        crumb.assert_async().await;
        summary.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_crumb_drops_session() {
        let mut server = mockito::Server::new_async().await;
        let _handshake = mock_handshake(&mut server, 1).await;
        let _summary = server
            .mock("GET", "/v10/finance/quoteSummary/AAPL")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body(r#"{"finance":{"result":null,"error":{"code":"Unauthorized","description":"Invalid Crumb"}}}"#)
            .create_async()
            .await;

        let client = stub_client(&server);
        let err = client.fundamentals("AAPL").await.unwrap_err();

        assert!(err.is_transient());
        assert!(client.session.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_cookie_fails_handshake() {
        let mut server = mockito::Server::new_async().await;
        let _cookie = server.mock("GET", "/").with_status(404).create_async().await;

        let client = stub_client(&server);
        assert!(matches!(
            client.fundamentals("AAPL").await,
            Err(StockError::FeedError(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_instrument() {
        let client = YahooFinanceClient::new(Duration::from_secs(10)).unwrap();
        let instrument = client
            .instrument(&RosterEntry::new("AAPL", "애플"))
            .await
            .unwrap();
        assert_eq!(instrument.symbol, "AAPL");
        assert!(instrument.price > 0.0);
    }
}
