//! Roster strategies: which tickers a run covers, in order

use crate::api::SheetsClient;
use crate::error::{Result, StockError};
use crate::model::RosterEntry;
use async_trait::async_trait;
use tracing::info;

/// Built-in roster: sixteen large US stocks with their Korean names
pub const DEFAULT_ROSTER: &[(&str, &str)] = &[
    ("AAPL", "애플"),
    ("MSFT", "마이크로소프트"),
    ("NVDA", "엔비디아"),
    ("GOOGL", "알파벳"),
    ("AMZN", "아마존"),
    ("META", "메타"),
    ("TSLA", "테슬라"),
    ("AVGO", "브로드컴"),
    ("LLY", "일라이 릴리"),
    ("V", "비자"),
    ("JNJ", "존슨앤존슨"),
    ("ORCL", "오라클"),
    ("BRK-B", "버크셔 해서웨이"),
    ("PLTR", "팔란티어"),
    ("WMT", "월마트"),
    ("COST", "코스트코"),
];

/// Produces the ordered, active roster for a run
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn load(&self) -> Result<Vec<RosterEntry>>;
}

/// Fixed roster held in memory
#[derive(Debug, Clone)]
pub struct StaticRoster {
    entries: Vec<RosterEntry>,
}

impl StaticRoster {
    pub fn new(entries: Vec<RosterEntry>) -> Self {
        Self { entries }
    }
}

impl Default for StaticRoster {
    fn default() -> Self {
        Self::new(
            DEFAULT_ROSTER
                .iter()
                .map(|(symbol, name)| RosterEntry::new(*symbol, *name))
                .collect(),
        )
    }
}

#[async_trait]
impl RosterSource for StaticRoster {
    async fn load(&self) -> Result<Vec<RosterEntry>> {
        Ok(self.entries.iter().filter(|e| e.active).cloned().collect())
    }
}

/// Worksheet with `Ticker`, `Name` and `Status` columns
pub struct SheetRoster {
    client: SheetsClient,
    spreadsheet_id: String,
    worksheet: String,
}

impl SheetRoster {
    pub fn new(
        client: SheetsClient,
        spreadsheet_id: impl Into<String>,
        worksheet: impl Into<String>,
    ) -> Self {
        Self {
            client,
            spreadsheet_id: spreadsheet_id.into(),
            worksheet: worksheet.into(),
        }
    }
}

#[async_trait]
impl RosterSource for SheetRoster {
    async fn load(&self) -> Result<Vec<RosterEntry>> {
        let rows = self
            .client
            .values(&self.spreadsheet_id, &self.worksheet)
            .await?;
        let entries = parse_rows(&rows)?;
        info!(
            "Loaded {} active tickers from worksheet '{}'",
            entries.len(),
            self.worksheet
        );
        Ok(entries)
    }
}

/// Turn sheet rows (header first) into the active roster
///
/// Header names are trimmed and matched case-insensitively. Rows without a
/// ticker are ignored; a missing name falls back to the ticker.
pub fn parse_rows(rows: &[Vec<String>]) -> Result<Vec<RosterEntry>> {
    let Some((header, body)) = rows.split_first() else {
        return Ok(Vec::new());
    };

    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| StockError::SheetError(format!("missing '{name}' column")))
    };
    let ticker_col = column("Ticker")?;
    let name_col = column("Name")?;
    let status_col = column("Status")?;

    let cell = |row: &Vec<String>, idx: usize| row.get(idx).map_or("", |c| c.trim()).to_string();

    Ok(body
        .iter()
        .filter_map(|row| {
            let symbol = cell(row, ticker_col);
            if symbol.is_empty() {
                return None;
            }
            let name = cell(row, name_col);
            let active = cell(row, status_col).eq_ignore_ascii_case("active");
            Some(RosterEntry {
                name: if name.is_empty() { symbol.clone() } else { name },
                symbol,
                active,
            })
        })
        .filter(|e| e.active)
        .collect())
}
