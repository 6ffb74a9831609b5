//! Threshold-based metric classification
//!
//! Every function here is pure: the same raw input and [`Thresholds`] always
//! give the same category. Interval convention: comparisons are strict
//! where the threshold table says `<`/`>` and inclusive where it says `≥`,
//! so an upside of exactly 15% or exactly 0% is neutral.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::Instrument;

const BLUE: &str = "#1a73e8";
const RED: &str = "#d93025";
const AMBER: &str = "#f9ab00";
const INK: &str = "#111";
const GREY: &str = "#666";

/// Three-way classification of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Favorable,
    Neutral,
    Unfavorable,
}

/// Which metric a [`ClassifiedMetric`] describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Analyst target vs. current price, percent
    Upside,
    /// Trailing P/E ratio
    PriceEarnings,
    /// Dividend yield, percent
    DividendYield,
    /// Distance above the 52-week low, percent
    LowDistance,
}

/// A raw value with its category and display colour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedMetric {
    pub kind: MetricKind,
    /// `None` only for an unavailable P/E
    pub value: Option<f64>,
    /// `None` when the value is unavailable
    pub category: Option<Category>,
}

impl ClassifiedMetric {
    fn new(kind: MetricKind, value: f64, category: Category) -> Self {
        Self {
            kind,
            value: Some(value),
            category: Some(category),
        }
    }

    /// Presentation colour
    pub fn color(&self) -> &'static str {
        match self.category {
            Some(Category::Favorable) => BLUE,
            Some(Category::Unfavorable) => RED,
            Some(Category::Neutral) => match self.kind {
                MetricKind::Upside | MetricKind::LowDistance => INK,
                MetricKind::PriceEarnings | MetricKind::DividendYield => AMBER,
            },
            None => GREY,
        }
    }

    /// Formatted value, e.g. `+12.3%`, `28.4`, `2.50%`, or `-` when unavailable
    pub fn display(&self) -> String {
        match (self.kind, self.value) {
            (_, None) => "-".to_string(),
            (MetricKind::Upside | MetricKind::LowDistance, Some(v)) => format!("{v:+.1}%"),
            (MetricKind::PriceEarnings, Some(v)) => format!("{v:.1}"),
            (MetricKind::DividendYield, Some(v)) => format!("{v:.2}%"),
        }
    }
}

/// Attention flags attached to an instrument for the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    HighVolatility,
    NearYearHigh,
    EarningsImminent,
}

impl Flag {
    pub fn icon(self) -> &'static str {
        match self {
            Flag::HighVolatility => "⚠️",
            Flag::NearYearHigh => "✨",
            Flag::EarningsImminent => "🚩",
        }
    }
}

/// Volatility-index bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FearLevel {
    Calm,
    Caution,
    Alarm,
}

impl FearLevel {
    pub fn color(self) -> &'static str {
        match self {
            FearLevel::Calm => BLUE,
            FearLevel::Caution => AMBER,
            FearLevel::Alarm => RED,
        }
    }
}

/// Unit convention of a provider's dividend-yield field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YieldUnit {
    /// `0.025` means 2.5%
    Fraction,
    /// `2.5` means 2.5%
    Percent,
    /// Values above 0.1 are taken as percent, others as fractions
    Auto,
}

impl std::str::FromStr for YieldUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fraction" => Ok(Self::Fraction),
            "percent" => Ok(Self::Percent),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown yield unit '{other}'")),
        }
    }
}

/// Cut-points for every classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Upside strictly above this is favorable
    pub upside_favorable_above: f64,
    /// Upside strictly below this is unfavorable
    pub upside_unfavorable_below: f64,
    pub pe_favorable_below: f64,
    pub pe_unfavorable_above: f64,
    /// Yield at or above this is favorable
    pub dividend_favorable_at: f64,
    /// Yield at or above this (and below favorable) is neutral
    pub dividend_neutral_at: f64,
    pub low_distance_favorable_below: f64,
    pub low_distance_unfavorable_above: f64,
    /// Absolute daily change at or above this raises [`Flag::HighVolatility`]
    pub volatility_flag_at: f64,
    /// Price at or above `year_high * ratio` raises [`Flag::NearYearHigh`]
    pub new_high_ratio: f64,
    pub earnings_window_days: i64,
    pub fear_calm_below: f64,
    pub fear_caution_below: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            upside_favorable_above: 15.0,
            upside_unfavorable_below: 0.0,
            pe_favorable_below: 25.0,
            pe_unfavorable_above: 40.0,
            dividend_favorable_at: 3.0,
            dividend_neutral_at: 1.0,
            low_distance_favorable_below: 10.0,
            low_distance_unfavorable_above: 30.0,
            volatility_flag_at: 3.5,
            new_high_ratio: 0.98,
            earnings_window_days: 7,
            fear_calm_below: 20.0,
            fear_caution_below: 30.0,
        }
    }
}

/// Classified view of one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Daily change, percent
    pub pct_change: f64,
    pub upside: ClassifiedMetric,
    pub price_earnings: ClassifiedMetric,
    pub dividend_yield: ClassifiedMetric,
    pub low_distance: ClassifiedMetric,
    pub flags: Vec<Flag>,
}

impl Assessment {
    /// Flag icons concatenated, e.g. `⚠️✨`
    pub fn flag_icons(&self) -> String {
        self.flags.iter().map(|f| f.icon()).collect()
    }
}

/// Classify every metric of an instrument
pub fn assess(
    instrument: &Instrument,
    thresholds: &Thresholds,
    yield_unit: YieldUnit,
    today: NaiveDate,
) -> Assessment {
    let pct = pct_change(instrument.price, instrument.previous_close);

    let upside = upside_pct(instrument.target_price, instrument.price);
    let dividend = normalize_dividend_yield(instrument.dividend_yield, yield_unit);
    let low = low_distance_pct(instrument.price, instrument.year_low);

    let mut flags = Vec::new();
    if is_volatile(pct, thresholds) {
        flags.push(Flag::HighVolatility);
    }
    if is_near_year_high(instrument.price, instrument.year_high, thresholds) {
        flags.push(Flag::NearYearHigh);
    }
    if is_earnings_imminent(instrument.earnings_date, today, thresholds) {
        flags.push(Flag::EarningsImminent);
    }

    Assessment {
        pct_change: pct,
        upside: ClassifiedMetric::new(MetricKind::Upside, upside, classify_upside(upside, thresholds)),
        price_earnings: classify_pe(instrument.trailing_pe, thresholds),
        dividend_yield: ClassifiedMetric::new(
            MetricKind::DividendYield,
            dividend,
            classify_dividend(dividend, thresholds),
        ),
        low_distance: ClassifiedMetric::new(
            MetricKind::LowDistance,
            low,
            classify_low_distance(low, thresholds),
        ),
        flags,
    }
}

/// Percentage change from `previous` to `current`; 0 when `previous` is not positive
pub fn pct_change(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

/// Upside to the analyst target; 0 when the target is missing or zero
pub fn upside_pct(target: Option<f64>, current: f64) -> f64 {
    match target {
        Some(t) if t > 0.0 && current > 0.0 => (t / current - 1.0) * 100.0,
        _ => 0.0,
    }
}

pub fn classify_upside(upside: f64, t: &Thresholds) -> Category {
    if upside > t.upside_favorable_above {
        Category::Favorable
    } else if upside < t.upside_unfavorable_below {
        Category::Unfavorable
    } else {
        Category::Neutral
    }
}

/// Classify a P/E ratio; missing or non-finite values are unavailable
pub fn classify_pe(pe: Option<f64>, t: &Thresholds) -> ClassifiedMetric {
    let Some(pe) = pe.filter(|v| v.is_finite()) else {
        return ClassifiedMetric {
            kind: MetricKind::PriceEarnings,
            value: None,
            category: None,
        };
    };

    let category = if pe < t.pe_favorable_below {
        Category::Favorable
    } else if pe > t.pe_unfavorable_above {
        Category::Unfavorable
    } else {
        Category::Neutral
    };
    ClassifiedMetric::new(MetricKind::PriceEarnings, pe, category)
}

/// Convert a raw dividend yield to percent; missing means 0
pub fn normalize_dividend_yield(raw: Option<f64>, unit: YieldUnit) -> f64 {
    let Some(raw) = raw.filter(|v| v.is_finite()) else {
        return 0.0;
    };
    match unit {
        YieldUnit::Fraction => raw * 100.0,
        YieldUnit::Percent => raw,
        YieldUnit::Auto if raw > 0.1 => {
            tracing::debug!("Treating dividend yield {} as already in percent", raw);
            raw
        }
        YieldUnit::Auto => raw * 100.0,
    }
}

pub fn classify_dividend(pct: f64, t: &Thresholds) -> Category {
    if pct >= t.dividend_favorable_at {
        Category::Favorable
    } else if pct >= t.dividend_neutral_at {
        Category::Neutral
    } else {
        Category::Unfavorable
    }
}

/// Distance above the 52-week low in percent; 0 when the low is not positive
pub fn low_distance_pct(current: f64, year_low: f64) -> f64 {
    if year_low > 0.0 {
        (current / year_low - 1.0) * 100.0
    } else {
        0.0
    }
}

pub fn classify_low_distance(distance: f64, t: &Thresholds) -> Category {
    if distance < t.low_distance_favorable_below {
        Category::Favorable
    } else if distance > t.low_distance_unfavorable_above {
        Category::Unfavorable
    } else {
        Category::Neutral
    }
}

pub fn is_volatile(pct_change: f64, t: &Thresholds) -> bool {
    pct_change.abs() >= t.volatility_flag_at
}

pub fn is_near_year_high(current: f64, year_high: f64, t: &Thresholds) -> bool {
    year_high > 0.0 && current >= year_high * t.new_high_ratio
}

pub fn is_earnings_imminent(date: Option<NaiveDate>, today: NaiveDate, t: &Thresholds) -> bool {
    date.is_some_and(|d| {
        let days = (d - today).num_days();
        (0..=t.earnings_window_days).contains(&days)
    })
}

pub fn classify_fear(level: f64, t: &Thresholds) -> FearLevel {
    if level < t.fear_calm_below {
        FearLevel::Calm
    } else if level < t.fear_caution_below {
        FearLevel::Caution
    } else {
        FearLevel::Alarm
    }
}

/// Price-move colour: red for gains, blue otherwise
pub fn change_color(pct: f64) -> &'static str {
    if pct > 0.0 { RED } else { BLUE }
}

/// Header background paired with [`change_color`]
pub fn change_background(pct: f64) -> &'static str {
    if pct > 0.0 { "#fce8e6" } else { "#e8f0fe" }
}

/// Market cap in trillions, e.g. `3.4T`
pub fn format_market_cap(cap: Option<f64>) -> String {
    format!("{:.1}T", cap.unwrap_or(0.0) / 1_000_000_000_000.0)
}

/// Price with thousands separators and two decimals, e.g. `1,234.50`
pub fn format_price(price: f64) -> String {
    let fixed = format!("{:.2}", price.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    // -0.001 rounds to zero and must not print as "-0.00"
    let sign = if price < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}
