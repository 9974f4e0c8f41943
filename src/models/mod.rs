use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Candle period length
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    M5,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M5 => "5m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        match self {
            Timeframe::M5 => chrono::Duration::minutes(5),
            Timeframe::H1 => chrono::Duration::hours(1),
            Timeframe::H4 => chrono::Duration::hours(4),
            Timeframe::D1 => chrono::Duration::days(1),
        }
    }

    /// Number of 5-minute candles that make up one period of this timeframe
    pub fn base_candles(&self) -> usize {
        match self {
            Timeframe::M5 => 1,
            Timeframe::H1 => 12,
            Timeframe::H4 => 48,
            Timeframe::D1 => 288,
        }
    }

    /// True for timeframes derived from 5-minute candles by rollup
    pub fn is_aggregated(&self) -> bool {
        !matches!(self, Timeframe::M5)
    }

    /// Floor a timestamp to the start of the period containing it
    ///
    /// All supported periods divide a UTC day evenly, so flooring in epoch
    /// seconds is exact (1h candles get zero minutes/seconds, 1d candles get
    /// midnight).
    pub fn floor(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let period = self.duration().num_seconds();
        let floored = ts.timestamp() - ts.timestamp().rem_euclid(period);
        Utc.timestamp_opt(floored, 0).unwrap()
    }

    pub fn all() -> [Timeframe; 4] {
        [Timeframe::M5, Timeframe::H1, Timeframe::H4, Timeframe::D1]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "5m" => Ok(Timeframe::M5),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(format!("unknown timeframe: {}", other)),
        }
    }
}

/// Where a candle came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataSource {
    Feed,
    Aggregated,
    Synthetic,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Feed => "feed",
            DataSource::Aggregated => "aggregated",
            DataSource::Synthetic => "synthetic",
        }
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "feed" => Ok(DataSource::Feed),
            "aggregated" => Ok(DataSource::Aggregated),
            "synthetic" => Ok(DataSource::Synthetic),
            other => Err(format!("unknown data source: {}", other)),
        }
    }
}

/// OHLCV candlestick for one currency pair and period
///
/// (pair, timeframe, timestamp) is unique; timestamp is the period start,
/// floored to the period boundary. The `calculated` fields belong to the
/// differential tracker and mark whether indicators have been computed for
/// this candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub id: Uuid,
    pub pair: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub timeframe: Timeframe,
    pub source: DataSource,
    pub calculated: bool,
    pub calculated_at: Option<DateTime<Utc>>,
    pub calc_version: i32,
}

impl Candle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pair: &str,
        timeframe: Timeframe,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: i64,
        source: DataSource,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pair: pair.to_string(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            timeframe,
            source,
            calculated: false,
            calculated_at: None,
            calc_version: 0,
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Absolute body size
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Full high-low range
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    /// Body as a fraction of the full range, 0 when the range is zero
    pub fn body_ratio(&self) -> f64 {
        let range = self.range();
        if range <= 0.0 {
            0.0
        } else {
            self.body() / range
        }
    }
}

/// Trade direction implied by a pattern
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Bullish => "bullish",
            Direction::Bearish => "bearish",
        }
    }
}

/// Ordinal importance bucket used to arbitrate simultaneous matches
///
/// Variants are declared lowest-first so the derived `Ord` ranks
/// `VeryHigh` above everything else.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum PatternPriority {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl PatternPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternPriority::VeryLow => "very_low",
            PatternPriority::Low => "low",
            PatternPriority::Medium => "medium",
            PatternPriority::High => "high",
            PatternPriority::VeryHigh => "very_high",
        }
    }
}

/// One detector's finding for one window
///
/// Immutable once created; the analyzer consumes it the same cycle.
/// `take_profit` and `stop_loss` are price distances from the reference
/// close, not absolute levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    pub detector_id: String,
    pub name: String,
    pub priority: PatternPriority,
    pub direction: Direction,
    pub confidence: f64,
    pub timeframe: Timeframe,
    pub conditions: Vec<String>,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub description: String,
    pub detected_at: DateTime<Utc>,
}

/// The analyzer's single winning match for one cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedPattern {
    pub pair: String,
    pub pattern: PatternMatch,
    pub selected_at: DateTime<Utc>,
}

/// Validate that candles are consecutive periods of the given timeframe
///
/// Allows up to 1.5x the period between neighbors to tolerate single missing
/// candles; anything wider is a data gap the indicators should not see.
pub fn validate_candle_spacing(candles: &[Candle], timeframe: Timeframe) -> anyhow::Result<()> {
    if candles.len() < 2 {
        return Ok(());
    }

    let expected_secs = timeframe.duration().num_seconds();
    let max_gap_secs = expected_secs + expected_secs / 2;

    for window in candles.windows(2) {
        let diff = (window[1].timestamp - window[0].timestamp).num_seconds();

        if diff < 0 {
            anyhow::bail!("candles are not sorted by timestamp");
        }
        if diff > max_gap_secs {
            anyhow::bail!(
                "data gap: {}s between candles (expected ~{}s, max allowed {}s), from {} to {}",
                diff,
                expected_secs,
                max_gap_secs,
                window[0].timestamp.format("%Y-%m-%d %H:%M"),
                window[1].timestamp.format("%Y-%m-%d %H:%M")
            );
        }
    }

    Ok(())
}
