use super::atr::calculate_atr;
use super::bollinger::calculate_bollinger_series;
use super::macd::calculate_macd_series;
use super::moving_average::{calculate_ema_series, calculate_sma_series};
use super::rsi::calculate_rsi_series;
use super::stochastic::calculate_stochastic;
use crate::error::{PipelineError, Result};
use crate::models::{Candle, Direction, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Indicator families the engine can compute
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Rsi,
    Macd,
    Bollinger,
    Sma,
    Ema,
    Stochastic,
    Atr,
}

impl IndicatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::Rsi => "RSI",
            IndicatorKind::Macd => "MACD",
            IndicatorKind::Bollinger => "BB",
            IndicatorKind::Sma => "SMA",
            IndicatorKind::Ema => "EMA",
            IndicatorKind::Stochastic => "STOCH",
            IndicatorKind::Atr => "ATR",
        }
    }

    pub fn all() -> [IndicatorKind; 7] {
        [
            IndicatorKind::Rsi,
            IndicatorKind::Macd,
            IndicatorKind::Bollinger,
            IndicatorKind::Sma,
            IndicatorKind::Ema,
            IndicatorKind::Stochastic,
            IndicatorKind::Atr,
        ]
    }
}

/// Overbought/oversold classification shared by RSI and Stochastic
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ThresholdState {
    Overbought,
    Oversold,
    Neutral,
}

/// Slope sign over a short lookback
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

/// MACD regime, read from the line/signal relation and histogram momentum
///
/// Bullish means the MACD line is above the signal line and the histogram is
/// still widening; once the histogram starts shrinking the regime weakens.
/// Bearish mirrors both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MacdState {
    Bullish,
    WeakeningBullish,
    Bearish,
    WeakeningBearish,
}

/// Close position relative to the Bollinger envelope
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BandPosition {
    AboveUpper,
    Inside,
    BelowLower,
}

/// One configured RSI period's reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsiPeriodResult {
    pub period: usize,
    pub value: f64,
    pub state: ThresholdState,
    pub trend: Trend,
}

/// One configured moving-average period's reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaPeriodResult {
    pub period: usize,
    pub value: f64,
    pub price_above: bool,
    pub slope: Trend,
}

/// Secondary values and derived state, one variant per indicator kind
///
/// Multi-period indicators carry all their periods in the one variant, never
/// as separate results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndicatorValues {
    Rsi {
        periods: Vec<RsiPeriodResult>,
    },
    Macd {
        macd: f64,
        signal: f64,
        histogram: f64,
        state: MacdState,
        crossover: Option<Direction>,
        above_zero: bool,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
        position: BandPosition,
        band_walk: u32,
    },
    MovingAverage {
        periods: Vec<MaPeriodResult>,
    },
    Stochastic {
        k: f64,
        d: f64,
        state: ThresholdState,
    },
    Atr {
        value: f64,
    },
}

/// One indicator computation for one (pair, timestamp, kind, timeframe)
///
/// `value` is the kind's primary number (medium-period RSI/MA, the MACD line,
/// the Bollinger middle band, %K, ATR).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorResult {
    pub pair: String,
    pub timestamp: DateTime<Utc>,
    pub kind: IndicatorKind,
    pub timeframe: Timeframe,
    pub value: f64,
    pub values: IndicatorValues,
}

/// All indicator results for one cycle, keyed by kind
pub type IndicatorSet = HashMap<IndicatorKind, IndicatorResult>;

/// Periods and thresholds for every indicator kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub rsi_periods: [usize; 3],
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
    pub ma_periods: [usize; 3],
    pub stoch_k_period: usize,
    pub stoch_k_smooth: usize,
    pub stoch_d_period: usize,
    pub stoch_overbought: f64,
    pub stoch_oversold: f64,
    pub atr_period: usize,
    pub trend_lookback: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_periods: [30, 50, 70],
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_multiplier: 2.0,
            ma_periods: [20, 50, 200],
            stoch_k_period: 14,
            stoch_k_smooth: 3,
            stoch_d_period: 3,
            stoch_overbought: 80.0,
            stoch_oversold: 20.0,
            atr_period: 14,
            trend_lookback: 5,
        }
    }
}

impl IndicatorConfig {
    /// Minimum candles a kind needs before it produces a result
    pub fn required_window(&self, kind: IndicatorKind) -> usize {
        match kind {
            IndicatorKind::Rsi => self.rsi_periods[2] + self.trend_lookback,
            IndicatorKind::Macd => self.macd_slow + self.macd_signal,
            IndicatorKind::Bollinger => self.bollinger_period,
            IndicatorKind::Sma | IndicatorKind::Ema => self.ma_periods[2] + 1,
            IndicatorKind::Stochastic => {
                self.stoch_k_period + self.stoch_k_smooth + self.stoch_d_period - 2
            }
            IndicatorKind::Atr => self.atr_period + 1,
        }
    }

    /// Largest window any kind needs; the pipeline fetches this much history
    pub fn longest_window(&self) -> usize {
        IndicatorKind::all()
            .iter()
            .map(|&kind| self.required_window(kind))
            .max()
            .unwrap_or(0)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let [rsi_s, rsi_m, rsi_l] = self.rsi_periods;
        if rsi_s == 0 || !(rsi_s < rsi_m && rsi_m < rsi_l) {
            anyhow::bail!("rsi periods must be strictly increasing and non-zero");
        }
        if !(0.0 < self.rsi_oversold && self.rsi_oversold < self.rsi_overbought)
            || self.rsi_overbought >= 100.0
        {
            anyhow::bail!("rsi thresholds must satisfy 0 < oversold < overbought < 100");
        }
        if self.macd_fast == 0 || self.macd_fast >= self.macd_slow || self.macd_signal == 0 {
            anyhow::bail!("macd periods must satisfy 0 < fast < slow and signal > 0");
        }
        if self.bollinger_period < 2 || self.bollinger_multiplier <= 0.0 {
            anyhow::bail!("bollinger needs period >= 2 and a positive multiplier");
        }
        let [ma_s, ma_m, ma_l] = self.ma_periods;
        if ma_s == 0 || !(ma_s < ma_m && ma_m < ma_l) {
            anyhow::bail!("ma periods must be strictly increasing and non-zero");
        }
        if self.stoch_k_period == 0 || self.stoch_k_smooth == 0 || self.stoch_d_period == 0 {
            anyhow::bail!("stochastic periods must be non-zero");
        }
        if !(0.0 < self.stoch_oversold && self.stoch_oversold < self.stoch_overbought)
            || self.stoch_overbought >= 100.0
        {
            anyhow::bail!("stochastic thresholds must satisfy 0 < oversold < overbought < 100");
        }
        if self.atr_period == 0 {
            anyhow::bail!("atr period must be non-zero");
        }
        if self.trend_lookback < 2 {
            anyhow::bail!("trend lookback must be at least 2");
        }
        Ok(())
    }
}

/// Computes one `IndicatorResult` per kind over a trailing candle window
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Compute one indicator kind over the window
    ///
    /// The window must be in chronological order; the result is stamped with
    /// the last candle's pair and timestamp. Windows shorter than the kind's
    /// requirement return `InsufficientWindow`, never a number.
    pub fn compute(
        &self,
        candles: &[Candle],
        kind: IndicatorKind,
        timeframe: Timeframe,
    ) -> Result<IndicatorResult> {
        let needed = self.config.required_window(kind);
        if candles.len() < needed {
            return Err(PipelineError::InsufficientWindow {
                kind: kind.as_str(),
                needed,
                got: candles.len(),
            });
        }

        let last = &candles[candles.len() - 1];
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let (value, values) = match kind {
            IndicatorKind::Rsi => self.compute_rsi(&closes, needed)?,
            IndicatorKind::Macd => self.compute_macd(&closes, needed)?,
            IndicatorKind::Bollinger => self.compute_bollinger(&closes, needed)?,
            IndicatorKind::Sma => self.compute_ma(&closes, false, needed)?,
            IndicatorKind::Ema => self.compute_ma(&closes, true, needed)?,
            IndicatorKind::Stochastic => self.compute_stochastic(candles, needed)?,
            IndicatorKind::Atr => {
                let atr = calculate_atr(candles, self.config.atr_period)
                    .ok_or_else(|| short_window(IndicatorKind::Atr, needed, candles.len()))?;
                (atr, IndicatorValues::Atr { value: atr })
            }
        };

        Ok(IndicatorResult {
            pair: last.pair.clone(),
            timestamp: last.timestamp,
            kind,
            timeframe,
            value,
            values,
        })
    }

    fn compute_rsi(&self, closes: &[f64], needed: usize) -> Result<(f64, IndicatorValues)> {
        let mut periods = Vec::with_capacity(3);

        for &period in &self.config.rsi_periods {
            let series = calculate_rsi_series(closes, period)
                .ok_or_else(|| short_window(IndicatorKind::Rsi, needed, closes.len()))?;
            let value = *series.last().unwrap_or(&50.0);

            let state = classify_threshold(value, self.config.rsi_overbought, self.config.rsi_oversold);
            let trend = slope_trend(&series, self.config.trend_lookback);

            periods.push(RsiPeriodResult {
                period,
                value,
                state,
                trend,
            });
        }

        let primary = periods[1].value;
        Ok((primary, IndicatorValues::Rsi { periods }))
    }

    fn compute_macd(&self, closes: &[f64], needed: usize) -> Result<(f64, IndicatorValues)> {
        let series = calculate_macd_series(
            closes,
            self.config.macd_fast,
            self.config.macd_slow,
            self.config.macd_signal,
        )
        .ok_or_else(|| short_window(IndicatorKind::Macd, needed, closes.len()))?;

        if series.len() < 2 {
            return Err(short_window(IndicatorKind::Macd, needed, closes.len()));
        }

        let prev = series[series.len() - 2];
        let point = series[series.len() - 1];

        let state = if point.macd > point.signal {
            if point.histogram >= prev.histogram {
                MacdState::Bullish
            } else {
                MacdState::WeakeningBullish
            }
        } else if point.histogram <= prev.histogram {
            MacdState::Bearish
        } else {
            MacdState::WeakeningBearish
        };

        // Crossover = (MACD - signal) changed sign between the last two points
        let crossover = if prev.histogram <= 0.0 && point.histogram > 0.0 {
            Some(Direction::Bullish)
        } else if prev.histogram >= 0.0 && point.histogram < 0.0 {
            Some(Direction::Bearish)
        } else {
            None
        };

        Ok((
            point.macd,
            IndicatorValues::Macd {
                macd: point.macd,
                signal: point.signal,
                histogram: point.histogram,
                state,
                crossover,
                above_zero: point.macd > 0.0,
            },
        ))
    }

    fn compute_bollinger(&self, closes: &[f64], needed: usize) -> Result<(f64, IndicatorValues)> {
        let series = calculate_bollinger_series(
            closes,
            self.config.bollinger_period,
            self.config.bollinger_multiplier,
        )
        .ok_or_else(|| short_window(IndicatorKind::Bollinger, needed, closes.len()))?;

        let bands = series[series.len() - 1];
        let close = closes[closes.len() - 1];

        let position = if close > bands.upper {
            BandPosition::AboveUpper
        } else if close < bands.lower {
            BandPosition::BelowLower
        } else {
            BandPosition::Inside
        };

        // Band walk: consecutive closes outside the same band, newest first.
        // Band i covers closes[i + period - 1].
        let mut band_walk = 0u32;
        if position != BandPosition::Inside {
            for (i, b) in series.iter().enumerate().rev() {
                let c = closes[i + self.config.bollinger_period - 1];
                let outside = match position {
                    BandPosition::AboveUpper => c > b.upper,
                    BandPosition::BelowLower => c < b.lower,
                    BandPosition::Inside => false,
                };
                if outside {
                    band_walk += 1;
                } else {
                    break;
                }
            }
        }

        Ok((
            bands.middle,
            IndicatorValues::Bollinger {
                upper: bands.upper,
                middle: bands.middle,
                lower: bands.lower,
                position,
                band_walk,
            },
        ))
    }

    fn compute_ma(
        &self,
        closes: &[f64],
        exponential: bool,
        needed: usize,
    ) -> Result<(f64, IndicatorValues)> {
        let kind = if exponential {
            IndicatorKind::Ema
        } else {
            IndicatorKind::Sma
        };
        let close = closes[closes.len() - 1];
        let mut periods = Vec::with_capacity(3);

        for &period in &self.config.ma_periods {
            let series = if exponential {
                calculate_ema_series(closes, period)
            } else {
                calculate_sma_series(closes, period)
            }
            .ok_or_else(|| short_window(kind, needed, closes.len()))?;

            if series.len() < 2 {
                return Err(short_window(kind, needed, closes.len()));
            }

            let value = series[series.len() - 1];
            let prev = series[series.len() - 2];

            periods.push(MaPeriodResult {
                period,
                value,
                price_above: close > value,
                slope: trend_of(value - prev),
            });
        }

        let primary = periods[1].value;
        Ok((primary, IndicatorValues::MovingAverage { periods }))
    }

    fn compute_stochastic(&self, candles: &[Candle], needed: usize) -> Result<(f64, IndicatorValues)> {
        let (k, d) = calculate_stochastic(
            candles,
            self.config.stoch_k_period,
            self.config.stoch_k_smooth,
            self.config.stoch_d_period,
        )
        .ok_or_else(|| short_window(IndicatorKind::Stochastic, needed, candles.len()))?;

        let state = classify_threshold(k, self.config.stoch_overbought, self.config.stoch_oversold);

        Ok((k, IndicatorValues::Stochastic { k, d, state }))
    }
}

fn short_window(kind: IndicatorKind, needed: usize, got: usize) -> PipelineError {
    PipelineError::InsufficientWindow {
        kind: kind.as_str(),
        needed,
        got,
    }
}

fn classify_threshold(value: f64, overbought: f64, oversold: f64) -> ThresholdState {
    if value >= overbought {
        ThresholdState::Overbought
    } else if value <= oversold {
        ThresholdState::Oversold
    } else {
        ThresholdState::Neutral
    }
}

fn trend_of(delta: f64) -> Trend {
    if delta > 1e-9 {
        Trend::Rising
    } else if delta < -1e-9 {
        Trend::Falling
    } else {
        Trend::Flat
    }
}

/// Slope sign between the value `lookback - 1` steps back and the last value
fn slope_trend(series: &[f64], lookback: usize) -> Trend {
    if series.len() < lookback {
        return Trend::Flat;
    }
    let last = series[series.len() - 1];
    let earlier = series[series.len() - lookback];
    trend_of(last - earlier)
}
