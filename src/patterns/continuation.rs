// Continuation formations: flags and wedges
//
// A flag keys off the most recent bars directly (impulse leg, drifting
// channel, breakout bar); wedges key off pivots and their trendlines.

use super::pivots::{line_value, pivot_highs, pivot_lows, regression_slope, slope};
use super::{atr_or_avg_range, DetectorConfig, PatternDetector};
use crate::error::Result;
use crate::indicators::IndicatorSet;
use crate::models::{Candle, Direction, PatternMatch, PatternPriority};

/// Flag: a strong impulse leg, a near-parallel channel drifting against it,
/// then a close beyond the channel in the impulse direction.
pub struct Flag {
    pole_bars: usize,
    channel_bars: usize,
    min_pole_move: f64,
    slope_tolerance: f64,
}

impl Flag {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            pole_bars: config.flag_pole_bars,
            channel_bars: config.flag_channel_bars,
            min_pole_move: config.min_pole_move,
            slope_tolerance: config.channel_slope_tolerance,
        }
    }
}

impl PatternDetector for Flag {
    fn id(&self) -> &'static str {
        "flag"
    }

    fn name(&self) -> &'static str {
        "Flag"
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::Medium
    }

    fn min_candles(&self) -> usize {
        self.pole_bars + self.channel_bars + 1
    }

    fn detect(
        &self,
        window: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Option<PatternMatch>> {
        let n = window.len();
        if n < self.min_candles() {
            return Ok(None);
        }

        let last = &window[n - 1];
        let channel = &window[n - 1 - self.channel_bars..n - 1];
        let pole = &window[n - 1 - self.channel_bars - self.pole_bars..n - 1 - self.channel_bars];

        let pole_start = &pole[0];
        let pole_end = &pole[pole.len() - 1];
        if pole_start.close <= 0.0 {
            return Ok(None);
        }
        let pole_move = (pole_end.close - pole_start.close) / pole_start.close;
        if pole_move.abs() < self.min_pole_move {
            return Ok(None);
        }
        let direction = if pole_move > 0.0 {
            Direction::Bullish
        } else {
            Direction::Bearish
        };

        let mean_price = channel.iter().map(|c| c.close).sum::<f64>() / channel.len() as f64;
        if mean_price <= 0.0 {
            return Ok(None);
        }
        let highs: Vec<f64> = channel.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = channel.iter().map(|c| c.low).collect();
        let high_slope = regression_slope(&highs) / mean_price;
        let low_slope = regression_slope(&lows) / mean_price;

        // channel drifts against the impulse and stays near-parallel
        let counter_tilted = match direction {
            Direction::Bullish => high_slope <= 0.0 && low_slope <= 0.0,
            Direction::Bearish => high_slope >= 0.0 && low_slope >= 0.0,
        };
        if !counter_tilted || (high_slope - low_slope).abs() > self.slope_tolerance {
            return Ok(None);
        }

        let channel_top = channel.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let channel_bottom = channel.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let channel_height = channel_top - channel_bottom;
        let pole_height = (pole_end.close - pole_start.close).abs();
        if channel_height > pole_height * 0.5 {
            return Ok(None);
        }

        let broke_out = match direction {
            Direction::Bullish => last.close > channel_top,
            Direction::Bearish => last.close < channel_bottom,
        };
        if !broke_out {
            return Ok(None);
        }

        let pole_excess = (pole_move.abs() / self.min_pole_move - 1.0).clamp(0.0, 1.0);
        let parallelism =
            (1.0 - (high_slope - low_slope).abs() / self.slope_tolerance).clamp(0.0, 1.0);
        let confidence = (0.55 + 0.2 * pole_excess + 0.15 * parallelism).min(0.9);

        let unit = atr_or_avg_range(window, indicators);
        Ok(Some(PatternMatch {
            detector_id: self.id().to_string(),
            name: self.name().to_string(),
            priority: self.priority(),
            direction,
            confidence,
            timeframe: last.timeframe,
            conditions: vec![
                format!(
                    "impulse leg moved {:.2}% over {} candles",
                    pole_move.abs() * 100.0,
                    self.pole_bars
                ),
                "consolidation drifting against the impulse".to_string(),
                format!("close {:.5} cleared the channel", last.close),
            ],
            take_profit: pole_height,
            stop_loss: channel_height.max(unit * 0.5),
            description: match direction {
                Direction::Bullish => {
                    format!("Bull flag breakout after a {:.2}% pole", pole_move * 100.0)
                }
                Direction::Bearish => {
                    format!("Bear flag breakdown after a {:.2}% pole", pole_move.abs() * 100.0)
                }
            },
            detected_at: last.timestamp,
        }))
    }
}

/// Rising wedge (bearish) and falling wedge (bullish)
///
/// Both trendlines slope the same way and converge; the match fires when the
/// latest close escapes against the slope.
pub struct Wedge {
    rising: bool,
    lookback: usize,
    min_convergence: f64,
}

impl Wedge {
    pub fn rising(config: &DetectorConfig) -> Self {
        Self {
            rising: true,
            lookback: config.pivot_lookback,
            min_convergence: config.min_convergence,
        }
    }

    pub fn falling(config: &DetectorConfig) -> Self {
        Self {
            rising: false,
            ..Self::rising(config)
        }
    }
}

impl PatternDetector for Wedge {
    fn id(&self) -> &'static str {
        if self.rising {
            "rising_wedge"
        } else {
            "falling_wedge"
        }
    }

    fn name(&self) -> &'static str {
        if self.rising {
            "Rising Wedge"
        } else {
            "Falling Wedge"
        }
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::High
    }

    fn min_candles(&self) -> usize {
        8 * self.lookback + 6
    }

    fn detect(
        &self,
        window: &[Candle],
        _indicators: &IndicatorSet,
    ) -> Result<Option<PatternMatch>> {
        if window.len() < self.min_candles() {
            return Ok(None);
        }

        let peaks = pivot_highs(window, self.lookback);
        let troughs = pivot_lows(window, self.lookback);
        if peaks.len() < 2 || troughs.len() < 2 {
            return Ok(None);
        }
        let h1 = peaks[peaks.len() - 2];
        let h2 = peaks[peaks.len() - 1];
        let l1 = troughs[troughs.len() - 2];
        let l2 = troughs[troughs.len() - 1];

        let upper_slope = slope(&h1, &h2);
        let lower_slope = slope(&l1, &l2);
        let sloped_right = if self.rising {
            upper_slope > 0.0 && lower_slope > 0.0
        } else {
            upper_slope < 0.0 && lower_slope < 0.0
        };
        if !sloped_right {
            return Ok(None);
        }

        let start = h1.index.min(l1.index);
        let end = window.len() - 1;
        let gap_start = line_value(&h1, &h2, start) - line_value(&l1, &l2, start);
        let gap_end = line_value(&h1, &h2, end) - line_value(&l1, &l2, end);
        if gap_start <= 0.0 || gap_end > gap_start * (1.0 - self.min_convergence) {
            return Ok(None);
        }

        let last = &window[end];
        let (broke_out, raw_depth, direction) = if self.rising {
            let support = line_value(&l1, &l2, end);
            (
                last.close < support,
                (support - last.close) / gap_start,
                Direction::Bearish,
            )
        } else {
            let resistance = line_value(&h1, &h2, end);
            (
                last.close > resistance,
                (last.close - resistance) / gap_start,
                Direction::Bullish,
            )
        };
        if !broke_out {
            return Ok(None);
        }

        let convergence = ((gap_start - gap_end) / gap_start).clamp(0.0, 1.0);
        let depth = raw_depth.clamp(0.0, 1.0);
        let confidence = (0.55 + 0.25 * convergence + 0.15 * depth).min(0.95);

        Ok(Some(PatternMatch {
            detector_id: self.id().to_string(),
            name: self.name().to_string(),
            priority: self.priority(),
            direction,
            confidence,
            timeframe: last.timeframe,
            conditions: vec![
                if self.rising {
                    "both trendlines rising into the apex".to_string()
                } else {
                    "both trendlines falling into the apex".to_string()
                },
                format!("range narrowed {:.0}% between the trendlines", convergence * 100.0),
                format!(
                    "close {:.5} broke the {} trendline",
                    last.close,
                    if self.rising { "lower" } else { "upper" }
                ),
            ],
            take_profit: gap_start,
            stop_loss: gap_start * 0.5,
            description: if self.rising {
                format!("Rising wedge breakdown from a {:.5} wide base", gap_start)
            } else {
                format!("Falling wedge breakout from a {:.5} wide base", gap_start)
            },
            detected_at: last.timestamp,
        }))
    }
}
