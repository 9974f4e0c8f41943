// Pivot-based reversal formations
//
// All six detectors here share the same skeleton: find the last pivots,
// check the formation's level agreement, derive a neckline from the
// intervening extremes, and only match once the latest close has broken it.

use super::pivots::{pivot_highs, pivot_lows};
use super::{medium_rsi_state, DetectorConfig, PatternDetector};
use crate::error::Result;
use crate::indicators::{IndicatorSet, ThresholdState};
use crate::models::{Candle, Direction, PatternMatch, PatternPriority};

fn lowest_low(window: &[Candle]) -> f64 {
    window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min)
}

fn highest_high(window: &[Candle]) -> f64 {
    window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max)
}

/// Double top (bearish) and double bottom (bullish)
pub struct DoubleExtreme {
    direction: Direction,
    lookback: usize,
    min_separation: usize,
    tolerance: f64,
}

impl DoubleExtreme {
    pub fn top(config: &DetectorConfig) -> Self {
        Self {
            direction: Direction::Bearish,
            lookback: config.pivot_lookback,
            min_separation: config.min_separation,
            tolerance: config.price_tolerance,
        }
    }

    pub fn bottom(config: &DetectorConfig) -> Self {
        Self {
            direction: Direction::Bullish,
            lookback: config.pivot_lookback,
            min_separation: config.min_separation,
            tolerance: config.price_tolerance,
        }
    }

    fn detect_top(&self, window: &[Candle], indicators: &IndicatorSet) -> Option<PatternMatch> {
        let peaks = pivot_highs(window, self.lookback);
        if peaks.len() < 2 {
            return None;
        }
        let p1 = peaks[peaks.len() - 2];
        let p2 = peaks[peaks.len() - 1];
        if p2.index - p1.index < self.min_separation {
            return None;
        }

        let diff = (p1.price - p2.price).abs();
        let avg = (p1.price + p2.price) / 2.0;
        if avg <= 0.0 || diff / avg > self.tolerance {
            return None;
        }

        let neckline = lowest_low(&window[p1.index + 1..p2.index]);
        let height = avg - neckline;
        if height <= 0.0 {
            return None;
        }

        let last = window.last()?;
        if last.close >= neckline {
            return None;
        }

        let agreement = 1.0 - (diff / avg) / self.tolerance;
        let breakout = ((neckline - last.close) / height).clamp(0.0, 1.0);
        let mut confidence = (0.55 + 0.25 * agreement + 0.15 * breakout).min(0.95);

        let mut conditions = vec![
            format!("two peaks within {:.3}% of each other", diff / avg * 100.0),
            format!("neckline {:.5} broken at close {:.5}", neckline, last.close),
        ];
        if medium_rsi_state(indicators) == Some(ThresholdState::Overbought) {
            confidence = (confidence + 0.03).min(0.95);
            conditions.push("overbought momentum confluence".to_string());
        }

        Some(PatternMatch {
            detector_id: self.id().to_string(),
            name: self.name().to_string(),
            priority: self.priority(),
            direction: Direction::Bearish,
            confidence,
            timeframe: last.timeframe,
            conditions,
            take_profit: height,
            stop_loss: height * 0.5,
            description: format!("Double top near {:.5} with broken neckline", avg),
            detected_at: last.timestamp,
        })
    }

    fn detect_bottom(&self, window: &[Candle], indicators: &IndicatorSet) -> Option<PatternMatch> {
        let troughs = pivot_lows(window, self.lookback);
        if troughs.len() < 2 {
            return None;
        }
        let t1 = troughs[troughs.len() - 2];
        let t2 = troughs[troughs.len() - 1];
        if t2.index - t1.index < self.min_separation {
            return None;
        }

        let diff = (t1.price - t2.price).abs();
        let avg = (t1.price + t2.price) / 2.0;
        if avg <= 0.0 || diff / avg > self.tolerance {
            return None;
        }

        let neckline = highest_high(&window[t1.index + 1..t2.index]);
        let height = neckline - avg;
        if height <= 0.0 {
            return None;
        }

        let last = window.last()?;
        if last.close <= neckline {
            return None;
        }

        let agreement = 1.0 - (diff / avg) / self.tolerance;
        let breakout = ((last.close - neckline) / height).clamp(0.0, 1.0);
        let mut confidence = (0.55 + 0.25 * agreement + 0.15 * breakout).min(0.95);

        let mut conditions = vec![
            format!("two troughs within {:.3}% of each other", diff / avg * 100.0),
            format!("neckline {:.5} broken at close {:.5}", neckline, last.close),
        ];
        if medium_rsi_state(indicators) == Some(ThresholdState::Oversold) {
            confidence = (confidence + 0.03).min(0.95);
            conditions.push("oversold momentum confluence".to_string());
        }

        Some(PatternMatch {
            detector_id: self.id().to_string(),
            name: self.name().to_string(),
            priority: self.priority(),
            direction: Direction::Bullish,
            confidence,
            timeframe: last.timeframe,
            conditions,
            take_profit: height,
            stop_loss: height * 0.5,
            description: format!("Double bottom near {:.5} with broken neckline", avg),
            detected_at: last.timestamp,
        })
    }
}

impl PatternDetector for DoubleExtreme {
    fn id(&self) -> &'static str {
        match self.direction {
            Direction::Bearish => "double_top",
            Direction::Bullish => "double_bottom",
        }
    }

    fn name(&self) -> &'static str {
        match self.direction {
            Direction::Bearish => "Double Top",
            Direction::Bullish => "Double Bottom",
        }
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::VeryHigh
    }

    fn min_candles(&self) -> usize {
        2 * self.lookback + self.min_separation + 2
    }

    fn detect(
        &self,
        window: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Option<PatternMatch>> {
        if window.len() < self.min_candles() {
            return Ok(None);
        }
        Ok(match self.direction {
            Direction::Bearish => self.detect_top(window, indicators),
            Direction::Bullish => self.detect_bottom(window, indicators),
        })
    }
}

/// Triple top (bearish) and triple bottom (bullish)
pub struct TripleExtreme {
    direction: Direction,
    lookback: usize,
    min_separation: usize,
    tolerance: f64,
}

impl TripleExtreme {
    pub fn top(config: &DetectorConfig) -> Self {
        Self {
            direction: Direction::Bearish,
            lookback: config.pivot_lookback,
            min_separation: config.min_separation,
            tolerance: config.price_tolerance,
        }
    }

    pub fn bottom(config: &DetectorConfig) -> Self {
        Self {
            direction: Direction::Bullish,
            lookback: config.pivot_lookback,
            min_separation: config.min_separation,
            tolerance: config.price_tolerance,
        }
    }

    fn detect_top(&self, window: &[Candle], indicators: &IndicatorSet) -> Option<PatternMatch> {
        let peaks = pivot_highs(window, self.lookback);
        if peaks.len() < 3 {
            return None;
        }
        let p1 = peaks[peaks.len() - 3];
        let p2 = peaks[peaks.len() - 2];
        let p3 = peaks[peaks.len() - 1];
        if p2.index - p1.index < self.min_separation || p3.index - p2.index < self.min_separation {
            return None;
        }

        let mean = (p1.price + p2.price + p3.price) / 3.0;
        let max_dev = [p1.price, p2.price, p3.price]
            .into_iter()
            .map(|p| (p - mean).abs())
            .fold(0.0, f64::max);
        if mean <= 0.0 || max_dev / mean > self.tolerance {
            return None;
        }

        let neckline = lowest_low(&window[p1.index + 1..p3.index]);
        let height = mean - neckline;
        if height <= 0.0 {
            return None;
        }

        let last = window.last()?;
        if last.close >= neckline {
            return None;
        }

        let agreement = 1.0 - (max_dev / mean) / self.tolerance;
        let breakout = ((neckline - last.close) / height).clamp(0.0, 1.0);
        let mut confidence = (0.6 + 0.2 * agreement + 0.15 * breakout).min(0.95);

        let mut conditions = vec![
            format!("three peaks within {:.3}% of their mean", max_dev / mean * 100.0),
            format!("support {:.5} broken at close {:.5}", neckline, last.close),
        ];
        if medium_rsi_state(indicators) == Some(ThresholdState::Overbought) {
            confidence = (confidence + 0.03).min(0.95);
            conditions.push("overbought momentum confluence".to_string());
        }

        Some(PatternMatch {
            detector_id: self.id().to_string(),
            name: self.name().to_string(),
            priority: self.priority(),
            direction: Direction::Bearish,
            confidence,
            timeframe: last.timeframe,
            conditions,
            take_profit: height,
            stop_loss: height * 0.5,
            description: format!("Triple top near {:.5} with broken support", mean),
            detected_at: last.timestamp,
        })
    }

    fn detect_bottom(&self, window: &[Candle], indicators: &IndicatorSet) -> Option<PatternMatch> {
        let troughs = pivot_lows(window, self.lookback);
        if troughs.len() < 3 {
            return None;
        }
        let t1 = troughs[troughs.len() - 3];
        let t2 = troughs[troughs.len() - 2];
        let t3 = troughs[troughs.len() - 1];
        if t2.index - t1.index < self.min_separation || t3.index - t2.index < self.min_separation {
            return None;
        }

        let mean = (t1.price + t2.price + t3.price) / 3.0;
        let max_dev = [t1.price, t2.price, t3.price]
            .into_iter()
            .map(|p| (p - mean).abs())
            .fold(0.0, f64::max);
        if mean <= 0.0 || max_dev / mean > self.tolerance {
            return None;
        }

        let neckline = highest_high(&window[t1.index + 1..t3.index]);
        let height = neckline - mean;
        if height <= 0.0 {
            return None;
        }

        let last = window.last()?;
        if last.close <= neckline {
            return None;
        }

        let agreement = 1.0 - (max_dev / mean) / self.tolerance;
        let breakout = ((last.close - neckline) / height).clamp(0.0, 1.0);
        let mut confidence = (0.6 + 0.2 * agreement + 0.15 * breakout).min(0.95);

        let mut conditions = vec![
            format!(
                "three troughs within {:.3}% of their mean",
                max_dev / mean * 100.0
            ),
            format!("resistance {:.5} broken at close {:.5}", neckline, last.close),
        ];
        if medium_rsi_state(indicators) == Some(ThresholdState::Oversold) {
            confidence = (confidence + 0.03).min(0.95);
            conditions.push("oversold momentum confluence".to_string());
        }

        Some(PatternMatch {
            detector_id: self.id().to_string(),
            name: self.name().to_string(),
            priority: self.priority(),
            direction: Direction::Bullish,
            confidence,
            timeframe: last.timeframe,
            conditions,
            take_profit: height,
            stop_loss: height * 0.5,
            description: format!("Triple bottom near {:.5} with broken resistance", mean),
            detected_at: last.timestamp,
        })
    }
}

impl PatternDetector for TripleExtreme {
    fn id(&self) -> &'static str {
        match self.direction {
            Direction::Bearish => "triple_top",
            Direction::Bullish => "triple_bottom",
        }
    }

    fn name(&self) -> &'static str {
        match self.direction {
            Direction::Bearish => "Triple Top",
            Direction::Bullish => "Triple Bottom",
        }
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::VeryHigh
    }

    fn min_candles(&self) -> usize {
        2 * self.lookback + 2 * self.min_separation + 2
    }

    fn detect(
        &self,
        window: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Option<PatternMatch>> {
        if window.len() < self.min_candles() {
            return Ok(None);
        }
        Ok(match self.direction {
            Direction::Bearish => self.detect_top(window, indicators),
            Direction::Bullish => self.detect_bottom(window, indicators),
        })
    }
}

/// Head and shoulders (bearish) and its inverse (bullish)
pub struct HeadShoulders {
    inverse: bool,
    lookback: usize,
    shoulder_tolerance: f64,
    min_head_ratio: f64,
    neckline_tolerance: f64,
}

impl HeadShoulders {
    pub fn standard(config: &DetectorConfig) -> Self {
        Self {
            inverse: false,
            lookback: config.pivot_lookback,
            shoulder_tolerance: config.price_tolerance,
            min_head_ratio: config.min_head_ratio,
            neckline_tolerance: config.neckline_tolerance,
        }
    }

    pub fn inverse(config: &DetectorConfig) -> Self {
        Self {
            inverse: true,
            ..Self::standard(config)
        }
    }

    fn detect_standard(&self, window: &[Candle], indicators: &IndicatorSet) -> Option<PatternMatch> {
        let peaks = pivot_highs(window, self.lookback);
        if peaks.len() < 3 {
            return None;
        }
        let ls = peaks[peaks.len() - 3];
        let head = peaks[peaks.len() - 2];
        let rs = peaks[peaks.len() - 1];

        let shoulder_max = ls.price.max(rs.price);
        let excess = head.price / shoulder_max - 1.0;
        if excess < self.min_head_ratio {
            return None;
        }

        let diff = (ls.price - rs.price).abs();
        let shoulder_avg = (ls.price + rs.price) / 2.0;
        if shoulder_avg <= 0.0 || diff / shoulder_avg > self.shoulder_tolerance {
            return None;
        }

        let left_valley = lowest_low(&window[ls.index + 1..head.index]);
        let right_valley = lowest_low(&window[head.index + 1..rs.index]);
        if !left_valley.is_finite() || !right_valley.is_finite() {
            return None;
        }
        let neckline = (left_valley + right_valley) / 2.0;
        let height = head.price - neckline;
        if height <= 0.0 {
            return None;
        }

        let last = window.last()?;
        if last.close > neckline * (1.0 + self.neckline_tolerance) {
            return None;
        }

        let prominence = (excess / self.min_head_ratio - 1.0).clamp(0.0, 1.0);
        let breakout = ((neckline - last.close) / height).clamp(0.0, 1.0);
        let mut confidence = (0.6 + 0.15 * prominence + 0.15 * breakout).min(0.95);

        let mut conditions = vec![
            format!("head {:.3}% above the shoulders", excess * 100.0),
            format!("shoulders within {:.3}%", diff / shoulder_avg * 100.0),
            format!("neckline {:.5} cleared at close {:.5}", neckline, last.close),
        ];
        if medium_rsi_state(indicators) == Some(ThresholdState::Overbought) {
            confidence = (confidence + 0.03).min(0.95);
            conditions.push("overbought momentum confluence".to_string());
        }

        Some(PatternMatch {
            detector_id: self.id().to_string(),
            name: self.name().to_string(),
            priority: self.priority(),
            direction: Direction::Bearish,
            confidence,
            timeframe: last.timeframe,
            conditions,
            take_profit: height,
            stop_loss: height * 0.5,
            description: format!("Head and shoulders peaking at {:.5}", head.price),
            detected_at: last.timestamp,
        })
    }

    fn detect_inverse(&self, window: &[Candle], indicators: &IndicatorSet) -> Option<PatternMatch> {
        let troughs = pivot_lows(window, self.lookback);
        if troughs.len() < 3 {
            return None;
        }
        let ls = troughs[troughs.len() - 3];
        let head = troughs[troughs.len() - 2];
        let rs = troughs[troughs.len() - 1];

        let shoulder_min = ls.price.min(rs.price);
        if shoulder_min <= 0.0 {
            return None;
        }
        let excess = 1.0 - head.price / shoulder_min;
        if excess < self.min_head_ratio {
            return None;
        }

        let diff = (ls.price - rs.price).abs();
        let shoulder_avg = (ls.price + rs.price) / 2.0;
        if diff / shoulder_avg > self.shoulder_tolerance {
            return None;
        }

        let left_crest = highest_high(&window[ls.index + 1..head.index]);
        let right_crest = highest_high(&window[head.index + 1..rs.index]);
        if !left_crest.is_finite() || !right_crest.is_finite() {
            return None;
        }
        let neckline = (left_crest + right_crest) / 2.0;
        let height = neckline - head.price;
        if height <= 0.0 {
            return None;
        }

        let last = window.last()?;
        if last.close < neckline * (1.0 - self.neckline_tolerance) {
            return None;
        }

        let prominence = (excess / self.min_head_ratio - 1.0).clamp(0.0, 1.0);
        let breakout = ((last.close - neckline) / height).clamp(0.0, 1.0);
        let mut confidence = (0.6 + 0.15 * prominence + 0.15 * breakout).min(0.95);

        let mut conditions = vec![
            format!("head {:.3}% below the shoulders", excess * 100.0),
            format!("shoulders within {:.3}%", diff / shoulder_avg * 100.0),
            format!("neckline {:.5} cleared at close {:.5}", neckline, last.close),
        ];
        if medium_rsi_state(indicators) == Some(ThresholdState::Oversold) {
            confidence = (confidence + 0.03).min(0.95);
            conditions.push("oversold momentum confluence".to_string());
        }

        Some(PatternMatch {
            detector_id: self.id().to_string(),
            name: self.name().to_string(),
            priority: self.priority(),
            direction: Direction::Bullish,
            confidence,
            timeframe: last.timeframe,
            conditions,
            take_profit: height,
            stop_loss: height * 0.5,
            description: format!("Inverse head and shoulders bottoming at {:.5}", head.price),
            detected_at: last.timestamp,
        })
    }
}

impl PatternDetector for HeadShoulders {
    fn id(&self) -> &'static str {
        if self.inverse {
            "inverse_head_and_shoulders"
        } else {
            "head_and_shoulders"
        }
    }

    fn name(&self) -> &'static str {
        if self.inverse {
            "Inverse Head and Shoulders"
        } else {
            "Head and Shoulders"
        }
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::VeryHigh
    }

    fn min_candles(&self) -> usize {
        6 * self.lookback + 3
    }

    fn detect(
        &self,
        window: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Option<PatternMatch>> {
        if window.len() < self.min_candles() {
            return Ok(None);
        }
        Ok(if self.inverse {
            self.detect_inverse(window, indicators)
        } else {
            self.detect_standard(window, indicators)
        })
    }
}
