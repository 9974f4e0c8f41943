// Candlestick shape detectors: marubozu, engulfing pairs, soldier/crow runs

use super::{atr_or_avg_range, DetectorConfig, PatternDetector};
use crate::error::Result;
use crate::indicators::IndicatorSet;
use crate::models::{Candle, Direction, PatternMatch, PatternPriority};

/// Single candle whose body swallows nearly the whole range
pub struct Marubozu {
    min_body_ratio: f64,
}

impl Marubozu {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            min_body_ratio: config.marubozu_body_ratio,
        }
    }
}

impl PatternDetector for Marubozu {
    fn id(&self) -> &'static str {
        "marubozu"
    }

    fn name(&self) -> &'static str {
        "Marubozu"
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::Low
    }

    fn min_candles(&self) -> usize {
        1
    }

    fn detect(
        &self,
        window: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Option<PatternMatch>> {
        let Some(last) = window.last() else {
            return Ok(None);
        };

        if last.range() <= 0.0 {
            return Ok(None);
        }
        let body_ratio = last.body_ratio();
        if body_ratio < self.min_body_ratio {
            return Ok(None);
        }

        let direction = if last.is_bullish() {
            Direction::Bullish
        } else {
            Direction::Bearish
        };

        let span = (1.0 - self.min_body_ratio).max(f64::EPSILON);
        let fullness = ((body_ratio - self.min_body_ratio) / span).clamp(0.0, 1.0);
        let confidence = 0.55 + 0.4 * fullness;

        let stop = last.range().max(atr_or_avg_range(window, indicators));

        Ok(Some(PatternMatch {
            detector_id: self.id().to_string(),
            name: self.name().to_string(),
            priority: self.priority(),
            direction,
            confidence,
            timeframe: last.timeframe,
            conditions: vec![
                format!("body covers {:.0}% of range", body_ratio * 100.0),
                "both wicks within tolerance".to_string(),
            ],
            take_profit: stop * 2.0,
            stop_loss: stop,
            description: format!(
                "{} marubozu, body {:.0}% of range",
                direction.as_str(),
                body_ratio * 100.0
            ),
            detected_at: last.timestamp,
        }))
    }
}

/// Two-candle reversal where the last body contains the previous one
pub struct Engulfing {
    direction: Direction,
    min_ratio: f64,
}

impl Engulfing {
    pub fn bullish(config: &DetectorConfig) -> Self {
        Self {
            direction: Direction::Bullish,
            min_ratio: config.min_engulfing_ratio,
        }
    }

    pub fn bearish(config: &DetectorConfig) -> Self {
        Self {
            direction: Direction::Bearish,
            min_ratio: config.min_engulfing_ratio,
        }
    }
}

impl PatternDetector for Engulfing {
    fn id(&self) -> &'static str {
        match self.direction {
            Direction::Bullish => "bullish_engulfing",
            Direction::Bearish => "bearish_engulfing",
        }
    }

    fn name(&self) -> &'static str {
        match self.direction {
            Direction::Bullish => "Bullish Engulfing",
            Direction::Bearish => "Bearish Engulfing",
        }
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::Medium
    }

    fn min_candles(&self) -> usize {
        2
    }

    fn detect(
        &self,
        window: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Option<PatternMatch>> {
        if window.len() < 2 {
            return Ok(None);
        }
        let prev = &window[window.len() - 2];
        let curr = &window[window.len() - 1];

        let engulfs = match self.direction {
            Direction::Bullish => {
                prev.is_bearish()
                    && curr.is_bullish()
                    && curr.open <= prev.close
                    && curr.close >= prev.open
            }
            Direction::Bearish => {
                prev.is_bullish()
                    && curr.is_bearish()
                    && curr.open >= prev.close
                    && curr.close <= prev.open
            }
        };
        if !engulfs || prev.body() <= 0.0 {
            return Ok(None);
        }

        let ratio = curr.body() / prev.body();
        if ratio < self.min_ratio {
            return Ok(None);
        }

        let confidence = (0.5 + (ratio - self.min_ratio) * 0.2).min(0.9);

        let unit = atr_or_avg_range(window, indicators);
        let stop = match self.direction {
            Direction::Bullish => curr.close - prev.low.min(curr.low),
            Direction::Bearish => prev.high.max(curr.high) - curr.close,
        }
        .max(unit * 0.5);

        Ok(Some(PatternMatch {
            detector_id: self.id().to_string(),
            name: self.name().to_string(),
            priority: self.priority(),
            direction: self.direction,
            confidence,
            timeframe: curr.timeframe,
            conditions: vec![
                match self.direction {
                    Direction::Bullish => "engulfs prior bearish body".to_string(),
                    Direction::Bearish => "engulfs prior bullish body".to_string(),
                },
                format!("body ratio {:.2} (min {:.2})", ratio, self.min_ratio),
            ],
            take_profit: stop * 2.0,
            stop_loss: stop,
            description: format!(
                "{} closing at {:.5}, {:.2}x the prior body",
                self.name(),
                curr.close,
                ratio
            ),
            detected_at: curr.timestamp,
        }))
    }
}

/// Three same-direction candles with monotone opens/closes and firm bodies
pub struct TrendRun {
    direction: Direction,
    min_body_dominance: f64,
}

impl TrendRun {
    pub fn soldiers(config: &DetectorConfig) -> Self {
        Self {
            direction: Direction::Bullish,
            min_body_dominance: config.min_body_dominance,
        }
    }

    pub fn crows(config: &DetectorConfig) -> Self {
        Self {
            direction: Direction::Bearish,
            min_body_dominance: config.min_body_dominance,
        }
    }
}

impl PatternDetector for TrendRun {
    fn id(&self) -> &'static str {
        match self.direction {
            Direction::Bullish => "three_white_soldiers",
            Direction::Bearish => "three_black_crows",
        }
    }

    fn name(&self) -> &'static str {
        match self.direction {
            Direction::Bullish => "Three White Soldiers",
            Direction::Bearish => "Three Black Crows",
        }
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::High
    }

    fn min_candles(&self) -> usize {
        3
    }

    fn detect(
        &self,
        window: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<Option<PatternMatch>> {
        if window.len() < 3 {
            return Ok(None);
        }
        let n = window.len();
        let (first, second, third) = (&window[n - 3], &window[n - 2], &window[n - 1]);

        let aligned = match self.direction {
            Direction::Bullish => {
                first.is_bullish()
                    && second.is_bullish()
                    && third.is_bullish()
                    && second.close > first.close
                    && third.close > second.close
                    && second.open > first.open
                    && third.open > second.open
            }
            Direction::Bearish => {
                first.is_bearish()
                    && second.is_bearish()
                    && third.is_bearish()
                    && second.close < first.close
                    && third.close < second.close
                    && second.open < first.open
                    && third.open < second.open
            }
        };
        if !aligned {
            return Ok(None);
        }

        let dominances = [first.body_ratio(), second.body_ratio(), third.body_ratio()];
        if dominances.iter().any(|d| *d < self.min_body_dominance) {
            return Ok(None);
        }

        // a shrinking third body signals exhaustion, not continuation
        if third.body() < first.body() * 0.5 {
            return Ok(None);
        }

        let avg = dominances.iter().sum::<f64>() / 3.0;
        let span = (1.0 - self.min_body_dominance).max(f64::EPSILON);
        let confidence = (0.6 + 0.3 * ((avg - self.min_body_dominance) / span)).min(0.9);

        let run = (third.close - first.open).abs();
        let stop = (run * 0.5).max(atr_or_avg_range(window, indicators) * 0.5);

        Ok(Some(PatternMatch {
            detector_id: self.id().to_string(),
            name: self.name().to_string(),
            priority: self.priority(),
            direction: self.direction,
            confidence,
            timeframe: third.timeframe,
            conditions: vec![
                match self.direction {
                    Direction::Bullish => "three consecutive bullish closes".to_string(),
                    Direction::Bearish => "three consecutive bearish closes".to_string(),
                },
                "monotone opens and closes".to_string(),
                format!("average body dominance {:.0}%", avg * 100.0),
            ],
            take_profit: run,
            stop_loss: stop,
            description: format!(
                "{} advancing {:.5} over three candles",
                self.name(),
                run
            ),
            detected_at: third.timestamp,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSource, Timeframe};
    use chrono::{TimeZone, Utc};

    fn make_candles(bars: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 3, 5, 13, 0, 0).unwrap();
        bars.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| {
                Candle::new(
                    "EURUSD",
                    Timeframe::M5,
                    start + chrono::Duration::minutes(5 * i as i64),
                    open,
                    high,
                    low,
                    close,
                    100,
                    DataSource::Feed,
                )
            })
            .collect()
    }

    fn no_indicators() -> IndicatorSet {
        IndicatorSet::new()
    }

    #[test]
    fn test_bullish_engulfing_detects() {
        let config = DetectorConfig::default();
        let detector = Engulfing::bullish(&config);
        let window = make_candles(&[
            (1.1050, 1.1060, 1.1010, 1.1020),
            (1.1015, 1.1070, 1.1005, 1.1065),
        ]);

        let found = detector
            .detect(&window, &no_indicators())
            .unwrap()
            .expect("engulfing should match");

        assert_eq!(found.detector_id, "bullish_engulfing");
        assert_eq!(found.direction, Direction::Bullish);
        assert!(found.confidence > 0.5 && found.confidence <= 0.9);
        assert!(found.take_profit > 0.0);
        assert!(found.stop_loss > 0.0);
        assert_eq!(found.detected_at, window[1].timestamp);
    }

    #[test]
    fn test_engulfing_rejects_smaller_body() {
        let config = DetectorConfig::default();
        let detector = Engulfing::bullish(&config);
        // bullish second candle but its body does not reach the prior open
        let window = make_candles(&[
            (1.1050, 1.1060, 1.1010, 1.1020),
            (1.1018, 1.1040, 1.1015, 1.1035),
        ]);

        assert!(detector.detect(&window, &no_indicators()).unwrap().is_none());
    }

    #[test]
    fn test_engulfing_rejects_same_color() {
        let config = DetectorConfig::default();
        let detector = Engulfing::bullish(&config);
        let window = make_candles(&[
            (1.1020, 1.1060, 1.1010, 1.1050),
            (1.1015, 1.1070, 1.1005, 1.1065),
        ]);

        assert!(detector.detect(&window, &no_indicators()).unwrap().is_none());
    }

    #[test]
    fn test_bearish_engulfing_detects() {
        let config = DetectorConfig::default();
        let detector = Engulfing::bearish(&config);
        let window = make_candles(&[
            (1.1020, 1.1060, 1.1010, 1.1050),
            (1.1055, 1.1065, 1.1000, 1.1005),
        ]);

        let found = detector
            .detect(&window, &no_indicators())
            .unwrap()
            .expect("bearish engulfing should match");
        assert_eq!(found.detector_id, "bearish_engulfing");
        assert_eq!(found.direction, Direction::Bearish);
    }

    #[test]
    fn test_marubozu_detects_full_body() {
        let config = DetectorConfig::default();
        let detector = Marubozu::new(&config);
        let window = make_candles(&[(1.1000, 1.1102, 1.0999, 1.1100)]);

        let found = detector
            .detect(&window, &no_indicators())
            .unwrap()
            .expect("marubozu should match");

        assert_eq!(found.direction, Direction::Bullish);
        assert!(found.confidence > 0.55);
        assert!(found.confidence < 0.95);
    }

    #[test]
    fn test_marubozu_rejects_wicks_and_flat_range() {
        let config = DetectorConfig::default();
        let detector = Marubozu::new(&config);

        let wicky = make_candles(&[(1.1000, 1.1100, 1.0950, 1.1040)]);
        assert!(detector.detect(&wicky, &no_indicators()).unwrap().is_none());

        let flat = make_candles(&[(1.1000, 1.1000, 1.1000, 1.1000)]);
        assert!(detector.detect(&flat, &no_indicators()).unwrap().is_none());
    }

    #[test]
    fn test_three_white_soldiers() {
        let config = DetectorConfig::default();
        let detector = TrendRun::soldiers(&config);
        let window = make_candles(&[
            (1.1000, 1.1055, 1.0995, 1.1050),
            (1.1060, 1.1115, 1.1055, 1.1110),
            (1.1120, 1.1175, 1.1115, 1.1170),
        ]);

        let found = detector
            .detect(&window, &no_indicators())
            .unwrap()
            .expect("soldiers should match");

        assert_eq!(found.detector_id, "three_white_soldiers");
        assert_eq!(found.direction, Direction::Bullish);
        assert_eq!(found.priority, PatternPriority::High);
        assert!(found.confidence > 0.6);
        assert!((found.take_profit - 0.0170).abs() < 1e-9);
    }

    #[test]
    fn test_three_black_crows() {
        let config = DetectorConfig::default();
        let detector = TrendRun::crows(&config);
        let window = make_candles(&[
            (1.1170, 1.1175, 1.1115, 1.1120),
            (1.1110, 1.1115, 1.1055, 1.1060),
            (1.1050, 1.1055, 1.0995, 1.1000),
        ]);

        let found = detector
            .detect(&window, &no_indicators())
            .unwrap()
            .expect("crows should match");
        assert_eq!(found.direction, Direction::Bearish);
    }

    #[test]
    fn test_soldiers_reject_wicky_candles() {
        let config = DetectorConfig::default();
        let detector = TrendRun::soldiers(&config);
        // rising closes but bodies only ~30% of each range
        let window = make_candles(&[
            (1.1000, 1.1080, 1.0960, 1.1030),
            (1.1035, 1.1120, 1.1000, 1.1070),
            (1.1075, 1.1160, 1.1040, 1.1110),
        ]);

        assert!(detector.detect(&window, &no_indicators()).unwrap().is_none());
    }

    #[test]
    fn test_soldiers_reject_broken_sequence() {
        let config = DetectorConfig::default();
        let detector = TrendRun::soldiers(&config);
        // middle candle bearish
        let window = make_candles(&[
            (1.1000, 1.1055, 1.0995, 1.1050),
            (1.1060, 1.1065, 1.1000, 1.1005),
            (1.1120, 1.1175, 1.1115, 1.1170),
        ]);

        assert!(detector.detect(&window, &no_indicators()).unwrap().is_none());
    }
}
