// Pattern detector library
//
// Fourteen detectors behind one trait: five candlestick shapes, six pivot
// reversals, three continuation structures. Detectors are pure functions of
// the candle window and the cycle's indicator set; the analyzer owns
// scheduling, arbitration and cooldown.

pub mod pivots;

mod candlestick;
mod continuation;
mod reversal;

pub use candlestick::{Engulfing, Marubozu, TrendRun};
pub use continuation::{Flag, Wedge};
pub use reversal::{DoubleExtreme, HeadShoulders, TripleExtreme};

use std::sync::Arc;

use crate::error::Result;
use crate::indicators::{IndicatorKind, IndicatorSet, IndicatorValues, ThresholdState};
use crate::models::{Candle, PatternMatch, PatternPriority};

pub trait PatternDetector: Send + Sync {
    /// Stable identifier, also the cooldown key
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn priority(&self) -> PatternPriority;

    /// Smallest window the detector can say anything about
    fn min_candles(&self) -> usize;

    fn detect(&self, window: &[Candle], indicators: &IndicatorSet)
        -> Result<Option<PatternMatch>>;
}

const DETECTOR_IDS: [&str; 14] = [
    "marubozu",
    "bullish_engulfing",
    "bearish_engulfing",
    "three_white_soldiers",
    "three_black_crows",
    "flag",
    "rising_wedge",
    "falling_wedge",
    "double_top",
    "double_bottom",
    "triple_top",
    "triple_bottom",
    "head_and_shoulders",
    "inverse_head_and_shoulders",
];

/// Thresholds shared by the detector library
///
/// Price tolerances are fractional (0.002 = 0.2%), sized for major FX pairs
/// rather than crypto.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DetectorConfig {
    /// Detector ids to leave out of the registry
    #[serde(default)]
    pub disabled: Vec<String>,
    /// Bars on each side a pivot must dominate
    pub pivot_lookback: usize,
    /// Minimum bars between the pivots of a double/triple formation
    pub min_separation: usize,
    /// Two price levels count as equal within this fraction
    pub price_tolerance: f64,
    /// Neckline break tolerance band
    pub neckline_tolerance: f64,
    /// Head must exceed the higher shoulder by this fraction
    pub min_head_ratio: f64,
    /// Current body / previous body minimum for engulfing
    pub min_engulfing_ratio: f64,
    /// Body / range minimum per soldier or crow
    pub min_body_dominance: f64,
    /// Body / range minimum for a marubozu
    pub marubozu_body_ratio: f64,
    /// Minimum fractional move of a flag pole
    pub min_pole_move: f64,
    pub flag_pole_bars: usize,
    pub flag_channel_bars: usize,
    /// Channel edges count as parallel within this fractional slope per bar
    pub channel_slope_tolerance: f64,
    /// Wedge gap must shrink by at least this fraction start to end
    pub min_convergence: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            pivot_lookback: 3,
            min_separation: 4,
            price_tolerance: 0.002,
            neckline_tolerance: 0.001,
            min_head_ratio: 0.002,
            min_engulfing_ratio: 1.0,
            min_body_dominance: 0.6,
            marubozu_body_ratio: 0.95,
            min_pole_move: 0.004,
            flag_pole_bars: 10,
            flag_channel_bars: 8,
            channel_slope_tolerance: 0.0015,
            min_convergence: 0.25,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        for id in &self.disabled {
            if !DETECTOR_IDS.contains(&id.as_str()) {
                anyhow::bail!("unknown detector id in disabled list: {}", id);
            }
        }
        if self.pivot_lookback == 0 {
            anyhow::bail!("pivot_lookback must be at least 1");
        }
        if self.min_separation == 0 {
            anyhow::bail!("min_separation must be at least 1");
        }
        if self.price_tolerance <= 0.0 || self.neckline_tolerance <= 0.0 {
            anyhow::bail!("price tolerances must be positive");
        }
        if self.min_head_ratio <= 0.0 {
            anyhow::bail!("min_head_ratio must be positive");
        }
        if self.min_engulfing_ratio <= 0.0 {
            anyhow::bail!("min_engulfing_ratio must be positive");
        }
        if !(0.0..1.0).contains(&self.min_body_dominance) {
            anyhow::bail!("min_body_dominance must be in [0, 1)");
        }
        if !(0.0..=1.0).contains(&self.marubozu_body_ratio) || self.marubozu_body_ratio == 0.0 {
            anyhow::bail!("marubozu_body_ratio must be in (0, 1]");
        }
        if self.min_pole_move <= 0.0 {
            anyhow::bail!("min_pole_move must be positive");
        }
        if self.flag_pole_bars < 2 || self.flag_channel_bars < 3 {
            anyhow::bail!("flag pole needs at least 2 bars and the channel at least 3");
        }
        if self.channel_slope_tolerance <= 0.0 {
            anyhow::bail!("channel_slope_tolerance must be positive");
        }
        if !(0.0..1.0).contains(&self.min_convergence) || self.min_convergence == 0.0 {
            anyhow::bail!("min_convergence must be in (0, 1)");
        }
        Ok(())
    }
}

/// Build the detector list honoring the disabled set
///
/// Order is ascending structural significance (single candles first, full
/// chart formations last); the analyzer breaks remaining ties toward the
/// highest index, so the later entry wins.
pub fn registry(config: &DetectorConfig) -> Vec<Arc<dyn PatternDetector>> {
    let all: Vec<Arc<dyn PatternDetector>> = vec![
        Arc::new(Marubozu::new(config)),
        Arc::new(Engulfing::bullish(config)),
        Arc::new(Engulfing::bearish(config)),
        Arc::new(TrendRun::soldiers(config)),
        Arc::new(TrendRun::crows(config)),
        Arc::new(Flag::new(config)),
        Arc::new(Wedge::rising(config)),
        Arc::new(Wedge::falling(config)),
        Arc::new(DoubleExtreme::top(config)),
        Arc::new(DoubleExtreme::bottom(config)),
        Arc::new(TripleExtreme::top(config)),
        Arc::new(TripleExtreme::bottom(config)),
        Arc::new(HeadShoulders::standard(config)),
        Arc::new(HeadShoulders::inverse(config)),
    ];

    all.into_iter()
        .filter(|d| !config.disabled.iter().any(|id| id == d.id()))
        .collect()
}

/// ATR if the cycle computed one, else the average range of the last candles
pub(crate) fn atr_or_avg_range(window: &[Candle], indicators: &IndicatorSet) -> f64 {
    if let Some(result) = indicators.get(&IndicatorKind::Atr) {
        if result.value > 0.0 {
            return result.value;
        }
    }

    if window.is_empty() {
        return 0.0;
    }
    let tail = &window[window.len().saturating_sub(14)..];
    tail.iter().map(|c| c.range()).sum::<f64>() / tail.len() as f64
}

/// Medium-period RSI state for confluence checks, if the cycle computed RSI
pub(crate) fn medium_rsi_state(indicators: &IndicatorSet) -> Option<ThresholdState> {
    let result = indicators.get(&IndicatorKind::Rsi)?;
    match &result.values {
        IndicatorValues::Rsi { periods } => periods.get(periods.len() / 2).map(|p| p.state),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_builds_all_detectors() {
        let detectors = registry(&DetectorConfig::default());
        assert_eq!(detectors.len(), 14);

        let ids: HashSet<&str> = detectors.iter().map(|d| d.id()).collect();
        assert_eq!(ids.len(), 14);
        for id in DETECTOR_IDS {
            assert!(ids.contains(id), "missing detector {}", id);
        }
    }

    #[test]
    fn test_registry_honors_disabled() {
        let config = DetectorConfig {
            disabled: vec!["marubozu".to_string(), "flag".to_string()],
            ..Default::default()
        };
        let detectors = registry(&config);
        assert_eq!(detectors.len(), 12);
        assert!(!detectors.iter().any(|d| d.id() == "marubozu"));
        assert!(!detectors.iter().any(|d| d.id() == "flag"));
    }

    #[test]
    fn test_chart_formations_register_after_candlesticks() {
        let detectors = registry(&DetectorConfig::default());
        let index_of = |id: &str| detectors.iter().position(|d| d.id() == id).unwrap();

        assert!(index_of("double_top") > index_of("bullish_engulfing"));
        assert!(index_of("head_and_shoulders") > index_of("double_top"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = DetectorConfig::default();
        config.marubozu_body_ratio = 1.4;
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::default();
        config.disabled = vec!["no_such_detector".to_string()];
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::default();
        config.min_convergence = 0.0;
        assert!(config.validate().is_err());

        assert!(DetectorConfig::default().validate().is_ok());
    }
}
