// Synthetic candle feed
//
// Seeded generator for demos and pipeline tests. Trend and range scenarios
// follow a drifting random walk; formation scenarios trace a waypoint
// skeleton with enough noise to look organic but not enough to break the
// formation's tolerances. Use 30+ candles for the formation scenarios so
// the pivot structure fits in the window.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{Candle, DataSource, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceScenario {
    Uptrend,
    Downtrend,
    Range,
    DoubleTop,
    HeadAndShoulders,
}

impl PriceScenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceScenario::Uptrend => "uptrend",
            PriceScenario::Downtrend => "downtrend",
            PriceScenario::Range => "range",
            PriceScenario::DoubleTop => "double-top",
            PriceScenario::HeadAndShoulders => "head-and-shoulders",
        }
    }
}

impl FromStr for PriceScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uptrend" => Ok(PriceScenario::Uptrend),
            "downtrend" => Ok(PriceScenario::Downtrend),
            "range" => Ok(PriceScenario::Range),
            "double-top" => Ok(PriceScenario::DoubleTop),
            "head-and-shoulders" => Ok(PriceScenario::HeadAndShoulders),
            other => Err(format!("unknown scenario: {}", other)),
        }
    }
}

pub struct SyntheticFeed {
    rng: StdRng,
    base_price: f64,
    base_volume: i64,
}

impl SyntheticFeed {
    /// Seeded for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 1.1000,
            base_volume: 500,
        }
    }

    /// `count` candles ending at the period containing `end`, timestamps
    /// aligned to the timeframe grid
    pub fn generate(
        &mut self,
        pair: &str,
        timeframe: Timeframe,
        scenario: PriceScenario,
        count: usize,
        end: DateTime<Utc>,
    ) -> Vec<Candle> {
        let path = match scenario {
            PriceScenario::Uptrend => self.trend_path(count, 0.0008),
            PriceScenario::Downtrend => self.trend_path(count, -0.0008),
            PriceScenario::Range => self.range_path(count),
            PriceScenario::DoubleTop => self.shaped_path(
                count,
                &[
                    (0.0, -0.0080),
                    (0.30, 0.0070),
                    (0.50, -0.0040),
                    (0.70, 0.0070),
                    (1.0, -0.0090),
                ],
            ),
            PriceScenario::HeadAndShoulders => self.shaped_path(
                count,
                &[
                    (0.0, -0.0080),
                    (0.20, 0.0050),
                    (0.32, -0.0020),
                    (0.50, 0.0110),
                    (0.68, -0.0018),
                    (0.80, 0.0052),
                    (1.0, -0.0095),
                ],
            ),
        };

        let last_period = timeframe.floor(end);
        path.into_iter()
            .enumerate()
            .map(|(i, price)| {
                let offset = (count - 1 - i) as i32;
                let timestamp = last_period - timeframe.duration() * offset;
                self.create_candle(pair, timeframe, timestamp, price)
            })
            .collect()
    }

    fn trend_path(&mut self, count: usize, drift: f64) -> Vec<f64> {
        let mut price = self.base_price;
        (0..count)
            .map(|_| {
                price += drift + self.rng.gen_range(-0.0003..0.0003);
                price
            })
            .collect()
    }

    /// Mean-reverting walk around the base price
    fn range_path(&mut self, count: usize) -> Vec<f64> {
        let mut price = self.base_price;
        (0..count)
            .map(|_| {
                let reversion = (self.base_price - price) * 0.2;
                price += reversion + self.rng.gen_range(-0.0012..0.0012);
                price
            })
            .collect()
    }

    /// Linear interpolation between (fraction, offset) waypoints plus a
    /// little noise; offsets are relative to the base price
    fn shaped_path(&mut self, count: usize, waypoints: &[(f64, f64)]) -> Vec<f64> {
        (0..count)
            .map(|i| {
                let t = if count <= 1 {
                    1.0
                } else {
                    i as f64 / (count - 1) as f64
                };
                let mut offset = waypoints[waypoints.len() - 1].1;
                for leg in waypoints.windows(2) {
                    let (t0, v0) = leg[0];
                    let (t1, v1) = leg[1];
                    if t <= t1 {
                        offset = v0 + (v1 - v0) * ((t - t0) / (t1 - t0));
                        break;
                    }
                }
                self.base_price + offset + self.rng.gen_range(-0.0002..0.0002)
            })
            .collect()
    }

    fn create_candle(
        &mut self,
        pair: &str,
        timeframe: Timeframe,
        timestamp: DateTime<Utc>,
        price: f64,
    ) -> Candle {
        let span = 0.0008;
        let high = price + self.rng.gen_range(0.0..span);
        let low = price - self.rng.gen_range(0.0..span);
        let open = (price + self.rng.gen_range(-span..span)).clamp(low, high);
        let volume = (self.base_volume as f64 * self.rng.gen_range(0.7..1.3)) as i64;

        Candle::new(
            pair,
            timeframe,
            timestamp,
            open,
            high,
            low,
            price,
            volume,
            DataSource::Synthetic,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorSet;
    use crate::patterns::{DetectorConfig, DoubleExtreme, HeadShoulders, PatternDetector};
    use chrono::TimeZone;

    fn feed() -> SyntheticFeed {
        SyntheticFeed::new(7)
    }

    fn end_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 12, 3, 0).unwrap()
    }

    #[test]
    fn test_uptrend_ends_higher() {
        let candles = feed().generate("EURUSD", Timeframe::M5, PriceScenario::Uptrend, 100, end_time());

        assert_eq!(candles.len(), 100);
        assert!(candles[99].close > candles[0].close);
    }

    #[test]
    fn test_range_stays_near_base() {
        let candles = feed().generate("EURUSD", Timeframe::M5, PriceScenario::Range, 200, end_time());

        for candle in &candles {
            assert!(candle.close > 1.09 && candle.close < 1.11);
        }
    }

    #[test]
    fn test_timestamps_align_to_the_grid() {
        let candles = feed().generate("EURUSD", Timeframe::H1, PriceScenario::Uptrend, 24, end_time());

        assert_eq!(
            candles[23].timestamp,
            Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()
        );
        for pair in candles.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, chrono::Duration::hours(1));
        }
    }

    #[test]
    fn test_ohlc_stays_consistent() {
        let candles = feed().generate("EURUSD", Timeframe::M5, PriceScenario::Range, 100, end_time());

        for candle in &candles {
            assert!(candle.high >= candle.open && candle.high >= candle.close);
            assert!(candle.low <= candle.open && candle.low <= candle.close);
        }
    }

    #[test]
    fn test_double_top_scenario_trips_the_detector() {
        let candles = feed().generate(
            "EURUSD",
            Timeframe::H1,
            PriceScenario::DoubleTop,
            60,
            end_time(),
        );

        let detector = DoubleExtreme::top(&DetectorConfig::default());
        let found = detector.detect(&candles, &IndicatorSet::new()).unwrap();
        assert!(found.is_some(), "double-top scenario should be detectable");
    }

    #[test]
    fn test_head_and_shoulders_scenario_trips_the_detector() {
        let candles = feed().generate(
            "EURUSD",
            Timeframe::H1,
            PriceScenario::HeadAndShoulders,
            60,
            end_time(),
        );

        let detector = HeadShoulders::standard(&DetectorConfig::default());
        let found = detector.detect(&candles, &IndicatorSet::new()).unwrap();
        assert!(
            found.is_some(),
            "head-and-shoulders scenario should be detectable"
        );
    }

    #[test]
    fn test_scenario_labels_parse() {
        assert_eq!(
            "double-top".parse::<PriceScenario>().unwrap(),
            PriceScenario::DoubleTop
        );
        assert!("sideways".parse::<PriceScenario>().is_err());
    }
}
