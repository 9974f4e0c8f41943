// Pivot helpers shared by the chart-formation detectors

use crate::models::Candle;

/// A local price extreme
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pivot {
    pub index: usize,
    pub price: f64,
}

/// Indices whose high strictly dominates every bar within `lookback` bars on
/// both sides
///
/// Strictness means plateaus of equal highs produce no pivot; the first and
/// last `lookback` bars can never qualify.
pub fn pivot_highs(candles: &[Candle], lookback: usize) -> Vec<Pivot> {
    let mut pivots = Vec::new();
    if candles.len() < 2 * lookback + 1 {
        return pivots;
    }

    for i in lookback..candles.len() - lookback {
        let high = candles[i].high;
        let dominant = candles[i - lookback..=i + lookback]
            .iter()
            .enumerate()
            .all(|(offset, c)| offset == lookback || c.high < high);

        if dominant {
            pivots.push(Pivot { index: i, price: high });
        }
    }

    pivots
}

/// Mirror of `pivot_highs` over lows
pub fn pivot_lows(candles: &[Candle], lookback: usize) -> Vec<Pivot> {
    let mut pivots = Vec::new();
    if candles.len() < 2 * lookback + 1 {
        return pivots;
    }

    for i in lookback..candles.len() - lookback {
        let low = candles[i].low;
        let dominant = candles[i - lookback..=i + lookback]
            .iter()
            .enumerate()
            .all(|(offset, c)| offset == lookback || c.low > low);

        if dominant {
            pivots.push(Pivot { index: i, price: low });
        }
    }

    pivots
}

/// Price change per bar between two pivots
pub fn slope(a: &Pivot, b: &Pivot) -> f64 {
    let dx = b.index as f64 - a.index as f64;
    if dx == 0.0 {
        0.0
    } else {
        (b.price - a.price) / dx
    }
}

/// Value at `index` of the line through two pivots
pub fn line_value(a: &Pivot, b: &Pivot, index: usize) -> f64 {
    a.price + slope(a, b) * (index as f64 - a.index as f64)
}

/// Least-squares slope of a series, in price units per bar
pub fn regression_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }

    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSource, Timeframe};
    use chrono::{TimeZone, Utc};

    fn candles_from_ranges(ranges: &[(f64, f64)]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        ranges
            .iter()
            .enumerate()
            .map(|(i, &(high, low))| {
                let mid = (high + low) / 2.0;
                Candle::new(
                    "EURUSD",
                    Timeframe::M5,
                    start + chrono::Duration::minutes(5 * i as i64),
                    mid,
                    high,
                    low,
                    mid,
                    100,
                    DataSource::Feed,
                )
            })
            .collect()
    }

    #[test]
    fn test_pivot_high_at_triangle_apex() {
        let candles = candles_from_ranges(&[
            (1.10, 1.09),
            (1.11, 1.10),
            (1.12, 1.11),
            (1.13, 1.12),
            (1.12, 1.11),
            (1.11, 1.10),
            (1.10, 1.09),
        ]);

        let pivots = pivot_highs(&candles, 2);
        assert_eq!(pivots.len(), 1);
        assert_eq!(pivots[0].index, 3);
        assert!((pivots[0].price - 1.13).abs() < 1e-9);
    }

    #[test]
    fn test_plateau_is_not_a_pivot() {
        let candles = candles_from_ranges(&[
            (1.10, 1.09),
            (1.12, 1.11),
            (1.12, 1.11),
            (1.10, 1.09),
            (1.09, 1.08),
        ]);

        assert!(pivot_highs(&candles, 1).is_empty());
    }

    #[test]
    fn test_edges_never_qualify() {
        // the global maximum sits in the first lookback band
        let candles = candles_from_ranges(&[
            (1.15, 1.14),
            (1.12, 1.11),
            (1.11, 1.10),
            (1.10, 1.09),
            (1.09, 1.08),
        ]);

        assert!(pivot_highs(&candles, 2).is_empty());
    }

    #[test]
    fn test_pivot_low_in_v_shape() {
        let candles = candles_from_ranges(&[
            (1.12, 1.11),
            (1.11, 1.10),
            (1.10, 1.08),
            (1.11, 1.10),
            (1.12, 1.11),
        ]);

        let pivots = pivot_lows(&candles, 2);
        assert_eq!(pivots.len(), 1);
        assert_eq!(pivots[0].index, 2);
        assert!((pivots[0].price - 1.08).abs() < 1e-9);
    }

    #[test]
    fn test_slope_and_line_value() {
        let a = Pivot { index: 2, price: 1.10 };
        let b = Pivot { index: 6, price: 1.14 };

        assert!((slope(&a, &b) - 0.01).abs() < 1e-12);
        assert!((line_value(&a, &b, 8) - 1.16).abs() < 1e-12);
        assert!((line_value(&a, &b, 0) - 1.08).abs() < 1e-12);
    }

    #[test]
    fn test_regression_slope() {
        let perfect: Vec<f64> = (0..10).map(|i| 1.0 + 0.02 * i as f64).collect();
        assert!((regression_slope(&perfect) - 0.02).abs() < 1e-12);

        let flat = vec![1.5; 8];
        assert!(regression_slope(&flat).abs() < 1e-12);

        assert_eq!(regression_slope(&[1.0]), 0.0);
    }
}
