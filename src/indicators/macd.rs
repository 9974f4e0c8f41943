/// Moving Average Convergence Divergence (MACD)
///
/// MACD line = EMA(fast) - EMA(slow); signal line = EMA of the MACD line;
/// histogram = MACD - signal. Crossovers are read from the sign of
/// (MACD - signal) between consecutive points.
use super::moving_average::calculate_ema_series;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Current MACD point, or None if insufficient data
pub fn calculate_macd(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Option<MacdPoint> {
    calculate_macd_series(prices, fast_period, slow_period, signal_period)?
        .last()
        .copied()
}

/// MACD points for every step once both EMAs and the signal are seeded
///
/// Needs `slow_period + signal_period - 1` prices for one point. Requires
/// fast_period < slow_period.
pub fn calculate_macd_series(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Option<Vec<MacdPoint>> {
    if fast_period == 0 || signal_period == 0 || fast_period >= slow_period {
        return None;
    }
    if prices.len() < slow_period + signal_period - 1 {
        return None;
    }

    let fast_series = calculate_ema_series(prices, fast_period)?;
    let slow_series = calculate_ema_series(prices, slow_period)?;

    // Both series end at the last price; align the fast one to the slow one
    let offset = slow_period - fast_period;
    let macd_line: Vec<f64> = slow_series
        .iter()
        .enumerate()
        .map(|(j, slow)| fast_series[j + offset] - slow)
        .collect();

    let signal_series = calculate_ema_series(&macd_line, signal_period)?;

    let points = signal_series
        .iter()
        .enumerate()
        .map(|(k, &signal)| {
            let macd = macd_line[k + signal_period - 1];
            MacdPoint {
                macd,
                signal,
                histogram: macd - signal,
            }
        })
        .collect();

    Some(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_prices(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * step).collect()
    }

    #[test]
    fn test_macd_insufficient_data() {
        let prices = trending_prices(20, 0.5);
        assert!(calculate_macd(&prices, 12, 26, 9).is_none());
    }

    #[test]
    fn test_macd_minimum_length() {
        // slow + signal - 1 = 34 prices give exactly one point
        let prices = trending_prices(34, 0.5);
        let series = calculate_macd_series(&prices, 12, 26, 9).unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let prices = trending_prices(60, 0.5);
        let point = calculate_macd(&prices, 12, 26, 9).unwrap();
        // Fast EMA sits above slow EMA in a steady uptrend
        assert!(point.macd > 0.0);
    }

    #[test]
    fn test_histogram_identity() {
        let mut prices = trending_prices(40, 0.5);
        prices.extend(trending_prices(20, -0.8));

        let series = calculate_macd_series(&prices, 12, 26, 9).unwrap();
        for point in series {
            assert!((point.histogram - (point.macd - point.signal)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_macd_rejects_inverted_periods() {
        let prices = trending_prices(60, 0.5);
        assert!(calculate_macd(&prices, 26, 12, 9).is_none());
    }
}
