/// Stochastic Oscillator
///
/// Raw %K = 100 * (close - lowest low) / (highest high - lowest low) over the
/// %K period, smoothed by a short SMA; %D = SMA of the smoothed %K. A flat
/// window (highest high equals lowest low) reads as the 50 midline.
use super::moving_average::calculate_sma;
use crate::models::Candle;

/// Current (%K, %D), or None if insufficient data
///
/// Needs `k_period + k_smooth + d_period - 2` candles.
pub fn calculate_stochastic(
    candles: &[Candle],
    k_period: usize,
    k_smooth: usize,
    d_period: usize,
) -> Option<(f64, f64)> {
    if k_period == 0 || k_smooth == 0 || d_period == 0 {
        return None;
    }
    if candles.len() < k_period + k_smooth + d_period - 2 {
        return None;
    }

    let mut raw = Vec::with_capacity(candles.len() - k_period + 1);
    for window in candles.windows(k_period) {
        let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let close = window[window.len() - 1].close;

        let value = if highest > lowest {
            100.0 * (close - lowest) / (highest - lowest)
        } else {
            50.0
        };
        raw.push(value);
    }

    let mut smoothed = Vec::with_capacity(raw.len() - k_smooth + 1);
    for window in raw.windows(k_smooth) {
        smoothed.push(window.iter().sum::<f64>() / k_smooth as f64);
    }

    let k = *smoothed.last()?;
    let d = calculate_sma(&smoothed, d_period)?;

    Some((k, d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSource, Timeframe};
    use chrono::Utc;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                Candle::new(
                    "EURUSD",
                    Timeframe::H1,
                    Utc::now() + chrono::Duration::hours(i as i64),
                    close - 0.1,
                    close + 0.2,
                    close - 0.2,
                    close,
                    1000,
                    DataSource::Feed,
                )
            })
            .collect()
    }

    #[test]
    fn test_stochastic_high_in_uptrend() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let (k, d) = calculate_stochastic(&candles_from_closes(&closes), 14, 3, 3).unwrap();

        assert!(k > 80.0);
        assert!(d > 80.0);
    }

    #[test]
    fn test_stochastic_low_in_downtrend() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let (k, d) = calculate_stochastic(&candles_from_closes(&closes), 14, 3, 3).unwrap();

        assert!(k < 20.0);
        assert!(d < 20.0);
    }

    #[test]
    fn test_stochastic_bounded() {
        let closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + ((i * 7) % 11) as f64 - 5.0)
            .collect();
        let (k, d) = calculate_stochastic(&candles_from_closes(&closes), 14, 3, 3).unwrap();

        assert!((0.0..=100.0).contains(&k));
        assert!((0.0..=100.0).contains(&d));
    }

    #[test]
    fn test_stochastic_insufficient_data() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        assert!(calculate_stochastic(&candles_from_closes(&closes), 14, 3, 3).is_none());
    }
}
