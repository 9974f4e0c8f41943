/// Relative Strength Index (RSI)
///
/// Measures the magnitude of recent price changes to evaluate overbought or
/// oversold conditions. Uses Wilder smoothing: the first average gain/loss is
/// a simple mean over the period, every later one is
/// `(prev * (period - 1) + current) / period`.
///
/// Values:
/// - RSI above the upper threshold (default 70): overbought
/// - RSI below the lower threshold (default 30): oversold
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    calculate_rsi_series(prices, period)?.last().copied()
}

/// RSI at every step once the seed window is filled
///
/// Element 0 is the RSI over prices[0..=period]; the last element is the
/// current RSI. Needs `period + 1` prices for one value.
pub fn calculate_rsi_series(prices: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let mut gains = Vec::with_capacity(prices.len() - 1);
    let mut losses = Vec::with_capacity(prices.len() - 1);

    // Calculate price changes
    for i in 1..prices.len() {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    // Seed with a simple average, then apply Wilder smoothing
    let mut avg_gain: f64 = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[..period].iter().sum::<f64>() / period as f64;

    let mut series = Vec::with_capacity(gains.len() - period + 1);
    series.push(rsi_value(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period as f64 - 1.0) + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + losses[i]) / period as f64;
        series.push(rsi_value(avg_gain, avg_loss));
    }

    Some(series)
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}
