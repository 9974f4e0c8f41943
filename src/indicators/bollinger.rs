/// Bollinger Bands
///
/// Middle band = SMA over the period; upper/lower = middle +/- the population
/// standard deviation of the same window times the multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Current bands, or None if insufficient data
pub fn calculate_bollinger(prices: &[f64], period: usize, multiplier: f64) -> Option<BollingerBands> {
    calculate_bollinger_series(prices, period, multiplier)?
        .last()
        .copied()
}

/// Bands for every trailing window, element 0 covering prices[0..period]
pub fn calculate_bollinger_series(
    prices: &[f64],
    period: usize,
    multiplier: f64,
) -> Option<Vec<BollingerBands>> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let mut series = Vec::with_capacity(prices.len() - period + 1);

    for window in prices.windows(period) {
        let middle: f64 = window.iter().sum::<f64>() / period as f64;
        let variance: f64 =
            window.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / period as f64;
        let deviation = variance.sqrt() * multiplier;

        series.push(BollingerBands {
            upper: middle + deviation,
            middle,
            lower: middle - deviation,
        });
    }

    Some(series)
}
