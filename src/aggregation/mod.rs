// Candle aggregation engine
//
// Rolls 5-minute candles up into 1h/4h/1d candles over clock-aligned
// windows. Aggregation is idempotent: the window math is deterministic and
// the store keeps the first write for a given (pair, timeframe, start).

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::models::{Candle, DataSource, Timeframe};
use crate::store::CandleStore;

/// Window of the most recent complete period strictly before `now`
///
/// Returns (start, end) where both bound 5-minute candle start times
/// inclusively: end = start + period - 5m. Asked for 1h at 01:05, the
/// window is [00:00, 00:55].
pub fn aggregation_period(
    timeframe: Timeframe,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let period = timeframe.duration();
    let start = timeframe.floor(now) - period;
    let end = start + period - Timeframe::M5.duration();
    (start, end)
}

pub struct Aggregator {
    store: Arc<dyn CandleStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn CandleStore>) -> Self {
        Self { store }
    }

    /// Build and persist the rollup candle for the last complete period
    ///
    /// Partial windows (weekend gaps, feed outages) aggregate whatever
    /// exists; an empty window is the skippable InsufficientData condition.
    pub async fn aggregate(
        &self,
        pair: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<Candle> {
        if !timeframe.is_aggregated() {
            return Err(PipelineError::Config(format!(
                "{} is not an aggregation target",
                timeframe
            )));
        }

        let (start, end) = aggregation_period(timeframe, now);

        let base = self
            .store
            .get_candles(pair, Timeframe::M5, start, end)
            .await?;

        if base.is_empty() {
            return Err(PipelineError::InsufficientData {
                pair: pair.to_string(),
                timeframe,
                stage: "aggregate",
            });
        }

        let expected = timeframe.base_candles();
        if base.len() < expected {
            debug!(
                "Partial {} window for {}: {}/{} base candles",
                timeframe,
                pair,
                base.len(),
                expected
            );
        }

        let open = base[0].open;
        let close = base[base.len() - 1].close;
        let high = base.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let low = base.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let volume = base.iter().map(|c| c.volume).sum();

        let candle = Candle::new(
            pair,
            timeframe,
            start,
            open,
            high,
            low,
            close,
            volume,
            DataSource::Aggregated,
        );

        if self.store.candle_exists(pair, timeframe, start).await? {
            debug!(
                "{} {} candle at {} already exists, skipping write",
                pair, timeframe, start
            );
        } else {
            self.store.save_candle(&candle).await?;
            info!(
                "📊 Aggregated {} {} candle at {} from {} base candles",
                pair,
                timeframe,
                start.format("%Y-%m-%d %H:%M"),
                base.len()
            );
        }

        Ok(candle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCandleStore;
    use chrono::TimeZone;

    fn base_candle(minute_index: i64) -> Candle {
        let open = 1.1000 + 0.0010 * minute_index as f64;
        Candle::new(
            "EURUSD",
            Timeframe::M5,
            Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()
                + chrono::Duration::minutes(5 * minute_index),
            open,
            open + 0.0015,
            open - 0.0005,
            open + 0.0010,
            100 + minute_index,
            DataSource::Feed,
        )
    }

    #[test]
    fn test_aggregation_period_hour() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 1, 5, 0).unwrap();
        let (start, end) = aggregation_period(Timeframe::H1, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 5, 0, 55, 0).unwrap());
    }

    #[test]
    fn test_aggregation_period_on_exact_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 1, 0, 0).unwrap();
        let (start, end) = aggregation_period(Timeframe::H1, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 5, 0, 55, 0).unwrap());
    }

    #[test]
    fn test_aggregation_period_4h_and_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 13, 47, 0).unwrap();

        let (start, end) = aggregation_period(Timeframe::H4, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 5, 11, 55, 0).unwrap());

        let (start, end) = aggregation_period(Timeframe::D1, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 4, 23, 55, 0).unwrap());
    }

    #[tokio::test]
    async fn test_full_hour_rollup() {
        let store = Arc::new(MemoryCandleStore::new());
        for i in 0..12 {
            store.save_candle(&base_candle(i)).await.unwrap();
        }

        let aggregator = Aggregator::new(store.clone());
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 1, 5, 0).unwrap();
        let candle = aggregator
            .aggregate("EURUSD", Timeframe::H1, now)
            .await
            .unwrap();

        assert_eq!(
            candle.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()
        );
        assert!((candle.open - 1.1000).abs() < 1e-9);
        assert!((candle.close - 1.1120).abs() < 1e-9);
        assert!((candle.high - 1.1125).abs() < 1e-9);
        assert!((candle.low - 1.0995).abs() < 1e-9);
        assert_eq!(candle.volume, 1266);
        assert_eq!(candle.source, DataSource::Aggregated);

        assert!(store
            .candle_exists("EURUSD", Timeframe::H1, candle.timestamp)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_aggregate_is_idempotent() {
        let store = Arc::new(MemoryCandleStore::new());
        for i in 0..12 {
            store.save_candle(&base_candle(i)).await.unwrap();
        }

        let aggregator = Aggregator::new(store.clone());
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 1, 5, 0).unwrap();

        let first = aggregator
            .aggregate("EURUSD", Timeframe::H1, now)
            .await
            .unwrap();
        let second = aggregator
            .aggregate("EURUSD", Timeframe::H1, now)
            .await
            .unwrap();

        assert!((first.close - second.close).abs() < 1e-9);

        let stored = store
            .get_candles("EURUSD", Timeframe::H1, first.timestamp, first.timestamp)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, first.id);
    }

    #[tokio::test]
    async fn test_partial_window_aggregates() {
        let store = Arc::new(MemoryCandleStore::new());
        for i in [0, 5, 11] {
            store.save_candle(&base_candle(i)).await.unwrap();
        }

        let aggregator = Aggregator::new(store);
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 1, 5, 0).unwrap();
        let candle = aggregator
            .aggregate("EURUSD", Timeframe::H1, now)
            .await
            .unwrap();

        assert!((candle.open - 1.1000).abs() < 1e-9);
        assert!((candle.close - 1.1120).abs() < 1e-9);
        assert_eq!(candle.volume, 100 + 105 + 111);
    }

    #[tokio::test]
    async fn test_empty_window_is_skippable() {
        let store = Arc::new(MemoryCandleStore::new());
        let aggregator = Aggregator::new(store);
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 1, 5, 0).unwrap();

        let err = aggregator
            .aggregate("EURUSD", Timeframe::H1, now)
            .await
            .unwrap_err();

        assert!(err.is_skippable());
        assert!(matches!(err, PipelineError::InsufficientData { .. }));
    }
}
