// Differential calculation tracker
//
// Knows which candles still need indicator work. All reads and writes go
// through the CandleStore; this layer adds the calc-version stamp, per-pair
// serialization, and the outstanding-work summary.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Candle, Timeframe};
use crate::store::CandleStore;

/// Outstanding (not yet calculated) candle counts per timeframe
#[derive(Debug, Clone)]
pub struct TrackerSummary {
    pub outstanding: Vec<(Timeframe, i64)>,
}

impl TrackerSummary {
    pub fn total(&self) -> i64 {
        self.outstanding.iter().map(|(_, count)| count).sum()
    }
}

pub struct DifferentialTracker {
    store: Arc<dyn CandleStore>,
    calc_version: i32,
    locks: Mutex<HashMap<(String, Timeframe), Arc<Mutex<()>>>>,
}

impl DifferentialTracker {
    pub fn new(store: Arc<dyn CandleStore>, calc_version: i32) -> Self {
        Self {
            store,
            calc_version,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Serialize work on one (pair, timeframe); other pairs proceed freely
    ///
    /// The guard is owned, so it can be held across awaits and dropped when
    /// the cycle finishes (or is cancelled).
    pub async fn lock_pair(&self, pair: &str, timeframe: Timeframe) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self.locks.lock().await;
            locks
                .entry((pair.to_string(), timeframe))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        slot.lock_owned().await
    }

    /// Oldest-first batch of candles that still need indicators
    pub async fn find_uncalculated(
        &self,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let candles = self.store.find_uncalculated(timeframe, limit).await?;
        debug!(
            "Found {} uncalculated {} candles (limit {})",
            candles.len(),
            timeframe,
            limit
        );
        Ok(candles)
    }

    /// Same batch restricted to one pair
    pub async fn find_uncalculated_for_pair(
        &self,
        pair: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let candles = self.store.find_uncalculated(timeframe, limit).await?;
        Ok(candles.into_iter().filter(|c| c.pair == pair).collect())
    }

    /// Stamp the given candles as calculated at the tracker's version
    ///
    /// The store only touches rows still unflagged, so a concurrent worker
    /// marking the same batch is harmless; we just log the shortfall.
    pub async fn mark_calculated(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let updated = self.store.mark_calculated(ids, self.calc_version).await?;

        if updated < ids.len() as u64 {
            warn!(
                "Marked {}/{} candles; the rest were already flagged",
                updated,
                ids.len()
            );
        } else {
            debug!("Marked {} candles calculated (v{})", updated, self.calc_version);
        }

        Ok(updated)
    }

    /// Outstanding counts across every timeframe
    pub async fn summarize(&self) -> Result<TrackerSummary> {
        let mut outstanding = Vec::new();
        for timeframe in Timeframe::all() {
            let count = self.store.count_uncalculated(timeframe).await?;
            outstanding.push((timeframe, count));
        }

        Ok(TrackerSummary { outstanding })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, DataSource};
    use crate::store::MemoryCandleStore;
    use chrono::{TimeZone, Utc};

    fn candle_at(pair: &str, timeframe: Timeframe, hour: u32, minute: u32) -> Candle {
        Candle::new(
            pair,
            timeframe,
            Utc.with_ymd_and_hms(2024, 3, 5, hour, minute, 0).unwrap(),
            1.10,
            1.11,
            1.09,
            1.105,
            100,
            DataSource::Feed,
        )
    }

    async fn seeded_tracker() -> DifferentialTracker {
        let store = Arc::new(MemoryCandleStore::new());
        for minute in [0, 5, 10] {
            store
                .save_candle(&candle_at("EURUSD", Timeframe::M5, 13, minute))
                .await
                .unwrap();
        }
        store
            .save_candle(&candle_at("EURUSD", Timeframe::H1, 13, 0))
            .await
            .unwrap();

        DifferentialTracker::new(store, 1)
    }

    #[tokio::test]
    async fn test_find_mark_and_summarize() {
        let tracker = seeded_tracker().await;

        let summary = tracker.summarize().await.unwrap();
        assert_eq!(summary.total(), 4);

        let pending = tracker.find_uncalculated(Timeframe::M5, 10).await.unwrap();
        assert_eq!(pending.len(), 3);
        assert!(pending[0].timestamp < pending[2].timestamp);

        let ids: Vec<Uuid> = pending.iter().map(|c| c.id).collect();
        assert_eq!(tracker.mark_calculated(&ids).await.unwrap(), 3);

        let summary = tracker.summarize().await.unwrap();
        assert_eq!(summary.total(), 1);
        assert!(summary
            .outstanding
            .iter()
            .any(|(tf, count)| *tf == Timeframe::H1 && *count == 1));

        // second pass finds nothing to touch
        assert_eq!(tracker.mark_calculated(&ids).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_for_pair_filters_other_pairs() {
        let store = Arc::new(MemoryCandleStore::new());
        store
            .save_candle(&candle_at("EURUSD", Timeframe::M5, 13, 0))
            .await
            .unwrap();
        store
            .save_candle(&candle_at("GBPUSD", Timeframe::M5, 13, 0))
            .await
            .unwrap();

        let tracker = DifferentialTracker::new(store, 1);
        let pending = tracker
            .find_uncalculated_for_pair("GBPUSD", Timeframe::M5, 10)
            .await
            .unwrap();

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].pair, "GBPUSD");
    }

    #[tokio::test]
    async fn test_pair_lock_serializes_same_pair() {
        let store = Arc::new(MemoryCandleStore::new());
        let tracker = Arc::new(DifferentialTracker::new(store, 1));

        let guard = tracker.lock_pair("EURUSD", Timeframe::M5).await;

        let tracker2 = tracker.clone();
        let waiter = tokio::spawn(async move {
            let _guard = tracker2.lock_pair("EURUSD", Timeframe::M5).await;
            Utc::now()
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let released_at = Utc::now();
        drop(guard);

        let acquired_at = waiter.await.unwrap();
        assert!(acquired_at >= released_at);
    }

    #[tokio::test]
    async fn test_pair_lock_independent_across_pairs_and_timeframes() {
        let store = Arc::new(MemoryCandleStore::new());
        let tracker = DifferentialTracker::new(store, 1);

        let _eur = tracker.lock_pair("EURUSD", Timeframe::M5).await;
        let _gbp = tracker.lock_pair("GBPUSD", Timeframe::M5).await;
        let _eur_h1 = tracker.lock_pair("EURUSD", Timeframe::H1).await;
    }
}
