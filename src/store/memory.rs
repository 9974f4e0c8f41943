use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

use super::{CandleStore, CooldownStore};
use crate::error::{PipelineError, Result};
use crate::models::{Candle, Timeframe};

/// In-memory candle store for tests and one-shot runs
///
/// Candles are kept per (pair, timeframe) in a BTreeMap keyed by period
/// start, which gives range queries and oldest-first iteration for free.
#[derive(Default)]
pub struct MemoryCandleStore {
    candles: RwLock<HashMap<(String, Timeframe), BTreeMap<DateTime<Utc>, Candle>>>,
}

impl MemoryCandleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CandleStore for MemoryCandleStore {
    async fn get_candles(
        &self,
        pair: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let candles = self
            .candles
            .read()
            .map_err(|e| PipelineError::store("get_candles", e))?;

        Ok(candles
            .get(&(pair.to_string(), timeframe))
            .map(|series| series.range(start..=end).map(|(_, c)| c.clone()).collect())
            .unwrap_or_default())
    }

    async fn save_candle(&self, candle: &Candle) -> Result<()> {
        let mut candles = self
            .candles
            .write()
            .map_err(|e| PipelineError::store("save_candle", e))?;

        let series = candles
            .entry((candle.pair.clone(), candle.timeframe))
            .or_default();

        // unique on (pair, timeframe, ts): replays leave the first write intact
        series.entry(candle.timestamp).or_insert_with(|| candle.clone());

        Ok(())
    }

    async fn candle_exists(
        &self,
        pair: &str,
        timeframe: Timeframe,
        timestamp: DateTime<Utc>,
    ) -> Result<bool> {
        let candles = self
            .candles
            .read()
            .map_err(|e| PipelineError::store("candle_exists", e))?;

        Ok(candles
            .get(&(pair.to_string(), timeframe))
            .is_some_and(|series| series.contains_key(&timestamp)))
    }

    async fn find_uncalculated(&self, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let candles = self
            .candles
            .read()
            .map_err(|e| PipelineError::store("find_uncalculated", e))?;

        let mut pending: Vec<Candle> = candles
            .iter()
            .filter(|((_, tf), _)| *tf == timeframe)
            .flat_map(|(_, series)| series.values())
            .filter(|c| !c.calculated)
            .cloned()
            .collect();

        pending.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.pair.cmp(&b.pair))
        });
        pending.truncate(limit);

        Ok(pending)
    }

    async fn mark_calculated(&self, ids: &[Uuid], version: i32) -> Result<u64> {
        let wanted: HashSet<Uuid> = ids.iter().copied().collect();
        let now = Utc::now();

        let mut candles = self
            .candles
            .write()
            .map_err(|e| PipelineError::store("mark_calculated", e))?;

        let mut updated = 0u64;
        for series in candles.values_mut() {
            for candle in series.values_mut() {
                if wanted.contains(&candle.id) && !candle.calculated {
                    candle.calculated = true;
                    candle.calculated_at = Some(now);
                    candle.calc_version = version;
                    updated += 1;
                }
            }
        }

        Ok(updated)
    }

    async fn count_uncalculated(&self, timeframe: Timeframe) -> Result<i64> {
        let candles = self
            .candles
            .read()
            .map_err(|e| PipelineError::store("count_uncalculated", e))?;

        Ok(candles
            .iter()
            .filter(|((_, tf), _)| *tf == timeframe)
            .flat_map(|(_, series)| series.values())
            .filter(|c| !c.calculated)
            .count() as i64)
    }

    async fn list_pairs(&self, timeframe: Timeframe) -> Result<Vec<String>> {
        let candles = self
            .candles
            .read()
            .map_err(|e| PipelineError::store("list_pairs", e))?;

        let mut pairs: Vec<String> = candles
            .keys()
            .filter(|(_, tf)| *tf == timeframe)
            .map(|(pair, _)| pair.clone())
            .collect();

        pairs.sort();
        pairs.dedup();

        Ok(pairs)
    }
}

/// In-memory cooldown store, one last-fired timestamp per (pair, pattern)
#[derive(Default)]
pub struct MemoryCooldownStore {
    fired: RwLock<HashMap<(String, String), DateTime<Utc>>>,
}

impl MemoryCooldownStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CooldownStore for MemoryCooldownStore {
    async fn was_recently_fired(
        &self,
        pair: &str,
        pattern_id: &str,
        window: chrono::Duration,
    ) -> Result<bool> {
        let fired = self
            .fired
            .read()
            .map_err(|e| PipelineError::store("was_recently_fired", e))?;

        Ok(fired
            .get(&(pair.to_string(), pattern_id.to_string()))
            .is_some_and(|at| *at > Utc::now() - window))
    }

    async fn record_fired(&self, pair: &str, pattern_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut fired = self
            .fired
            .write()
            .map_err(|e| PipelineError::store("record_fired", e))?;

        fired.insert((pair.to_string(), pattern_id.to_string()), at);

        Ok(())
    }
}
