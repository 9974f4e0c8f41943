// Storage seams for the pipeline
//
// The pipeline talks to candles and cooldown state only through these
// traits; Postgres/Redis back the real deployment and the in-memory
// implementations keep the default test run hermetic.

pub mod memory;
pub mod postgres;
pub mod redis;

pub use memory::{MemoryCandleStore, MemoryCooldownStore};
pub use postgres::PostgresCandleStore;
pub use redis::RedisCooldownStore;

use crate::error::Result;
use crate::models::{Candle, Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Append-only OHLCV store keyed by (pair, timeframe, timestamp)
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// Candles in [start, end] inclusive, oldest first
    async fn get_candles(
        &self,
        pair: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>>;

    /// Insert a candle; a record already at the unique key is left untouched
    async fn save_candle(&self, candle: &Candle) -> Result<()>;

    async fn candle_exists(
        &self,
        pair: &str,
        timeframe: Timeframe,
        timestamp: DateTime<Utc>,
    ) -> Result<bool>;

    /// Candles whose indicators have not been computed yet, oldest first
    async fn find_uncalculated(&self, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>>;

    /// Flag the given candles calculated at the given version
    ///
    /// Only rows still unflagged are touched; returns how many were.
    async fn mark_calculated(&self, ids: &[Uuid], version: i32) -> Result<u64>;

    async fn count_uncalculated(&self, timeframe: Timeframe) -> Result<i64>;

    async fn list_pairs(&self, timeframe: Timeframe) -> Result<Vec<String>>;
}

/// Remembers which (pair, pattern) alerts fired recently
#[async_trait]
pub trait CooldownStore: Send + Sync {
    async fn was_recently_fired(
        &self,
        pair: &str,
        pattern_id: &str,
        window: chrono::Duration,
    ) -> Result<bool>;

    async fn record_fired(&self, pair: &str, pattern_id: &str, at: DateTime<Utc>) -> Result<()>;
}
