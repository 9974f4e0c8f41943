use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

use super::CooldownStore;
use crate::error::{PipelineError, Result};

/// Redis-backed cooldown store
///
/// One sorted set per pair (`fxscan:fired:{pair}`), member = pattern id,
/// score = epoch seconds of the last alert. Entries survive restarts, so a
/// rescheduled process does not re-alert inside the window.
pub struct RedisCooldownStore {
    conn: ConnectionManager,
}

fn fired_key(pair: &str) -> String {
    format!("fxscan:fired:{}", pair)
}

impl RedisCooldownStore {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client =
            redis::Client::open(redis_url).map_err(|e| PipelineError::store("redis_open", e))?;

        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| PipelineError::store("redis_connect", "connection timeout after 5 seconds"))?
            .map_err(|e| PipelineError::store("redis_connect", e))?;

        info!("Cooldown store connected to Redis");

        Ok(Self { conn })
    }

    /// Drop fired entries older than `keep`; returns how many were removed
    pub async fn cleanup_old(&self, pair: &str, keep: chrono::Duration) -> Result<usize> {
        let mut conn = self.conn.clone();
        let key = fired_key(pair);
        let cutoff = (Utc::now() - keep).timestamp();

        let removed: usize = conn
            .zrembyscore(&key, "-inf", cutoff)
            .await
            .map_err(|e| PipelineError::store("cleanup_old", e))?;

        if removed > 0 {
            debug!("Removed {} stale cooldown entries for {}", removed, pair);
        }

        Ok(removed)
    }

    #[cfg(test)]
    async fn clear(&self, pair: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(fired_key(pair))
            .await
            .map_err(|e| PipelineError::store("clear", e))?;
        Ok(())
    }
}

#[async_trait]
impl CooldownStore for RedisCooldownStore {
    async fn was_recently_fired(
        &self,
        pair: &str,
        pattern_id: &str,
        window: chrono::Duration,
    ) -> Result<bool> {
        let mut conn = self.conn.clone();
        let key = fired_key(pair);

        let score: Option<f64> = conn
            .zscore(&key, pattern_id)
            .await
            .map_err(|e| PipelineError::store("was_recently_fired", e))?;

        let cutoff = (Utc::now() - window).timestamp() as f64;
        Ok(score.is_some_and(|s| s > cutoff))
    }

    async fn record_fired(&self, pair: &str, pattern_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = fired_key(pair);

        conn.zadd::<_, _, _, ()>(&key, pattern_id, at.timestamp())
            .await
            .map_err(|e| PipelineError::store("record_fired", e))?;

        Ok(())
    }
}
