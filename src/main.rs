use chrono::Utc;
use fxscan::analyzer::ScanOutcome;
use fxscan::models::Timeframe;
use fxscan::notify::LogNotifier;
use fxscan::store::{CooldownStore, MemoryCooldownStore, PostgresCandleStore, RedisCooldownStore};
use fxscan::{AppConfig, Pipeline};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Seconds past the period boundary before a scan fires, so the feed has
/// landed the period's final base candle by the time we aggregate
const BOUNDARY_SETTLE_SECONDS: u64 = 10;

const CLEANUP_INTERVAL_SECONDS: u64 = 3600;
const CLEANUP_KEEP_HOURS: i64 = 48;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    tracing::info!("🚀 fxscan starting - one scan loop per timeframe");

    let config = AppConfig::load()?;
    let timeframes = config.parsed_timeframes()?;

    let store = Arc::new(PostgresCandleStore::new(&config.database_url).await?);

    let redis_cooldown = connect_cooldown(&config.redis_url).await;
    let cooldown: Arc<dyn CooldownStore> = match &redis_cooldown {
        Some(redis) => redis.clone(),
        None => Arc::new(MemoryCooldownStore::new()),
    };

    let pipeline = Arc::new(Pipeline::new(store, cooldown, Arc::new(LogNotifier), &config));

    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Pairs: {}", config.pairs.join(", "));
    tracing::info!("  Timeframes: {}", config.timeframes.join(", "));
    tracing::info!("  Batch limit: {}", config.batch_limit);
    tracing::info!("  Cooldown: {} min", config.cooldown_minutes);
    tracing::info!("  Detectors: {}", pipeline.detector_count());
    tracing::info!("  Calc version: {}", config.calc_version);

    match pipeline.summarize().await {
        Ok(summary) => tracing::info!("  Outstanding candles: {}", summary.total()),
        Err(e) => tracing::warn!("  Could not count outstanding candles: {}", e),
    }

    tracing::info!("\n🔄 Spawning scan loops...");

    let mut tasks = JoinSet::new();
    for timeframe in timeframes {
        let pipeline = pipeline.clone();
        tasks.spawn(async move {
            scan_loop(pipeline, timeframe).await;
        });
        tracing::info!(
            "  🔄 {}: every {} min (clock-aligned)",
            timeframe.as_str(),
            timeframe.duration().num_minutes()
        );
    }

    if let Some(redis) = redis_cooldown {
        let pairs = config.pairs.clone();
        tasks.spawn(async move {
            cooldown_cleanup_loop(redis, pairs).await;
        });
        tracing::info!("  🧹 Cooldown cleanup: every 60 min");
    }

    tracing::info!("\nPress Ctrl+C to stop...\n");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        Some(result) = tasks.join_next() => {
            tracing::error!("Scan loop exited: {:?}", result);
        }
    }

    tracing::info!("👋 fxscan stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fxscan=info".into()),
        )
        .init();
}

async fn connect_cooldown(redis_url: &str) -> Option<Arc<RedisCooldownStore>> {
    match RedisCooldownStore::new(redis_url).await {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            tracing::warn!(
                "Failed to connect to Redis ({}), cooldowns will not survive restarts",
                e
            );
            None
        }
    }
}

/// When the next period boundary for this timeframe starts
fn next_boundary(timeframe: Timeframe) -> Instant {
    let now = Utc::now();
    let next = timeframe.floor(now) + timeframe.duration();
    let wait = (next - now).num_milliseconds().max(0) as u64;
    Instant::now() + Duration::from_millis(wait)
}

/// One loop per timeframe, ticking just after each period boundary
async fn scan_loop(pipeline: Arc<Pipeline>, timeframe: Timeframe) {
    let start = next_boundary(timeframe) + Duration::from_secs(BOUNDARY_SETTLE_SECONDS);
    let period = Duration::from_secs(timeframe.duration().num_seconds() as u64);

    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        tracing::info!(
            "🔄 [{}] Tick at {}",
            timeframe.as_str().to_uppercase(),
            Utc::now().format("%H:%M:%S")
        );

        let reports = pipeline.run_timeframe(timeframe, Utc::now()).await;

        let processed: usize = reports.iter().map(|r| r.processed).sum();
        let selected = reports
            .iter()
            .filter(|r| matches!(&r.outcome, Some(ScanOutcome::Selected(_))))
            .count();
        if processed > 0 {
            tracing::info!(
                "  ✓ {} fresh candles across {} pairs, {} patterns selected",
                processed,
                reports.len(),
                selected
            );
        }
    }
}

/// Hourly sweep of cooldown entries too old to matter
async fn cooldown_cleanup_loop(cooldown: Arc<RedisCooldownStore>, pairs: Vec<String>) {
    let mut ticker = interval_at(
        Instant::now() + Duration::from_secs(CLEANUP_INTERVAL_SECONDS),
        Duration::from_secs(CLEANUP_INTERVAL_SECONDS),
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        tracing::info!(
            "🧹 Running cooldown cleanup (keeping last {}h)...",
            CLEANUP_KEEP_HOURS
        );

        for pair in &pairs {
            match cooldown
                .cleanup_old(pair, chrono::Duration::hours(CLEANUP_KEEP_HOURS))
                .await
            {
                Ok(removed) if removed > 0 => {
                    tracing::info!("  ✓ Removed {} stale entries for {}", removed, pair);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("  ✗ Failed to clean up {}: {}", pair, e);
                }
            }
        }
    }
}
