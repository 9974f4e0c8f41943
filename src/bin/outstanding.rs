use fxscan::store::PostgresCandleStore;
use fxscan::tracker::DifferentialTracker;
use fxscan::AppConfig;
use std::sync::Arc;

/// Print how many candles per timeframe still await indicator calculation
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("fxscan=warn")
        .init();

    let config = AppConfig::load()?;
    let store = Arc::new(PostgresCandleStore::new(&config.database_url).await?);
    let tracker = DifferentialTracker::new(store, config.calc_version);

    let summary = tracker.summarize().await?;

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              OUTSTANDING CANDLE WORK                  ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    println!("{:<12} {:>12}", "Timeframe", "Uncalculated");
    println!("{}", "─".repeat(26));
    for (timeframe, count) in &summary.outstanding {
        println!("{:<12} {:>12}", timeframe.as_str(), count);
    }
    println!("{}", "─".repeat(26));
    println!("{:<12} {:>12}", "total", summary.total());
    println!();

    Ok(())
}
