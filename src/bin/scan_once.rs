use chrono::Utc;
use clap::Parser;
use fxscan::analyzer::ScanOutcome;
use fxscan::models::Timeframe;
use fxscan::notify::LogNotifier;
use fxscan::store::{CandleStore, MemoryCandleStore, MemoryCooldownStore};
use fxscan::synthetic::{PriceScenario, SyntheticFeed};
use fxscan::{AppConfig, Pipeline};
use std::sync::Arc;

/// Run one scan cycle against synthetic candles, no Postgres or Redis needed
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Currency pair label for the generated series
    #[arg(long, default_value = "EURUSD")]
    pair: String,

    /// Timeframe to scan (5m, 1h, 4h, 1d)
    #[arg(long, default_value = "1h")]
    timeframe: String,

    /// Scenario: uptrend, downtrend, range, double-top, head-and-shoulders
    #[arg(long, default_value = "double-top")]
    scenario: String,

    /// How many candles to generate
    #[arg(long, default_value_t = 60)]
    candles: usize,

    /// Generator seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("fxscan=info")
        .init();

    let args = Args::parse();
    let timeframe: Timeframe = args.timeframe.parse().map_err(anyhow::Error::msg)?;
    let scenario: PriceScenario = args.scenario.parse().map_err(anyhow::Error::msg)?;

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║                FXSCAN ONE-SHOT SCAN                   ║");
    println!("╚═══════════════════════════════════════════════════════╝");
    println!();
    println!("  Pair:      {}", args.pair);
    println!("  Timeframe: {}", timeframe.as_str());
    println!(
        "  Scenario:  {} ({} candles, seed {})",
        scenario.as_str(),
        args.candles,
        args.seed
    );

    let store = Arc::new(MemoryCandleStore::new());
    let mut feed = SyntheticFeed::new(args.seed);
    let candles = feed.generate(&args.pair, timeframe, scenario, args.candles, Utc::now());
    for candle in &candles {
        store.save_candle(candle).await?;
    }

    let config = AppConfig {
        pairs: vec![args.pair.clone()],
        ..AppConfig::default()
    };
    let pipeline = Pipeline::new(
        store,
        Arc::new(MemoryCooldownStore::new()),
        Arc::new(LogNotifier),
        &config,
    );

    let report = pipeline.run_cycle(&args.pair, timeframe, Utc::now()).await?;
    println!("\n  Scanned {} fresh candles", report.processed);

    match report.outcome {
        Some(ScanOutcome::Selected(selected)) => {
            let pattern = &selected.pattern;
            println!("\n🎯 {} ({})", pattern.name, pattern.direction.as_str());
            println!("  Priority:    {}", pattern.priority.as_str());
            println!("  Confidence:  {:.0}%", pattern.confidence * 100.0);
            println!(
                "  Detected at: {}",
                pattern.detected_at.format("%Y-%m-%d %H:%M UTC")
            );
            println!(
                "  Targets:     +{:.1} pips / -{:.1} pips",
                pattern.take_profit / 0.0001,
                pattern.stop_loss / 0.0001
            );
            println!("  {}", pattern.description);
            for condition in &pattern.conditions {
                println!("    - {}", condition);
            }
        }
        Some(ScanOutcome::Suppressed { pattern_id }) => {
            println!("\n🔕 {} matched but is inside its cooldown window", pattern_id);
        }
        Some(ScanOutcome::NoMatch) => {
            println!("\n  No pattern in this window");
        }
        None => {
            println!("\n  Nothing fresh to scan");
        }
    }

    println!();
    Ok(())
}
