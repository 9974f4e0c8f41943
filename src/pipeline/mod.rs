// Scan pipeline
//
// One cycle per (pair, timeframe): roll up the aggregated candle, claim
// uncalculated candles under the pair lock, compute indicators over the
// trailing window, run pattern arbitration, then stamp the batch calculated.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregation::Aggregator;
use crate::analyzer::{PatternAnalyzer, ScanOutcome};
use crate::config::AppConfig;
use crate::error::{PipelineError, Result};
use crate::indicators::{IndicatorEngine, IndicatorKind, IndicatorSet};
use crate::models::{validate_candle_spacing, Candle, Timeframe};
use crate::notify::Notifier;
use crate::patterns::registry;
use crate::store::{CandleStore, CooldownStore};
use crate::tracker::{DifferentialTracker, TrackerSummary};

/// What one cycle did for one (pair, timeframe)
#[derive(Debug)]
pub struct CycleReport {
    pub pair: String,
    pub timeframe: Timeframe,
    pub aggregated: bool,
    pub processed: usize,
    pub marked: u64,
    /// `None` when there was nothing fresh to analyze
    pub outcome: Option<ScanOutcome>,
}

pub struct Pipeline {
    store: Arc<dyn CandleStore>,
    aggregator: Aggregator,
    tracker: DifferentialTracker,
    engine: Arc<IndicatorEngine>,
    analyzer: PatternAnalyzer,
    notifier: Arc<dyn Notifier>,
    pairs: Vec<String>,
    batch_limit: usize,
    store_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn CandleStore>,
        cooldown: Arc<dyn CooldownStore>,
        notifier: Arc<dyn Notifier>,
        config: &AppConfig,
    ) -> Self {
        let analyzer = PatternAnalyzer::new(
            registry(&config.detectors),
            cooldown,
            config.cooldown(),
            config.detector_concurrency,
        );
        Self {
            aggregator: Aggregator::new(store.clone()),
            tracker: DifferentialTracker::new(store.clone(), config.calc_version),
            engine: Arc::new(IndicatorEngine::new(config.indicators.clone())),
            analyzer,
            notifier,
            pairs: config.pairs.clone(),
            batch_limit: config.batch_limit,
            store_timeout: config.store_timeout(),
            store,
        }
    }

    /// One full cycle for every configured pair; per-pair failures are logged
    /// and do not stop the sweep.
    pub async fn run_timeframe(&self, timeframe: Timeframe, now: DateTime<Utc>) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        for pair in &self.pairs {
            match self.run_cycle(pair, timeframe, now).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!("✗ Cycle failed for {} {}: {}", pair, timeframe.as_str(), e)
                }
            }
        }
        reports
    }

    pub async fn run_cycle(
        &self,
        pair: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<CycleReport> {
        let aggregated = if timeframe.is_aggregated() {
            match self.aggregator.aggregate(pair, timeframe, now).await {
                Ok(_) => true,
                Err(e) if e.is_skippable() => {
                    debug!("No rollup for {} {}: {}", pair, timeframe.as_str(), e);
                    false
                }
                Err(e) => return Err(e),
            }
        } else {
            false
        };

        let _cycle_guard = self.tracker.lock_pair(pair, timeframe).await;

        let fresh = self
            .with_timeout(
                "find_uncalculated",
                self.tracker
                    .find_uncalculated_for_pair(pair, timeframe, self.batch_limit),
            )
            .await?;
        if fresh.is_empty() {
            debug!("Nothing fresh for {} {}", pair, timeframe.as_str());
            return Ok(CycleReport {
                pair: pair.to_string(),
                timeframe,
                aggregated,
                processed: 0,
                marked: 0,
                outcome: None,
            });
        }

        let newest = fresh[fresh.len() - 1].timestamp;
        let window = self.fetch_window(pair, timeframe, newest).await?;
        if let Err(e) = validate_candle_spacing(&window, timeframe) {
            warn!("Gapped {} series for {}: {}", timeframe.as_str(), pair, e);
        }

        let indicators = self.compute_indicators(&window, timeframe).await?;
        let outcome = self.analyzer.analyze(pair, &window, &indicators).await?;
        if let ScanOutcome::Selected(selected) = &outcome {
            if let Err(e) = self.notifier.notify(selected).await {
                warn!("Notifier failed for {}: {}", pair, e);
            }
        }

        let ids: Vec<Uuid> = fresh.iter().map(|c| c.id).collect();
        let marked = self
            .with_timeout("mark_calculated", self.tracker.mark_calculated(&ids))
            .await?;

        info!(
            "📊 {} {} cycle: {} fresh candles, {} marked{}",
            pair,
            timeframe.as_str(),
            fresh.len(),
            marked,
            match &outcome {
                ScanOutcome::Selected(s) => format!(", selected {}", s.pattern.detector_id),
                ScanOutcome::Suppressed { pattern_id } => format!(", suppressed {}", pattern_id),
                ScanOutcome::NoMatch => String::new(),
            }
        );

        Ok(CycleReport {
            pair: pair.to_string(),
            timeframe,
            aggregated,
            processed: fresh.len(),
            marked,
            outcome: Some(outcome),
        })
    }

    /// Outstanding work across every timeframe
    pub async fn summarize(&self) -> Result<TrackerSummary> {
        self.tracker.summarize().await
    }

    pub fn detector_count(&self) -> usize {
        self.analyzer.detector_count()
    }

    /// Trailing window ending at `end`, long enough for the hungriest
    /// indicator. One retry on a failed read.
    async fn fetch_window(
        &self,
        pair: &str,
        timeframe: Timeframe,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let span = timeframe.duration() * self.engine.config().longest_window() as i32;
        let start = end - span;

        match self
            .with_timeout("get_candles", self.store.get_candles(pair, timeframe, start, end))
            .await
        {
            Ok(window) => Ok(window),
            Err(e) => {
                warn!(
                    "Window fetch failed for {} {} ({}), retrying once",
                    pair,
                    timeframe.as_str(),
                    e
                );
                tokio::time::sleep(Duration::from_millis(100)).await;
                self.with_timeout("get_candles", self.store.get_candles(pair, timeframe, start, end))
                    .await
            }
        }
    }

    /// One task per indicator kind; kinds the window cannot support are
    /// skipped, anything else fails the cycle.
    async fn compute_indicators(
        &self,
        window: &[Candle],
        timeframe: Timeframe,
    ) -> Result<IndicatorSet> {
        let shared: Arc<[Candle]> = Arc::from(window);
        let mut handles = Vec::new();
        for kind in IndicatorKind::all() {
            let engine = self.engine.clone();
            let candles = shared.clone();
            handles.push(tokio::spawn(async move {
                (kind, engine.compute(&candles, kind, timeframe))
            }));
        }

        let mut set = IndicatorSet::new();
        for handle in handles {
            let (kind, result) = handle
                .await
                .map_err(|e| PipelineError::store("indicator_tasks", e))?;
            match result {
                Ok(result) => {
                    set.insert(kind, result);
                }
                Err(e) if e.is_skippable() => debug!("Skipping {}: {}", kind.as_str(), e),
                Err(e) => return Err(e),
            }
        }
        Ok(set)
    }

    async fn with_timeout<T, F>(&self, stage: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| {
                PipelineError::store(stage, format!("timed out after {:?}", self.store_timeout))
            })?
    }
}
