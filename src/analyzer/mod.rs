// Pattern arbitration
//
// Runs every eligible detector over the window, keeps the strongest match,
// and consults the cooldown store before letting it through.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::indicators::IndicatorSet;
use crate::models::{Candle, PatternMatch, SelectedPattern};
use crate::patterns::PatternDetector;
use crate::store::CooldownStore;

/// Result of one analysis pass over a window
#[derive(Debug)]
pub enum ScanOutcome {
    /// A pattern won arbitration and was recorded against the cooldown store
    Selected(SelectedPattern),
    /// The winning pattern fired too recently and was held back
    Suppressed { pattern_id: String },
    NoMatch,
}

pub struct PatternAnalyzer {
    detectors: Vec<Arc<dyn PatternDetector>>,
    cooldown: Arc<dyn CooldownStore>,
    cooldown_window: chrono::Duration,
    semaphore: Arc<Semaphore>,
}

impl PatternAnalyzer {
    pub fn new(
        detectors: Vec<Arc<dyn PatternDetector>>,
        cooldown: Arc<dyn CooldownStore>,
        cooldown_window: chrono::Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            detectors,
            cooldown,
            cooldown_window,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub fn detector_count(&self) -> usize {
        self.detectors.len()
    }

    /// Runs the detectors over `window` and arbitrates the matches.
    ///
    /// A detector that errors is logged and dropped from the pass; the others
    /// still compete. Ties go to higher confidence, then to the detector
    /// registered later.
    pub async fn analyze(
        &self,
        pair: &str,
        window: &[Candle],
        indicators: &IndicatorSet,
    ) -> Result<ScanOutcome> {
        let shared_window: Arc<[Candle]> = Arc::from(window);
        let shared_indicators = Arc::new(indicators.clone());

        let mut handles = Vec::new();
        for (index, detector) in self.detectors.iter().enumerate() {
            if window.len() < detector.min_candles() {
                continue;
            }
            let detector = detector.clone();
            let semaphore = self.semaphore.clone();
            let window = shared_window.clone();
            let indicators = shared_indicators.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (index, detector.detect(&window, &indicators))
            }));
        }
        tracing::debug!(
            "Running {}/{} detectors on {} ({} candles)",
            handles.len(),
            self.detectors.len(),
            pair,
            window.len()
        );

        let mut matches: Vec<(usize, PatternMatch)> = Vec::new();
        for handle in handles {
            match handle.await {
                Ok((index, Ok(Some(found)))) => matches.push((index, found)),
                Ok((_, Ok(None))) => {}
                Ok((index, Err(e))) => {
                    tracing::error!(
                        "Detector {} failed on {}: {}",
                        self.detectors[index].id(),
                        pair,
                        e
                    );
                }
                Err(e) => tracing::error!("Detector task panicked on {}: {}", pair, e),
            }
        }

        let winner = matches.iter().max_by(|a, b| {
            a.1.priority
                .cmp(&b.1.priority)
                .then(
                    a.1.confidence
                        .partial_cmp(&b.1.confidence)
                        .unwrap_or(Ordering::Equal),
                )
                .then(a.0.cmp(&b.0))
        });
        let Some((_, found)) = winner else {
            return Ok(ScanOutcome::NoMatch);
        };

        if self
            .cooldown
            .was_recently_fired(pair, &found.detector_id, self.cooldown_window)
            .await?
        {
            tracing::debug!("Cooldown active for {} on {}, holding back", found.detector_id, pair);
            return Ok(ScanOutcome::Suppressed {
                pattern_id: found.detector_id.clone(),
            });
        }

        let selected_at = Utc::now();
        self.cooldown
            .record_fired(pair, &found.detector_id, selected_at)
            .await?;
        tracing::info!(
            "🎯 {} selected for {} ({}): {:.0}% confidence from {} candidate(s)",
            found.name,
            pair,
            found.timeframe.as_str(),
            found.confidence * 100.0,
            matches.len()
        );

        Ok(ScanOutcome::Selected(SelectedPattern {
            pair: pair.to_string(),
            pattern: found.clone(),
            selected_at,
        }))
    }
}
