// Drain seam for selected patterns
//
// The pipeline pushes every winning pattern through a `Notifier`. The default
// drain just logs; alternative sinks (webhooks, queues) implement the trait.

use async_trait::async_trait;

use crate::error::{PipelineError, Result};
use crate::models::SelectedPattern;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, selected: &SelectedPattern) -> Result<()>;
}

/// Emits each selection as one structured-JSON log line
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, selected: &SelectedPattern) -> Result<()> {
        let payload = serde_json::to_string(selected)
            .map_err(|e| PipelineError::store("notify_encode", e))?;
        tracing::info!(
            "🔔 {} {} on {} ({}): {}",
            selected.pattern.direction.as_str(),
            selected.pattern.name,
            selected.pair,
            selected.pattern.timeframe.as_str(),
            payload
        );
        Ok(())
    }
}

/// Test drain that keeps everything it is handed
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: std::sync::Mutex<Vec<SelectedPattern>>,
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, selected: &SelectedPattern) -> Result<()> {
        self.sent
            .lock()
            .map_err(|e| PipelineError::store("notify_record", e))?
            .push(selected.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, PatternMatch, PatternPriority, Timeframe};
    use chrono::Utc;

    fn sample_selection() -> SelectedPattern {
        SelectedPattern {
            pair: "EURUSD".to_string(),
            pattern: PatternMatch {
                detector_id: "double_top".to_string(),
                name: "Double Top".to_string(),
                priority: PatternPriority::VeryHigh,
                direction: Direction::Bearish,
                confidence: 0.81,
                timeframe: Timeframe::H1,
                conditions: vec!["neckline broken".to_string()],
                take_profit: 0.0120,
                stop_loss: 0.0060,
                description: "Double top".to_string(),
                detected_at: Utc::now(),
            },
            selected_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_selection() {
        assert!(LogNotifier.notify(&sample_selection()).await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_notifier_keeps_selections() {
        let notifier = RecordingNotifier::default();
        notifier.notify(&sample_selection()).await.unwrap();
        notifier.notify(&sample_selection()).await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].pattern.detector_id, "double_top");
    }
}
