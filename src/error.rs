use crate::models::Timeframe;
use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure taxonomy for the analysis pipeline
///
/// The two `Insufficient*` variants are expected steady-state conditions
/// (market gaps, cold starts) and must be treated as skip-this-cycle, not as
/// failures. Everything else surfaces with enough context to say which pair,
/// timeframe and stage broke.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No source candles exist for the requested aggregation window
    #[error("insufficient data for {pair}/{timeframe} at {stage}")]
    InsufficientData {
        pair: String,
        timeframe: Timeframe,
        stage: &'static str,
    },

    /// Indicator window shorter than the longest configured period
    #[error("insufficient window for {kind}: need {needed} candles, got {got}")]
    InsufficientWindow {
        kind: &'static str,
        needed: usize,
        got: usize,
    },

    /// Candle Store or Cooldown Store read/write failure, including timeouts
    #[error("store failure at {stage}: {message}")]
    Store { stage: &'static str, message: String },

    /// A single detector failed; isolated so the rest of the cycle proceeds
    #[error("detector {id} failed: {message}")]
    Detector { id: &'static str, message: String },

    /// Invalid configuration detected at startup; the process must not run
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn store(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Store {
            stage,
            message: err.to_string(),
        }
    }

    pub fn detector(id: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Detector {
            id,
            message: err.to_string(),
        }
    }

    /// True for conditions the scheduler should silently skip past
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. } | Self::InsufficientWindow { .. }
        )
    }
}
