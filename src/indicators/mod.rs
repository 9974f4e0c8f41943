// Technical indicators module
// Free-function math per indicator plus the engine that wraps results
// with state classification

pub mod atr;
pub mod bollinger;
pub mod engine;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod stochastic;

pub use atr::{calculate_atr, calculate_atr_series};
pub use bollinger::{calculate_bollinger, calculate_bollinger_series, BollingerBands};
pub use engine::{
    BandPosition, IndicatorConfig, IndicatorEngine, IndicatorKind, IndicatorResult, IndicatorSet,
    IndicatorValues, MacdState, MaPeriodResult, RsiPeriodResult, ThresholdState, Trend,
};
pub use macd::{calculate_macd, calculate_macd_series, MacdPoint};
pub use moving_average::{calculate_ema, calculate_ema_series, calculate_sma, calculate_sma_series};
pub use rsi::{calculate_rsi, calculate_rsi_series};
pub use stochastic::calculate_stochastic;
