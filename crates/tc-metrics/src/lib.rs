//! Forecast accuracy metrics for TideCast.
//!
//! Provides RMSLE, WAPE, RMSSE, MAE, MASE, RMSE and MAPE as pure functions that
//! report undefined inputs as [`tc_types::MetricError`].

pub mod metrics;

pub use metrics::{score, Metric, WAPE_EPSILON};
