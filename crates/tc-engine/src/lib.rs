//! # tc-engine
//!
//! TideCast forecasting engine. Classifies each series into a demand regime,
//! searches the regime's candidate model families, refits the winner on the
//! full history and forecasts the requested horizon, one series at a time or
//! as a bounded parallel batch.

pub mod classifier;
pub mod config;
pub mod orchestrator;

pub use classifier::{classify, prune_correlated, FeatureSelection};
pub use config::{ClassifierConfig, ForecastConfig, ModelCatalog, RegimeCatalog, SearchTuning};
pub use orchestrator::{ForecastEvent, Forecaster};
