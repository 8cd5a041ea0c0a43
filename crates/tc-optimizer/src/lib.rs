//! # tc-optimizer
//!
//! Hyperparameter search for TideCast model families.
//!
//! Provides search space definitions, seeded search strategies (TPE, random),
//! the per-family space registry and the sequential trial loop that turns a
//! family, a training segment and a metric into its best configuration.

mod engine;
mod registry;
mod search;
mod trial;

pub use engine::{CandidateFit, Optimizer, TrialError};
pub use registry::SearchSpaceRegistry;
pub use search::{
    ParameterDef, ParameterKind, RandomSearch, SearchSpace, SearchStrategy, TpeSearch, TpeSettings,
};
pub use trial::{OptimizationResult, SearchConfig, StrategyKind, Trial, TrialStatus};
