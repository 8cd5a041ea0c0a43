//! Sequential trial loop shared by every family search.

use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

use tc_metrics::{score, Metric};
use tc_models::{FamilyContext, FittedModel, ModelSpec};
use tc_types::{FitError, MetricError, ModelFamily, Params, SeriesSlice};

use crate::search::{RandomSearch, SearchSpace, SearchStrategy, TpeSearch};
use crate::trial::{OptimizationResult, SearchConfig, StrategyKind, Trial};

/// Why a single trial produced no loss. Contained by the search loop.
#[derive(Debug, Error)]
pub enum TrialError {
    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    Metric(#[from] MetricError),
}

/// Best-trial state of a family search: the model fitted on the training
/// segment and its forecast over the holdout.
#[derive(Debug, Clone)]
pub struct CandidateFit {
    pub model: FittedModel,
    pub holdout_forecast: Vec<f64>,
}

/// Runs seeded searches. Holds no per-run state, so one instance can drive
/// any number of searches concurrently.
#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    config: SearchConfig,
}

impl Optimizer {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn strategy(&self, space: &SearchSpace) -> Box<dyn SearchStrategy> {
        match self.config.strategy {
            StrategyKind::Tpe => Box::new(TpeSearch::new(space.clone(), self.config.seed, self.config.tpe_settings())),
            StrategyKind::Random => Box::new(RandomSearch::new(space.clone(), self.config.seed)),
        }
    }

    /// Minimise `objective` over `space`.
    ///
    /// Trials run strictly one after another. A trial whose objective errors or
    /// returns NaN is recorded as failed with an infinite loss and the search
    /// moves on. The full budget runs unless the time budget expires first.
    pub fn search<S, F>(&self, family: ModelFamily, space: &SearchSpace, mut objective: F) -> OptimizationResult<S>
    where
        F: FnMut(&Params) -> Result<(f64, S), TrialError>,
    {
        let started = Instant::now();
        let deadline = self.config.time_budget();
        let mut strategy = self.strategy(space);

        let mut trials = Vec::with_capacity(self.config.trial_budget);
        let mut best: Option<(f64, Params, S)> = None;
        let mut timed_out = false;

        for number in 0..self.config.trial_budget {
            if deadline.is_some_and(|limit| started.elapsed() >= limit) {
                warn!(%family, trials = number, "search time budget expired");
                timed_out = true;
                break;
            }

            let Some(params) = strategy.suggest(1).pop() else {
                break;
            };
            let mut trial = Trial::new(number, params.clone());
            trial.mark_running();

            match objective(&params) {
                Ok((loss, _)) if loss.is_nan() => trial.mark_failed("objective returned NaN".to_string()),
                Ok((loss, state)) => {
                    trial.mark_completed(loss);
                    if loss.is_finite() && best.as_ref().map_or(true, |(b, _, _)| loss < *b) {
                        best = Some((loss, params.clone(), state));
                    }
                }
                Err(err) => trial.mark_failed(err.to_string()),
            }
            debug!(%family, trial = number, loss = trial.loss, status = ?trial.status, "trial finished");

            strategy.report(&params, trial.loss);
            trials.push(trial);
        }

        let strategy_name = strategy.name().to_string();
        match best {
            Some((loss, params, state)) => OptimizationResult {
                family,
                strategy: strategy_name,
                best_params: Some(params),
                loss,
                state: Some(state),
                trials,
                timed_out,
            },
            None => OptimizationResult {
                family,
                strategy: strategy_name,
                best_params: None,
                loss: f64::INFINITY,
                state: None,
                trials,
                timed_out,
            },
        }
    }

    /// Search one family: each trial fits on `train`, forecasts the holdout
    /// length and scores the forecast with `metric`.
    #[allow(clippy::too_many_arguments)]
    pub fn search_family(
        &self,
        family: ModelFamily,
        space: &SearchSpace,
        ctx: &FamilyContext,
        train: &SeriesSlice<'_>,
        holdout: &[f64],
        metric: Metric,
        seasonality: usize,
    ) -> OptimizationResult<CandidateFit> {
        self.search(family, space, |params| {
            let spec = ModelSpec::from_params(family, params, ctx)?;
            let model = spec.fit(train)?;
            let forecast = model.forecast(holdout.len())?;
            let loss = score(metric, holdout, &forecast, train.values, seasonality)?;
            Ok((
                loss,
                CandidateFit {
                    model,
                    holdout_forecast: forecast,
                },
            ))
        })
    }
}
