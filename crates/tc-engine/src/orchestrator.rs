//! Per-series forecasting pipeline and batch execution.
//!
//! A [`Forecaster`] classifies each series, searches every candidate family of
//! its regime in parallel, refits the winner on the full history and returns a
//! [`ForecastResult`]. Failures are contained per series: a bad series yields a
//! failed result and never aborts the batch.

use chrono::Utc;
use crossbeam_channel::Sender;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tc_metrics::{score, Metric};
use tc_models::ModelSpec;
use tc_optimizer::{CandidateFit, OptimizationResult, Optimizer, SearchSpaceRegistry};
use tc_types::{
    config_error, internal_error, ConfigError, FitError, ForecastResult, ForecastStatus, ModelFamily, Params,
    Regime, SeriesDataset, SeriesId, TcResult,
};

use crate::classifier::{classify, prune_correlated, FeatureSelection};
use crate::config::ForecastConfig;

/// Progress notifications emitted while forecasting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ForecastEvent {
    SeriesStarted {
        series_id: SeriesId,
        regime: Regime,
    },
    CandidateSearched {
        series_id: SeriesId,
        family: ModelFamily,
        loss: f64,
        trials: usize,
    },
    SeriesFinished {
        series_id: SeriesId,
        family: Option<ModelFamily>,
        succeeded: bool,
    },
}

/// Forecast engine. Immutable once built, so one instance (typically behind an
/// `Arc`) serves any number of concurrent series.
#[derive(Debug, Clone)]
pub struct Forecaster {
    config: ForecastConfig,
    registry: SearchSpaceRegistry,
    events: Option<Sender<ForecastEvent>>,
}

struct RankedCandidate {
    position: usize,
    family: ModelFamily,
    result: OptimizationResult<CandidateFit>,
}

impl Forecaster {
    pub fn new(config: ForecastConfig) -> Result<Self, ConfigError> {
        Self::with_registry(config, SearchSpaceRegistry::default())
    }

    pub fn with_registry(config: ForecastConfig, registry: SearchSpaceRegistry) -> Result<Self, ConfigError> {
        config.validate(&registry)?;
        Ok(Self {
            config,
            registry,
            events: None,
        })
    }

    /// Send progress events to `tx`. Sending is best-effort.
    pub fn with_events(mut self, tx: Sender<ForecastEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    fn emit(&self, event: ForecastEvent) {
        if let Some(tx) = &self.events {
            // receiver may have gone away; events are advisory
            let _ = tx.try_send(event);
        }
    }

    /// Forecast one series `horizon` periods past the end of its history.
    pub fn forecast_series(&self, dataset: &SeriesDataset, horizon: usize) -> ForecastResult {
        let mut regime = None;
        let result = match self.run_series(dataset, horizon, &mut regime) {
            Ok(result) => result,
            Err(err) => {
                warn!(series = dataset.id(), error = %err, "series forecast failed");
                ForecastResult::failed(dataset.id(), regime, err.to_string())
            }
        };
        self.emit(ForecastEvent::SeriesFinished {
            series_id: result.series_id.clone(),
            family: result.family,
            succeeded: result.is_success(),
        });
        result
    }

    fn run_series(&self, dataset: &SeriesDataset, horizon: usize, regime_out: &mut Option<Regime>) -> TcResult<ForecastResult> {
        if horizon == 0 {
            return Err(config_error!("horizon", "must be at least 1").into());
        }
        dataset.ensure_segments()?;
        let train = dataset.train();
        let holdout = dataset.holdout();

        let regime = classify(train.values, &self.config.classifier);
        *regime_out = Some(regime);
        self.emit(ForecastEvent::SeriesStarted {
            series_id: dataset.id().to_string(),
            regime,
        });

        let selection = match regime {
            Regime::General => prune_correlated(&train.features, self.config.classifier.correlation_threshold),
            _ => FeatureSelection {
                kept: dataset.feature_names().into_iter().map(String::from).collect(),
                pruned: Vec::new(),
            },
        };
        if !selection.pruned.is_empty() {
            debug!(series = dataset.id(), pruned = ?selection.pruned, "correlated features dropped");
        }

        let catalog = self.config.catalog.get(regime);
        if catalog.families.is_empty() {
            return Err(ConfigError::EmptyCandidates { regime }.into());
        }
        info!(
            series = dataset.id(),
            %regime,
            candidates = catalog.families.len(),
            observations = dataset.len(),
            "forecasting series"
        );

        let ctx = self.config.family_context();
        let train = train.retain_features(&selection.kept);
        let seasonality = self.config.seasonality;

        let searches: Vec<RankedCandidate> = catalog
            .families
            .par_iter()
            .enumerate()
            .map(|(position, &family)| -> Result<RankedCandidate, ConfigError> {
                let space = self.registry.get(family)?;
                let optimizer = Optimizer::new(self.config.search_config(position));
                let result = optimizer.search_family(
                    family,
                    space,
                    &ctx,
                    &train,
                    holdout.values,
                    catalog.objective,
                    seasonality,
                );
                Ok(RankedCandidate {
                    position,
                    family,
                    result,
                })
            })
            .collect::<Result<_, _>>()?;

        for candidate in &searches {
            self.emit(ForecastEvent::CandidateSearched {
                series_id: dataset.id().to_string(),
                family: candidate.family,
                loss: candidate.result.loss,
                trials: candidate.result.trials_run(),
            });
            debug!(
                series = dataset.id(),
                family = %candidate.family,
                loss = candidate.result.loss,
                failed = candidate.result.trials_failed(),
                "candidate searched"
            );
        }
        let trials_run = searches.iter().map(|c| c.result.trials_run()).sum();

        let mut ranked: Vec<&RankedCandidate> = searches.iter().filter(|c| c.result.is_success()).collect();
        ranked.sort_by(|a, b| a.result.loss.total_cmp(&b.result.loss).then(a.position.cmp(&b.position)));
        if ranked.is_empty() {
            let detail = searches
                .iter()
                .map(|c| format!("{}: {}", c.family, c.result.last_error().unwrap_or("no trials ran")))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FitError::NoViableCandidate { regime, detail }.into());
        }

        let full = dataset.full().retain_features(&selection.kept);
        let timestamps = full.future_timestamps(horizon)?;
        for candidate in ranked {
            let (Some(params), Some(fit)) = (&candidate.result.best_params, &candidate.result.state) else {
                continue;
            };
            let forecast = match Self::refit(candidate.family, params, &ctx, &full, horizon) {
                Ok(forecast) => forecast,
                Err(err) => {
                    warn!(series = dataset.id(), family = %candidate.family, error = %err, "refit failed, trying next candidate");
                    continue;
                }
            };

            let metrics = report_metrics(
                catalog.objective,
                candidate.result.loss,
                &catalog.report,
                holdout.values,
                &fit.holdout_forecast,
                train.values,
                seasonality,
            );
            info!(series = dataset.id(), family = %candidate.family, loss = candidate.result.loss, "model selected");

            return Ok(ForecastResult {
                id: Uuid::new_v4(),
                series_id: dataset.id().to_string(),
                regime: Some(regime),
                status: ForecastStatus::Succeeded,
                family: Some(candidate.family),
                params: params.clone(),
                objective: Some(catalog.objective.to_string()),
                metrics,
                forecast,
                timestamps,
                kept_features: selection.kept.clone(),
                pruned_features: selection.pruned.clone(),
                trials_run,
                created_at: Utc::now(),
            });
        }

        Err(FitError::NoViableCandidate {
            regime,
            detail: "every refit on the full history failed".to_string(),
        }
        .into())
    }

    fn refit(
        family: ModelFamily,
        params: &Params,
        ctx: &tc_models::FamilyContext,
        full: &tc_types::SeriesSlice<'_>,
        horizon: usize,
    ) -> Result<Vec<f64>, FitError> {
        let spec = ModelSpec::from_params(family, params, ctx)?;
        spec.fit(full)?.forecast(horizon)
    }

    /// Forecast many series on a bounded worker pool. Output order matches
    /// input order.
    pub fn forecast_batch(&self, datasets: &[SeriesDataset], horizon: usize) -> Vec<ForecastResult> {
        let workers = self.config.worker_count();
        info!(series = datasets.len(), workers, horizon, "starting batch");

        let run = || -> Vec<ForecastResult> {
            datasets
                .par_iter()
                .map(|dataset| self.forecast_series(dataset, horizon))
                .collect()
        };
        let results = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(run),
            Err(err) => {
                warn!(error = %err, "could not build worker pool, using the global pool");
                run()
            }
        };

        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(series = results.len(), failed, "batch finished");
        results
    }

    /// Async variant of [`forecast_batch`](Self::forecast_batch): each series
    /// runs on tokio's blocking pool, at most `workers` at a time.
    pub async fn forecast_batch_async(self: Arc<Self>, datasets: Vec<SeriesDataset>, horizon: usize) -> Vec<ForecastResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.worker_count()));
        let mut pending = Vec::with_capacity(datasets.len());

        for dataset in datasets {
            let permit = semaphore.clone().acquire_owned().await.ok();
            let id = dataset.id().to_string();
            let this = Arc::clone(&self);
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                this.forecast_series(&dataset, horizon)
            });
            pending.push((id, handle));
        }

        let mut results = Vec::with_capacity(pending.len());
        for (id, handle) in pending {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => ForecastResult::failed(id, None, internal_error!("forecast task failed: {err}").to_string()),
            };
            results.push(result);
        }
        results
    }
}

/// Holdout scores keyed by metric name. The objective is always present;
/// report metrics that are undefined for this series are left out.
fn report_metrics(
    objective: Metric,
    loss: f64,
    report: &[Metric],
    actual: &[f64],
    predicted: &[f64],
    train: &[f64],
    seasonality: usize,
) -> BTreeMap<String, f64> {
    let mut metrics = BTreeMap::new();
    metrics.insert(objective.to_string(), loss);
    for &metric in report {
        match score(metric, actual, predicted, train, seasonality) {
            Ok(value) => {
                metrics.insert(metric.to_string(), value);
            }
            Err(err) => debug!(%metric, error = %err, "report metric omitted"),
        }
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelCatalog, RegimeCatalog};
    use chrono::{DateTime, Duration, TimeZone};
    use crossbeam_channel::unbounded;

    fn daily(n: usize) -> Vec<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n as i64).map(|i| start + Duration::days(i)).collect()
    }

    fn series(id: &str, values: Vec<f64>, holdout: usize) -> SeriesDataset {
        SeriesDataset::with_holdout(id, daily(values.len()), values, holdout).unwrap()
    }

    fn seasonal(n: usize) -> Vec<f64> {
        (0..n)
            .map(|t| 20.0 + 0.1 * t as f64 + [3.0, 5.0, 4.0, 8.0, 9.0, 1.0, 0.0][t % 7])
            .collect()
    }

    fn forecaster(budget: usize) -> Forecaster {
        Forecaster::new(ForecastConfig::default().with_trial_budget(budget).with_workers(2)).unwrap()
    }

    #[test]
    fn mostly_zero_series_is_forecast_as_intermittent() {
        let values: Vec<f64> = (0..50).map(|t| if t % 20 == 7 { 5.0 } else { 0.0 }).collect();
        let (tx, rx) = unbounded();
        let result = forecaster(10).with_events(tx).forecast_series(&series("sparse", values, 7), 7);

        assert!(result.is_success(), "{:?}", result.failure_reason());
        assert_eq!(result.regime, Some(Regime::Intermittent));
        assert!(matches!(result.family, Some(ModelFamily::Croston | ModelFamily::Adida)));
        assert_eq!(result.objective.as_deref(), Some("mae"));
        assert!(result.metrics.contains_key("mae"));
        assert_eq!(result.forecast.len(), 7);
        assert_eq!(result.timestamps.len(), 7);

        let searched: Vec<ModelFamily> = rx
            .try_iter()
            .filter_map(|e| match e {
                ForecastEvent::CandidateSearched { family, .. } => Some(family),
                _ => None,
            })
            .collect();
        assert_eq!(searched, vec![ModelFamily::Croston, ModelFamily::Adida]);
    }

    #[test]
    fn loaded_series_shorter_than_holdout_gets_a_baseline() {
        let csv = "series_id,date,value\n\
                   new,2024-03-01,3\n\
                   new,2024-03-02,4\n\
                   new,2024-03-03,2\n\
                   new,2024-03-04,5\n\
                   new,2024-03-05,4\n";
        let datasets = tc_data::CsvSeriesLoader::new(14).load_reader(csv.as_bytes()).unwrap();
        let result = forecaster(5).forecast_series(&datasets[0], 7);

        assert!(result.is_success(), "{:?}", result.failure_reason());
        assert_eq!(result.regime, Some(Regime::NewProduct));
        assert_eq!(result.family, Some(ModelFamily::Baseline));
        assert_eq!(result.forecast.len(), 7);
    }

    #[test]
    fn short_series_uses_new_product_catalog() {
        let result = forecaster(8).forecast_series(&series("launch", vec![4.0, 5.0, 6.0, 5.0, 6.0, 7.0, 6.0, 7.0, 8.0, 9.0], 3), 5);
        assert!(result.is_success(), "{:?}", result.failure_reason());
        assert_eq!(result.regime, Some(Regime::NewProduct));
        assert_eq!(result.family, Some(ModelFamily::Baseline));
        assert_eq!(result.forecast.len(), 5);
    }

    #[test]
    fn general_series_selects_a_general_family() {
        let result = forecaster(6).forecast_series(&series("weekly", seasonal(84), 14), 14);
        assert!(result.is_success(), "{:?}", result.failure_reason());
        assert_eq!(result.regime, Some(Regime::General));
        let family = result.family.unwrap();
        assert!(ForecastConfig::default().catalog.general.families.contains(&family));
        assert!(result.metrics.contains_key("rmse"));
        assert_eq!(result.trials_run, 18);
    }

    #[test]
    fn correlated_features_are_pruned_for_general_series() {
        let values = seasonal(70);
        let price: Vec<f64> = (0..70).map(|t| 10.0 + t as f64).collect();
        let shadow: Vec<f64> = price.iter().map(|p| 3.0 * p).collect();
        let promo: Vec<f64> = (0..70).map(|t| (t % 2) as f64).collect();
        let dataset = series("featured", values, 7)
            .with_feature("price", price)
            .unwrap()
            .with_feature("price_x3", shadow)
            .unwrap()
            .with_feature("promo", promo)
            .unwrap();

        let result = forecaster(4).forecast_series(&dataset, 7);
        assert!(result.is_success(), "{:?}", result.failure_reason());
        assert_eq!(result.kept_features, vec!["price", "promo"]);
        assert_eq!(result.pruned_features, vec!["price_x3"]);
    }

    #[test]
    fn empty_holdout_fails_only_that_series() {
        let good = series("good", (1..=10).map(f64::from).collect(), 2);
        let bad = series("bad", vec![1.0; 30], 0);
        let results = forecaster(5).forecast_batch(&[good, bad], 3);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].series_id, "good");
        assert!(results[0].is_success());
        assert_eq!(results[1].series_id, "bad");
        assert!(!results[1].is_success());
        assert!(results[1]
            .failure_reason()
            .unwrap()
            .contains("holdout segment is empty"));
        assert_eq!(results[1].regime, None);
    }

    #[test]
    fn empty_catalog_yields_failed_result() {
        let mut catalog = ModelCatalog::default();
        catalog.new_product = RegimeCatalog::new(vec![], Metric::Mae, vec![]);
        let forecaster = Forecaster::new(ForecastConfig::default().with_catalog(catalog).with_trial_budget(4)).unwrap();

        let result = forecaster.forecast_series(&series("tiny", vec![1.0, 2.0, 3.0], 1), 2);
        assert!(!result.is_success());
        assert_eq!(result.regime, Some(Regime::NewProduct));
        assert!(result.failure_reason().unwrap().contains("no candidate"));
    }

    #[test]
    fn all_failed_searches_yield_failed_result() {
        // boosting cannot fit 20 observations with a 28-period lookback
        let mut catalog = ModelCatalog::default();
        catalog.general = RegimeCatalog::new(vec![ModelFamily::GradientBoosting], Metric::Rmse, vec![]);
        let forecaster = Forecaster::new(ForecastConfig::default().with_catalog(catalog).with_trial_budget(3)).unwrap();

        let result = forecaster.forecast_series(&series("short", seasonal(20), 4), 4);
        assert!(!result.is_success());
        assert_eq!(result.regime, Some(Regime::General));
        assert!(result.failure_reason().unwrap().contains("gradient_boosting"));
    }

    #[test]
    fn failed_searches_do_not_affect_other_series() {
        let mut catalog = ModelCatalog::default();
        catalog.general = RegimeCatalog::new(vec![ModelFamily::GradientBoosting], Metric::Rmse, vec![]);
        let forecaster = Forecaster::new(
            ForecastConfig::default()
                .with_catalog(catalog)
                .with_trial_budget(4)
                .with_workers(3),
        )
        .unwrap();

        let sparse: Vec<f64> = (0..40).map(|t| if t % 9 == 4 { 3.0 } else { 0.0 }).collect();
        let datasets = vec![
            series("launch", (1..=10).map(f64::from).collect(), 2),
            series("short", seasonal(20), 4),
            series("sparse", sparse, 7),
        ];
        let results = forecaster.forecast_batch(&datasets, 5);

        let ids: Vec<&str> = results.iter().map(|r| r.series_id.as_str()).collect();
        assert_eq!(ids, vec!["launch", "short", "sparse"]);
        assert!(results[0].is_success(), "{:?}", results[0].failure_reason());
        assert_eq!(results[0].family, Some(ModelFamily::Baseline));
        assert!(!results[1].is_success());
        assert_eq!(results[1].regime, Some(Regime::General));
        assert!(results[2].is_success(), "{:?}", results[2].failure_reason());
        assert_eq!(results[2].regime, Some(Regime::Intermittent));
        assert!(results.iter().filter(|r| r.is_success()).all(|r| r.forecast.len() == 5));
    }

    #[test]
    fn same_seed_same_result() {
        let dataset = series("weekly", seasonal(70), 7);
        let a = forecaster(8).forecast_series(&dataset, 7);
        let b = forecaster(8).forecast_series(&dataset, 7);
        assert_eq!(a.family, b.family);
        assert_eq!(a.params, b.params);
        assert_eq!(a.forecast, b.forecast);
        assert_eq!(a.metrics, b.metrics);
    }

    #[test]
    fn events_are_emitted() {
        let (tx, rx) = unbounded();
        let forecaster = forecaster(3).with_events(tx);
        forecaster.forecast_series(&series("launch", (1..=12).map(f64::from).collect(), 2), 2);

        let events: Vec<ForecastEvent> = rx.try_iter().collect();
        assert!(matches!(events.first(), Some(ForecastEvent::SeriesStarted { regime: Regime::NewProduct, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, ForecastEvent::CandidateSearched { family: ModelFamily::Baseline, trials: 3, .. })));
        assert!(matches!(events.last(), Some(ForecastEvent::SeriesFinished { succeeded: true, .. })));
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let result = forecaster(2).forecast_series(&series("s", vec![1.0; 10], 2), 0);
        assert!(!result.is_success());
        assert!(result.failure_reason().unwrap().contains("horizon"));
    }

    #[tokio::test]
    async fn async_batch_preserves_order() {
        let forecaster = Arc::new(forecaster(4));
        let datasets = vec![
            series("a", (1..=10).map(f64::from).collect(), 1),
            series("b", vec![1.0; 5], 0),
            series("c", vec![3.0; 10], 2),
        ];
        let results = forecaster.forecast_batch_async(datasets, 2).await;
        let ids: Vec<&str> = results.iter().map(|r| r.series_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert!(results[2].is_success());
    }
}
