//! Forecast run configuration.
//!
//! Everything a run needs is carried explicitly in [`ForecastConfig`]; it can be
//! built in code with the `with_*` methods or deserialized from JSON, where any
//! omitted field takes its default.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use tc_metrics::Metric;
use tc_models::{FamilyContext, FeatureConfig};
use tc_optimizer::{SearchConfig, SearchSpaceRegistry, StrategyKind, TpeSettings};
use tc_types::{config_error, ConfigError, ModelFamily, Regime};

/// Thresholds that assign a series to a regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Training segments shorter than this are new products.
    pub min_history: usize,
    /// Zero fraction above which a series is intermittent (exclusive).
    pub zero_threshold: f64,
    /// Absolute values at or below this count as zero.
    pub zero_tolerance: f64,
    /// Absolute Pearson correlation above which a feature is pruned (exclusive).
    pub correlation_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_history: 14,
            zero_threshold: 0.6,
            zero_tolerance: 1e-8,
            correlation_threshold: 0.8,
        }
    }
}

/// Candidate families and metrics for one regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeCatalog {
    /// Candidates in priority order; earlier families win loss ties.
    pub families: Vec<ModelFamily>,
    /// Metric the candidates are searched and ranked by.
    pub objective: Metric,
    /// Extra metrics reported on the winner's holdout forecast.
    pub report: Vec<Metric>,
}

impl RegimeCatalog {
    pub fn new(families: Vec<ModelFamily>, objective: Metric, report: Vec<Metric>) -> Self {
        Self {
            families,
            objective,
            report,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCatalog {
    pub general: RegimeCatalog,
    pub intermittent: RegimeCatalog,
    pub new_product: RegimeCatalog,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            general: RegimeCatalog::new(
                vec![
                    ModelFamily::Arima,
                    ModelFamily::ExponentialSmoothing,
                    ModelFamily::GradientBoosting,
                ],
                Metric::Rmse,
                vec![Metric::Mape, Metric::Wape, Metric::Rmsse],
            ),
            intermittent: RegimeCatalog::new(
                vec![ModelFamily::Croston, ModelFamily::Adida],
                Metric::Mae,
                vec![Metric::Mase, Metric::Wape],
            ),
            new_product: RegimeCatalog::new(vec![ModelFamily::Baseline], Metric::Mae, vec![Metric::Wape]),
        }
    }
}

impl ModelCatalog {
    pub fn get(&self, regime: Regime) -> &RegimeCatalog {
        match regime {
            Regime::General => &self.general,
            Regime::Intermittent => &self.intermittent,
            Regime::NewProduct => &self.new_product,
        }
    }
}

/// Strategy knobs shared by every family search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTuning {
    pub strategy: StrategyKind,
    pub n_startup_trials: usize,
    pub gamma: f64,
    pub n_candidates: usize,
}

impl Default for SearchTuning {
    fn default() -> Self {
        let tpe = TpeSettings::default();
        Self {
            strategy: StrategyKind::Tpe,
            n_startup_trials: tpe.n_startup_trials,
            gamma: tpe.gamma,
            n_candidates: tpe.n_candidates,
        }
    }
}

/// Top-level configuration for a forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Trials per family search.
    pub trial_budget: usize,
    /// Optional wall-clock limit per family search.
    pub time_budget_ms: Option<u64>,
    pub seed: u64,
    /// Seasonal period used by seasonal models and scaled metrics.
    pub seasonality: usize,
    /// Concurrent series in a batch; defaults to the number of CPUs.
    pub workers: Option<usize>,
    pub classifier: ClassifierConfig,
    pub features: FeatureConfig,
    pub catalog: ModelCatalog,
    pub search: SearchTuning,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            trial_budget: 200,
            time_budget_ms: None,
            seed: 73,
            seasonality: 7,
            workers: None,
            classifier: ClassifierConfig::default(),
            features: FeatureConfig::default(),
            catalog: ModelCatalog::default(),
            search: SearchTuning::default(),
        }
    }
}

impl ForecastConfig {
    pub fn with_trial_budget(mut self, n: usize) -> Self {
        self.trial_budget = n;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget_ms = Some(budget.as_millis() as u64);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_seasonality(mut self, period: usize) -> Self {
        self.seasonality = period;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.search.strategy = strategy;
        self
    }

    /// Number of series processed concurrently.
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()))
            .max(1)
    }

    pub fn family_context(&self) -> FamilyContext {
        FamilyContext {
            seasonality: self.seasonality,
            features: self.features.clone(),
        }
    }

    /// Search settings for the candidate at `position` in its regime catalog.
    /// Each position gets its own seed so the searches are independent yet
    /// reproducible.
    pub fn search_config(&self, position: usize) -> SearchConfig {
        SearchConfig {
            trial_budget: self.trial_budget,
            time_budget_ms: self.time_budget_ms,
            seed: self.seed.wrapping_add(position as u64),
            strategy: self.search.strategy,
            n_startup_trials: self.search.n_startup_trials,
            gamma: self.search.gamma,
            n_candidates: self.search.n_candidates,
        }
    }

    pub fn validate(&self, registry: &SearchSpaceRegistry) -> Result<(), ConfigError> {
        if self.seasonality == 0 {
            return Err(config_error!("seasonality", "must be at least 1"));
        }
        if self.workers == Some(0) {
            return Err(config_error!("workers", "must be at least 1"));
        }

        let c = &self.classifier;
        if c.min_history == 0 {
            return Err(config_error!("classifier.min_history", "must be at least 1"));
        }
        for (field, value) in [
            ("classifier.zero_threshold", c.zero_threshold),
            ("classifier.correlation_threshold", c.correlation_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(config_error!(field, "{value} outside [0, 1]"));
            }
        }
        if !(c.zero_tolerance >= 0.0 && c.zero_tolerance.is_finite()) {
            return Err(config_error!("classifier.zero_tolerance", "must be a non-negative number"));
        }
        if self.features.lags.contains(&0) || self.features.rolling_windows.contains(&0) {
            return Err(config_error!("features", "lags and rolling windows must be positive"));
        }

        self.search_config(0)
            .validate()
            .map_err(|message| ConfigError::InvalidValue {
                field: "search".to_string(),
                message,
            })?;

        for regime in Regime::ALL {
            for &family in &self.catalog.get(regime).families {
                let space = registry.get(family)?;
                space.validate().map_err(|message| ConfigError::InvalidValue {
                    field: format!("search space for {family}"),
                    message,
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_optimizer::SearchSpace;

    #[test]
    fn defaults_match_documented_values() {
        let config = ForecastConfig::default();
        assert_eq!(config.trial_budget, 200);
        assert_eq!(config.seed, 73);
        assert_eq!(config.seasonality, 7);
        assert_eq!(config.classifier.min_history, 14);
        assert_eq!(config.catalog.get(Regime::Intermittent).objective, Metric::Mae);
        assert_eq!(
            config.catalog.get(Regime::NewProduct).families,
            vec![ModelFamily::Baseline]
        );
        assert!(config.validate(&SearchSpaceRegistry::default()).is_ok());
    }

    #[test]
    fn family_seeds_are_offset_by_position() {
        let config = ForecastConfig::default().with_seed(100).with_trial_budget(12);
        assert_eq!(config.search_config(0).seed, 100);
        assert_eq!(config.search_config(2).seed, 102);
        assert_eq!(config.search_config(2).trial_budget, 12);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let err = ForecastConfig::default()
            .with_trial_budget(0)
            .validate(&SearchSpaceRegistry::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "search"));
    }

    #[test]
    fn thresholds_must_be_fractions() {
        let config = ForecastConfig::default().with_classifier(ClassifierConfig {
            zero_threshold: 1.5,
            ..ClassifierConfig::default()
        });
        assert!(config.validate(&SearchSpaceRegistry::default()).is_err());
    }

    #[test]
    fn catalog_family_without_space_is_rejected() {
        let registry = SearchSpaceRegistry::empty().with_space(ModelFamily::Baseline, SearchSpace::new());
        let err = ForecastConfig::default().validate(&registry).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSearchSpace { family } if family == "arima"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ForecastConfig = serde_json::from_str(
            r#"{
                "trial_budget": 30,
                "catalog": {"new_product": {"families": ["baseline"], "objective": "wape", "report": []}},
                "search": {"strategy": "random"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.trial_budget, 30);
        assert_eq!(config.seed, 73);
        assert_eq!(config.catalog.new_product.objective, Metric::Wape);
        assert_eq!(config.catalog.general.objective, Metric::Rmse);
        assert_eq!(config.search.strategy, StrategyKind::Random);
    }
}
