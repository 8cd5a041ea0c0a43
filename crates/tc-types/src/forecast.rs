use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::family::{ModelFamily, Regime};
use crate::params::Params;
use crate::series::SeriesId;

/// Whether a usable model was found for the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ForecastStatus {
    Succeeded,
    Failed { reason: String },
}

/// Final per-series output of a forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub id: Uuid,
    pub series_id: SeriesId,
    /// `None` when the series was rejected before classification.
    pub regime: Option<Regime>,
    pub status: ForecastStatus,
    pub family: Option<ModelFamily>,
    pub params: Params,
    /// Name of the metric the candidates were ranked by.
    pub objective: Option<String>,
    /// Holdout scores of the chosen candidate, keyed by metric name.
    pub metrics: BTreeMap<String, f64>,
    pub forecast: Vec<f64>,
    pub timestamps: Vec<DateTime<Utc>>,
    pub kept_features: Vec<String>,
    pub pruned_features: Vec<String>,
    pub trials_run: usize,
    pub created_at: DateTime<Utc>,
}

impl ForecastResult {
    /// A result carrying no model, for series that could not be forecast.
    pub fn failed(series_id: impl Into<SeriesId>, regime: Option<Regime>, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            series_id: series_id.into(),
            regime,
            status: ForecastStatus::Failed {
                reason: reason.into(),
            },
            family: None,
            params: Params::new(),
            objective: None,
            metrics: BTreeMap::new(),
            forecast: Vec::new(),
            timestamps: Vec::new(),
            kept_features: Vec::new(),
            pruned_features: Vec::new(),
            trials_run: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ForecastStatus::Succeeded)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            ForecastStatus::Failed { reason } => Some(reason),
            ForecastStatus::Succeeded => None,
        }
    }

    /// Holdout score of the ranking metric, if any.
    pub fn objective_score(&self) -> Option<f64> {
        self.objective.as_ref().and_then(|m| self.metrics.get(m).copied())
    }
}
