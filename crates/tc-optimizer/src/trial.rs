//! Trial tracking and search run configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use tc_types::{ModelFamily, Params};

use crate::search::TpeSettings;

/// Which search strategy drives a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Tpe,
    Random,
}

/// Configuration for one hyperparameter search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of trials to run.
    pub trial_budget: usize,
    /// Optional wall-clock limit, checked before each proposal.
    pub time_budget_ms: Option<u64>,
    pub seed: u64,
    pub strategy: StrategyKind,
    pub n_startup_trials: usize,
    pub gamma: f64,
    pub n_candidates: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let tpe = TpeSettings::default();
        Self {
            trial_budget: 200,
            time_budget_ms: None,
            seed: 73,
            strategy: StrategyKind::Tpe,
            n_startup_trials: tpe.n_startup_trials,
            gamma: tpe.gamma,
            n_candidates: tpe.n_candidates,
        }
    }
}

impl SearchConfig {
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

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }

    pub fn tpe_settings(&self) -> TpeSettings {
        TpeSettings {
            n_startup_trials: self.n_startup_trials,
            gamma: self.gamma,
            n_candidates: self.n_candidates,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.trial_budget == 0 {
            return Err("trial_budget must be positive".to_string());
        }
        if self.time_budget_ms == Some(0) {
            return Err("time_budget_ms must be positive when set".to_string());
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(format!("gamma {} outside (0, 1]", self.gamma));
        }
        if self.n_candidates == 0 {
            return Err("n_candidates must be positive".to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Individual trial
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One evaluated hyperparameter assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: Uuid,
    pub number: usize,
    pub params: Params,
    pub status: TrialStatus,
    /// Objective value; `+inf` for failed trials.
    pub loss: f64,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Trial {
    pub fn new(number: usize, params: Params) -> Self {
        Self {
            id: Uuid::new_v4(),
            number,
            params,
            status: TrialStatus::Pending,
            loss: f64::INFINITY,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = TrialStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, loss: f64) {
        self.status = TrialStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.loss = loss;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = TrialStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.loss = f64::INFINITY;
        self.error = Some(error);
    }
}

/// Outcome of a search over one family's space.
///
/// `state` is whatever the objective produced for the best trial, e.g. the
/// fitted model.
#[derive(Debug, Clone)]
pub struct OptimizationResult<S> {
    pub family: ModelFamily,
    pub strategy: String,
    pub best_params: Option<Params>,
    /// Best loss; `+inf` when no trial succeeded.
    pub loss: f64,
    pub state: Option<S>,
    pub trials: Vec<Trial>,
    /// Whether the wall-clock budget cut the search short.
    pub timed_out: bool,
}

impl<S> OptimizationResult<S> {
    pub fn is_success(&self) -> bool {
        self.loss.is_finite() && self.best_params.is_some()
    }

    pub fn trials_run(&self) -> usize {
        self.trials.len()
    }

    pub fn trials_failed(&self) -> usize {
        self.trials.iter().filter(|t| t.status == TrialStatus::Failed).count()
    }

    /// Error of the most recent failed trial.
    pub fn last_error(&self) -> Option<&str> {
        self.trials.iter().rev().find_map(|t| t.error.as_deref())
    }
}
