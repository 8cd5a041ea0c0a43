//! Uniform fit/forecast contract over every model family.

use serde::{Deserialize, Serialize};

use tc_types::{FitError, ModelFamily, Params, SeriesSlice};

use crate::arima::{self, ArimaFit, ArimaParams};
use crate::baseline::{self, BaselineFit, BaselineParams};
use crate::boosting::{self, BoostingFit, BoostingParams};
use crate::features::FeatureConfig;
use crate::intermittent::{self, AdidaFit, AdidaParams, CrostonFit, CrostonParams};
use crate::smoothing::{self, SmoothingFit, SmoothingParams};

/// Settings shared by every family, independent of the searched parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyContext {
    pub seasonality: usize,
    pub features: FeatureConfig,
}

impl Default for FamilyContext {
    fn default() -> Self {
        Self {
            seasonality: 7,
            features: FeatureConfig::default(),
        }
    }
}

/// Typed hyperparameters for one family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelSpec {
    Baseline(BaselineParams),
    Arima(ArimaParams),
    ExponentialSmoothing(SmoothingParams),
    GradientBoosting {
        params: BoostingParams,
        features: FeatureConfig,
    },
    Croston(CrostonParams),
    Adida(AdidaParams),
}

impl ModelSpec {
    /// Decode a search assignment into the family's typed parameters.
    pub fn from_params(family: ModelFamily, params: &Params, ctx: &FamilyContext) -> Result<Self, FitError> {
        Ok(match family {
            ModelFamily::Baseline => ModelSpec::Baseline(BaselineParams::from_params(params, ctx.seasonality)?),
            ModelFamily::Arima => ModelSpec::Arima(ArimaParams::from_params(params)?),
            ModelFamily::ExponentialSmoothing => {
                ModelSpec::ExponentialSmoothing(SmoothingParams::from_params(params, ctx.seasonality)?)
            }
            ModelFamily::GradientBoosting => ModelSpec::GradientBoosting {
                params: BoostingParams::from_params(params)?,
                features: ctx.features.clone(),
            },
            ModelFamily::Croston => ModelSpec::Croston(CrostonParams::from_params(params)?),
            ModelFamily::Adida => ModelSpec::Adida(AdidaParams::from_params(params)?),
        })
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            ModelSpec::Baseline(_) => ModelFamily::Baseline,
            ModelSpec::Arima(_) => ModelFamily::Arima,
            ModelSpec::ExponentialSmoothing(_) => ModelFamily::ExponentialSmoothing,
            ModelSpec::GradientBoosting { .. } => ModelFamily::GradientBoosting,
            ModelSpec::Croston(_) => ModelFamily::Croston,
            ModelSpec::Adida(_) => ModelFamily::Adida,
        }
    }

    pub fn fit(&self, series: &SeriesSlice<'_>) -> Result<FittedModel, FitError> {
        fit(self, series)
    }
}

/// Fitted state of one family.
#[derive(Debug, Clone, PartialEq)]
pub enum FittedModel {
    Baseline(BaselineFit),
    Arima(ArimaFit),
    ExponentialSmoothing(SmoothingFit),
    GradientBoosting(BoostingFit),
    Croston(CrostonFit),
    Adida(AdidaFit),
}

/// Fit `spec` on a series segment.
///
/// Only the tree-based family reads timestamps and exogenous columns; the
/// others use the values alone.
pub fn fit(spec: &ModelSpec, series: &SeriesSlice<'_>) -> Result<FittedModel, FitError> {
    let values = series.values;
    Ok(match spec {
        ModelSpec::Baseline(p) => FittedModel::Baseline(baseline::fit(p, values)?),
        ModelSpec::Arima(p) => FittedModel::Arima(arima::fit(p, values)?),
        ModelSpec::ExponentialSmoothing(p) => FittedModel::ExponentialSmoothing(smoothing::fit(p, values)?),
        ModelSpec::GradientBoosting { params, features } => {
            FittedModel::GradientBoosting(boosting::fit(params, features, series)?)
        }
        ModelSpec::Croston(p) => FittedModel::Croston(intermittent::fit_croston(p, values)?),
        ModelSpec::Adida(p) => FittedModel::Adida(intermittent::fit_adida(p, values)?),
    })
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            FittedModel::Baseline(_) => ModelFamily::Baseline,
            FittedModel::Arima(_) => ModelFamily::Arima,
            FittedModel::ExponentialSmoothing(_) => ModelFamily::ExponentialSmoothing,
            FittedModel::GradientBoosting(_) => ModelFamily::GradientBoosting,
            FittedModel::Croston(_) => ModelFamily::Croston,
            FittedModel::Adida(_) => ModelFamily::Adida,
        }
    }

    /// Point forecast for the `horizon` periods after the fitted segment.
    pub fn forecast(&self, horizon: usize) -> Result<Vec<f64>, FitError> {
        let values = match self {
            FittedModel::Baseline(m) => m.forecast(horizon),
            FittedModel::Arima(m) => m.forecast(horizon),
            FittedModel::ExponentialSmoothing(m) => m.forecast(horizon),
            FittedModel::GradientBoosting(m) => m.forecast(horizon)?,
            FittedModel::Croston(m) => m.forecast(horizon),
            FittedModel::Adida(m) => m.forecast(horizon),
        };
        if values.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NotConverged {
                family: self.family().to_string(),
                message: "forecast contains non-finite values".to_string(),
            });
        }
        Ok(values)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelState {
    Unfit,
    Fit(FittedModel),
    Failed(String),
}

/// One family instance with an explicit fit lifecycle.
#[derive(Debug, Clone)]
pub struct Model {
    spec: ModelSpec,
    state: ModelState,
}

impl Model {
    pub fn new(spec: ModelSpec) -> Self {
        Self {
            spec,
            state: ModelState::Unfit,
        }
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn is_fit(&self) -> bool {
        matches!(self.state, ModelState::Fit(_))
    }

    /// Fit on `series`, replacing any previous state.
    pub fn fit(&mut self, series: &SeriesSlice<'_>) -> Result<(), FitError> {
        match fit(&self.spec, series) {
            Ok(fitted) => {
                self.state = ModelState::Fit(fitted);
                Ok(())
            }
            Err(err) => {
                self.state = ModelState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    pub fn forecast(&self, horizon: usize) -> Result<Vec<f64>, FitError> {
        match &self.state {
            ModelState::Fit(fitted) => fitted.forecast(horizon),
            ModelState::Unfit => Err(FitError::Unfit),
            ModelState::Failed(reason) => Err(FitError::FailedState {
                reason: reason.clone(),
            }),
        }
    }

    pub fn into_fitted(self) -> Option<FittedModel> {
        match self.state {
            ModelState::Fit(fitted) => Some(fitted),
            _ => None,
        }
    }
}
