use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// Demand pattern of a series; decides which model families are eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    General,
    /// Mostly-zero demand.
    Intermittent,
    /// Too little history for standard fitting.
    NewProduct,
}

impl Regime {
    pub const ALL: [Regime; 3] = [Regime::General, Regime::Intermittent, Regime::NewProduct];

    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::General => "general",
            Regime::Intermittent => "intermittent",
            Regime::NewProduct => "new_product",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of model families the engine knows how to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Naive / seasonal-naive / mean / drift.
    Baseline,
    Arima,
    ExponentialSmoothing,
    /// Gradient-boosted regression trees on engineered features.
    #[serde(alias = "lightgbm")]
    GradientBoosting,
    Croston,
    Adida,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 6] = [
        ModelFamily::Baseline,
        ModelFamily::Arima,
        ModelFamily::ExponentialSmoothing,
        ModelFamily::GradientBoosting,
        ModelFamily::Croston,
        ModelFamily::Adida,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Baseline => "baseline",
            ModelFamily::Arima => "arima",
            ModelFamily::ExponentialSmoothing => "exponential_smoothing",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::Croston => "croston",
            ModelFamily::Adida => "adida",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "baseline" => Ok(ModelFamily::Baseline),
            "arima" | "auto_arima" => Ok(ModelFamily::Arima),
            "exponential_smoothing" | "ets" => Ok(ModelFamily::ExponentialSmoothing),
            "gradient_boosting" | "lightgbm" | "gbt" => Ok(ModelFamily::GradientBoosting),
            "croston" => Ok(ModelFamily::Croston),
            "adida" => Ok(ModelFamily::Adida),
            other => Err(ConfigError::UnknownFamily(other.to_string())),
        }
    }
}
