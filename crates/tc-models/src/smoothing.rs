//! Additive exponential smoothing: simple, Holt (trend) and Holt-Winters
//! (trend + season).

use serde::{Deserialize, Serialize};

use tc_types::{FitError, Params};

use crate::decode;

const FAMILY: &str = "exponential_smoothing";

pub const SMOOTHING_MIN: f64 = 0.05;
pub const SMOOTHING_MAX: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingKind {
    Simple,
    Holt,
    HoltWinters,
}

impl SmoothingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmoothingKind::Simple => "simple",
            SmoothingKind::Holt => "holt",
            SmoothingKind::HoltWinters => "holt_winters",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingParams {
    pub kind: SmoothingKind,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub period: usize,
}

impl SmoothingParams {
    pub fn simple(alpha: f64) -> Self {
        Self {
            kind: SmoothingKind::Simple,
            alpha,
            beta: 0.0,
            gamma: 0.0,
            period: 1,
        }
    }

    pub fn holt(alpha: f64, beta: f64) -> Self {
        Self {
            kind: SmoothingKind::Holt,
            beta,
            ..Self::simple(alpha)
        }
    }

    pub fn holt_winters(alpha: f64, beta: f64, gamma: f64, period: usize) -> Self {
        Self {
            kind: SmoothingKind::HoltWinters,
            beta,
            gamma,
            period,
            ..Self::simple(alpha)
        }
    }

    pub(crate) fn from_params(params: &Params, period: usize) -> Result<Self, FitError> {
        let smoothing = |name| decode::unit_interval(params, name, SMOOTHING_MIN, SMOOTHING_MAX);
        let alpha = smoothing("alpha")?;
        let spec = match decode::choice(params, "kind")? {
            "simple" => Self::simple(alpha),
            "holt" => Self::holt(alpha, smoothing("beta")?),
            "holt_winters" => Self::holt_winters(alpha, smoothing("beta")?, smoothing("gamma")?, period),
            other => return Err(decode::unknown_choice("kind", other)),
        };
        Ok(spec)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingFit {
    kind: SmoothingKind,
    level: f64,
    trend: f64,
    /// Seasonal components indexed by position modulo the period.
    seasonal: Vec<f64>,
    /// Number of observations the states were updated over.
    observed: usize,
}

pub fn fit(params: &SmoothingParams, values: &[f64]) -> Result<SmoothingFit, FitError> {
    let n = values.len();
    let required = match params.kind {
        SmoothingKind::Simple => 1,
        SmoothingKind::Holt => 2,
        SmoothingKind::HoltWinters => 2 * params.period.max(2),
    };
    if n < required {
        return Err(FitError::InsufficientData {
            family: FAMILY.to_string(),
            required,
            available: n,
        });
    }

    let (alpha, beta, gamma) = (params.alpha, params.beta, params.gamma);
    let state = match params.kind {
        SmoothingKind::Simple => {
            let level = values[1..].iter().fold(values[0], |level, &y| alpha * y + (1.0 - alpha) * level);
            SmoothingFit {
                kind: params.kind,
                level,
                trend: 0.0,
                seasonal: Vec::new(),
                observed: n,
            }
        }
        SmoothingKind::Holt => {
            let mut level = values[0];
            let mut trend = values[1] - values[0];
            for &y in &values[1..] {
                let prev = level;
                level = alpha * y + (1.0 - alpha) * (level + trend);
                trend = beta * (level - prev) + (1.0 - beta) * trend;
            }
            SmoothingFit {
                kind: params.kind,
                level,
                trend,
                seasonal: Vec::new(),
                observed: n,
            }
        }
        SmoothingKind::HoltWinters => {
            let period = params.period.max(2);
            let first = values[..period].iter().sum::<f64>() / period as f64;
            let second = values[period..2 * period].iter().sum::<f64>() / period as f64;
            let mut level = first;
            let mut trend = (second - first) / period as f64;
            let mut seasonal: Vec<f64> = values[..period].iter().map(|y| y - first).collect();

            for (t, &y) in values.iter().enumerate().skip(period) {
                let idx = t % period;
                let prev = level;
                level = alpha * (y - seasonal[idx]) + (1.0 - alpha) * (level + trend);
                trend = beta * (level - prev) + (1.0 - beta) * trend;
                seasonal[idx] = gamma * (y - level) + (1.0 - gamma) * seasonal[idx];
            }
            SmoothingFit {
                kind: params.kind,
                level,
                trend,
                seasonal,
                observed: n,
            }
        }
    };

    if !state.level.is_finite() || !state.trend.is_finite() || state.seasonal.iter().any(|s| !s.is_finite()) {
        return Err(FitError::NotConverged {
            family: FAMILY.to_string(),
            message: "smoothing states became non-finite".to_string(),
        });
    }
    Ok(state)
}

impl SmoothingFit {
    pub fn kind(&self) -> SmoothingKind {
        self.kind
    }

    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        (1..=horizon)
            .map(|h| {
                let season = if self.seasonal.is_empty() {
                    0.0
                } else {
                    self.seasonal[(self.observed + h - 1) % self.seasonal.len()]
                };
                self.level + h as f64 * self.trend + season
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_smoothing_of_a_constant() {
        let fitted = fit(&SmoothingParams::simple(0.3), &[4.0; 12]).unwrap();
        assert_eq!(fitted.forecast(3), vec![4.0; 3]);
    }

    #[test]
    fn holt_follows_a_linear_trend() {
        let values: Vec<f64> = (0..20).map(|t| 5.0 + 3.0 * t as f64).collect();
        let fitted = fit(&SmoothingParams::holt(0.5, 0.5), &values).unwrap();
        let forecast = fitted.forecast(2);
        assert!((forecast[0] - 65.0).abs() < 1e-9);
        assert!((forecast[1] - 68.0).abs() < 1e-9);
    }

    #[test]
    fn holt_winters_keeps_season_phase() {
        let pattern = [10.0, 20.0, 30.0, 40.0];
        // 13 observations: the next value is pattern[13 % 4] = 20
        let values: Vec<f64> = (0..13).map(|t| pattern[t % 4]).collect();
        let fitted = fit(&SmoothingParams::holt_winters(0.3, 0.1, 0.3, 4), &values).unwrap();
        let forecast = fitted.forecast(4);
        for (f, e) in forecast.iter().zip([20.0, 30.0, 40.0, 10.0]) {
            assert!((f - e).abs() < 1e-9, "{forecast:?}");
        }
    }

    #[test]
    fn holt_winters_needs_two_seasons() {
        let err = fit(&SmoothingParams::holt_winters(0.3, 0.1, 0.3, 7), &[1.0; 13]).unwrap_err();
        assert!(matches!(
            err,
            FitError::InsufficientData {
                required: 14,
                available: 13,
                ..
            }
        ));
    }

    #[test]
    fn decode_rejects_out_of_range_smoothing() {
        let mut params = Params::new();
        params.insert("kind".into(), "holt".into());
        params.insert("alpha".into(), 0.5.into());
        params.insert("beta".into(), 0.99.into());
        assert!(matches!(
            SmoothingParams::from_params(&params, 7),
            Err(FitError::InvalidHyperparameter { name, .. }) if name == "beta"
        ));

        params.insert("kind".into(), "damped".into());
        assert!(SmoothingParams::from_params(&params, 7).is_err());
    }
}
