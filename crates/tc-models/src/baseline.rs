//! Closed-form benchmark forecasters.

use serde::{Deserialize, Serialize};

use tc_types::{FitError, Params};

use crate::decode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMethod {
    /// Last observed value.
    Naive,
    /// Last observed season, repeated.
    SeasonalNaive,
    /// Historical mean.
    Mean,
    /// Straight line through the first and last observation.
    Drift,
}

impl BaselineMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaselineMethod::Naive => "naive",
            BaselineMethod::SeasonalNaive => "seasonal_naive",
            BaselineMethod::Mean => "mean",
            BaselineMethod::Drift => "drift",
        }
    }

    fn parse(value: &str) -> Result<Self, FitError> {
        match value {
            "naive" => Ok(BaselineMethod::Naive),
            "seasonal_naive" => Ok(BaselineMethod::SeasonalNaive),
            "mean" => Ok(BaselineMethod::Mean),
            "drift" => Ok(BaselineMethod::Drift),
            other => Err(decode::unknown_choice("method", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineParams {
    pub method: BaselineMethod,
    pub seasonality: usize,
}

impl BaselineParams {
    pub fn new(method: BaselineMethod) -> Self {
        Self { method, seasonality: 1 }
    }

    pub fn with_seasonality(mut self, seasonality: usize) -> Self {
        self.seasonality = seasonality;
        self
    }

    pub(crate) fn from_params(params: &Params, default_seasonality: usize) -> Result<Self, FitError> {
        let method = BaselineMethod::parse(decode::choice(params, "method")?)?;
        let seasonality = decode::count_or(params, "seasonality", default_seasonality)?;
        Ok(Self { method, seasonality })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineFit {
    method: BaselineMethod,
    /// Values the forecast is built from: the last season for seasonal-naive,
    /// otherwise a single level.
    pattern: Vec<f64>,
    /// Per-step slope (drift only).
    slope: f64,
}

const FAMILY: &str = "baseline";

pub fn fit(params: &BaselineParams, values: &[f64]) -> Result<BaselineFit, FitError> {
    let n = values.len();
    let insufficient = |required: usize| FitError::InsufficientData {
        family: FAMILY.to_string(),
        required,
        available: n,
    };

    let Some(&last) = values.last() else {
        return Err(insufficient(1));
    };

    let (pattern, slope) = match params.method {
        BaselineMethod::Naive => (vec![last], 0.0),
        BaselineMethod::SeasonalNaive => {
            let s = params.seasonality.max(1);
            if n < s {
                return Err(insufficient(s));
            }
            (values[n - s..].to_vec(), 0.0)
        }
        BaselineMethod::Mean => (vec![values.iter().sum::<f64>() / n as f64], 0.0),
        BaselineMethod::Drift => {
            if n < 2 {
                return Err(insufficient(2));
            }
            (vec![last], (last - values[0]) / (n - 1) as f64)
        }
    };

    Ok(BaselineFit {
        method: params.method,
        pattern,
        slope,
    })
}

impl BaselineFit {
    pub fn method(&self) -> BaselineMethod {
        self.method
    }

    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        (0..horizon)
            .map(|i| match self.method {
                BaselineMethod::SeasonalNaive => self.pattern[i % self.pattern.len()],
                BaselineMethod::Drift => self.pattern[0] + self.slope * (i + 1) as f64,
                BaselineMethod::Naive | BaselineMethod::Mean => self.pattern[0],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naive_repeats_last_value() {
        let values = vec![10.0; 30];
        let fitted = fit(&BaselineParams::new(BaselineMethod::Naive), &values).unwrap();
        assert_eq!(fitted.forecast(7), vec![10.0; 7]);
    }

    #[test]
    fn drift_extrapolates_first_to_last() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let fitted = fit(&BaselineParams::new(BaselineMethod::Drift), &values).unwrap();
        assert_eq!(fitted.forecast(3), vec![11.0, 12.0, 13.0]);
    }

    #[test]
    fn seasonal_naive_cycles_last_season() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let params = BaselineParams::new(BaselineMethod::SeasonalNaive).with_seasonality(3);
        let fitted = fit(&params, &values).unwrap();
        assert_eq!(fitted.forecast(5), vec![5.0, 6.0, 7.0, 5.0, 6.0]);
    }

    #[test]
    fn mean_forecast() {
        let fitted = fit(&BaselineParams::new(BaselineMethod::Mean), &[1.0, 2.0, 6.0]).unwrap();
        assert_eq!(fitted.forecast(2), vec![3.0, 3.0]);
    }

    #[test]
    fn short_histories_fail() {
        assert!(matches!(
            fit(&BaselineParams::new(BaselineMethod::Naive), &[]),
            Err(FitError::InsufficientData { required: 1, .. })
        ));
        assert!(matches!(
            fit(&BaselineParams::new(BaselineMethod::Drift), &[4.0]),
            Err(FitError::InsufficientData { required: 2, .. })
        ));
        let params = BaselineParams::new(BaselineMethod::SeasonalNaive).with_seasonality(7);
        assert!(matches!(
            fit(&params, &[1.0, 2.0]),
            Err(FitError::InsufficientData { required: 7, .. })
        ));
    }
}
