//! Forecast accuracy metrics.
//!
//! Every metric is a pure function of its inputs. Inputs for which a metric is
//! mathematically undefined produce a [`MetricError`] instead of a NaN.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use tc_types::MetricError;

/// Floor applied to the WAPE denominator when all actuals are zero.
pub const WAPE_EPSILON: f64 = 1e-8;

/// Supported accuracy metrics. Lower is better for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Rmsle,
    Wape,
    Rmsse,
    Mae,
    Mase,
    Rmse,
    Mape,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Rmsle => "rmsle",
            Metric::Wape => "wape",
            Metric::Rmsse => "rmsse",
            Metric::Mae => "mae",
            Metric::Mase => "mase",
            Metric::Rmse => "rmse",
            Metric::Mape => "mape",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rmsle" => Ok(Metric::Rmsle),
            "wape" => Ok(Metric::Wape),
            "rmsse" => Ok(Metric::Rmsse),
            "mae" => Ok(Metric::Mae),
            "mase" => Ok(Metric::Mase),
            "rmse" => Ok(Metric::Rmse),
            "mape" => Ok(Metric::Mape),
            other => Err(MetricError::UnknownMetric(other.to_string())),
        }
    }
}

/// Score `y_pred` against `y_true`.
///
/// `train` and `seasonality` are only read by the scaled metrics (RMSSE, MASE);
/// a seasonality of 0 is treated as 1.
pub fn score(
    metric: Metric,
    y_true: &[f64],
    y_pred: &[f64],
    train: &[f64],
    seasonality: usize,
) -> Result<f64, MetricError> {
    check_inputs(metric, y_true, y_pred)?;

    let value = match metric {
        Metric::Rmsle => rmsle(y_true, y_pred)?,
        Metric::Wape => wape(y_true, y_pred),
        Metric::Rmsse => rmse(y_true, y_pred) / naive_scale(metric, train, seasonality, |d| d * d)?.sqrt(),
        Metric::Mae => mae(y_true, y_pred),
        Metric::Mase => mae(y_true, y_pred) / naive_scale(metric, train, seasonality, f64::abs)?,
        Metric::Rmse => rmse(y_true, y_pred),
        Metric::Mape => mape(y_true, y_pred)?,
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(MetricError::NonFinite {
            metric: metric.to_string(),
        })
    }
}

fn check_inputs(metric: Metric, y_true: &[f64], y_pred: &[f64]) -> Result<(), MetricError> {
    if y_true.len() != y_pred.len() {
        return Err(MetricError::LengthMismatch {
            metric: metric.to_string(),
            actual: y_true.len(),
            predicted: y_pred.len(),
        });
    }
    if y_true.is_empty() {
        return Err(MetricError::Empty {
            metric: metric.to_string(),
        });
    }
    if y_true.iter().chain(y_pred).any(|v| !v.is_finite()) {
        return Err(MetricError::NonFinite {
            metric: metric.to_string(),
        });
    }
    Ok(())
}

fn rmsle(y_true: &[f64], y_pred: &[f64]) -> Result<f64, MetricError> {
    if let Some(&value) = y_true.iter().chain(y_pred).find(|v| **v < -1.0) {
        return Err(MetricError::BelowLogDomain {
            metric: Metric::Rmsle.to_string(),
            value,
        });
    }
    let msle = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (p.ln_1p() - t.ln_1p()).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    Ok(msle.sqrt())
}

fn wape(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let abs_error: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum();
    let abs_actual: f64 = y_true.iter().map(|t| t.abs()).sum();
    abs_error / abs_actual.max(WAPE_EPSILON)
}

fn mae(y_true: &[f64], y_pred: &[f64]) -> f64 {
    y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum::<f64>() / y_true.len() as f64
}

fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let mse = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum::<f64>() / y_true.len() as f64;
    mse.sqrt()
}

fn mape(y_true: &[f64], y_pred: &[f64]) -> Result<f64, MetricError> {
    if let Some(index) = y_true.iter().position(|t| *t == 0.0) {
        return Err(MetricError::ZeroActual {
            metric: Metric::Mape.to_string(),
            index,
        });
    }
    Ok(y_true.iter().zip(y_pred).map(|(t, p)| ((t - p) / t).abs()).sum::<f64>() / y_true.len() as f64)
}

/// Mean of `f(train[i] - train[i - s])` over the training history: the in-sample
/// error of the seasonal-naive forecast.
fn naive_scale(
    metric: Metric,
    train: &[f64],
    seasonality: usize,
    f: impl Fn(f64) -> f64,
) -> Result<f64, MetricError> {
    let s = seasonality.max(1);
    if train.len() <= s {
        return Err(MetricError::ShortHistory {
            metric: metric.to_string(),
            seasonality: s,
            available: train.len(),
        });
    }
    if train.iter().any(|v| !v.is_finite()) {
        return Err(MetricError::NonFinite {
            metric: metric.to_string(),
        });
    }

    let diffs = train.len() - s;
    let scale = (s..train.len()).map(|i| f(train[i] - train[i - s])).sum::<f64>() / diffs as f64;
    if scale == 0.0 {
        return Err(MetricError::ZeroScale {
            metric: metric.to_string(),
        });
    }
    Ok(scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn perfect_forecasts_score_zero() {
        let y = [0.0, 3.0, 5.5, 10.0];
        assert_eq!(score(Metric::Rmsle, &y, &y, &[], 1).unwrap(), 0.0);
        assert_eq!(score(Metric::Wape, &y, &y, &[], 1).unwrap(), 0.0);
        assert_eq!(score(Metric::Mae, &y, &y, &[], 1).unwrap(), 0.0);
        assert_eq!(score(Metric::Rmse, &y, &y, &[], 1).unwrap(), 0.0);
    }

    #[test]
    fn rmsle_rejects_values_below_log_domain() {
        let err = score(Metric::Rmsle, &[1.0, -2.0], &[1.0, 1.0], &[], 1).unwrap_err();
        assert!(matches!(err, MetricError::BelowLogDomain { value, .. } if value == -2.0));
    }

    #[test]
    fn rmsle_at_minus_one_is_not_a_silent_nan() {
        let err = score(Metric::Rmsle, &[-1.0], &[1.0], &[], 1).unwrap_err();
        assert!(matches!(err, MetricError::NonFinite { .. }));
    }

    #[test]
    fn wape_uses_epsilon_floor_for_zero_actuals() {
        assert_eq!(score(Metric::Wape, &[0.0, 0.0], &[0.0, 0.0], &[], 1).unwrap(), 0.0);
        let v = score(Metric::Wape, &[0.0, 0.0], &[1.0, 0.0], &[], 1).unwrap();
        assert!((v - 1.0 / WAPE_EPSILON).abs() < 1.0);
    }

    #[test]
    fn wape_matches_definition() {
        let v = score(Metric::Wape, &[10.0, 20.0], &[12.0, 17.0], &[], 1).unwrap();
        assert!((v - 5.0 / 30.0).abs() < EPS);
    }

    #[test]
    fn rmsse_with_unit_seasonality() {
        let train = [1.0, 3.0, 2.0, 5.0];
        // diffs: 2, -1, 3 -> mean square 14/3
        let y_true = [4.0, 6.0];
        let y_pred = [5.0, 4.0];
        let rmse = ((1.0 + 4.0) / 2.0f64).sqrt();
        let expected = rmse / (14.0 / 3.0f64).sqrt();
        let v = score(Metric::Rmsse, &y_true, &y_pred, &train, 1).unwrap();
        assert!((v - expected).abs() < EPS);
    }

    #[test]
    fn rmsse_zero_scale_is_an_error() {
        let err = score(Metric::Rmsse, &[1.0], &[2.0], &[3.0, 3.0, 3.0], 1).unwrap_err();
        assert!(matches!(err, MetricError::ZeroScale { .. }));
    }

    #[test]
    fn scaled_metrics_need_history_longer_than_seasonality() {
        let err = score(Metric::Rmsse, &[1.0], &[2.0], &[1.0, 2.0, 3.0], 3).unwrap_err();
        assert!(matches!(
            err,
            MetricError::ShortHistory {
                seasonality: 3,
                available: 3,
                ..
            }
        ));
        let err = score(Metric::Mase, &[1.0], &[2.0], &[1.0], 1).unwrap_err();
        assert!(matches!(err, MetricError::ShortHistory { .. }));
    }

    #[test]
    fn mase_with_weekly_seasonality() {
        let train: Vec<f64> = (0..14).map(|i| (i % 7) as f64 + if i >= 7 { 2.0 } else { 0.0 }).collect();
        // every seasonal difference is exactly 2
        let v = score(Metric::Mase, &[5.0, 5.0], &[6.0, 4.0], &train, 7).unwrap();
        assert!((v - 0.5).abs() < EPS);
    }

    #[test]
    fn mape_rejects_zero_actuals() {
        let err = score(Metric::Mape, &[1.0, 0.0], &[1.0, 1.0], &[], 1).unwrap_err();
        assert!(matches!(err, MetricError::ZeroActual { index: 1, .. }));
        let v = score(Metric::Mape, &[2.0, 4.0], &[1.0, 5.0], &[], 1).unwrap();
        assert!((v - 0.375).abs() < EPS);
    }

    #[test]
    fn shape_errors() {
        assert!(matches!(
            score(Metric::Mae, &[1.0], &[1.0, 2.0], &[], 1),
            Err(MetricError::LengthMismatch { .. })
        ));
        assert!(matches!(score(Metric::Mae, &[], &[], &[], 1), Err(MetricError::Empty { .. })));
        assert!(matches!(
            score(Metric::Mae, &[1.0], &[f64::NAN], &[], 1),
            Err(MetricError::NonFinite { .. })
        ));
    }

    #[test]
    fn metric_names_parse() {
        assert_eq!("RMSSE".parse::<Metric>().unwrap(), Metric::Rmsse);
        assert!(matches!("smape".parse::<Metric>(), Err(MetricError::UnknownMetric(_))));
        assert_eq!(serde_json::to_string(&Metric::Wape).unwrap(), "\"wape\"");
    }

    #[test]
    fn metrics_are_deterministic() {
        let y = [3.0, 1.0, 4.0, 1.0, 5.0];
        let p = [2.0, 7.0, 1.0, 8.0, 2.0];
        let train = [9.0, 2.0, 6.0, 5.0, 3.0];
        for metric in [Metric::Rmsle, Metric::Wape, Metric::Rmsse, Metric::Mae, Metric::Mase] {
            assert_eq!(
                score(metric, &y, &p, &train, 1).unwrap(),
                score(metric, &y, &p, &train, 1).unwrap()
            );
        }
    }
}
