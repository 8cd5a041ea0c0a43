//! Forecasters for sparse, intermittent demand: Croston (with the SBA bias
//! correction) and ADIDA temporal aggregation.

use serde::{Deserialize, Serialize};

use tc_types::{FitError, Params};

use crate::decode;

pub const CROSTON_ALPHA_MIN: f64 = 0.05;
pub const CROSTON_ALPHA_MAX: f64 = 0.5;
pub const MAX_AGGREGATION_LEVEL: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrostonVariant {
    Classic,
    /// Syntetos–Boylan approximation.
    Sba,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrostonParams {
    pub alpha: f64,
    pub variant: CrostonVariant,
}

impl CrostonParams {
    pub(crate) fn from_params(params: &Params) -> Result<Self, FitError> {
        let alpha = decode::unit_interval(params, "alpha", CROSTON_ALPHA_MIN, CROSTON_ALPHA_MAX)?;
        let variant = match decode::choice_or(params, "variant", "classic")? {
            "classic" => CrostonVariant::Classic,
            "sba" => CrostonVariant::Sba,
            other => return Err(decode::unknown_choice("variant", other)),
        };
        Ok(Self { alpha, variant })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrostonFit {
    /// Smoothed non-zero demand size.
    size: f64,
    /// Smoothed inter-demand interval; zero when no demand was seen.
    interval: f64,
    rate: f64,
}

pub fn fit_croston(params: &CrostonParams, values: &[f64]) -> Result<CrostonFit, FitError> {
    if values.is_empty() {
        return Err(FitError::InsufficientData {
            family: "croston".to_string(),
            required: 1,
            available: 0,
        });
    }

    let alpha = params.alpha;
    let mut state: Option<(f64, f64)> = None;
    let mut last_demand = 0;

    for (t, &y) in values.iter().enumerate() {
        if y == 0.0 {
            continue;
        }
        state = Some(match state {
            None => (y, (t + 1) as f64),
            Some((size, interval)) => {
                let gap = (t - last_demand) as f64;
                (size + alpha * (y - size), interval + alpha * (gap - interval))
            }
        });
        last_demand = t;
    }

    let Some((size, interval)) = state else {
        return Ok(CrostonFit {
            size: 0.0,
            interval: 0.0,
            rate: 0.0,
        });
    };

    let correction = match params.variant {
        CrostonVariant::Classic => 1.0,
        CrostonVariant::Sba => 1.0 - alpha / 2.0,
    };
    Ok(CrostonFit {
        size,
        interval,
        rate: correction * size / interval,
    })
}

impl CrostonFit {
    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        vec![self.rate; horizon]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdidaParams {
    pub aggregation_level: usize,
    pub alpha: f64,
}

impl AdidaParams {
    pub(crate) fn from_params(params: &Params) -> Result<Self, FitError> {
        let aggregation_level = decode::count(params, "aggregation_level")?;
        if !(1..=MAX_AGGREGATION_LEVEL).contains(&aggregation_level) {
            return Err(FitError::InvalidHyperparameter {
                name: "aggregation_level".to_string(),
                message: format!("{aggregation_level} outside [1, {MAX_AGGREGATION_LEVEL}]"),
            });
        }
        let alpha = decode::unit_interval(params, "alpha", 0.05, 0.95)?;
        Ok(Self {
            aggregation_level,
            alpha,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdidaFit {
    per_period: f64,
}

/// Sum the most recent complete buckets of `aggregation_level` periods, smooth
/// the bucket totals and spread the level evenly back over a bucket.
pub fn fit_adida(params: &AdidaParams, values: &[f64]) -> Result<AdidaFit, FitError> {
    let k = params.aggregation_level.max(1);
    let buckets = values.len() / k;
    if buckets == 0 {
        return Err(FitError::InsufficientData {
            family: "adida".to_string(),
            required: k,
            available: values.len(),
        });
    }

    let tail = &values[values.len() - buckets * k..];
    let mut totals = tail.chunks_exact(k).map(|c| c.iter().sum::<f64>());
    let first = totals.next().unwrap_or(0.0);
    let level = totals.fold(first, |level, total| params.alpha * total + (1.0 - params.alpha) * level);

    Ok(AdidaFit {
        per_period: level / k as f64,
    })
}

impl AdidaFit {
    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        vec![self.per_period; horizon]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn croston(alpha: f64, variant: CrostonVariant) -> CrostonParams {
        CrostonParams { alpha, variant }
    }

    #[test]
    fn croston_rate_is_size_over_interval() {
        // demand of 6 every third period
        let values: Vec<f64> = (0..30).map(|t| if t % 3 == 2 { 6.0 } else { 0.0 }).collect();
        let fitted = fit_croston(&croston(0.1, CrostonVariant::Classic), &values).unwrap();
        assert!((fitted.forecast(1)[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn sba_applies_bias_correction() {
        let values: Vec<f64> = (0..30).map(|t| if t % 3 == 2 { 6.0 } else { 0.0 }).collect();
        let fitted = fit_croston(&croston(0.2, CrostonVariant::Sba), &values).unwrap();
        assert!((fitted.forecast(2)[1] - 2.0 * 0.9).abs() < 1e-12);
    }

    #[test]
    fn croston_without_demand_forecasts_zero() {
        let fitted = fit_croston(&croston(0.1, CrostonVariant::Classic), &[0.0; 20]).unwrap();
        assert_eq!(fitted.forecast(4), vec![0.0; 4]);
    }

    #[test]
    fn adida_disaggregates_bucket_level() {
        // 2 leading periods are dropped; each bucket of 4 sums to 8
        let values: Vec<f64> = [9.0, 9.0].into_iter().chain((0..12).map(|t| if t % 2 == 0 { 4.0 } else { 0.0 })).collect();
        let params = AdidaParams {
            aggregation_level: 4,
            alpha: 0.5,
        };
        let fitted = fit_adida(&params, &values).unwrap();
        assert_eq!(fitted.forecast(3), vec![2.0; 3]);
    }

    #[test]
    fn adida_needs_a_full_bucket() {
        let params = AdidaParams {
            aggregation_level: 5,
            alpha: 0.5,
        };
        assert!(matches!(
            fit_adida(&params, &[1.0; 4]),
            Err(FitError::InsufficientData { required: 5, .. })
        ));
    }

    #[test]
    fn decode_bounds() {
        let mut params = Params::new();
        params.insert("alpha".into(), 0.6.into());
        assert!(CrostonParams::from_params(&params).is_err());

        params.insert("alpha".into(), 0.3.into());
        params.insert("aggregation_level".into(), 13i64.into());
        assert!(AdidaParams::from_params(&params).is_err());
        assert_eq!(
            CrostonParams::from_params(&params).unwrap().variant,
            CrostonVariant::Classic
        );
    }
}
