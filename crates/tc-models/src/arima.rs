//! ARIMA with automatic (p, q) selection.
//!
//! Each candidate order is estimated with the Hannan–Rissanen procedure: a long
//! autoregression supplies residual estimates, then a single least-squares
//! regression on lagged values and lagged residuals gives the ARMA
//! coefficients. All orders are scored on the same rows so their AIC values
//! are comparable.

use serde::{Deserialize, Serialize};

use tc_types::{FitError, Params};

use crate::decode;
use crate::linalg::least_squares;

const FAMILY: &str = "arima";

pub const MAX_ORDER: usize = 3;
pub const MAX_DIFFERENCING: usize = 2;

/// Variance floor inside the AIC log term, so exact fits stay finite.
const VARIANCE_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaParams {
    pub max_p: usize,
    pub max_q: usize,
    pub d: usize,
}

impl ArimaParams {
    pub fn new(max_p: usize, d: usize, max_q: usize) -> Self {
        Self { max_p, max_q, d }
    }

    pub(crate) fn from_params(params: &Params) -> Result<Self, FitError> {
        let parsed = Self {
            max_p: decode::count(params, "max_p")?,
            max_q: decode::count(params, "max_q")?,
            d: decode::count(params, "d")?,
        };
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), FitError> {
        let bounded = [
            ("max_p", self.max_p, MAX_ORDER),
            ("max_q", self.max_q, MAX_ORDER),
            ("d", self.d, MAX_DIFFERENCING),
        ];
        for (name, value, max) in bounded {
            if value > max {
                return Err(FitError::InvalidHyperparameter {
                    name: name.to_string(),
                    message: format!("{value} exceeds {max}"),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaFit {
    p: usize,
    q: usize,
    d: usize,
    intercept: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    aic: f64,
    /// Tail of the differenced series, most recent last.
    recent: Vec<f64>,
    /// Tail of the in-sample residuals, most recent last.
    residuals: Vec<f64>,
    /// Last value at each differencing level, level 0 first.
    anchors: Vec<f64>,
}

pub fn fit(params: &ArimaParams, values: &[f64]) -> Result<ArimaFit, FitError> {
    params.validate()?;

    let required = params.d + params.max_p.max(1) + params.max_q + 3;
    if values.len() < required {
        return Err(FitError::InsufficientData {
            family: FAMILY.to_string(),
            required,
            available: values.len(),
        });
    }

    let (w, anchors) = difference(values, params.d);
    let m = w.len();

    let long_order = if params.max_q == 0 {
        0
    } else {
        (params.max_p + params.max_q + 1).max(4).min(m / 3)
    };
    let innovations = if long_order > 0 {
        long_ar_residuals(&w, long_order)
    } else {
        None
    };
    let max_q = if innovations.is_some() { params.max_q } else { 0 };
    let start = (long_order + max_q).max(params.max_p);

    let mut best: Option<Candidate> = None;
    for p in 0..=params.max_p {
        for q in 0..=max_q {
            let Some(candidate) = estimate(&w, innovations.as_deref(), start, p, q) else {
                tracing::trace!(p, q, "arima order not estimable");
                continue;
            };
            if best.as_ref().map_or(true, |b| candidate.aic < b.aic) {
                best = Some(candidate);
            }
        }
    }

    let best = best.ok_or_else(|| FitError::NotConverged {
        family: FAMILY.to_string(),
        message: format!("no estimable order up to ({}, {}, {})", params.max_p, params.d, params.max_q),
    })?;
    tracing::debug!(p = best.p, d = params.d, q = best.q, aic = best.aic, "arima order selected");

    Ok(ArimaFit {
        p: best.p,
        q: best.q,
        d: params.d,
        intercept: best.coefficients[0],
        ar: best.coefficients[1..=best.p].to_vec(),
        ma: best.coefficients[best.p + 1..].to_vec(),
        aic: best.aic,
        recent: w[m - best.p..].to_vec(),
        residuals: best.residuals[best.residuals.len() - best.q..].to_vec(),
        anchors,
    })
}

struct Candidate {
    p: usize,
    q: usize,
    coefficients: Vec<f64>,
    residuals: Vec<f64>,
    aic: f64,
}

/// Difference `d` times, returning the differenced series and the last value
/// of every level before each differencing step.
fn difference(values: &[f64], d: usize) -> (Vec<f64>, Vec<f64>) {
    let mut series = values.to_vec();
    let mut anchors = Vec::with_capacity(d);
    for _ in 0..d {
        anchors.push(series[series.len() - 1]);
        series = series.windows(2).map(|w| w[1] - w[0]).collect();
    }
    (series, anchors)
}

/// Residuals of an AR(`order`) fit with intercept; zero before `order`.
fn long_ar_residuals(w: &[f64], order: usize) -> Option<Vec<f64>> {
    let rows: Vec<Vec<f64>> = (order..w.len())
        .map(|t| std::iter::once(1.0).chain((1..=order).map(|i| w[t - i])).collect())
        .collect();
    let coef = least_squares(&rows, &w[order..])?;

    let mut residuals = vec![0.0; w.len()];
    for (t, row) in (order..w.len()).zip(&rows) {
        residuals[t] = w[t] - dot(&coef, row);
    }
    Some(residuals)
}

fn estimate(w: &[f64], innovations: Option<&[f64]>, start: usize, p: usize, q: usize) -> Option<Candidate> {
    let k = 1 + p + q;
    let n = w.len().checked_sub(start)?;
    if n <= k {
        return None;
    }
    let lagged_residual = |t: usize, j: usize| innovations.map_or(0.0, |e| e[t - j]);

    let rows: Vec<Vec<f64>> = (start..w.len())
        .map(|t| {
            std::iter::once(1.0)
                .chain((1..=p).map(|i| w[t - i]))
                .chain((1..=q).map(|j| lagged_residual(t, j)))
                .collect()
        })
        .collect();
    let coefficients = least_squares(&rows, &w[start..])?;

    let residuals: Vec<f64> = rows.iter().zip(&w[start..]).map(|(row, y)| y - dot(&coefficients, row)).collect();
    let variance = residuals.iter().map(|e| e * e).sum::<f64>() / n as f64;
    let aic = n as f64 * variance.max(VARIANCE_FLOOR).ln() + 2.0 * k as f64;
    if !aic.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
        return None;
    }

    Some(Candidate {
        p,
        q,
        coefficients,
        residuals,
        aic,
    })
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl ArimaFit {
    /// Selected `(p, d, q)`.
    pub fn order(&self) -> (usize, usize, usize) {
        (self.p, self.d, self.q)
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        let mut w = self.recent.clone();
        let mut shocks = self.residuals.clone();
        let mut out = Vec::with_capacity(horizon);

        for _ in 0..horizon {
            let ar: f64 = (1..=self.p).map(|i| self.ar[i - 1] * w[w.len() - i]).sum();
            let ma: f64 = (1..=self.q).map(|j| self.ma[j - 1] * shocks[shocks.len() - j]).sum();
            let next = self.intercept + ar + ma;
            w.push(next);
            shocks.push(0.0);
            out.push(next);
        }

        for anchor in self.anchors.iter().rev() {
            let mut level = *anchor;
            for v in out.iter_mut() {
                level += *v;
                *v = level;
            }
        }
        out
    }
}
