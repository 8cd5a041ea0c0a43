//! Search space definitions and seeded search strategies.

use rand::distributions::WeightedIndex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use tc_types::{ParameterValue, Params};

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub kind: ParameterKind,
}

/// Describes how a parameter is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Continuous uniform range [low, high].
    FloatRange { low: f64, high: f64 },
    /// Integer range [low, high] inclusive.
    IntRange { low: i64, high: i64 },
    /// Log-uniform range (sampled in log-space then exponentiated).
    LogUniform { low: f64, high: f64 },
    /// Categorical choices.
    Choice { values: Vec<serde_json::Value> },
}

impl ParameterKind {
    /// Bounds in the internal coordinate the strategies work in: the value
    /// itself for ranges, its logarithm for log-uniform ranges and the
    /// choice index for categoricals.
    fn coordinate_bounds(&self) -> (f64, f64) {
        match self {
            ParameterKind::FloatRange { low, high } => (*low, *high),
            ParameterKind::IntRange { low, high } => (*low as f64, *high as f64),
            ParameterKind::LogUniform { low, high } => (low.ln(), high.ln()),
            ParameterKind::Choice { values } => (0.0, values.len().saturating_sub(1) as f64),
        }
    }

    fn encode(&self, value: &ParameterValue) -> Option<f64> {
        match self {
            ParameterKind::FloatRange { .. } | ParameterKind::IntRange { .. } => value.as_f64(),
            ParameterKind::LogUniform { .. } => value.as_f64().filter(|v| *v > 0.0).map(f64::ln),
            ParameterKind::Choice { values } => {
                let json = match value {
                    ParameterValue::Json(v) => v.clone(),
                    ParameterValue::Int(v) => serde_json::Value::from(*v),
                    ParameterValue::Float(v) => serde_json::Value::from(*v),
                };
                values.iter().position(|v| *v == json).map(|i| i as f64)
            }
        }
    }

    fn decode(&self, coordinate: f64) -> ParameterValue {
        match self {
            ParameterKind::FloatRange { low, high } => ParameterValue::Float(coordinate.clamp(*low, *high)),
            ParameterKind::IntRange { low, high } => ParameterValue::Int((coordinate.round() as i64).clamp(*low, *high)),
            ParameterKind::LogUniform { low, high } => ParameterValue::Float(coordinate.exp().clamp(*low, *high)),
            ParameterKind::Choice { values } => {
                let idx = (coordinate.max(0.0) as usize).min(values.len().saturating_sub(1));
                ParameterValue::Json(values.get(idx).cloned().unwrap_or(serde_json::Value::Null))
            }
        }
    }
}

/// The full search space: an ordered list of parameter definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::FloatRange { low, high },
        });
        self
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::IntRange { low, high },
        });
        self
    }

    pub fn add_log_uniform(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::LogUniform { low, high },
        });
        self
    }

    pub fn add_choice(mut self, name: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::Choice { values },
        });
        self
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// Reject empty ranges and choice lists, and non-positive log bounds.
    pub fn validate(&self) -> Result<(), String> {
        for param in &self.parameters {
            let ok = match &param.kind {
                ParameterKind::FloatRange { low, high } => low.is_finite() && high.is_finite() && low <= high,
                ParameterKind::IntRange { low, high } => low <= high,
                ParameterKind::LogUniform { low, high } => *low > 0.0 && high.is_finite() && low <= high,
                ParameterKind::Choice { values } => !values.is_empty(),
            };
            if !ok {
                return Err(format!("parameter {} has an empty or invalid range", param.name));
            }
        }
        Ok(())
    }

    fn sample_uniform(&self, rng: &mut ChaCha8Rng) -> Vec<f64> {
        self.parameters
            .iter()
            .map(|param| match &param.kind {
                ParameterKind::Choice { values } => rng.gen_range(0..values.len().max(1)) as f64,
                kind => {
                    let (low, high) = kind.coordinate_bounds();
                    rng.gen_range(low..=high)
                }
            })
            .collect()
    }

    fn decode(&self, coordinates: &[f64]) -> Params {
        self.parameters
            .iter()
            .zip(coordinates)
            .map(|(param, &c)| (param.name.clone(), param.kind.decode(c)))
            .collect()
    }

    fn encode(&self, params: &Params) -> Option<Vec<f64>> {
        self.parameters
            .iter()
            .map(|param| params.get(&param.name).and_then(|v| param.kind.encode(v)))
            .collect()
    }
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Search strategies
// ---------------------------------------------------------------------------

/// Common trait for all search strategies.
pub trait SearchStrategy: Send + Sync {
    /// Generate the next batch of parameter assignments to evaluate.
    fn suggest(&mut self, count: usize) -> Vec<Params>;

    /// Report a completed trial so adaptive strategies can learn. Failed
    /// trials are reported with an infinite loss.
    fn report(&mut self, _params: &Params, _loss: f64) {}

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

// ---- Random search ----

/// Independent uniform sampling across the search space.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: SearchSpace,
    rng: ChaCha8Rng,
}

impl RandomSearch {
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        Self {
            space,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SearchStrategy for RandomSearch {
    fn suggest(&mut self, count: usize) -> Vec<Params> {
        (0..count)
            .map(|_| {
                let coordinates = self.space.sample_uniform(&mut self.rng);
                self.space.decode(&coordinates)
            })
            .collect()
    }

    fn name(&self) -> &str {
        "random"
    }
}

// ---- Tree-structured Parzen estimator ----

/// Tuning knobs for [`TpeSearch`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TpeSettings {
    /// Uniform draws before the density model is used.
    pub n_startup_trials: usize,
    /// Fraction of finite-loss trials treated as "good".
    pub gamma: f64,
    /// Candidates drawn from the good density per proposal.
    pub n_candidates: usize,
}

impl Default for TpeSettings {
    fn default() -> Self {
        Self {
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
        }
    }
}

/// Kernel width as a fraction of the range, shrinking with the number of
/// observations.
fn bandwidth(range: f64, n: usize) -> f64 {
    (0.3 * range * ((n + 1) as f64).powf(-0.2)).max(0.01 * range)
}

/// Sequential model-based search: observed trials are split into a good and a
/// bad group by loss, a Parzen density is fitted per group and each proposal
/// is the candidate (drawn from the good density) maximising `l(x) / g(x)`.
///
/// Every density mixes in a uniform prior component, so no point in the space
/// ever has zero probability.
#[derive(Debug, Clone)]
pub struct TpeSearch {
    space: SearchSpace,
    settings: TpeSettings,
    rng: ChaCha8Rng,
    observations: Vec<(Vec<f64>, f64)>,
}

impl TpeSearch {
    pub fn new(space: SearchSpace, seed: u64, settings: TpeSettings) -> Self {
        Self {
            space,
            settings,
            rng: ChaCha8Rng::seed_from_u64(seed),
            observations: Vec::new(),
        }
    }

    pub fn observations(&self) -> usize {
        self.observations.len()
    }

    fn propose(&mut self) -> Vec<f64> {
        let mut finite: Vec<&(Vec<f64>, f64)> = self.observations.iter().filter(|o| o.1.is_finite()).collect();
        if self.observations.len() < self.settings.n_startup_trials || finite.is_empty() {
            return self.space.sample_uniform(&mut self.rng);
        }

        finite.sort_by(|a, b| a.1.total_cmp(&b.1));
        let n_good = ((self.settings.gamma * finite.len() as f64).ceil() as usize).clamp(1, finite.len());
        let good: Vec<Vec<f64>> = finite[..n_good].iter().map(|o| o.0.clone()).collect();
        let bad: Vec<Vec<f64>> = finite[n_good..]
            .iter()
            .map(|o| o.0.clone())
            .chain(self.observations.iter().filter(|o| !o.1.is_finite()).map(|o| o.0.clone()))
            .collect();

        let mut best: Option<(f64, Vec<f64>)> = None;
        for _ in 0..self.settings.n_candidates.max(1) {
            let candidate = self.sample_from(&good);
            let score = self.log_density(&candidate, &good) - self.log_density(&candidate, &bad);
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, candidate));
            }
        }
        match best {
            Some((_, candidate)) => candidate,
            None => self.space.sample_uniform(&mut self.rng),
        }
    }

    fn sample_from(&mut self, group: &[Vec<f64>]) -> Vec<f64> {
        let n = group.len();
        let mut point = Vec::with_capacity(self.space.len());

        for (dim, param) in self.space.parameters.iter().enumerate() {
            let value = match &param.kind {
                ParameterKind::Choice { values } => {
                    let weights = category_weights(values.len(), group.iter().map(|o| o[dim]));
                    WeightedIndex::new(&weights).map_or(0.0, |w| w.sample(&mut self.rng) as f64)
                }
                kind => {
                    let (low, high) = kind.coordinate_bounds();
                    // component n is the uniform prior
                    let component = self.rng.gen_range(0..=n);
                    if component == n || high <= low {
                        self.rng.gen_range(low..=high)
                    } else {
                        let centre = group[component][dim];
                        Normal::new(centre, bandwidth(high - low, n))
                            .map_or(centre, |d| d.sample(&mut self.rng))
                            .clamp(low, high)
                    }
                }
            };
            point.push(value);
        }
        point
    }

    fn log_density(&self, point: &[f64], group: &[Vec<f64>]) -> f64 {
        let n = group.len();
        self.space
            .parameters
            .iter()
            .enumerate()
            .map(|(dim, param)| {
                let p = match &param.kind {
                    ParameterKind::Choice { values } => {
                        let weights = category_weights(values.len(), group.iter().map(|o| o[dim]));
                        let idx = (point[dim] as usize).min(weights.len().saturating_sub(1));
                        weights.get(idx).copied().unwrap_or(1.0) / weights.iter().sum::<f64>().max(1.0)
                    }
                    kind => {
                        let (low, high) = kind.coordinate_bounds();
                        let range = high - low;
                        if range <= 0.0 {
                            1.0
                        } else {
                            let sigma = bandwidth(range, n);
                            let kernels: f64 = group.iter().map(|o| gaussian(point[dim], o[dim], sigma)).sum();
                            (1.0 / range + kernels) / (n + 1) as f64
                        }
                    }
                };
                p.max(f64::MIN_POSITIVE).ln()
            })
            .sum()
    }
}

/// Laplace-smoothed category counts.
fn category_weights(k: usize, observed: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut weights = vec![1.0; k.max(1)];
    for c in observed {
        if let Some(w) = weights.get_mut(c as usize) {
            *w += 1.0;
        }
    }
    weights
}

fn gaussian(x: f64, mean: f64, sigma: f64) -> f64 {
    let z = (x - mean) / sigma;
    (-0.5 * z * z).exp() / (sigma * (2.0 * std::f64::consts::PI).sqrt())
}

impl SearchStrategy for TpeSearch {
    fn suggest(&mut self, count: usize) -> Vec<Params> {
        (0..count)
            .map(|_| {
                let coordinates = self.propose();
                self.space.decode(&coordinates)
            })
            .collect()
    }

    fn report(&mut self, params: &Params, loss: f64) {
        if let Some(coordinates) = self.space.encode(params) {
            let loss = if loss.is_nan() { f64::INFINITY } else { loss };
            self.observations.push((coordinates, loss));
        }
    }

    fn name(&self) -> &str {
        "tpe"
    }
}
