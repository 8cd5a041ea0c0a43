//! Per-family hyperparameter search spaces.

use serde_json::json;
use std::collections::BTreeMap;

use tc_types::{ConfigError, ModelFamily};

use crate::search::SearchSpace;

/// Maps every model family to the space its searches sample from.
///
/// Parameter names match exactly what the family's model spec decodes.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpaceRegistry {
    spaces: BTreeMap<ModelFamily, SearchSpace>,
}

impl SearchSpaceRegistry {
    pub fn empty() -> Self {
        Self {
            spaces: BTreeMap::new(),
        }
    }

    pub fn with_space(mut self, family: ModelFamily, space: SearchSpace) -> Self {
        self.spaces.insert(family, space);
        self
    }

    pub fn get(&self, family: ModelFamily) -> Result<&SearchSpace, ConfigError> {
        self.spaces.get(&family).ok_or_else(|| ConfigError::MissingSearchSpace {
            family: family.to_string(),
        })
    }
}

impl Default for SearchSpaceRegistry {
    fn default() -> Self {
        Self::empty()
            .with_space(
                ModelFamily::Baseline,
                SearchSpace::new().add_choice(
                    "method",
                    vec![json!("naive"), json!("seasonal_naive"), json!("mean"), json!("drift")],
                ),
            )
            .with_space(
                ModelFamily::Arima,
                SearchSpace::new()
                    .add_int("max_p", 0, 3)
                    .add_int("d", 0, 2)
                    .add_int("max_q", 0, 3),
            )
            .with_space(
                ModelFamily::ExponentialSmoothing,
                SearchSpace::new()
                    .add_choice("kind", vec![json!("simple"), json!("holt"), json!("holt_winters")])
                    .add_float("alpha", 0.05, 0.95)
                    .add_float("beta", 0.05, 0.95)
                    .add_float("gamma", 0.05, 0.95),
            )
            .with_space(
                ModelFamily::GradientBoosting,
                SearchSpace::new()
                    .add_int("n_estimators", 20, 200)
                    .add_log_uniform("learning_rate", 0.01, 0.3)
                    .add_int("max_depth", 2, 6)
                    .add_int("min_samples_leaf", 1, 10),
            )
            .with_space(
                ModelFamily::Croston,
                SearchSpace::new()
                    .add_float("alpha", 0.05, 0.5)
                    .add_choice("variant", vec![json!("classic"), json!("sba")]),
            )
            .with_space(
                ModelFamily::Adida,
                SearchSpace::new()
                    .add_int("aggregation_level", 1, 12)
                    .add_float("alpha", 0.05, 0.95),
            )
    }
}
