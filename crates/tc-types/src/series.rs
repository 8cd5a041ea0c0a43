//! Series datasets and borrowed views over their train / holdout segments.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DataError;

/// Unique series identifier.
pub type SeriesId = String;

/// A named exogenous column aligned with the series timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// One series with its history, optional feature columns and train/test split.
///
/// `[0, split)` is the training segment, `[split, len)` the held-out segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDataset {
    id: SeriesId,
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
    features: Vec<FeatureColumn>,
    split: usize,
}

impl SeriesDataset {
    pub fn new(
        id: impl Into<SeriesId>,
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<f64>,
        split: usize,
    ) -> Result<Self, DataError> {
        let id = id.into();

        if timestamps.len() != values.len() {
            return Err(DataError::LengthMismatch {
                series: id,
                column: "value".to_string(),
                expected: timestamps.len(),
                actual: values.len(),
            });
        }
        if let Some(index) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(DataError::NonIncreasingTimestamps {
                series: id,
                index: index + 1,
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(DataError::NonFinite {
                series: id,
                column: "value".to_string(),
                index,
            });
        }
        if split > values.len() {
            return Err(DataError::InvalidSplit {
                series: id,
                split,
                len: values.len(),
            });
        }

        Ok(Self {
            id,
            timestamps,
            values,
            features: Vec::new(),
            split,
        })
    }

    /// Build a dataset whose last `holdout` observations form the test segment.
    ///
    /// The holdout is capped at half the series, so any non-empty series keeps
    /// at least one training observation.
    pub fn with_holdout(
        id: impl Into<SeriesId>,
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<f64>,
        holdout: usize,
    ) -> Result<Self, DataError> {
        let split = values.len() - holdout.min(values.len() / 2);
        Self::new(id, timestamps, values, split)
    }

    /// Attach a numeric feature column. Columns keep insertion order.
    pub fn with_feature(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self, DataError> {
        let name = name.into();
        if values.len() != self.values.len() {
            return Err(DataError::LengthMismatch {
                series: self.id,
                column: name,
                expected: self.values.len(),
                actual: values.len(),
            });
        }
        if self.features.iter().any(|c| c.name == name) {
            return Err(DataError::DuplicateFeature {
                series: self.id,
                column: name,
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(DataError::NonFinite {
                series: self.id,
                column: name,
                index,
            });
        }
        self.features.push(FeatureColumn { name, values });
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn split(&self) -> usize {
        self.split
    }

    /// Fails when the training or the holdout segment has no observations.
    pub fn ensure_segments(&self) -> Result<(), DataError> {
        let len = self.values.len();
        let segment = if self.split == 0 {
            "training"
        } else if self.split == len {
            "holdout"
        } else {
            return Ok(());
        };
        Err(DataError::EmptySegment {
            series: self.id.clone(),
            segment: segment.to_string(),
            len,
            holdout: len - self.split,
        })
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn features(&self) -> &[FeatureColumn] {
        &self.features
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn train(&self) -> SeriesSlice<'_> {
        self.slice(0, self.split)
    }

    pub fn holdout(&self) -> SeriesSlice<'_> {
        self.slice(self.split, self.values.len())
    }

    /// Train and holdout together, used for the final refit.
    pub fn full(&self) -> SeriesSlice<'_> {
        self.slice(0, self.values.len())
    }

    fn slice(&self, start: usize, end: usize) -> SeriesSlice<'_> {
        SeriesSlice {
            timestamps: &self.timestamps[start..end],
            values: &self.values[start..end],
            features: self
                .features
                .iter()
                .map(|c| FeatureView {
                    name: c.name.as_str(),
                    values: &c.values[start..end],
                })
                .collect(),
        }
    }
}

/// Borrowed feature column restricted to a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureView<'a> {
    pub name: &'a str,
    pub values: &'a [f64],
}

/// Borrowed view over a contiguous segment of a [`SeriesDataset`].
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSlice<'a> {
    pub timestamps: &'a [DateTime<Utc>],
    pub values: &'a [f64],
    pub features: Vec<FeatureView<'a>>,
}

impl<'a> SeriesSlice<'a> {
    /// A view with no timestamps or features, for callers that only have values.
    pub fn from_values(values: &'a [f64]) -> Self {
        Self {
            timestamps: &[],
            values,
            features: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keep only the named feature columns, in their original order.
    pub fn retain_features(mut self, keep: &[String]) -> Self {
        self.features.retain(|f| keep.iter().any(|k| k == f.name));
        self
    }

    /// Spacing between the last two observations, falling back to one day.
    pub fn step(&self) -> Duration {
        match self.timestamps {
            [.., a, b] => *b - *a,
            _ => Duration::days(1),
        }
    }

    /// Timestamps for the `horizon` periods following this segment.
    pub fn future_timestamps(&self, horizon: usize) -> Result<Vec<DateTime<Utc>>, DataError> {
        let Some(&last) = self.timestamps.last() else {
            return Ok(Vec::new());
        };
        let step = self.step();
        (1..=horizon).map(|h| step_forward(last, step, h)).collect()
    }
}

/// The instant `periods` steps of `step` after `last`.
pub fn step_forward(last: DateTime<Utc>, step: Duration, periods: usize) -> Result<DateTime<Utc>, DataError> {
    i32::try_from(periods)
        .ok()
        .and_then(|n| step.checked_mul(n))
        .and_then(|offset| last.checked_add_signed(offset))
        .ok_or(DataError::TimestampOverflow { last, step, periods })
}
