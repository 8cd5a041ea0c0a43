//! Feature engineering for the tree-based family.
//!
//! A row for target index `t` is built only from values strictly before `t`,
//! the timestamp at `t` and the exogenous columns at `t`, so the same builder
//! serves training and recursive forecasting.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollingFunction {
    Mean,
    Std,
}

impl RollingFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollingFunction::Mean => "mean",
            RollingFunction::Std => "std",
        }
    }

    fn apply(&self, window: &[f64]) -> f64 {
        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        match self {
            RollingFunction::Mean => mean,
            // sample standard deviation; a single observation has none
            RollingFunction::Std if window.len() < 2 => 0.0,
            RollingFunction::Std => {
                (window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFeature {
    DayOfWeek,
    Month,
    Year,
    WeekOfYear,
}

impl DateFeature {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateFeature::DayOfWeek => "dayofweek",
            DateFeature::Month => "month",
            DateFeature::Year => "year",
            DateFeature::WeekOfYear => "weekofyear",
        }
    }

    fn extract(&self, ts: &DateTime<Utc>) -> f64 {
        match self {
            DateFeature::DayOfWeek => f64::from(ts.weekday().num_days_from_monday()),
            DateFeature::Month => f64::from(ts.month()),
            DateFeature::Year => f64::from(ts.year()),
            DateFeature::WeekOfYear => f64::from(ts.iso_week().week()),
        }
    }
}

/// Which engineered columns the tree-based family sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub lags: Vec<usize>,
    pub rolling_windows: Vec<usize>,
    pub rolling_functions: Vec<RollingFunction>,
    pub date_features: Vec<DateFeature>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lags: vec![1, 7, 14],
            rolling_windows: vec![7, 14, 28],
            rolling_functions: vec![RollingFunction::Mean, RollingFunction::Std],
            date_features: vec![
                DateFeature::DayOfWeek,
                DateFeature::Month,
                DateFeature::Year,
                DateFeature::WeekOfYear,
            ],
        }
    }
}

impl FeatureConfig {
    /// Number of past observations a row needs.
    pub fn lookback(&self) -> usize {
        self.lags
            .iter()
            .chain(&self.rolling_windows)
            .copied()
            .max()
            .unwrap_or(0)
            .max(1)
    }

    /// Column names in row order, given the exogenous column names.
    pub fn column_names(&self, exogenous: &[&str]) -> Vec<String> {
        let mut names: Vec<String> = self.lags.iter().map(|k| format!("lag_{k}")).collect();
        for w in &self.rolling_windows {
            for f in &self.rolling_functions {
                names.push(format!("rolling_{}_{w}", f.as_str()));
            }
        }
        names.extend(self.date_features.iter().map(|d| d.as_str().to_string()));
        names.extend(exogenous.iter().map(|e| e.to_string()));
        names
    }

    /// Build one feature row.
    ///
    /// `history` holds every value before the target and must be at least
    /// [`lookback`](Self::lookback) long. Without a timestamp the calendar
    /// columns are zero.
    pub fn row(&self, history: &[f64], timestamp: Option<&DateTime<Utc>>, exogenous: &[f64]) -> Vec<f64> {
        let n = history.len();
        debug_assert!(n >= self.lookback());

        let mut row = Vec::with_capacity(
            self.lags.len()
                + self.rolling_windows.len() * self.rolling_functions.len()
                + self.date_features.len()
                + exogenous.len(),
        );
        row.extend(self.lags.iter().map(|&k| history[n - k.max(1)]));
        for &w in &self.rolling_windows {
            let window = &history[n - w.max(1)..];
            row.extend(self.rolling_functions.iter().map(|f| f.apply(window)));
        }
        row.extend(
            self.date_features
                .iter()
                .map(|d| timestamp.map_or(0.0, |ts| d.extract(ts))),
        );
        row.extend_from_slice(exogenous);
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_lookback_is_longest_window() {
        assert_eq!(FeatureConfig::default().lookback(), 28);
        let empty = FeatureConfig {
            lags: vec![],
            rolling_windows: vec![],
            rolling_functions: vec![],
            date_features: vec![],
        };
        assert_eq!(empty.lookback(), 1);
    }

    #[test]
    fn row_uses_only_past_values() {
        let config = FeatureConfig {
            lags: vec![1, 3],
            rolling_windows: vec![2],
            rolling_functions: vec![RollingFunction::Mean, RollingFunction::Std],
            date_features: vec![DateFeature::DayOfWeek, DateFeature::WeekOfYear],
        };
        // 2024-01-03 is a Wednesday in ISO week 1
        let ts = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let row = config.row(&[1.0, 2.0, 4.0, 6.0], Some(&ts), &[9.5]);

        let std = (2.0f64).sqrt();
        assert_eq!(row.len(), 7);
        assert_eq!(&row[..3], &[6.0, 2.0, 5.0]);
        assert!((row[3] - std).abs() < 1e-12);
        assert_eq!(&row[4..], &[2.0, 1.0, 9.5]);
        assert_eq!(
            config.column_names(&["price"]),
            vec!["lag_1", "lag_3", "rolling_mean_2", "rolling_std_2", "dayofweek", "weekofyear", "price"]
        );
    }

    #[test]
    fn missing_timestamp_zeroes_calendar_columns() {
        let config = FeatureConfig {
            lags: vec![1],
            rolling_windows: vec![],
            rolling_functions: vec![],
            date_features: vec![DateFeature::Year],
        };
        assert_eq!(config.row(&[3.0], None, &[]), vec![3.0, 0.0]);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: FeatureConfig = serde_json::from_str(r#"{"lags":[1,2]}"#).unwrap();
        assert_eq!(config.lags, vec![1, 2]);
        assert_eq!(config.rolling_windows, vec![7, 14, 28]);
        assert_eq!(config.date_features.len(), 4);
    }
}
