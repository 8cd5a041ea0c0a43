//! Exogenous features derived from news text.
//!
//! Producing the scores (an LLM call, a sentiment service, ...) is left to a
//! [`NewsFeatureSource`] implementation. This module only defines the feature
//! contract and attaches the scores to a dataset as ordinary numeric columns.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tc_types::{DataError, SeriesDataset};

/// Structured scores extracted from the news of one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewsFeatures {
    /// -1 (very negative) to 1 (very positive).
    pub sentiment: f64,
    /// 0 to 1.
    pub supply_chain_risk: f64,
    /// 0 (falling demand) to 1 (rising demand).
    pub demand_indicator: f64,
    /// -1 (deflationary) to 1 (inflationary).
    pub price_pressure: f64,
    /// 0 to 1.
    pub market_volatility: f64,
    pub event_count: u32,
}

impl NewsFeatures {
    /// Column names, in the order [`NewsFeatures::to_row`] emits them.
    pub const COLUMNS: [&'static str; 6] = [
        "news_sentiment",
        "supply_chain_risk",
        "demand_indicator",
        "price_pressure",
        "market_volatility",
        "event_count",
    ];

    /// Scores used when no news is available for a period.
    pub fn neutral() -> Self {
        Self {
            sentiment: 0.0,
            supply_chain_risk: 0.0,
            demand_indicator: 0.5,
            price_pressure: 0.0,
            market_volatility: 0.5,
            event_count: 0,
        }
    }

    pub fn to_row(&self) -> [f64; 6] {
        [
            self.sentiment,
            self.supply_chain_risk,
            self.demand_indicator,
            self.price_pressure,
            self.market_volatility,
            f64::from(self.event_count),
        ]
    }

    fn is_finite(&self) -> bool {
        self.to_row().iter().all(|v| v.is_finite())
    }
}

impl Default for NewsFeatures {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Turns the news text of one period into [`NewsFeatures`].
pub trait NewsFeatureSource: Send + Sync {
    fn extract(&self, text: &str, date: DateTime<Utc>) -> anyhow::Result<NewsFeatures>;
}

/// Score each observation's news and attach the six [`NewsFeatures::COLUMNS`]
/// to `dataset`.
///
/// `news` maps timestamps to text. A timestamp without text, a source error or
/// a non-finite score falls back to [`NewsFeatures::neutral`].
pub fn attach_news_features(
    dataset: SeriesDataset,
    news: &BTreeMap<DateTime<Utc>, String>,
    source: &dyn NewsFeatureSource,
) -> Result<SeriesDataset, DataError> {
    let mut columns: [Vec<f64>; 6] = Default::default();
    let mut fallbacks = 0usize;

    for &timestamp in dataset.timestamps() {
        let features = match news.get(&timestamp).map(String::as_str) {
            None | Some("") => {
                fallbacks += 1;
                NewsFeatures::neutral()
            }
            Some(text) => match source.extract(text, timestamp) {
                Ok(features) if features.is_finite() => features,
                Ok(_) => {
                    tracing::warn!(series = dataset.id(), %timestamp, "non-finite news scores, using neutral");
                    fallbacks += 1;
                    NewsFeatures::neutral()
                }
                Err(e) => {
                    tracing::warn!(series = dataset.id(), %timestamp, error = %e, "news extraction failed, using neutral");
                    fallbacks += 1;
                    NewsFeatures::neutral()
                }
            },
        };
        for (column, value) in columns.iter_mut().zip(features.to_row()) {
            column.push(value);
        }
    }

    if fallbacks > 0 {
        tracing::debug!(series = dataset.id(), fallbacks, "neutral news features used");
    }

    let mut dataset = dataset;
    for (name, column) in NewsFeatures::COLUMNS.into_iter().zip(columns) {
        dataset = dataset.with_feature(name, column)?;
    }
    Ok(dataset)
}
