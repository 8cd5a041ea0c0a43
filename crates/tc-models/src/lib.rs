//! Model families for TideCast.
//!
//! Every family is decoded from a [`Params`](tc_types::Params) assignment into a
//! typed [`ModelSpec`], fitted on a [`SeriesSlice`](tc_types::SeriesSlice) and
//! forecast through the same [`FittedModel::forecast`] contract.

pub mod adapter;
pub mod arima;
pub mod baseline;
pub mod boosting;
pub mod features;
pub mod intermittent;
pub mod linalg;
pub mod smoothing;

mod decode;

pub use adapter::{fit, FamilyContext, FittedModel, Model, ModelSpec, ModelState};
pub use features::{DateFeature, FeatureConfig, RollingFunction};
