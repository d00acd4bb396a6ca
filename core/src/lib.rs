//! Density surface modelling core for two-platform line-transect surveys.
//!
//! Segments are duplicated per observation platform, detection functions are
//! fitted per platform, and nested spatial count models are fitted, refitted
//! with detection uncertainty, predicted over a grid and sampled to map
//! per-cell uncertainty.

pub mod detection;
pub mod math;
pub mod model;
pub mod prelude;
pub mod processing;
pub mod survey;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

pub use prelude::{DsmError, DsmResult, Platform, SampleKey};
