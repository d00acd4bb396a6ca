//! Detection functions: key functions fitted by maximum likelihood and the
//! fixed "dummy" function used for strip-count platforms.

pub mod dummy;
pub mod fit;
pub mod key;

pub use dummy::{DummyDetection, DummyFitter};
pub use fit::{FittedDetection, MaximumLikelihoodFitter};
pub use key::KeyFunction;

use crate::prelude::{DsmError, DsmResult};
use crate::survey::Distance;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fits a detection function to one platform's distances.
pub trait DetectionFitter {
    fn fit(&self, distances: &[Distance]) -> DsmResult<DetectionFunction>;
}

#[derive(Debug, Clone)]
pub enum DetectionFunction {
    Fitted(FittedDetection),
    Dummy(DummyDetection),
}

impl DetectionFunction {
    pub fn width(&self) -> f64 {
        match self {
            DetectionFunction::Fitted(f) => f.width,
            DetectionFunction::Dummy(d) => d.width,
        }
    }

    /// Average detection probability inside the truncation width.
    pub fn probability(&self) -> f64 {
        match self {
            DetectionFunction::Fitted(f) => f.probability_at(&f.params),
            DetectionFunction::Dummy(_) => 1.0,
        }
    }

    /// Detection probability for an alternative parameter vector.
    pub fn probability_at(&self, params: &[f64]) -> f64 {
        match self {
            DetectionFunction::Fitted(f) => f.probability_at(params),
            DetectionFunction::Dummy(_) => 1.0,
        }
    }

    pub fn parameters(&self) -> &[f64] {
        match self {
            DetectionFunction::Fitted(f) => &f.params,
            DetectionFunction::Dummy(_) => &[],
        }
    }

    pub fn parameter_covariance(&self) -> Option<&Array2<f64>> {
        match self {
            DetectionFunction::Fitted(f) => Some(&f.covariance),
            DetectionFunction::Dummy(_) => None,
        }
    }

    pub fn aic(&self) -> Option<f64> {
        match self {
            DetectionFunction::Fitted(f) => Some(f.aic()),
            DetectionFunction::Dummy(_) => None,
        }
    }

    /// Whether an observation survives truncation; unmeasured sightings only
    /// count toward the dummy function.
    pub fn retains(&self, distance: Option<&Distance>) -> bool {
        match (self, distance) {
            (_, Some(d)) => d.upper() <= self.width() + 1e-9,
            (DetectionFunction::Dummy(_), None) => true,
            (DetectionFunction::Fitted(_), None) => false,
        }
    }

    pub fn summary(&self, ddf_index: u8) -> DetectionSummary {
        DetectionSummary {
            ddf_index,
            model: match self {
                DetectionFunction::Fitted(f) => f.key.name().to_string(),
                DetectionFunction::Dummy(_) => "dummy".to_string(),
            },
            width: self.width(),
            probability: self.probability(),
            aic: self.aic(),
            parameters: self.parameters().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionSummary {
    pub ddf_index: u8,
    pub model: String,
    pub width: f64,
    pub probability: f64,
    pub aic: Option<f64>,
    pub parameters: Vec<f64>,
}

/// Picks the candidate with the lowest AIC; dummy functions never win a comparison.
pub fn select_by_aic(candidates: Vec<DetectionFunction>) -> DsmResult<DetectionFunction> {
    candidates
        .into_iter()
        .filter_map(|c| c.aic().map(|aic| (aic, c)))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c)
        .ok_or_else(|| DsmError::InvalidInput("no fitted detection function to compare".into()))
}

/// Detection functions indexed by `ddf_index`.
#[derive(Debug, Clone, Default)]
pub struct DetectionFunctionSet {
    functions: BTreeMap<u8, DetectionFunction>,
}

impl DetectionFunctionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ddf_index: u8, function: DetectionFunction) {
        self.functions.insert(ddf_index, function);
    }

    pub fn get(&self, ddf_index: u8) -> DsmResult<&DetectionFunction> {
        self.functions.get(&ddf_index).ok_or_else(|| {
            DsmError::InvalidInput(format!("no detection function with index {}", ddf_index))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &DetectionFunction)> {
        self.functions.iter().map(|(i, f)| (*i, f))
    }

    /// Total parameter count across all functions, in index order.
    pub fn parameter_count(&self) -> usize {
        self.functions.values().map(|f| f.parameters().len()).sum()
    }

    pub fn summaries(&self) -> Vec<DetectionSummary> {
        self.iter().map(|(i, f)| f.summary(i)).collect()
    }
}
