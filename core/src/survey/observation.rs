use crate::prelude::{Platform, SampleKey};
use serde::{Deserialize, Serialize};

/// Measured perpendicular distance, either exact or as a distance bin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Distance {
    Exact(f64),
    Binned { begin: f64, end: f64 },
}

impl Distance {
    /// Upper bound of the measurement, used for truncation.
    pub fn upper(&self) -> f64 {
        match *self {
            Distance::Exact(d) => d,
            Distance::Binned { end, .. } => end,
        }
    }
}

/// Raw sighting row; `distance` or the `distbegin`/`distend` pair may be empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub object: u64,
    pub sample_label: String,
    pub size: f64,
    pub distance: Option<f64>,
    pub distbegin: Option<f64>,
    pub distend: Option<f64>,
    pub platform: Platform,
}

impl Observation {
    pub fn measured(&self) -> Option<Distance> {
        if let Some(d) = self.distance {
            return Some(Distance::Exact(d));
        }
        match (self.distbegin, self.distend) {
            (Some(begin), Some(end)) => Some(Distance::Binned { begin, end }),
            _ => None,
        }
    }
}

/// Sighting relabelled onto its platform's segment copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformObservation {
    pub object: u64,
    pub key: SampleKey,
    pub size: f64,
    pub distance: Option<Distance>,
    pub ddf_index: u8,
}
