use serde::{Deserialize, Serialize};
use std::fmt;

/// Observation platform; each one carries its own detection function.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Platform {
    A,
    B,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::A, Platform::B];

    /// Detection-function index bound to this platform (1-based).
    pub fn ddf_index(self) -> u8 {
        match self {
            Platform::A => 1,
            Platform::B => 2,
        }
    }

    pub fn from_ddf_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Platform::A),
            2 => Some(Platform::B),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Platform::A => "A",
            Platform::B => "B",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Composite sample-unit key: the source segment label plus the platform copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleKey {
    pub label: String,
    pub platform: Platform,
}

impl SampleKey {
    pub fn new(label: impl Into<String>, platform: Platform) -> Self {
        Self {
            label: label.into(),
            platform,
        }
    }
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.label, self.platform)
    }
}

/// Common error type for every pipeline stage.
#[derive(thiserror::Error, Debug)]
pub enum DsmError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("duplicate sample label '{0}'")]
    DuplicateSampleLabel(String),
    #[error("observation {object} has no matching segment {key}")]
    UnmatchedObservation { object: u64, key: String },
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("fit did not converge: {0}")]
    NonConvergence(String),
    #[error("numerical failure: {0}")]
    Numerical(String),
    #[error("invalid sample subset: {0}")]
    InvalidSubset(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DsmResult<T> = Result<T, DsmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_index_round_trips() {
        for platform in Platform::ALL {
            assert_eq!(Platform::from_ddf_index(platform.ddf_index()), Some(platform));
        }
        assert_eq!(Platform::from_ddf_index(3), None);
    }

    #[test]
    fn sample_keys_with_suffix_like_labels_stay_distinct() {
        let plain = SampleKey::new("seg-1/A", Platform::B);
        let other = SampleKey::new("seg-1", Platform::A);
        assert_ne!(plain, other);
        assert_eq!(plain.to_string(), "seg-1/A/B");
    }
}
