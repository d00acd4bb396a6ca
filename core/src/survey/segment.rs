use crate::prelude::SampleKey;
use serde::{Deserialize, Serialize};

/// Transect sub-unit as recorded by the survey.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub sample_label: String,
    pub transect_label: String,
    /// Effort length in metres.
    pub effort: f64,
    pub x: f64,
    pub y: f64,
}

/// Segment copy attached to one platform and its detection function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformSegment {
    pub key: SampleKey,
    pub transect_label: String,
    pub effort: f64,
    pub x: f64,
    pub y: f64,
    pub ddf_index: u8,
}
