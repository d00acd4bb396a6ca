use crate::detection::DetectionFunctionSet;
use crate::model::basis::SpatialBasis;
use crate::model::formula::ModelSpec;
use crate::prelude::{DsmError, DsmResult, SampleKey};
use crate::processing::reshape::ReshapedSurvey;
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// Segment-level training table for a spatial model.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub keys: Vec<SampleKey>,
    pub ddf_index: Vec<u8>,
    pub design: Array2<f64>,
    /// Summed group size of retained sightings.
    pub response: Array1<f64>,
    /// `log(2 · w · effort · p)`.
    pub log_offset: Array1<f64>,
    /// Penalty scaled by the smoothing parameter.
    pub smooth_penalty: Array2<f64>,
    /// Penalty added as-is (variance propagation blocks).
    pub fixed_penalty: Option<Array2<f64>>,
}

impl ModelData {
    pub fn build(
        spec: ModelSpec,
        basis: &SpatialBasis,
        survey: &ReshapedSurvey,
        detection: &DetectionFunctionSet,
    ) -> DsmResult<Self> {
        let index = survey.segment_index()?;
        let mut response = Array1::<f64>::zeros(survey.segments.len());
        for obs in &survey.observations {
            let row = *index.get(&obs.key).ok_or_else(|| DsmError::UnmatchedObservation {
                object: obs.object,
                key: obs.key.to_string(),
            })?;
            let function = detection.get(obs.ddf_index)?;
            if function.retains(obs.distance.as_ref()) {
                response[row] += obs.size;
            }
        }

        let n = survey.segments.len();
        let p = spec.coefficient_count(basis);
        let mut design = Array2::<f64>::zeros((n, p));
        let mut log_offset = Array1::<f64>::zeros(n);
        let mut probabilities: HashMap<u8, (f64, f64)> = HashMap::new();
        for (row, segment) in survey.segments.iter().enumerate() {
            let values = spec.design_row(basis, segment.x, segment.y, Some(segment.key.platform))?;
            design.row_mut(row).assign(&Array1::from(values));
            let (width, prob) = match probabilities.get(&segment.ddf_index) {
                Some(v) => *v,
                None => {
                    let function = detection.get(segment.ddf_index)?;
                    let v = (function.width(), function.probability());
                    probabilities.insert(segment.ddf_index, v);
                    v
                }
            };
            let effective_area = 2.0 * width * segment.effort * prob;
            if !(effective_area > 0.0) {
                return Err(DsmError::InvalidInput(format!(
                    "segment {} has no effective area",
                    segment.key
                )));
            }
            log_offset[row] = effective_area.ln();
        }

        Ok(Self {
            keys: survey.segments.iter().map(|s| s.key.clone()).collect(),
            ddf_index: survey.segments.iter().map(|s| s.ddf_index).collect(),
            design,
            response,
            log_offset,
            smooth_penalty: spec.penalty(basis),
            fixed_penalty: None,
        })
    }

    pub fn rows(&self) -> usize {
        self.design.nrows()
    }

    pub fn columns(&self) -> usize {
        self.design.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{DetectionFunction, DummyDetection};
    use crate::prelude::Platform;
    use crate::processing::reshape::duplicate_by_platform;
    use crate::survey::{Observation, Segment};
    use approx::assert_relative_eq;

    #[test]
    fn response_and_offset_follow_platform_copies() {
        let segments = vec![
            Segment {
                sample_label: "s1".into(),
                transect_label: "t".into(),
                effort: 1000.0,
                x: 0.0,
                y: 0.0,
            },
            Segment {
                sample_label: "s2".into(),
                transect_label: "t".into(),
                effort: 1000.0,
                x: 100.0,
                y: 100.0,
            },
        ];
        let observations = vec![
            Observation {
                object: 1,
                sample_label: "s1".into(),
                size: 3.0,
                distance: Some(10.0),
                distbegin: None,
                distend: None,
                platform: Platform::B,
            },
            Observation {
                object: 2,
                sample_label: "s1".into(),
                size: 5.0,
                distance: Some(900.0),
                distbegin: None,
                distend: None,
                platform: Platform::B,
            },
        ];
        let survey = duplicate_by_platform(&segments, &observations).unwrap();
        let mut detection = DetectionFunctionSet::new();
        detection.insert(1, DetectionFunction::Dummy(DummyDetection { width: 200.0 }));
        detection.insert(2, DetectionFunction::Dummy(DummyDetection { width: 100.0 }));
        let basis = SpatialBasis::covering(vec![(0.0, 0.0), (100.0, 100.0)], 4).unwrap();

        let data =
            ModelData::build(ModelSpec::PlatformFactor, &basis, &survey, &detection).unwrap();
        assert_eq!(data.rows(), 4);
        assert_eq!(data.response.to_vec(), vec![0.0, 0.0, 3.0, 0.0]);
        assert_relative_eq!(data.log_offset[0], (2.0 * 200.0 * 500.0f64).ln());
        assert_relative_eq!(data.log_offset[2], (2.0 * 100.0 * 500.0f64).ln());
    }
}
