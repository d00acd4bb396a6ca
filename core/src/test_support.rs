use crate::detection::{
    DetectionFunction, DetectionFunctionSet, DummyDetection, FittedDetection, KeyFunction,
};
use crate::model::{
    Family, FitOptions, FittedModel, LambdaChoice, ModelData, ModelSpec, PenalizedIrls,
    SpatialBasis, SpatialModelFitter,
};
use crate::prelude::Platform;
use crate::processing::reshape::{duplicate_by_platform, ReshapedSurvey};
use crate::survey::{GridCell, Observation, PredictionGrid, Segment};
use ndarray::array;

pub fn segments() -> Vec<Segment> {
    let mut out = Vec::new();
    for i in 0..8 {
        for j in 0..8 {
            out.push(Segment {
                sample_label: format!("t{}-{}", i, j),
                transect_label: format!("t{}", i),
                effort: 2000.0,
                x: 1000.0 + 2500.0 * i as f64,
                y: 1000.0 + 2500.0 * j as f64,
            });
        }
    }
    out
}

/// Sightings whose counts rise towards the east; platform B sees about half as many.
pub fn observations(segments: &[Segment]) -> Vec<Observation> {
    let mut out = Vec::new();
    let mut object = 0;
    for (k, segment) in segments.iter().enumerate() {
        let east = (segment.x / 20_000.0 * 4.0) as usize;
        let count_a = (east + k % 2) % 5;
        let count_b = (east / 2 + k % 3) % 3;
        for n in 0..count_a {
            object += 1;
            out.push(Observation {
                object,
                sample_label: segment.sample_label.clone(),
                size: 1.0 + (n % 2) as f64,
                distance: Some(10.0 + 23.0 * ((k + n) % 8) as f64),
                distbegin: None,
                distend: None,
                platform: Platform::A,
            });
        }
        for _ in 0..count_b {
            object += 1;
            out.push(Observation {
                object,
                sample_label: segment.sample_label.clone(),
                size: 1.0,
                distance: None,
                distbegin: None,
                distend: None,
                platform: Platform::B,
            });
        }
    }
    out
}

pub fn reshaped() -> ReshapedSurvey {
    let segments = segments();
    let observations = observations(&segments);
    duplicate_by_platform(&segments, &observations).unwrap()
}

pub fn detection() -> DetectionFunctionSet {
    let mut set = DetectionFunctionSet::new();
    set.insert(
        1,
        DetectionFunction::Fitted(FittedDetection {
            key: KeyFunction::HalfNormal,
            width: 200.0,
            params: vec![80.0f64.ln()],
            covariance: array![[0.004]],
            log_likelihood: -500.0,
            n_observations: 100,
        }),
    );
    set.insert(2, DetectionFunction::Dummy(DummyDetection { width: 100.0 }));
    set
}

pub fn basis() -> SpatialBasis {
    let segments = segments();
    SpatialBasis::covering(segments.iter().map(|s| (s.x, s.y)), 5).unwrap()
}

pub fn options() -> FitOptions {
    FitOptions {
        family: Family::Poisson,
        lambda: LambdaChoice::Fixed(1.0),
        ..FitOptions::default()
    }
}

pub fn fitted(spec: ModelSpec) -> FittedModel {
    let basis = basis();
    let data = ModelData::build(spec, &basis, &reshaped(), &detection()).unwrap();
    PenalizedIrls::new(options()).fit(spec, &basis, data, 0).unwrap()
}

pub fn grid() -> PredictionGrid {
    let mut cells = Vec::new();
    let mut id = 0;
    for i in 0..5 {
        for j in 0..5 {
            id += 1;
            cells.push(GridCell {
                cell_id: id,
                x: 2000.0 + 4000.0 * i as f64,
                y: 2000.0 + 4000.0 * j as f64,
                area: 1.6e7,
            });
        }
    }
    PredictionGrid::new(cells).unwrap()
}
