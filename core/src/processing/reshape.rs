use crate::prelude::{DsmError, DsmResult, Platform, SampleKey};
use crate::survey::{Observation, PlatformObservation, PlatformSegment, Segment};
use crate::telemetry::StageLog;
use std::collections::{HashMap, HashSet};

/// Segment and observation tables after platform assignment.
#[derive(Debug, Clone, Default)]
pub struct ReshapedSurvey {
    pub segments: Vec<PlatformSegment>,
    pub observations: Vec<PlatformObservation>,
}

impl ReshapedSurvey {
    /// Row index of every segment key; fails on duplicate keys.
    pub fn segment_index(&self) -> DsmResult<HashMap<&SampleKey, usize>> {
        let mut index = HashMap::with_capacity(self.segments.len());
        for (row, segment) in self.segments.iter().enumerate() {
            if index.insert(&segment.key, row).is_some() {
                return Err(DsmError::DuplicateSampleLabel(segment.key.to_string()));
            }
        }
        Ok(index)
    }

    /// Every observation key must resolve to exactly one segment with the same index.
    pub fn validate(&self) -> DsmResult<()> {
        let index = self.segment_index()?;
        for obs in &self.observations {
            let row = index.get(&obs.key).ok_or_else(|| DsmError::UnmatchedObservation {
                object: obs.object,
                key: obs.key.to_string(),
            })?;
            if self.segments[*row].ddf_index != obs.ddf_index {
                return Err(DsmError::InvalidInput(format!(
                    "observation {} uses detection function {} but segment {} uses {}",
                    obs.object, obs.ddf_index, obs.key, self.segments[*row].ddf_index
                )));
            }
        }
        Ok(())
    }

    pub fn total_effort(&self) -> f64 {
        self.segments.iter().map(|s| s.effort).sum()
    }
}

fn check_unique_labels(segments: &[Segment]) -> DsmResult<HashSet<&str>> {
    let mut labels = HashSet::with_capacity(segments.len());
    for segment in segments {
        if !labels.insert(segment.sample_label.as_str()) {
            return Err(DsmError::DuplicateSampleLabel(segment.sample_label.clone()));
        }
    }
    Ok(labels)
}

fn relabel(
    observations: &[Observation],
    labels: &HashSet<&str>,
    platform_of: impl Fn(&Observation) -> Platform,
) -> DsmResult<Vec<PlatformObservation>> {
    observations
        .iter()
        .map(|obs| {
            let platform = platform_of(obs);
            let key = SampleKey::new(obs.sample_label.clone(), platform);
            if !labels.contains(obs.sample_label.as_str()) {
                return Err(DsmError::UnmatchedObservation {
                    object: obs.object,
                    key: key.to_string(),
                });
            }
            Ok(PlatformObservation {
                object: obs.object,
                key,
                size: obs.size,
                distance: obs.measured(),
                ddf_index: platform.ddf_index(),
            })
        })
        .collect()
}

/// Duplicates every segment once per platform.
///
/// Rows `0..N` are the platform A copies (detection function 1) and rows
/// `N..2N` the platform B copies (detection function 2). Effort is halved on
/// every copy because the source survey observed one side of the transect
/// only; this is independent of the duplication itself. Observations are
/// keyed on their own platform.
pub fn duplicate_by_platform(
    segments: &[Segment],
    observations: &[Observation],
) -> DsmResult<ReshapedSurvey> {
    let log = StageLog::new("reshape");
    let labels = check_unique_labels(segments)?;

    let platform_segments: Vec<PlatformSegment> = Platform::ALL
        .iter()
        .flat_map(|&platform| {
            segments.iter().map(move |s| PlatformSegment {
                key: SampleKey::new(s.sample_label.clone(), platform),
                transect_label: s.transect_label.clone(),
                effort: 0.5 * s.effort,
                x: s.x,
                y: s.y,
                ddf_index: platform.ddf_index(),
            })
        })
        .collect();

    let platform_observations = relabel(observations, &labels, |obs| obs.platform)?;
    let reshaped = ReshapedSurvey {
        segments: platform_segments,
        observations: platform_observations,
    };
    reshaped.validate()?;
    log.record(&format!(
        "{} segments -> {} platform segments, {} observations relabelled",
        segments.len(),
        reshaped.segments.len(),
        reshaped.observations.len()
    ));
    Ok(reshaped)
}

/// One-platform passthrough: every segment and sighting uses detection function 1.
pub fn single_platform(
    segments: &[Segment],
    observations: &[Observation],
) -> DsmResult<ReshapedSurvey> {
    let labels = check_unique_labels(segments)?;
    let platform_segments = segments
        .iter()
        .map(|s| PlatformSegment {
            key: SampleKey::new(s.sample_label.clone(), Platform::A),
            transect_label: s.transect_label.clone(),
            effort: s.effort,
            x: s.x,
            y: s.y,
            ddf_index: Platform::A.ddf_index(),
        })
        .collect();
    let reshaped = ReshapedSurvey {
        segments: platform_segments,
        observations: relabel(observations, &labels, |_| Platform::A)?,
    };
    reshaped.validate()?;
    Ok(reshaped)
}
