use crate::prelude::{DsmError, DsmResult};
use crate::survey::grid::{GridCell, GridGeometryFile, PredictionGrid};
use crate::survey::observation::Observation;
use crate::survey::segment::Segment;
use crate::survey::track::SurveyTrack;
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub const SEGMENTS_FILE: &str = "segments.csv";
pub const OBSERVATIONS_FILE: &str = "observations.csv";
pub const GRID_FILE: &str = "grid.csv";
pub const GRID_GEOMETRY_FILE: &str = "grid_geometry.json";
pub const TRACK_FILE: &str = "track.json";

/// Tables for one survey: segments, sightings, prediction grid and optional track.
#[derive(Debug, Clone)]
pub struct SurveyBundle {
    pub segments: Vec<Segment>,
    pub observations: Vec<Observation>,
    pub grid: PredictionGrid,
    pub track: Option<SurveyTrack>,
}

fn read_table<T: DeserializeOwned>(path: &Path) -> DsmResult<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> DsmResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

impl SurveyBundle {
    pub fn new(
        segments: Vec<Segment>,
        observations: Vec<Observation>,
        grid: PredictionGrid,
        track: Option<SurveyTrack>,
    ) -> DsmResult<Self> {
        let mut labels = HashSet::new();
        for segment in &segments {
            if !labels.insert(segment.sample_label.as_str()) {
                return Err(DsmError::DuplicateSampleLabel(segment.sample_label.clone()));
            }
            if !(segment.effort > 0.0) {
                return Err(DsmError::InvalidInput(format!(
                    "segment {} has non-positive effort",
                    segment.sample_label
                )));
            }
        }
        Ok(Self {
            segments,
            observations,
            grid,
            track,
        })
    }

    pub fn load<P: AsRef<Path>>(dir: P) -> DsmResult<Self> {
        let dir = dir.as_ref();
        let segments: Vec<Segment> = read_table(&dir.join(SEGMENTS_FILE))?;
        let observations: Vec<Observation> = read_table(&dir.join(OBSERVATIONS_FILE))?;
        let cells: Vec<GridCell> = read_table(&dir.join(GRID_FILE))?;
        let mut grid = PredictionGrid::new(cells)?;

        let geometry_path = dir.join(GRID_GEOMETRY_FILE);
        if geometry_path.exists() {
            let file: GridGeometryFile =
                serde_json::from_str(&fs::read_to_string(&geometry_path)?)?;
            grid = grid.with_geometry(&file)?;
        } else if let Some(cell) = grid.cells.iter().find(|c| !(c.area > 0.0)) {
            return Err(DsmError::InvalidInput(format!(
                "cell {} has no area and {} is missing",
                cell.cell_id, GRID_GEOMETRY_FILE
            )));
        }

        let track_path = dir.join(TRACK_FILE);
        let track = if track_path.exists() {
            Some(serde_json::from_str(&fs::read_to_string(&track_path)?)?)
        } else {
            None
        };

        info!(
            "loaded bundle {}: {} segments, {} observations, {} grid cells",
            dir.display(),
            segments.len(),
            observations.len(),
            grid.len()
        );
        Self::new(segments, observations, grid, track)
    }

    /// Writes the bundle layout read by [`SurveyBundle::load`].
    pub fn write<P: AsRef<Path>>(
        &self,
        dir: P,
        geometry: Option<&GridGeometryFile>,
    ) -> DsmResult<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        write_table(&dir.join(SEGMENTS_FILE), &self.segments)?;
        write_table(&dir.join(OBSERVATIONS_FILE), &self.observations)?;
        write_table(&dir.join(GRID_FILE), &self.grid.cells)?;
        if let Some(geometry) = geometry {
            fs::write(dir.join(GRID_GEOMETRY_FILE), serde_json::to_string(geometry)?)?;
        }
        if let Some(track) = &self.track {
            fs::write(dir.join(TRACK_FILE), serde_json::to_string(track)?)?;
        }
        Ok(())
    }
}
