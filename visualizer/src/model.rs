use anyhow::Context;
use dsmcore::detection::DetectionSummary;
use dsmcore::model::ModelSpec;
use dsmcore::processing::{
    CellSurface, CountComparison, UncertaintyCell, UncertaintyMethod, UncertaintySurfaces,
};
use dsmcore::survey::{AreaUnit, PredictionGrid, SurveyTrack};
use dsmcore::Platform;
use geo::{BoundingRect, Intersects, LineString, Polygon, Rect};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const RESULTS_FILE: &str = "results.json";

/// Grid cell as drawn on a map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportCell {
    pub cell_id: u64,
    pub x: f64,
    pub y: f64,
    pub area: f64,
    pub exterior: Vec<[f64; 2]>,
}

impl ReportCell {
    /// Cells of `grid`, using stored polygons or squares of the cell's area
    /// centred on the centroid.
    pub fn from_grid(grid: &PredictionGrid) -> Vec<ReportCell> {
        grid.cells
            .iter()
            .map(|cell| {
                let exterior = match grid.polygon(cell.cell_id) {
                    Some(polygon) => polygon.exterior().points().map(|p| [p.x(), p.y()]).collect(),
                    None => {
                        let half = 0.5 * cell.area.sqrt();
                        vec![
                            [cell.x - half, cell.y - half],
                            [cell.x + half, cell.y - half],
                            [cell.x + half, cell.y + half],
                            [cell.x - half, cell.y + half],
                            [cell.x - half, cell.y - half],
                        ]
                    }
                };
                ReportCell {
                    cell_id: cell.cell_id,
                    x: cell.x,
                    y: cell.y,
                    area: cell.area,
                    exterior,
                }
            })
            .collect()
    }

    pub fn polygon(&self) -> Polygon<f64> {
        let ring: Vec<(f64, f64)> = self.exterior.iter().map(|p| (p[0], p[1])).collect();
        Polygon::new(LineString::from(ring), vec![])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformReport {
    pub platform: Platform,
    pub total: f64,
    pub abundance: CellSurface,
    pub density: CellSurface,
}

/// Per-cell CV map for one surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintyLayer {
    pub name: String,
    pub method: Option<UncertaintyMethod>,
    pub cells: Vec<UncertaintyCell>,
}

impl UncertaintyLayer {
    pub fn from_surfaces(surfaces: UncertaintySurfaces) -> Vec<UncertaintyLayer> {
        let method = surfaces.method;
        vec![
            UncertaintyLayer {
                name: Platform::A.to_string(),
                method: None,
                cells: surfaces.platform_a,
            },
            UncertaintyLayer {
                name: Platform::B.to_string(),
                method: None,
                cells: surfaces.platform_b,
            },
            UncertaintyLayer {
                name: "combined".into(),
                method: Some(method),
                cells: surfaces.combined,
            },
            UncertaintyLayer {
                name: "difference".into(),
                method: Some(method),
                cells: surfaces.difference,
            },
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub label: String,
    pub spec: ModelSpec,
    pub varprop: bool,
    pub lambda: f64,
    pub edf: f64,
    pub deviance: f64,
    pub scale: f64,
    pub platforms: Vec<PlatformReport>,
    pub combined: Option<CellSurface>,
    pub difference: Option<CellSurface>,
    pub acceptance_rate: Option<f64>,
    #[serde(default)]
    pub uncertainty: Vec<UncertaintyLayer>,
}

impl ModelReport {
    /// Label safe to use in a file name.
    pub fn file_stem(&self) -> String {
        self.label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect()
    }
}

/// Everything the figures need, written by the workflow driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsReport {
    pub area_unit: AreaUnit,
    pub cv_labels: Vec<String>,
    pub detection: Vec<DetectionSummary>,
    pub summary: Vec<CountComparison>,
    pub cells: Vec<ReportCell>,
    pub track: Option<SurveyTrack>,
    pub models: Vec<ModelReport>,
}

impl ResultsReport {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading results {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing results {}", path.display()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self).context("serialising results")?;
        fs::write(path, contents).with_context(|| format!("writing results {}", path.display()))
    }

    /// Cells touching `bounds`, or all cells when no crop is given.
    pub fn visible_cells(&self, bounds: Option<Rect<f64>>) -> Vec<&ReportCell> {
        match bounds {
            None => self.cells.iter().collect(),
            Some(bounds) => self
                .cells
                .iter()
                .filter(|cell| cell.polygon().intersects(&bounds))
                .collect(),
        }
    }

    pub fn extent(cells: &[&ReportCell]) -> Option<Rect<f64>> {
        cells
            .iter()
            .filter_map(|cell| cell.polygon().bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                    (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
                )
            })
    }
}
