use crate::prelude::{DsmError, DsmResult};
use geo::{Area, LineString, Polygon};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Prediction cell with its centroid and area in square metres.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridCell {
    pub cell_id: u64,
    pub x: f64,
    pub y: f64,
    /// Zero or empty means "take it from the cell polygon".
    #[serde(default, deserialize_with = "empty_area_as_zero")]
    pub area: f64,
}

fn empty_area_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    SquareMetres,
    #[default]
    SquareKilometres,
}

impl AreaUnit {
    /// Converts an area in square metres into this unit.
    pub fn from_square_metres(self, area_m2: f64) -> f64 {
        match self {
            AreaUnit::SquareMetres => area_m2,
            AreaUnit::SquareKilometres => area_m2 / 1.0e6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AreaUnit::SquareMetres => "m^2",
            AreaUnit::SquareKilometres => "km^2",
        }
    }
}

/// Abundance per unit area for a cell whose area is given in square metres.
pub fn density(abundance: f64, area_m2: f64, unit: AreaUnit) -> f64 {
    abundance / unit.from_square_metres(area_m2)
}

/// Polygon ring stored in the geometry companion file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellGeometry {
    pub cell_id: u64,
    pub exterior: Vec<[f64; 2]>,
}

impl CellGeometry {
    pub fn to_polygon(&self) -> Polygon<f64> {
        let ring: Vec<(f64, f64)> = self.exterior.iter().map(|p| (p[0], p[1])).collect();
        Polygon::new(LineString::from(ring), vec![])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GridGeometryFile {
    pub cells: Vec<CellGeometry>,
}

#[derive(Debug, Clone, Default)]
pub struct PredictionGrid {
    pub cells: Vec<GridCell>,
    pub geometry: Option<BTreeMap<u64, Polygon<f64>>>,
}

impl PredictionGrid {
    pub fn new(cells: Vec<GridCell>) -> DsmResult<Self> {
        let mut seen = HashSet::new();
        for cell in &cells {
            if !seen.insert(cell.cell_id) {
                return Err(DsmError::InvalidInput(format!(
                    "duplicate grid cell id {}",
                    cell.cell_id
                )));
            }
        }
        Ok(Self {
            cells,
            geometry: None,
        })
    }

    /// Attaches polygons and fills non-positive areas from them.
    pub fn with_geometry(mut self, file: &GridGeometryFile) -> DsmResult<Self> {
        let polygons: BTreeMap<u64, Polygon<f64>> = file
            .cells
            .iter()
            .map(|g| (g.cell_id, g.to_polygon()))
            .collect();
        for cell in &mut self.cells {
            if cell.area <= 0.0 || !cell.area.is_finite() {
                let polygon = polygons.get(&cell.cell_id).ok_or_else(|| {
                    DsmError::InvalidInput(format!(
                        "cell {} has no area and no geometry",
                        cell.cell_id
                    ))
                })?;
                cell.area = polygon.unsigned_area();
            }
        }
        self.geometry = Some(polygons);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn polygon(&self, cell_id: u64) -> Option<&Polygon<f64>> {
        self.geometry.as_ref().and_then(|g| g.get(&cell_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(cell_id: u64, x0: f64, y0: f64, side: f64) -> CellGeometry {
        CellGeometry {
            cell_id,
            exterior: vec![
                [x0, y0],
                [x0 + side, y0],
                [x0 + side, y0 + side],
                [x0, y0 + side],
                [x0, y0],
            ],
        }
    }

    #[test]
    fn million_square_metres_is_one_square_kilometre() {
        assert_relative_eq!(AreaUnit::SquareKilometres.from_square_metres(1.0e6), 1.0);
        assert_relative_eq!(density(250.0, 1.0e6, AreaUnit::SquareKilometres), 250.0);
        assert_relative_eq!(density(250.0, 1.0e6, AreaUnit::SquareMetres), 2.5e-4);
    }

    #[test]
    fn missing_area_is_filled_from_geometry() {
        let grid = PredictionGrid::new(vec![GridCell {
            cell_id: 7,
            x: 500.0,
            y: 500.0,
            area: 0.0,
        }])
        .unwrap();
        let file = GridGeometryFile {
            cells: vec![square(7, 0.0, 0.0, 1000.0)],
        };
        let grid = grid.with_geometry(&file).unwrap();
        assert_relative_eq!(grid.cells[0].area, 1.0e6);
    }

    #[test]
    fn duplicate_cell_ids_are_rejected() {
        let cell = GridCell {
            cell_id: 1,
            x: 0.0,
            y: 0.0,
            area: 1.0,
        };
        assert!(PredictionGrid::new(vec![cell.clone(), cell]).is_err());
    }
}
