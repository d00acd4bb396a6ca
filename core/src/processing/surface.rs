use crate::prelude::{DsmError, DsmResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CellValue {
    pub cell_id: u64,
    pub value: f64,
}

/// Per-cell quantity keyed by cell id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CellSurface {
    pub values: Vec<CellValue>,
}

impl CellSurface {
    pub fn new(values: Vec<CellValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.values.iter().map(|v| v.value).sum()
    }

    pub fn get(&self, cell_id: u64) -> Option<f64> {
        self.values
            .iter()
            .find(|v| v.cell_id == cell_id)
            .map(|v| v.value)
    }

    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> CellSurface {
        CellSurface::new(
            self.values
                .iter()
                .map(|v| CellValue {
                    cell_id: v.cell_id,
                    value: f(v.value),
                })
                .collect(),
        )
    }

    fn index(&self) -> DsmResult<HashMap<u64, f64>> {
        let mut index = HashMap::with_capacity(self.values.len());
        for v in &self.values {
            if index.insert(v.cell_id, v.value).is_some() {
                return Err(DsmError::InvalidInput(format!(
                    "cell {} appears twice in a surface",
                    v.cell_id
                )));
            }
        }
        Ok(index)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceOp {
    /// `A + B`
    Combined,
    /// `A − B`
    Difference,
}

impl SurfaceOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            SurfaceOp::Combined => a + b,
            SurfaceOp::Difference => a - b,
        }
    }
}

/// How uncertainty is carried into combined and difference surfaces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyMethod {
    /// Standard deviations are added or subtracted like the estimates.
    #[default]
    StdDevArithmetic,
    /// Variance of the per-draw sums or differences.
    DrawwisePropagation,
}

/// Joins `a` and `b` on cell id and applies `op`; output follows `a`'s order.
pub fn combine(a: &CellSurface, b: &CellSurface, op: SurfaceOp) -> DsmResult<CellSurface> {
    if a.len() != b.len() {
        return Err(DsmError::DimensionMismatch(format!(
            "surfaces have {} and {} cells",
            a.len(),
            b.len()
        )));
    }
    a.index()?;
    let other = b.index()?;
    let values = a
        .values
        .iter()
        .map(|cell| {
            let rhs = other.get(&cell.cell_id).ok_or_else(|| {
                DsmError::DimensionMismatch(format!(
                    "cell {} is missing from the second surface",
                    cell.cell_id
                ))
            })?;
            Ok(CellValue {
                cell_id: cell.cell_id,
                value: op.apply(cell.value, *rhs),
            })
        })
        .collect::<DsmResult<Vec<_>>>()?;
    Ok(CellSurface::new(values))
}

pub fn combined_and_difference(
    a: &CellSurface,
    b: &CellSurface,
) -> DsmResult<(CellSurface, CellSurface)> {
    Ok((
        combine(a, b, SurfaceOp::Combined)?,
        combine(a, b, SurfaceOp::Difference)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(pairs: &[(u64, f64)]) -> CellSurface {
        CellSurface::new(
            pairs
                .iter()
                .map(|&(cell_id, value)| CellValue { cell_id, value })
                .collect(),
        )
    }

    #[test]
    fn combined_and_difference_are_cellwise() {
        let a = surface(&[(1, 10.0), (2, 4.0), (3, 0.5)]);
        let b = surface(&[(1, 3.0), (2, 6.0), (3, 0.5)]);
        let (combined, difference) = combined_and_difference(&a, &b).unwrap();
        for cell in &a.values {
            let av = cell.value;
            let bv = b.get(cell.cell_id).unwrap();
            assert_eq!(combined.get(cell.cell_id), Some(av + bv));
            assert_eq!(difference.get(cell.cell_id), Some(av - bv));
        }
    }

    #[test]
    fn reordered_second_surface_is_joined_by_id() {
        let a = surface(&[(1, 10.0), (2, 4.0), (3, 1.0)]);
        let b = surface(&[(3, 0.25), (1, 3.0), (2, 6.0)]);
        let difference = combine(&a, &b, SurfaceOp::Difference).unwrap();
        assert_eq!(
            difference,
            surface(&[(1, 7.0), (2, -2.0), (3, 0.75)])
        );
    }

    #[test]
    fn mismatched_cells_are_rejected() {
        let a = surface(&[(1, 1.0), (2, 1.0)]);
        let b = surface(&[(1, 1.0), (5, 1.0)]);
        assert!(matches!(
            combine(&a, &b, SurfaceOp::Combined),
            Err(DsmError::DimensionMismatch(_))
        ));
        let short = surface(&[(1, 1.0)]);
        assert!(combine(&a, &short, SurfaceOp::Combined).is_err());
    }

    #[test]
    fn duplicate_cells_are_rejected() {
        let a = surface(&[(1, 1.0), (1, 2.0)]);
        let b = surface(&[(1, 1.0), (2, 2.0)]);
        assert!(matches!(
            combine(&a, &b, SurfaceOp::Combined),
            Err(DsmError::InvalidInput(_))
        ));
    }
}
