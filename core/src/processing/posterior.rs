use crate::math::StatsHelper;
use crate::model::{prediction_matrix, CoefficientDraws, FittedModel};
use crate::prelude::{DsmError, DsmResult, Platform};
use crate::processing::cv_bins::CvBins;
use crate::processing::surface::{combine, CellSurface, CellValue, SurfaceOp, UncertaintyMethod};
use crate::survey::PredictionGrid;
use ndarray::{s, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

/// Rows of a draw matrix that belong to one platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubsetBlock {
    pub platform: Platform,
    pub rows: Range<usize>,
}

/// Abundance draws, one row per posterior sample and one column per cell,
/// stacked in per-platform blocks.
#[derive(Debug, Clone)]
pub struct PredictionDraws {
    pub cell_ids: Vec<u64>,
    pub values: Array2<f64>,
    pub blocks: Vec<SubsetBlock>,
}

impl PredictionDraws {
    pub fn new(
        cell_ids: Vec<u64>,
        values: Array2<f64>,
        blocks: Vec<SubsetBlock>,
    ) -> DsmResult<Self> {
        if values.ncols() != cell_ids.len() {
            return Err(DsmError::DimensionMismatch(format!(
                "{} draw columns for {} cells",
                values.ncols(),
                cell_ids.len()
            )));
        }
        let draws = Self {
            cell_ids,
            values,
            blocks,
        };
        for (i, block) in draws.blocks.iter().enumerate() {
            draws.check_range(&block.rows)?;
            for other in &draws.blocks[i + 1..] {
                if block.rows.start < other.rows.end && other.rows.start < block.rows.end {
                    return Err(DsmError::InvalidSubset(format!(
                        "rows {:?} ({}) overlap rows {:?} ({})",
                        block.rows, block.platform, other.rows, other.platform
                    )));
                }
                if block.platform == other.platform {
                    return Err(DsmError::InvalidSubset(format!(
                        "platform {} has two blocks",
                        block.platform
                    )));
                }
            }
        }
        Ok(draws)
    }

    /// Per-platform abundance draws `area · exp(Xp β_s)` for every coefficient draw.
    pub fn from_coefficients(
        model: &FittedModel,
        grid: &PredictionGrid,
        coefficients: &CoefficientDraws,
        platforms: &[Platform],
    ) -> DsmResult<Self> {
        let samples = coefficients.draws.nrows();
        let areas = ndarray::Array1::from_iter(grid.cells.iter().map(|c| c.area));
        let mut values = Array2::<f64>::zeros((samples * platforms.len(), grid.len()));
        let mut blocks = Vec::with_capacity(platforms.len());
        for (i, &platform) in platforms.iter().enumerate() {
            let matrix = prediction_matrix(model, grid, Some(platform))?;
            if matrix.ncols() != coefficients.draws.ncols() {
                return Err(DsmError::DimensionMismatch(format!(
                    "draws have {} coefficients, model has {}",
                    coefficients.draws.ncols(),
                    matrix.ncols()
                )));
            }
            let eta = coefficients.draws.dot(&matrix.t());
            let rows = i * samples..(i + 1) * samples;
            let mut block = values.slice_mut(s![rows.clone(), ..]);
            block.assign(&(eta.mapv(f64::exp) * &areas));
            blocks.push(SubsetBlock { platform, rows });
        }
        Self::new(grid.cells.iter().map(|c| c.cell_id).collect(), values, blocks)
    }

    fn check_range(&self, rows: &Range<usize>) -> DsmResult<()> {
        if rows.end > self.values.nrows() || rows.start >= rows.end {
            return Err(DsmError::InvalidSubset(format!(
                "rows {:?} do not fit a matrix of {} draws",
                rows,
                self.values.nrows()
            )));
        }
        if rows.len() < 2 {
            return Err(DsmError::InvalidSubset(format!(
                "rows {:?} hold fewer than two draws",
                rows
            )));
        }
        Ok(())
    }

    pub fn block(&self, platform: Platform) -> DsmResult<&SubsetBlock> {
        self.blocks
            .iter()
            .find(|b| b.platform == platform)
            .ok_or_else(|| DsmError::InvalidSubset(format!("no draws for platform {}", platform)))
    }

    /// Per-cell sample variance over `rows` only.
    pub fn subset_variance(&self, rows: Range<usize>) -> DsmResult<Vec<f64>> {
        self.check_range(&rows)?;
        let subset = self.values.slice(s![rows, ..]);
        Ok(subset
            .axis_iter(Axis(1))
            .map(|column| StatsHelper::sample_variance(&column.to_vec()))
            .collect())
    }

    pub fn platform_variance(&self, platform: Platform) -> DsmResult<CellSurface> {
        let rows = self.block(platform)?.rows.clone();
        Ok(self.surface(self.subset_variance(rows)?))
    }

    /// Variance of `A op B` computed draw by draw.
    pub fn drawwise_variance(&self, op: SurfaceOp) -> DsmResult<CellSurface> {
        let a = self.block(Platform::A)?.rows.clone();
        let b = self.block(Platform::B)?.rows.clone();
        if a.len() != b.len() {
            return Err(DsmError::InvalidSubset(format!(
                "platform blocks hold {} and {} draws",
                a.len(),
                b.len()
            )));
        }
        let lhs = self.values.slice(s![a, ..]);
        let rhs = self.values.slice(s![b, ..]);
        let paired = match op {
            SurfaceOp::Combined => &lhs + &rhs,
            SurfaceOp::Difference => &lhs - &rhs,
        };
        Ok(self.surface(
            paired
                .axis_iter(Axis(1))
                .map(|column| StatsHelper::sample_variance(&column.to_vec()))
                .collect(),
        ))
    }

    fn surface(&self, values: Vec<f64>) -> CellSurface {
        CellSurface::new(
            self.cell_ids
                .iter()
                .zip(values)
                .map(|(&cell_id, value)| CellValue { cell_id, value })
                .collect(),
        )
    }
}

// JSON has no infinities; a zero estimate gives a non-finite CV.
mod non_finite_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// Estimate, spread and binned CV for one cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UncertaintyCell {
    pub cell_id: u64,
    pub estimate: f64,
    pub std_dev: f64,
    #[serde(with = "non_finite_as_null")]
    pub cv: f64,
    pub cv_bin: Option<usize>,
}

/// Joins estimates and standard deviations by cell id and bins `sd / estimate`.
pub fn uncertainty_cells(
    estimate: &CellSurface,
    std_dev: &CellSurface,
    bins: &CvBins,
) -> DsmResult<Vec<UncertaintyCell>> {
    let spread: HashMap<u64, f64> = std_dev.values.iter().map(|v| (v.cell_id, v.value)).collect();
    if spread.len() != estimate.len() {
        return Err(DsmError::DimensionMismatch(format!(
            "{} estimates vs {} standard deviations",
            estimate.len(),
            spread.len()
        )));
    }
    estimate
        .values
        .iter()
        .map(|cell| {
            let sd = *spread.get(&cell.cell_id).ok_or_else(|| {
                DsmError::DimensionMismatch(format!(
                    "cell {} has no standard deviation",
                    cell.cell_id
                ))
            })?;
            let cv = StatsHelper::cv(sd, cell.value);
            Ok(UncertaintyCell {
                cell_id: cell.cell_id,
                estimate: cell.value,
                std_dev: sd,
                cv,
                cv_bin: bins.classify(cv),
            })
        })
        .collect()
}

/// Uncertainty maps for both platforms and their combined and difference surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintySurfaces {
    pub method: UncertaintyMethod,
    pub platform_a: Vec<UncertaintyCell>,
    pub platform_b: Vec<UncertaintyCell>,
    pub combined: Vec<UncertaintyCell>,
    pub difference: Vec<UncertaintyCell>,
}

pub fn summarise_uncertainty(
    draws: &PredictionDraws,
    estimate_a: &CellSurface,
    estimate_b: &CellSurface,
    method: UncertaintyMethod,
    bins: &CvBins,
) -> DsmResult<UncertaintySurfaces> {
    let sd_a = draws.platform_variance(Platform::A)?.map(f64::sqrt);
    let sd_b = draws.platform_variance(Platform::B)?.map(f64::sqrt);
    let combined_estimate = combine(estimate_a, estimate_b, SurfaceOp::Combined)?;
    let difference_estimate = combine(estimate_a, estimate_b, SurfaceOp::Difference)?;

    let (combined_sd, difference_sd) = match method {
        UncertaintyMethod::StdDevArithmetic => (
            combine(&sd_a, &sd_b, SurfaceOp::Combined)?,
            combine(&sd_a, &sd_b, SurfaceOp::Difference)?,
        ),
        UncertaintyMethod::DrawwisePropagation => (
            draws.drawwise_variance(SurfaceOp::Combined)?.map(f64::sqrt),
            draws.drawwise_variance(SurfaceOp::Difference)?.map(f64::sqrt),
        ),
    };

    Ok(UncertaintySurfaces {
        method,
        platform_a: uncertainty_cells(estimate_a, &sd_a, bins)?,
        platform_b: uncertainty_cells(estimate_b, &sd_b, bins)?,
        combined: uncertainty_cells(&combined_estimate, &combined_sd, bins)?,
        difference: uncertainty_cells(&difference_estimate, &difference_sd, bins)?,
    })
}
