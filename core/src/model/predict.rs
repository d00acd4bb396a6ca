use crate::model::fit::FittedModel;
use crate::prelude::{DsmError, DsmResult, Platform};
use crate::processing::surface::{CellSurface, CellValue};
use crate::survey::{density, AreaUnit, PredictionGrid};
use ndarray::{Array1, Array2, ArrayView1};

/// Linear-predictor matrix for every grid cell on `platform`.
///
/// Columns beyond the model's own coefficients (propagated detection terms)
/// are zero.
pub fn prediction_matrix(
    model: &FittedModel,
    grid: &PredictionGrid,
    platform: Option<Platform>,
) -> DsmResult<Array2<f64>> {
    let p = model.coefficients.len();
    let own = model.model_columns();
    let mut matrix = Array2::<f64>::zeros((grid.len(), p));
    for (row, cell) in grid.cells.iter().enumerate() {
        let values = model
            .spec
            .design_row(&model.basis, cell.x, cell.y, platform)?;
        if values.len() != own {
            return Err(DsmError::DimensionMismatch(format!(
                "prediction row has {} columns, model has {}",
                values.len(),
                own
            )));
        }
        for (col, value) in values.into_iter().enumerate() {
            matrix[[row, col]] = value;
        }
    }
    Ok(matrix)
}

/// `area · exp(Xp β)` for each cell.
pub fn abundance_from(
    matrix: &Array2<f64>,
    coefficients: ArrayView1<f64>,
    grid: &PredictionGrid,
) -> DsmResult<Array1<f64>> {
    if matrix.ncols() != coefficients.len() || matrix.nrows() != grid.len() {
        return Err(DsmError::DimensionMismatch(format!(
            "prediction matrix {}x{} vs {} coefficients and {} cells",
            matrix.nrows(),
            matrix.ncols(),
            coefficients.len(),
            grid.len()
        )));
    }
    let eta = matrix.dot(&coefficients);
    Ok(Array1::from_iter(
        eta.iter()
            .zip(&grid.cells)
            .map(|(e, cell)| cell.area * e.exp()),
    ))
}

/// Point predictions of abundance per cell, keyed by cell id.
pub fn predict_abundance(
    model: &FittedModel,
    grid: &PredictionGrid,
    platform: Option<Platform>,
) -> DsmResult<CellSurface> {
    let matrix = prediction_matrix(model, grid, platform)?;
    let abundance = abundance_from(&matrix, model.coefficients.view(), grid)?;
    Ok(CellSurface::new(
        grid.cells
            .iter()
            .zip(abundance.iter())
            .map(|(cell, &value)| CellValue {
                cell_id: cell.cell_id,
                value,
            })
            .collect(),
    ))
}

/// Converts an abundance surface to density in `unit`.
pub fn density_surface(
    abundance: &CellSurface,
    grid: &PredictionGrid,
    unit: AreaUnit,
) -> DsmResult<CellSurface> {
    let areas = grid
        .cells
        .iter()
        .map(|c| (c.cell_id, c.area))
        .collect::<std::collections::HashMap<_, _>>();
    let values = abundance
        .values
        .iter()
        .map(|cv| {
            let area = areas.get(&cv.cell_id).ok_or_else(|| {
                DsmError::DimensionMismatch(format!("cell {} is not in the grid", cv.cell_id))
            })?;
            Ok(CellValue {
                cell_id: cv.cell_id,
                value: density(cv.value, *area, unit),
            })
        })
        .collect::<DsmResult<Vec<_>>>()?;
    Ok(CellSurface::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{propagate_detection_variance, ModelSpec};
    use crate::test_support;
    use approx::assert_relative_eq;

    #[test]
    fn no_platform_model_predicts_the_same_surface_for_both_platforms() {
        let model = test_support::fitted(ModelSpec::NoPlatform);
        let grid = test_support::grid();
        let a = predict_abundance(&model, &grid, Some(Platform::A)).unwrap();
        let b = predict_abundance(&model, &grid, Some(Platform::B)).unwrap();
        assert_eq!(a, b);
        assert!(a.values.iter().all(|v| v.value > 0.0));
    }

    #[test]
    fn platform_models_need_a_platform_to_predict() {
        let model = test_support::fitted(ModelSpec::FactorSmooth);
        assert!(predict_abundance(&model, &test_support::grid(), None).is_err());
    }

    #[test]
    fn propagated_columns_are_zero_at_prediction() {
        let model = test_support::fitted(ModelSpec::PlatformFactor);
        let refit = propagate_detection_variance(
            &model,
            &test_support::detection(),
            &test_support::options(),
        )
        .unwrap();
        let matrix = prediction_matrix(&refit, &test_support::grid(), Some(Platform::A)).unwrap();
        assert_eq!(matrix.ncols(), refit.coefficients.len());
        assert!(matrix.column(matrix.ncols() - 1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn density_divides_by_area_in_square_kilometres() {
        let model = test_support::fitted(ModelSpec::NoPlatform);
        let grid = test_support::grid();
        let abundance = predict_abundance(&model, &grid, Some(Platform::A)).unwrap();
        let density = density_surface(&abundance, &grid, AreaUnit::SquareKilometres).unwrap();
        for (n, d) in abundance.values.iter().zip(&density.values) {
            assert_relative_eq!(d.value, n.value / 16.0, max_relative = 1e-12);
        }
    }

    #[test]
    fn mismatched_coefficients_are_rejected() {
        let grid = test_support::grid();
        let matrix = Array2::<f64>::zeros((grid.len(), 3));
        let coefficients = Array1::<f64>::zeros(4);
        assert!(matches!(
            abundance_from(&matrix, coefficients.view(), &grid),
            Err(DsmError::DimensionMismatch(_))
        ));
    }
}
