use crate::prelude::{DsmError, DsmResult};
use nalgebra::{Cholesky, DMatrix, DVector};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

pub struct MatrixHelper;

impl MatrixHelper {
    pub fn multiply(lhs: ArrayView2<f64>, rhs: ArrayView2<f64>) -> Array2<f64> {
        lhs.dot(&rhs)
    }

    fn to_dense(matrix: ArrayView2<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(matrix.nrows(), matrix.ncols(), |i, j| matrix[[i, j]])
    }

    fn from_dense(matrix: &DMatrix<f64>) -> Array2<f64> {
        Array2::from_shape_fn((matrix.nrows(), matrix.ncols()), |(i, j)| matrix[(i, j)])
    }

    fn cholesky(matrix: ArrayView2<f64>) -> DsmResult<Cholesky<f64, nalgebra::Dyn>> {
        if matrix.nrows() != matrix.ncols() {
            return Err(DsmError::DimensionMismatch(format!(
                "expected a square matrix, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        Cholesky::new(Self::to_dense(matrix))
            .ok_or_else(|| DsmError::Numerical("matrix is not positive definite".into()))
    }

    /// Lower-triangular factor `L` with `L Lᵀ = matrix`.
    pub fn cholesky_lower(matrix: ArrayView2<f64>) -> DsmResult<Array2<f64>> {
        let chol = Self::cholesky(matrix)?;
        Ok(Self::from_dense(&chol.l()))
    }

    pub fn solve_spd(matrix: ArrayView2<f64>, rhs: ArrayView1<f64>) -> DsmResult<Array1<f64>> {
        if rhs.len() != matrix.nrows() {
            return Err(DsmError::DimensionMismatch(format!(
                "right-hand side has {} rows, matrix has {}",
                rhs.len(),
                matrix.nrows()
            )));
        }
        let chol = Self::cholesky(matrix)?;
        let b = DVector::from_iterator(rhs.len(), rhs.iter().copied());
        let x = chol.solve(&b);
        Ok(Array1::from_iter(x.iter().copied()))
    }

    pub fn invert_spd(matrix: ArrayView2<f64>) -> DsmResult<Array2<f64>> {
        let chol = Self::cholesky(matrix)?;
        Ok(Self::symmetrize(Self::from_dense(&chol.inverse())))
    }

    pub fn symmetrize(mut matrix: Array2<f64>) -> Array2<f64> {
        let n = matrix.nrows().min(matrix.ncols());
        for i in 0..n {
            for j in (i + 1)..n {
                let avg = 0.5 * (matrix[[i, j]] + matrix[[j, i]]);
                matrix[[i, j]] = avg;
                matrix[[j, i]] = avg;
            }
        }
        matrix
    }

    /// Copies `block` into `target` with its top-left corner at `(offset, offset)`.
    pub fn embed_block(target: &mut Array2<f64>, block: ArrayView2<f64>, offset: usize) {
        let rows = block.nrows();
        let cols = block.ncols();
        target
            .slice_mut(s![offset..offset + rows, offset..offset + cols])
            .assign(&block);
    }

    /// `Xᵀ diag(w) X`.
    pub fn weighted_cross_product(x: ArrayView2<f64>, weights: ArrayView1<f64>) -> Array2<f64> {
        let mut weighted = x.to_owned();
        for (mut row, &w) in weighted.rows_mut().into_iter().zip(weights.iter()) {
            row *= w;
        }
        x.t().dot(&weighted)
    }

    /// Trace of `A B` without forming the product.
    pub fn trace_of_product(a: ArrayView2<f64>, b: ArrayView2<f64>) -> f64 {
        let mut total = 0.0;
        for i in 0..a.nrows() {
            for k in 0..a.ncols() {
                total += a[[i, k]] * b[[k, i]];
            }
        }
        total
    }
}
