use crate::prelude::{DsmError, DsmResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

const DEGREE: usize = 3;

/// Cubic B-spline basis on equally spaced knots with a second-order difference penalty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BSplineAxis {
    pub lower: f64,
    pub upper: f64,
    pub size: usize,
    knots: Vec<f64>,
}

impl BSplineAxis {
    pub fn new(lower: f64, upper: f64, size: usize) -> DsmResult<Self> {
        if size < DEGREE + 1 {
            return Err(DsmError::InvalidInput(format!(
                "basis size must be at least {}, got {}",
                DEGREE + 1,
                size
            )));
        }
        if !(upper > lower) {
            return Err(DsmError::InvalidInput(format!(
                "degenerate basis range [{}, {}]",
                lower, upper
            )));
        }
        let segments = size - DEGREE;
        let step = (upper - lower) / segments as f64;
        let knots = (0..size + DEGREE + 1)
            .map(|j| lower + (j as f64 - DEGREE as f64) * step)
            .collect();
        Ok(Self {
            lower,
            upper,
            size,
            knots,
        })
    }

    /// Basis values at `x`; points outside the range are clamped to it.
    pub fn evaluate(&self, x: f64) -> Vec<f64> {
        let span = self.upper - self.lower;
        let x = x.clamp(self.lower, self.upper - 1e-12 * span);
        let t = &self.knots;
        let mut values: Vec<f64> = (0..t.len() - 1)
            .map(|j| if t[j] <= x && x < t[j + 1] { 1.0 } else { 0.0 })
            .collect();
        for degree in 1..=DEGREE {
            let next: Vec<f64> = (0..t.len() - 1 - degree)
                .map(|j| {
                    let left = (x - t[j]) / (t[j + degree] - t[j]) * values[j];
                    let right =
                        (t[j + degree + 1] - x) / (t[j + degree + 1] - t[j + 1]) * values[j + 1];
                    left + right
                })
                .collect();
            values = next;
        }
        values
    }

    /// `DᵀD` for the second-order difference matrix `D`.
    pub fn difference_penalty(&self) -> Array2<f64> {
        let k = self.size;
        let mut d = Array2::<f64>::zeros((k - 2, k));
        for i in 0..k - 2 {
            d[[i, i]] = 1.0;
            d[[i, i + 1]] = -2.0;
            d[[i, i + 2]] = 1.0;
        }
        d.t().dot(&d)
    }
}

/// Tensor-product smooth `s(x, y)`; the basis sums to one, so it also carries the intercept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpatialBasis {
    pub x_axis: BSplineAxis,
    pub y_axis: BSplineAxis,
}

impl SpatialBasis {
    pub fn new(x_axis: BSplineAxis, y_axis: BSplineAxis) -> Self {
        Self { x_axis, y_axis }
    }

    /// Basis spanning the bounding box of `points`, padded by 1% per side.
    pub fn covering<I>(points: I, size: usize) -> DsmResult<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let (mut x0, mut x1, mut y0, mut y1) = (
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
        );
        for (x, y) in points {
            x0 = x0.min(x);
            x1 = x1.max(x);
            y0 = y0.min(y);
            y1 = y1.max(y);
        }
        if !x0.is_finite() || !y0.is_finite() {
            return Err(DsmError::InvalidInput("no coordinates to span".into()));
        }
        let pad = |lo: f64, hi: f64| {
            let width = (hi - lo).max(1.0);
            (lo - 0.01 * width, hi + 0.01 * width)
        };
        let (x0, x1) = pad(x0, x1);
        let (y0, y1) = pad(y0, y1);
        Ok(Self::new(
            BSplineAxis::new(x0, x1, size)?,
            BSplineAxis::new(y0, y1, size)?,
        ))
    }

    pub fn dimension(&self) -> usize {
        self.x_axis.size * self.y_axis.size
    }

    pub fn evaluate(&self, x: f64, y: f64) -> Vec<f64> {
        let bx = self.x_axis.evaluate(x);
        let by = self.y_axis.evaluate(y);
        let mut out = Vec::with_capacity(self.dimension());
        for vx in &bx {
            for vy in &by {
                out.push(vx * vy);
            }
        }
        out
    }

    /// `Px ⊗ I + I ⊗ Py`.
    pub fn penalty(&self) -> Array2<f64> {
        let kx = self.x_axis.size;
        let ky = self.y_axis.size;
        let px = self.x_axis.difference_penalty();
        let py = self.y_axis.difference_penalty();
        let mut out = Array2::<f64>::zeros((kx * ky, kx * ky));
        for i in 0..kx {
            for a in 0..kx {
                if px[[i, a]] == 0.0 {
                    continue;
                }
                for j in 0..ky {
                    out[[i * ky + j, a * ky + j]] += px[[i, a]];
                }
            }
        }
        for i in 0..kx {
            for j in 0..ky {
                for b in 0..ky {
                    out[[i * ky + j, i * ky + b]] += py[[j, b]];
                }
            }
        }
        out
    }
}
