//! Derivative-free minimisation and finite-difference curvature, used by the
//! detection-function fitter.

use crate::prelude::{DsmError, DsmResult};
use ndarray::Array2;

#[derive(Debug, Clone)]
pub struct NelderMeadOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub initial_step: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            tolerance: 1e-10,
            initial_step: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
}

/// Nelder-Mead simplex search. Non-finite objective values are treated as +inf.
pub fn nelder_mead<F>(
    objective: F,
    start: &[f64],
    options: &NelderMeadOptions,
) -> DsmResult<Minimum>
where
    F: Fn(&[f64]) -> f64,
{
    let dim = start.len();
    if dim == 0 {
        return Err(DsmError::InvalidInput("nelder-mead needs at least one parameter".into()));
    }
    let eval = |p: &[f64]| {
        let v = objective(p);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(dim + 1);
    simplex.push(start.to_vec());
    for i in 0..dim {
        let mut vertex = start.to_vec();
        vertex[i] += options.initial_step;
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();
    if !values[0].is_finite() {
        return Err(DsmError::NonConvergence(
            "objective is not finite at the starting point".into(),
        ));
    }

    for iteration in 0..options.max_iterations {
        let mut order: Vec<usize> = (0..=dim).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let spread = (values[dim] - values[0]).abs();
        if spread <= options.tolerance * (values[0].abs() + options.tolerance) {
            return Ok(Minimum {
                point: simplex[0].clone(),
                value: values[0],
                iterations: iteration,
            });
        }

        let centroid: Vec<f64> = (0..dim)
            .map(|j| simplex[..dim].iter().map(|v| v[j]).sum::<f64>() / dim as f64)
            .collect();
        let towards = |coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[dim])
                .map(|(c, w)| c + coef * (w - c))
                .collect()
        };

        let reflected = towards(-1.0);
        let reflected_value = eval(&reflected);
        if reflected_value < values[0] {
            let expanded = towards(-2.0);
            let expanded_value = eval(&expanded);
            if expanded_value < reflected_value {
                simplex[dim] = expanded;
                values[dim] = expanded_value;
            } else {
                simplex[dim] = reflected;
                values[dim] = reflected_value;
            }
            continue;
        }
        if reflected_value < values[dim - 1] {
            simplex[dim] = reflected;
            values[dim] = reflected_value;
            continue;
        }

        let contracted = if reflected_value < values[dim] {
            towards(-0.5)
        } else {
            towards(0.5)
        };
        let contracted_value = eval(&contracted);
        if contracted_value < values[dim].min(reflected_value) {
            simplex[dim] = contracted;
            values[dim] = contracted_value;
            continue;
        }

        let best = simplex[0].clone();
        for i in 1..=dim {
            simplex[i] = best
                .iter()
                .zip(&simplex[i])
                .map(|(b, v)| b + 0.5 * (v - b))
                .collect();
            values[i] = eval(&simplex[i]);
        }
    }

    Err(DsmError::NonConvergence(format!(
        "nelder-mead exceeded {} iterations",
        options.max_iterations
    )))
}

/// Central finite-difference Hessian.
pub fn numerical_hessian<F>(objective: F, point: &[f64], step: f64) -> Array2<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let dim = point.len();
    let mut hessian = Array2::zeros((dim, dim));
    let shifted = |i: usize, di: f64, j: usize, dj: f64| {
        let mut p = point.to_vec();
        p[i] += di;
        p[j] += dj;
        objective(&p)
    };
    for i in 0..dim {
        for j in i..dim {
            let value = if i == j {
                let f0 = objective(point);
                (shifted(i, step, i, 0.0) - 2.0 * f0 + shifted(i, -step, i, 0.0)) / (step * step)
            } else {
                (shifted(i, step, j, step) - shifted(i, step, j, -step) - shifted(i, -step, j, step)
                    + shifted(i, -step, j, -step))
                    / (4.0 * step * step)
            };
            hessian[[i, j]] = value;
            hessian[[j, i]] = value;
        }
    }
    hessian
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn nelder_mead_finds_quadratic_minimum() {
        let objective = |p: &[f64]| (p[0] - 1.5).powi(2) + 2.0 * (p[1] + 0.5).powi(2);
        let result = nelder_mead(objective, &[0.0, 0.0], &NelderMeadOptions::default()).unwrap();
        assert_abs_diff_eq!(result.point[0], 1.5, epsilon = 1e-4);
        assert_abs_diff_eq!(result.point[1], -0.5, epsilon = 1e-4);
    }

    #[test]
    fn non_finite_start_is_reported() {
        let objective = |_: &[f64]| f64::NAN;
        assert!(matches!(
            nelder_mead(objective, &[0.0], &NelderMeadOptions::default()),
            Err(DsmError::NonConvergence(_))
        ));
    }

    #[test]
    fn hessian_of_quadratic_is_constant() {
        let objective = |p: &[f64]| 3.0 * p[0] * p[0] + p[0] * p[1] + 0.5 * p[1] * p[1];
        let h = numerical_hessian(objective, &[0.2, -0.4], 1e-3);
        assert_abs_diff_eq!(h[[0, 0]], 6.0, epsilon = 1e-5);
        assert_abs_diff_eq!(h[[0, 1]], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(h[[1, 1]], 1.0, epsilon = 1e-5);
    }
}
