use crate::math::MatrixHelper;
use crate::model::basis::SpatialBasis;
use crate::model::data::ModelData;
use crate::model::family::Family;
use crate::model::formula::ModelSpec;
use crate::prelude::{DsmError, DsmResult};
use log::{debug, info};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

const RIDGE: f64 = 1e-8;

/// How the smoothing parameter is chosen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LambdaChoice {
    /// Minimise UBRE (Poisson) or GCV (quasi-Poisson) over these values.
    Grid(Vec<f64>),
    Fixed(f64),
}

impl Default for LambdaChoice {
    fn default() -> Self {
        LambdaChoice::Grid((0..=16).map(|i| 10f64.powf(-4.0 + 0.5 * i as f64)).collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub family: Family,
    pub lambda: LambdaChoice,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            family: Family::default(),
            lambda: LambdaChoice::default(),
            max_iterations: 100,
            tolerance: 1e-8,
        }
    }
}

/// Fitted count surface.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub spec: ModelSpec,
    pub family: Family,
    pub basis: SpatialBasis,
    pub data: ModelData,
    pub coefficients: Array1<f64>,
    /// Bayesian posterior covariance `φ (XᵀWX + P)⁻¹`.
    pub covariance: Array2<f64>,
    /// Total penalty `λS` plus any fixed blocks.
    pub penalty: Array2<f64>,
    pub lambda: f64,
    pub edf: f64,
    pub deviance: f64,
    pub scale: f64,
    pub fitted: Array1<f64>,
    /// Columns appended after the model's own coefficients (zero at prediction).
    pub extra_columns: usize,
    pub score: f64,
}

impl FittedModel {
    pub fn model_columns(&self) -> usize {
        self.coefficients.len() - self.extra_columns
    }

    pub fn label(&self) -> String {
        if self.extra_columns > 0 {
            format!("{}+varprop", self.spec.name())
        } else {
            self.spec.name().to_string()
        }
    }
}

/// Fits a spatial count model to a training table.
pub trait SpatialModelFitter {
    fn fit(
        &self,
        spec: ModelSpec,
        basis: &SpatialBasis,
        data: ModelData,
        extra_columns: usize,
    ) -> DsmResult<FittedModel>;
}

/// Penalised iteratively re-weighted least squares.
#[derive(Debug, Clone, Default)]
pub struct PenalizedIrls {
    pub options: FitOptions,
}

struct IrlsSolution {
    coefficients: Array1<f64>,
    mu: Array1<f64>,
    hessian: Array2<f64>,
    information: Array2<f64>,
    penalty: Array2<f64>,
    deviance: f64,
}

impl PenalizedIrls {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    fn total_penalty(data: &ModelData, lambda: f64) -> Array2<f64> {
        let mut penalty = &data.smooth_penalty * lambda;
        if let Some(fixed) = &data.fixed_penalty {
            penalty = penalty + fixed;
        }
        for i in 0..penalty.nrows() {
            penalty[[i, i]] += RIDGE;
        }
        penalty
    }

    fn penalised_deviance(
        data: &ModelData,
        beta: &Array1<f64>,
        penalty: &Array2<f64>,
    ) -> (f64, Array1<f64>) {
        let eta = data.design.dot(beta) + &data.log_offset;
        let mu = eta.mapv(f64::exp);
        let deviance = Family::deviance(data.response.view(), mu.view());
        (deviance + beta.dot(&penalty.dot(beta)), mu)
    }

    fn solve_fixed_lambda(&self, data: &ModelData, lambda: f64) -> DsmResult<IrlsSolution> {
        let penalty = Self::total_penalty(data, lambda);
        let y = &data.response;
        let mut mu = y.mapv(|v| v + 0.1);
        let mut eta = mu.mapv(f64::ln);
        let mut beta = Array1::<f64>::zeros(data.columns());
        let mut previous = f64::INFINITY;

        for iteration in 0..self.options.max_iterations {
            let z = &eta - &data.log_offset + (y - &mu) / &mu;
            let information = MatrixHelper::weighted_cross_product(data.design.view(), mu.view());
            let hessian = &information + &penalty;
            let rhs = data.design.t().dot(&(&mu * &z));
            let proposal = MatrixHelper::solve_spd(hessian.view(), rhs.view())?;

            // Step halving keeps the penalised deviance from increasing.
            let mut step = proposal - &beta;
            let mut candidate = &beta + &step;
            let (mut objective, mut candidate_mu) =
                Self::penalised_deviance(data, &candidate, &penalty);
            let mut halvings = 0;
            while !(objective <= previous || previous.is_infinite()) && halvings < 20 {
                step *= 0.5;
                candidate = &beta + &step;
                let (o, m) = Self::penalised_deviance(data, &candidate, &penalty);
                objective = o;
                candidate_mu = m;
                halvings += 1;
            }
            if !objective.is_finite() {
                return Err(DsmError::NonConvergence(format!(
                    "penalised deviance is not finite at iteration {} (lambda {:.3e})",
                    iteration, lambda
                )));
            }

            beta = candidate;
            mu = candidate_mu;
            eta = data.design.dot(&beta) + &data.log_offset;
            let converged =
                (previous - objective).abs() <= self.options.tolerance * (objective.abs() + 0.1);
            previous = objective;
            if converged {
                let information =
                    MatrixHelper::weighted_cross_product(data.design.view(), mu.view());
                let hessian = &information + &penalty;
                let deviance = objective - beta.dot(&penalty.dot(&beta));
                return Ok(IrlsSolution {
                    coefficients: beta,
                    mu,
                    hessian,
                    information,
                    penalty,
                    deviance,
                });
            }
        }

        Err(DsmError::NonConvergence(format!(
            "P-IRLS did not converge in {} iterations (lambda {:.3e})",
            self.options.max_iterations, lambda
        )))
    }
}

impl SpatialModelFitter for PenalizedIrls {
    fn fit(
        &self,
        spec: ModelSpec,
        basis: &SpatialBasis,
        data: ModelData,
        extra_columns: usize,
    ) -> DsmResult<FittedModel> {
        let n = data.rows();
        if n == 0 {
            return Err(DsmError::InvalidInput("no segments to fit".into()));
        }
        if data.response.len() != n || data.log_offset.len() != n {
            return Err(DsmError::DimensionMismatch(format!(
                "design has {} rows, response {} and offset {}",
                n,
                data.response.len(),
                data.log_offset.len()
            )));
        }
        let candidates = match &self.options.lambda {
            LambdaChoice::Grid(values) if !values.is_empty() => values.clone(),
            LambdaChoice::Grid(_) => {
                return Err(DsmError::InvalidInput("empty smoothing parameter grid".into()))
            }
            LambdaChoice::Fixed(value) => vec![*value],
        };

        let family = self.options.family;
        let mut best: Option<(f64, f64, IrlsSolution, Array2<f64>, f64)> = None;
        for lambda in candidates {
            let solution = self.solve_fixed_lambda(&data, lambda)?;
            let inverse = MatrixHelper::invert_spd(solution.hessian.view())?;
            let edf = MatrixHelper::trace_of_product(inverse.view(), solution.information.view());
            let n_f = n as f64;
            let score = if family.estimates_scale() {
                n_f * solution.deviance / (n_f - edf).powi(2)
            } else {
                solution.deviance / n_f - 1.0 + 2.0 * edf / n_f
            };
            debug!(
                "{}: lambda {:.3e} edf {:.2} score {:.5}",
                spec.name(),
                lambda,
                edf,
                score
            );
            if best.as_ref().map_or(true, |b| score < b.1) {
                best = Some((lambda, score, solution, inverse, edf));
            }
        }
        let (lambda, score, solution, inverse, edf) = best.ok_or_else(|| {
            DsmError::NonConvergence(format!("{}: no smoothing parameter fitted", spec.name()))
        })?;

        let scale = if family.estimates_scale() {
            let residual_df = (n as f64 - edf).max(1.0);
            Family::pearson(data.response.view(), solution.mu.view()) / residual_df
        } else {
            1.0
        };
        info!(
            "fitted {} ({} coefficients): lambda {:.3e}, edf {:.2}, deviance {:.3}, scale {:.3}",
            spec.name(),
            solution.coefficients.len(),
            lambda,
            edf,
            solution.deviance,
            scale
        );

        Ok(FittedModel {
            spec,
            family,
            basis: basis.clone(),
            data,
            coefficients: solution.coefficients,
            covariance: inverse * scale,
            penalty: solution.penalty,
            lambda,
            edf,
            deviance: solution.deviance,
            scale,
            fitted: solution.mu,
            extra_columns,
            score,
        })
    }
}
