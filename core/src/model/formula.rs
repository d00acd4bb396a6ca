use crate::model::basis::SpatialBasis;
use crate::prelude::{DsmError, DsmResult, Platform};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

/// The three nested count models.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    /// `count ~ s(x, y)`
    NoPlatform,
    /// `count ~ platform + s(x, y)`
    PlatformFactor,
    /// `count ~ s(x, y, by = platform)`
    FactorSmooth,
}

impl ModelSpec {
    pub const ALL: [ModelSpec; 3] = [
        ModelSpec::NoPlatform,
        ModelSpec::PlatformFactor,
        ModelSpec::FactorSmooth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModelSpec::NoPlatform => "no_platform",
            ModelSpec::PlatformFactor => "platform_factor",
            ModelSpec::FactorSmooth => "factor_smooth",
        }
    }

    pub fn uses_platform(self) -> bool {
        !matches!(self, ModelSpec::NoPlatform)
    }

    pub fn coefficient_count(self, basis: &SpatialBasis) -> usize {
        let m = basis.dimension();
        match self {
            ModelSpec::NoPlatform => m,
            ModelSpec::PlatformFactor => m + 1,
            ModelSpec::FactorSmooth => 2 * m,
        }
    }

    /// Linear-predictor row for one location on one platform.
    pub fn design_row(
        self,
        basis: &SpatialBasis,
        x: f64,
        y: f64,
        platform: Option<Platform>,
    ) -> DsmResult<Vec<f64>> {
        let smooth = basis.evaluate(x, y);
        let platform = match (self, platform) {
            (ModelSpec::NoPlatform, _) => return Ok(smooth),
            (_, Some(p)) => p,
            (spec, None) => {
                return Err(DsmError::InvalidInput(format!(
                    "model {} needs a platform for every row",
                    spec.name()
                )))
            }
        };
        let m = smooth.len();
        let mut row = vec![0.0; self.coefficient_count(basis)];
        match self {
            ModelSpec::PlatformFactor => {
                row[..m].copy_from_slice(&smooth);
                row[m] = if platform == Platform::B { 1.0 } else { 0.0 };
            }
            ModelSpec::FactorSmooth => {
                let offset = if platform == Platform::B { m } else { 0 };
                row[offset..offset + m].copy_from_slice(&smooth);
            }
            ModelSpec::NoPlatform => unreachable!(),
        }
        Ok(row)
    }

    /// Smoothing penalty before scaling by λ; the platform coefficient is unpenalised.
    pub fn penalty(self, basis: &SpatialBasis) -> Array2<f64> {
        let smooth = basis.penalty();
        let m = basis.dimension();
        let p = self.coefficient_count(basis);
        let mut out = Array2::<f64>::zeros((p, p));
        out.slice_mut(s![..m, ..m]).assign(&smooth);
        if self == ModelSpec::FactorSmooth {
            out.slice_mut(s![m.., m..]).assign(&smooth);
        }
        out
    }
}
