use serde::{Deserialize, Serialize};

/// Detection key function; parameters are held on the log scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeyFunction {
    /// `g(x) = exp(-x² / 2σ²)`
    HalfNormal,
    /// `g(x) = 1 - exp(-(x/σ)^-b)`
    HazardRate,
}

impl KeyFunction {
    pub fn parameter_count(self) -> usize {
        match self {
            KeyFunction::HalfNormal => 1,
            KeyFunction::HazardRate => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KeyFunction::HalfNormal => "half-normal",
            KeyFunction::HazardRate => "hazard-rate",
        }
    }

    pub fn evaluate(self, x: f64, params: &[f64]) -> f64 {
        let sigma = params[0].exp();
        match self {
            KeyFunction::HalfNormal => (-(x * x) / (2.0 * sigma * sigma)).exp(),
            KeyFunction::HazardRate => {
                if x <= 0.0 {
                    return 1.0;
                }
                let shape = params[1].exp();
                1.0 - (-(x / sigma).powf(-shape)).exp()
            }
        }
    }

    /// Starting values from the observed distances.
    pub fn start(self, distances: &[f64], width: f64) -> Vec<f64> {
        let scale = if distances.is_empty() {
            0.5 * width
        } else {
            let mean = distances.iter().sum::<f64>() / distances.len() as f64;
            mean.max(1e-3 * width)
        };
        match self {
            KeyFunction::HalfNormal => vec![scale.ln()],
            KeyFunction::HazardRate => vec![scale.ln(), 2.0f64.ln()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn keys_are_one_on_the_line() {
        assert_relative_eq!(KeyFunction::HalfNormal.evaluate(0.0, &[3.0]), 1.0);
        assert_relative_eq!(KeyFunction::HazardRate.evaluate(0.0, &[3.0, 1.0]), 1.0);
    }

    #[test]
    fn half_normal_at_sigma_is_exp_minus_half() {
        let sigma: f64 = 40.0;
        let g = KeyFunction::HalfNormal.evaluate(sigma, &[sigma.ln()]);
        assert_relative_eq!(g, (-0.5f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn hazard_rate_decreases_with_distance() {
        let params = [50.0f64.ln(), 3.0f64.ln()];
        let near = KeyFunction::HazardRate.evaluate(20.0, &params);
        let far = KeyFunction::HazardRate.evaluate(150.0, &params);
        assert!(near > far);
    }
}
