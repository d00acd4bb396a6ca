use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Count family with log link.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Poisson,
    /// Poisson mean-variance with a Pearson-estimated scale.
    #[default]
    QuasiPoisson,
}

impl Family {
    pub fn estimates_scale(self) -> bool {
        matches!(self, Family::QuasiPoisson)
    }

    pub fn unit_deviance(y: f64, mu: f64) -> f64 {
        let log_term = if y > 0.0 { y * (y / mu).ln() } else { 0.0 };
        2.0 * (log_term - (y - mu))
    }

    pub fn deviance(y: ArrayView1<f64>, mu: ArrayView1<f64>) -> f64 {
        y.iter()
            .zip(mu.iter())
            .map(|(&y, &m)| Self::unit_deviance(y, m))
            .sum()
    }

    /// Poisson log likelihood up to the `log y!` constant.
    pub fn log_likelihood(y: ArrayView1<f64>, eta: ArrayView1<f64>) -> f64 {
        y.iter().zip(eta.iter()).map(|(&y, &e)| y * e - e.exp()).sum()
    }

    pub fn pearson(y: ArrayView1<f64>, mu: ArrayView1<f64>) -> f64 {
        y.iter()
            .zip(mu.iter())
            .map(|(&y, &m)| (y - m) * (y - m) / m)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn deviance_is_zero_at_saturation() {
        let y = array![0.0, 3.0];
        let mu = array![1e-300, 3.0];
        assert_relative_eq!(Family::deviance(y.view(), mu.view()), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn pearson_statistic_matches_hand_value() {
        let y = array![2.0, 0.0];
        let mu = array![1.0, 2.0];
        assert_relative_eq!(Family::pearson(y.view(), mu.view()), 2.0);
    }

    #[test]
    fn zero_counts_contribute_twice_the_mean() {
        assert_relative_eq!(Family::unit_deviance(0.0, 0.75), 1.5);
    }
}
