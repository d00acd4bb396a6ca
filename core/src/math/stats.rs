pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    /// Sample variance with the `n - 1` denominator; zero for fewer than two values.
    pub fn sample_variance(samples: &[f64]) -> f64 {
        let n = samples.len();
        if n < 2 {
            return 0.0;
        }
        let mean = Self::mean(samples);
        let sum_sq: f64 = samples.iter().map(|&v| (v - mean) * (v - mean)).sum();
        sum_sq / (n - 1) as f64
    }

    /// Coefficient of variation; infinite when the estimate is zero.
    pub fn cv(std_dev: f64, estimate: f64) -> f64 {
        if estimate == 0.0 {
            return f64::INFINITY;
        }
        std_dev / estimate
    }

    /// Composite Simpson rule over `[a, b]` with `intervals` rounded up to even.
    pub fn simpson<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, intervals: usize) -> f64 {
        if b <= a {
            return 0.0;
        }
        let n = intervals.max(2) + intervals % 2;
        let h = (b - a) / n as f64;
        let mut total = f(a) + f(b);
        for i in 1..n {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            total += weight * f(a + i as f64 * h);
        }
        total * h / 3.0
    }
}
