use crate::prelude::{DsmError, DsmResult};
use serde::{Deserialize, Serialize};

/// Ordered CV breaks forming right-closed intervals `(a, b]`; the first
/// interval is also closed on the left.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct CvBins {
    breaks: Vec<f64>,
}

impl Default for CvBins {
    fn default() -> Self {
        Self {
            breaks: vec![0.0, 0.05, 0.1, 0.2, 0.3, 0.5, 1.0, f64::INFINITY],
        }
    }
}

impl TryFrom<Vec<f64>> for CvBins {
    type Error = DsmError;

    fn try_from(breaks: Vec<f64>) -> DsmResult<Self> {
        CvBins::new(breaks)
    }
}

impl From<CvBins> for Vec<f64> {
    fn from(bins: CvBins) -> Self {
        bins.breaks
    }
}

impl CvBins {
    pub fn new(breaks: Vec<f64>) -> DsmResult<Self> {
        if breaks.len() < 2 {
            return Err(DsmError::InvalidInput("CV bins need at least two breaks".into()));
        }
        if breaks.iter().any(|b| b.is_nan()) || breaks.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DsmError::InvalidInput(format!(
                "CV breaks must be strictly increasing: {:?}",
                breaks
            )));
        }
        Ok(Self { breaks })
    }

    pub fn breaks(&self) -> &[f64] {
        &self.breaks
    }

    pub fn count(&self) -> usize {
        self.breaks.len() - 1
    }

    /// Bin index for `value`, or `None` when it lies outside every interval.
    pub fn classify(&self, value: f64) -> Option<usize> {
        if value.is_nan() || value < self.breaks[0] {
            return None;
        }
        if value == self.breaks[0] {
            return Some(0);
        }
        self.breaks
            .windows(2)
            .position(|w| value > w[0] && value <= w[1])
    }

    pub fn labels(&self) -> Vec<String> {
        self.breaks
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let open = if i == 0 { "[" } else { "(" };
                let upper = if w[1].is_infinite() {
                    "Inf".to_string()
                } else {
                    format!("{}", w[1])
                };
                format!("{}{}, {}]", open, w[0], upper)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_edge_belongs_to_the_lower_interval() {
        let bins = CvBins::default();
        assert_eq!(bins.classify(0.05), Some(0));
        assert_eq!(bins.classify(0.050000001), Some(1));
        assert_eq!(bins.classify(0.1), Some(1));
    }

    #[test]
    fn lowest_break_is_inclusive() {
        let bins = CvBins::default();
        assert_eq!(bins.classify(0.0), Some(0));
        assert_eq!(bins.classify(-0.01), None);
        assert_eq!(bins.classify(f64::NAN), None);
    }

    #[test]
    fn infinite_cv_falls_in_open_top_bin() {
        let bins = CvBins::default();
        assert_eq!(bins.classify(f64::INFINITY), Some(bins.count() - 1));
        assert_eq!(bins.classify(3.0), Some(bins.count() - 1));
    }

    #[test]
    fn labels_show_closure() {
        let bins = CvBins::new(vec![0.0, 0.05, 1.0]).unwrap();
        assert_eq!(bins.labels(), vec!["[0, 0.05]", "(0.05, 1]"]);
    }

    #[test]
    fn unsorted_breaks_are_rejected() {
        assert!(CvBins::new(vec![0.0, 0.2, 0.1]).is_err());
        assert!(CvBins::new(vec![0.0]).is_err());
    }

    #[test]
    fn deserialised_breaks_are_validated() {
        assert!(serde_json::from_str::<CvBins>("[]").is_err());
        assert!(serde_json::from_str::<CvBins>("[0.5, 0.1]").is_err());
        let bins: CvBins = serde_json::from_str("[0.0, 0.2, 1.0]").unwrap();
        assert_eq!(bins.count(), 2);
    }
}
