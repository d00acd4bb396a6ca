use crate::detection::{DetectionFitter, DetectionFunction};
use crate::prelude::{DsmError, DsmResult};
use crate::survey::Distance;

/// Certain detection out to `width`; the strip-count platform's function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DummyDetection {
    pub width: f64,
}

pub struct DummyFitter {
    pub width: f64,
}

impl DetectionFitter for DummyFitter {
    fn fit(&self, _distances: &[Distance]) -> DsmResult<DetectionFunction> {
        if !(self.width > 0.0) {
            return Err(DsmError::InvalidInput(format!(
                "dummy detection width must be positive, got {}",
                self.width
            )));
        }
        Ok(DetectionFunction::Dummy(DummyDetection { width: self.width }))
    }
}
