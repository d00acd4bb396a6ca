use log::{info, warn};

/// Logger that prefixes every message with its stage name.
pub struct StageLog {
    stage: &'static str,
}

impl StageLog {
    pub fn new(stage: &'static str) -> Self {
        Self { stage }
    }

    pub fn record(&self, message: &str) {
        info!("{}", self.line(message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.line(message));
    }

    fn line(&self, message: &str) -> String {
        format!("[{}] {}", self.stage, message)
    }
}
