pub mod log;

pub use log::StageLog;
