pub mod log;
pub mod severity;
pub mod systime;

pub use log::{log, set_threshold, threshold};
pub use severity::LogSeverity;
