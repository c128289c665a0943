use crate::severity::LogSeverity;
use crate::systime::now;
use once_cell::sync::Lazy;
use std::env;
use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable holding the initial threshold
pub const LOG_ENV: &str = "STRATA_LOG";

static THRESHOLD: Lazy<AtomicU8> = Lazy::new(|| {
    let initial = env::var(LOG_ENV)
        .ok()
        .and_then(|value| value.parse::<LogSeverity>().ok())
        .unwrap_or(LogSeverity::Info);
    AtomicU8::new(initial as u8)
});

/// Prints `[SEVERITY] <local time> <msg>` to stderr if `severity` passes the threshold.
pub fn log(msg: String, severity: LogSeverity) {
    if !enabled(severity) {
        return;
    }
    eprintln!("[{}] {} {}", severity, now(), msg);
}

pub fn enabled(severity: LogSeverity) -> bool {
    severity >= threshold()
}

pub fn threshold() -> LogSeverity {
    LogSeverity::from_u8(THRESHOLD.load(Ordering::Relaxed))
}

pub fn set_threshold(severity: LogSeverity) {
    THRESHOLD.store(severity as u8, Ordering::Relaxed);
}
