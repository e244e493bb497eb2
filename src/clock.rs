//! Time source and timestamp rendering

use chrono::{DateTime, Utc};

/// Source of "now" for stored timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Render stored epoch seconds with a chrono format string.
///
/// Out-of-range values fall back to the raw number.
pub fn format_unix(secs: i64, format: &str) -> String {
    match DateTime::<Utc>::from_timestamp(secs, 0) {
        Some(dt) => dt.format(format).to_string(),
        None => secs.to_string(),
    }
}
