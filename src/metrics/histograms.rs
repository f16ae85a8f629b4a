//! Histogram metrics

use std::time::Duration;

/// Record how long one connection attempt took
pub fn connect_duration(elapsed: Duration) {
    metrics::histogram!("dbprobe_connect_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}
