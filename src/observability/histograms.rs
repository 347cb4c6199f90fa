//! Latency histograms for layout and data-server operations.

use metrics::histogram;
use std::time::{Duration, Instant};

/// Histogram buckets for operation latency (in seconds).
pub const LATENCY_BUCKETS: [f64; 12] = [
    0.00005, // 50µs
    0.0001,  // 100µs
    0.0005,  // 500µs
    0.001,   // 1ms
    0.005,   // 5ms
    0.01,    // 10ms
    0.025,   // 25ms
    0.05,    // 50ms
    0.1,     // 100ms
    0.25,    // 250ms
    0.5,     // 500ms
    1.0,     // 1s
];

pub const LAYOUT_OP_DURATION: &str = "pnfs_layout_op_duration_seconds";
pub const DS_OP_DURATION: &str = "pnfs_ds_op_duration_seconds";

/// A latency timer that records into a histogram when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
    operation: &'static str,
}

impl LatencyTimer {
    pub fn new(metric_name: &'static str, operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
            operation,
        }
    }

    /// Get elapsed time without recording.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name, "operation" => self.operation)
            .record(self.start.elapsed().as_secs_f64());
    }
}

/// Timer for a metadata-server layout operation.
pub fn layout_timer(operation: &'static str) -> LatencyTimer {
    LatencyTimer::new(LAYOUT_OP_DURATION, operation)
}

/// Timer for a data-server READ, WRITE or COMMIT.
pub fn ds_timer(operation: &'static str) -> LatencyTimer {
    LatencyTimer::new(DS_OP_DURATION, operation)
}
