//! Metrics from an upload run.

use serde::Serialize;
use std::time::Duration;

/// Counters collected by the driver over one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadMetrics {
    /// Uploads that belonged to a successful wave.
    pub records_uploaded: u64,
    /// Uploads dispatched, including those in failed waves.
    pub uploads_attempted: u64,
    /// Records passed over because the checkpoint already covered them.
    pub records_skipped: u64,
    /// Placeholder records reached, once per scan that reached them.
    pub placeholders: u64,
    /// Waves that completed without a failure.
    pub waves_completed: u64,
    /// Waves with at least one failed task.
    pub waves_failed: u64,
    /// Number of scans over the record source (1 + retries).
    pub scans: u64,
    /// Total time taken.
    pub total_duration: Duration,
}

impl UploadMetrics {
    /// Calculate successful uploads per second.
    pub fn records_per_second(&self) -> f64 {
        if self.total_duration.as_secs_f64() > 0.0 {
            self.records_uploaded as f64 / self.total_duration.as_secs_f64()
        } else {
            0.0
        }
    }
}
