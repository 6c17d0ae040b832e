//! Driver configuration and duration parsing.

use crate::error::DriverError;
use crate::routing::RoutingPolicy;
use anyhow::Context;
use payload_generator::StreamSpec;
use std::time::Duration;

/// Default number of uploads in flight per wave.
pub const DEFAULT_WINDOW_SIZE: usize = 500;

/// Default number of records processed per run.
pub const DEFAULT_PROCESSING_CAP: u64 = 2000;

/// Default payload size in megabytes.
pub const DEFAULT_PAYLOAD_SIZE_MB: u32 = 46;

/// Default pause after a failed wave.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(15);

/// Default progress report cadence, in records.
pub const DEFAULT_REPORT_EVERY: u64 = 500;

/// Configuration for [`crate::WindowedBatchDriver`].
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum uploads in flight; a wave is awaited once it holds this many.
    pub window_size: usize,
    /// Stop after this many records (skipped ones included).
    pub processing_cap: u64,
    /// Target payload size in megabytes.
    pub payload_size_mb: u32,
    /// Pause between a failed wave and the rescan.
    pub backoff: Duration,
    /// Report progress every this many records.
    pub report_every: u64,
    pub routing: RoutingPolicy,
    /// Consecutive failed waves tolerated before giving up. `None` retries forever.
    pub max_wave_retries: Option<u32>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            processing_cap: DEFAULT_PROCESSING_CAP,
            payload_size_mb: DEFAULT_PAYLOAD_SIZE_MB,
            backoff: DEFAULT_BACKOFF,
            report_every: DEFAULT_REPORT_EVERY,
            routing: RoutingPolicy::default(),
            max_wave_retries: None,
        }
    }
}

impl DriverConfig {
    /// Check every parameter before any upload starts.
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.window_size == 0 {
            return Err(DriverError::Config(
                "window size must be at least 1".to_string(),
            ));
        }
        if self.report_every == 0 {
            return Err(DriverError::Config(
                "report cadence must be at least 1".to_string(),
            ));
        }
        self.routing.validate().map_err(DriverError::Config)?;
        StreamSpec::new(self.payload_size_mb, 1)?;
        Ok(())
    }
}

/// Parse a duration string like "1h", "30m", "15s", "250ms" or "15".
///
/// Plain numbers are seconds.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    if let Some(num_str) = s.strip_suffix("ms") {
        let millis: u64 = num_str
            .parse()
            .with_context(|| format!("Invalid milliseconds value: {num_str}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(num_str) = s.strip_suffix('h') {
        let hours: u64 = num_str
            .parse()
            .with_context(|| format!("Invalid hours value: {num_str}"))?;
        let secs = hours
            .checked_mul(3600)
            .with_context(|| format!("Duration out of range: {s}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(num_str) = s.strip_suffix('m') {
        let minutes: u64 = num_str
            .parse()
            .with_context(|| format!("Invalid minutes value: {num_str}"))?;
        let secs = minutes
            .checked_mul(60)
            .with_context(|| format!("Duration out of range: {s}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(num_str) = s.strip_suffix('s') {
        let secs: u64 = num_str
            .parse()
            .with_context(|| format!("Invalid seconds value: {num_str}"))?;
        return Ok(Duration::from_secs(secs));
    }

    let secs: u64 = s
        .parse()
        .with_context(|| format!("Invalid duration value: {s}"))?;
    Ok(Duration::from_secs(secs))
}
