//! Common CLI argument definitions for upload commands.

use crate::config::{parse_duration, DriverConfig};
use crate::routing::RoutingPolicy;
use crate::sink::RemoteTier;
use chrono::Utc;
use clap::Args;
use std::time::Duration;

/// Arguments shared by every upload command, whatever the sink.
#[derive(Args, Clone, Debug)]
pub struct CommonUploadArgs {
    /// Maximum uploads in flight per wave
    #[arg(long, default_value = "500")]
    pub window_size: usize,

    /// Stop after processing this many records
    #[arg(long, default_value = "2000")]
    pub max_records: u64,

    /// Size of each generated payload in megabytes
    #[arg(long, default_value = "46")]
    pub payload_size_mb: u32,

    /// Pause after a failed wave before rescanning (e.g. "15s", "1m")
    #[arg(long, default_value = "15s", value_parser = parse_duration)]
    pub backoff: Duration,

    /// Give up after this many consecutive failed waves (default: retry forever)
    #[arg(long)]
    pub max_wave_retries: Option<u32>,

    /// Report progress every N records
    #[arg(long, default_value = "500")]
    pub report_every: u64,

    /// Share of the last records that skip the remote tier (0.0 - 1.0)
    #[arg(long, default_value = "0.1")]
    pub primary_only_fraction: f64,

    /// Identifier of the remote tier destination
    #[arg(long, default_value = "conf-identifier", env = "REMOTE_TIER_DESTINATION")]
    pub remote_destination: String,

    /// How long ago tiered payloads became eligible for the remote tier
    #[arg(long, default_value = "1d", value_parser = parse_remote_age)]
    pub remote_age: chrono::Duration,

    /// Payload name for primary-only records
    #[arg(long, default_value = "cover1.png")]
    pub primary_payload_name: String,

    /// Payload name for records also sent to the remote tier
    #[arg(long, default_value = "cover2.png")]
    pub tiered_payload_name: String,
}

impl CommonUploadArgs {
    /// Build the driver configuration from the parsed arguments.
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            window_size: self.window_size,
            processing_cap: self.max_records,
            payload_size_mb: self.payload_size_mb,
            backoff: self.backoff,
            report_every: self.report_every,
            routing: RoutingPolicy {
                primary_only_fraction: self.primary_only_fraction,
                primary_payload_name: self.primary_payload_name.clone(),
                tiered_payload_name: self.tiered_payload_name.clone(),
                remote: RemoteTier::new(
                    self.remote_destination.clone(),
                    Utc::now() - self.remote_age,
                ),
            },
            max_wave_retries: self.max_wave_retries,
        }
    }
}

/// Parse "1d", "12h", "30m" or plain seconds into a chrono duration.
fn parse_remote_age(s: &str) -> anyhow::Result<chrono::Duration> {
    let s = s.trim();
    let std_duration = match s.strip_suffix('d') {
        Some(days) => {
            let days: u64 = days
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid days value: {days}"))?;
            let secs = days
                .checked_mul(86_400)
                .ok_or_else(|| anyhow::anyhow!("Remote age out of range: {s}"))?;
            Duration::from_secs(secs)
        }
        None => parse_duration(s)?,
    };
    Ok(chrono::Duration::from_std(std_duration)?)
}
