//! Sink that validates payloads without storing them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bulk_upload::{RemoteTier, Sink};
use payload_generator::{BitmapHeader, SyntheticStream, HEADER_SIZE};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Reads and checks each payload's bitmap header, then discards the payload.
///
/// Useful for exercising the driver end to end without a storage backend.
#[derive(Debug, Default)]
pub struct DryRunSink {
    puts: AtomicU64,
    bytes: AtomicU64,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accepted puts.
    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    /// Total declared length of accepted payloads.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Sink for DryRunSink {
    async fn put(
        &self,
        destination_key: &str,
        payload_name: &str,
        mut payload: SyntheticStream,
        remote: Option<&RemoteTier>,
    ) -> Result<()> {
        let mut header = [0u8; HEADER_SIZE];
        let n = payload
            .read_into(&mut header, 0, HEADER_SIZE)
            .with_context(|| format!("Failed to read payload header for {destination_key}"))?;
        let parsed = BitmapHeader::parse(&header[..n])
            .with_context(|| format!("Invalid payload header for {destination_key}"))?;

        self.puts.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(payload.len(), Ordering::Relaxed);
        debug!(
            "Dry run: {destination_key}/{payload_name} {}x{} ({} bytes, remote: {})",
            parsed.width,
            parsed.height.unsigned_abs(),
            payload.len(),
            remote.map(|r| r.destination_id.as_str()).unwrap_or("none")
        );
        Ok(())
    }
}
