//! A single payload upload.

use crate::record::UploadRecord;
use crate::routing::Destination;
use crate::sink::Sink;
use anyhow::Context;
use payload_generator::{StreamSpec, SyntheticStream};
use std::sync::Arc;
use tracing::debug;

/// Upload of one generated payload for one record.
///
/// The payload stream is built when the task runs and is owned by it until the
/// sink returns.
#[derive(Debug, Clone)]
pub struct UploadTask {
    /// Position of the record in the scan.
    pub index: u64,
    pub record: UploadRecord,
    pub spec: StreamSpec,
    pub destination: Destination,
}

impl UploadTask {
    /// Build the task for the record at `index`.
    ///
    /// The payload seed is `index + 1`, so a retried record regenerates the exact
    /// same bytes.
    pub fn new(
        index: u64,
        record: UploadRecord,
        payload_size_mb: u32,
        destination: Destination,
    ) -> Result<Self, payload_generator::StreamError> {
        Ok(Self {
            index,
            record,
            spec: StreamSpec::new(payload_size_mb, index + 1)?,
            destination,
        })
    }

    /// Generate the payload and hand it to `sink`. Returns the record index.
    pub async fn run(self, sink: Arc<dyn Sink>) -> anyhow::Result<u64> {
        let payload = SyntheticStream::new(self.spec);
        debug!(
            "Uploading {} ({} bytes) for '{}' as {}",
            self.destination.payload_name,
            payload.len(),
            self.record.display_name,
            self.record.id
        );

        sink.put(
            &self.record.id,
            &self.destination.payload_name,
            payload,
            self.destination.remote.as_ref(),
        )
        .await
        .with_context(|| {
            format!(
                "Failed to upload {} for {} (index {})",
                self.destination.payload_name, self.record.id, self.index
            )
        })?;

        Ok(self.index)
    }
}
