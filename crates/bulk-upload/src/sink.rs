//! Upload sink trait and remote tier parameters.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payload_generator::SyntheticStream;
use serde::{Deserialize, Serialize};

/// Parameters for the secondary ("remote tier") destination of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTier {
    /// Identifier of the configured remote destination.
    pub destination_id: String,
    /// When the payload becomes eligible for the remote tier.
    pub remote_at: DateTime<Utc>,
}

impl RemoteTier {
    pub fn new(destination_id: impl Into<String>, remote_at: DateTime<Utc>) -> Self {
        Self {
            destination_id: destination_id.into(),
            remote_at,
        }
    }
}

/// Destination for generated payloads.
///
/// Implementations must be idempotent: re-submitting the same
/// `(destination_key, payload_name)` with the same payload succeeds and leaves
/// one copy. The driver retries whole waves, so tasks that already succeeded
/// are submitted again. Implementations are called concurrently.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Store `payload` as `payload_name` under `destination_key`, and in the
    /// remote tier too when `remote` is given.
    async fn put(
        &self,
        destination_key: &str,
        payload_name: &str,
        payload: SyntheticStream,
        remote: Option<&RemoteTier>,
    ) -> Result<()>;
}
