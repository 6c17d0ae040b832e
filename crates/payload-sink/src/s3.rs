//! S3 sink using multipart uploads.

use crate::sanitize_key;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bulk_upload::{RemoteTier, Sink};
use payload_generator::SyntheticStream;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Part size for multipart uploads (8 MiB). S3 requires at least 5 MiB for
/// every part but the last.
pub const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

/// Part buffers held at once across all uploads of one sink (512 MiB at the
/// default part size).
pub const DEFAULT_MAX_BUFFERED_PARTS: usize = 64;

const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Uploads payloads to `s3://<bucket>/<prefix>/<key>/<name>`.
///
/// Payloads are read and sent one part at a time. A wave runs many uploads
/// concurrently, so part buffers are drawn from a shared pool: at most
/// `max_buffered_parts * part_size` bytes are in memory however wide the wave
/// is, and uploads beyond that wait for a buffer. Parts are generated on the
/// blocking pool.
///
/// Remote-tier payloads carry the tier parameters as object metadata and are
/// server-side copied to `s3://<bucket>/<remote_prefix>/<destination_id>/<key>/<name>`.
pub struct S3Sink {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    remote_prefix: String,
    part_size: usize,
    max_buffered_parts: usize,
    part_buffers: Arc<Semaphore>,
}

impl S3Sink {
    /// Create a sink with a client built from the default AWS configuration chain.
    pub async fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Result<Self> {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = aws_sdk_s3::Client::new(&sdk_config);
        Ok(Self::with_client(client, bucket, prefix))
    }

    /// Create a sink around an existing client.
    pub fn with_client(
        client: aws_sdk_s3::Client,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
            remote_prefix: "remote".to_string(),
            part_size: DEFAULT_PART_SIZE,
            max_buffered_parts: DEFAULT_MAX_BUFFERED_PARTS,
            part_buffers: Arc::new(Semaphore::new(DEFAULT_MAX_BUFFERED_PARTS)),
        }
    }

    /// Prefix under which remote-tier copies are placed.
    pub fn with_remote_prefix(mut self, remote_prefix: impl Into<String>) -> Self {
        self.remote_prefix = remote_prefix.into();
        self
    }

    /// Override the multipart part size (clamped to the S3 minimum).
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(MIN_PART_SIZE);
        self
    }

    /// Limit how many part buffers all uploads may hold at once (at least one).
    pub fn with_max_buffered_parts(mut self, max_buffered_parts: usize) -> Self {
        self.max_buffered_parts = max_buffered_parts.max(1);
        self.part_buffers = Arc::new(Semaphore::new(self.max_buffered_parts));
        self
    }

    /// Upper bound on payload bytes buffered by this sink.
    pub fn max_buffered_bytes(&self) -> usize {
        self.max_buffered_parts * self.part_size
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key of the primary copy.
    pub fn object_key(&self, destination_key: &str, payload_name: &str) -> String {
        object_key(&self.prefix, &[destination_key, payload_name])
    }

    /// Key of the remote-tier copy.
    pub fn remote_object_key(
        &self,
        destination_key: &str,
        payload_name: &str,
        remote: &RemoteTier,
    ) -> String {
        object_key(
            &self.remote_prefix,
            &[&remote.destination_id, destination_key, payload_name],
        )
    }

    async fn upload(
        &self,
        key: &str,
        payload: SyntheticStream,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type("image/bmp")
            .set_metadata(Some(metadata))
            .send()
            .await
            .with_context(|| format!("Failed to start upload of s3://{}/{key}", self.bucket))?;
        let upload_id = created
            .upload_id()
            .context("S3 did not return an upload id")?
            .to_string();

        match self.upload_parts(key, &upload_id, payload).await {
            Ok(parts) => {
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await
                    .with_context(|| {
                        format!("Failed to complete upload of s3://{}/{key}", self.bucket)
                    })?;
                Ok(())
            }
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!("Failed to abort upload {upload_id} for {key}: {abort_err}");
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        mut payload: SyntheticStream,
    ) -> Result<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut part_number: i32 = 1;

        loop {
            let _buffer = Arc::clone(&self.part_buffers)
                .acquire_owned()
                .await
                .context("Part buffer pool closed")?;

            let part_size = self.part_size;
            let (returned, chunk) = tokio::task::spawn_blocking(move || {
                let chunk = read_part(&mut payload, part_size);
                (payload, chunk)
            })
            .await
            .context("Payload reader task failed")?;
            payload = returned;
            let chunk = chunk?;
            if chunk.is_empty() {
                break;
            }
            let chunk_len = chunk.len();

            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .with_context(|| format!("Failed to upload part {part_number} of {key}"))?;

            debug!("Uploaded part {part_number} ({chunk_len} bytes) of {key}");
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            part_number += 1;
        }

        Ok(parts)
    }
}

#[async_trait]
impl Sink for S3Sink {
    async fn put(
        &self,
        destination_key: &str,
        payload_name: &str,
        payload: SyntheticStream,
        remote: Option<&RemoteTier>,
    ) -> Result<()> {
        let key = self.object_key(destination_key, payload_name);
        let mut metadata = HashMap::new();
        metadata.insert("destination-key".to_string(), destination_key.to_string());
        if let Some(remote) = remote {
            metadata.insert("remote-destination".to_string(), remote.destination_id.clone());
            metadata.insert("remote-at".to_string(), remote.remote_at.to_rfc3339());
        }

        self.upload(&key, payload, metadata).await?;

        if let Some(remote) = remote {
            let remote_key = self.remote_object_key(destination_key, payload_name, remote);
            self.client
                .copy_object()
                .bucket(&self.bucket)
                .copy_source(format!("{}/{key}", self.bucket))
                .key(&remote_key)
                .send()
                .await
                .with_context(|| {
                    format!("Failed to copy s3://{}/{key} to {remote_key}", self.bucket)
                })?;
        }

        debug!("Stored s3://{}/{key}", self.bucket);
        Ok(())
    }
}

/// Join a prefix and sanitized segments with `/`.
fn object_key(prefix: &str, segments: &[&str]) -> String {
    let prefix = prefix.trim_matches('/');
    let mut key = String::new();
    if !prefix.is_empty() {
        key.push_str(prefix);
    }
    for segment in segments {
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(&sanitize_key(segment));
    }
    key
}

/// Read up to `part_size` bytes; shorter only at end-of-stream.
fn read_part(payload: &mut SyntheticStream, part_size: usize) -> Result<Vec<u8>> {
    let want = (payload.remaining() as usize).min(part_size);
    let mut chunk = Vec::with_capacity(want);
    payload
        .take(want as u64)
        .read_to_end(&mut chunk)
        .context("Failed to read payload")?;
    Ok(chunk)
}
