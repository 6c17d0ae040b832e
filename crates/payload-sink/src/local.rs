//! Local filesystem sink.

use crate::sanitize_key;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bulk_upload::{RemoteTier, Sink};
use chrono::{DateTime, Utc};
use payload_generator::SyntheticStream;
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Metadata written next to payloads that went to the remote tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSidecar {
    pub destination_key: String,
    pub payload_name: String,
    pub destination_id: String,
    pub remote_at: DateTime<Utc>,
    pub length: u64,
}

/// Writes payloads to `<root>/<key>/<name>`.
///
/// Remote-tier payloads are also copied to
/// `<remote_root>/<destination_id>/<key>/<name>` and get a `<name>.remote.json`
/// sidecar in the primary directory. Files are written to a temporary name and
/// renamed into place, so a retried upload replaces the earlier copy atomically.
#[derive(Debug, Clone)]
pub struct FilesystemSink {
    root: PathBuf,
    remote_root: Option<PathBuf>,
}

impl FilesystemSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            remote_root: None,
        }
    }

    /// Mirror remote-tier payloads below `remote_root`.
    pub fn with_remote_root(mut self, remote_root: impl Into<PathBuf>) -> Self {
        self.remote_root = Some(remote_root.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a payload is stored at.
    pub fn payload_path(&self, destination_key: &str, payload_name: &str) -> PathBuf {
        self.root
            .join(sanitize_key(destination_key))
            .join(sanitize_key(payload_name))
    }

    /// Path a remote-tier copy is stored at, if a remote root is configured.
    pub fn remote_path(
        &self,
        destination_key: &str,
        payload_name: &str,
        remote: &RemoteTier,
    ) -> Option<PathBuf> {
        self.remote_root.as_ref().map(|root| {
            root.join(sanitize_key(&remote.destination_id))
                .join(sanitize_key(destination_key))
                .join(sanitize_key(payload_name))
        })
    }
}

#[async_trait]
impl Sink for FilesystemSink {
    async fn put(
        &self,
        destination_key: &str,
        payload_name: &str,
        payload: SyntheticStream,
        remote: Option<&RemoteTier>,
    ) -> Result<()> {
        let length = payload.len();
        let path = self.payload_path(destination_key, payload_name);
        let mut remote_copy = payload.clone();
        write_atomically(&path, payload).await?;

        if let Some(remote) = remote {
            if let Some(remote_path) = self.remote_path(destination_key, payload_name, remote) {
                remote_copy
                    .seek_to(SeekFrom::Start(0))
                    .context("Failed to rewind payload for remote copy")?;
                write_atomically(&remote_path, remote_copy).await?;
            }

            let sidecar = RemoteSidecar {
                destination_key: destination_key.to_string(),
                payload_name: payload_name.to_string(),
                destination_id: remote.destination_id.clone(),
                remote_at: remote.remote_at,
                length,
            };
            let sidecar_path = path.with_file_name(format!(
                "{}.remote.json",
                sanitize_key(payload_name)
            ));
            tokio::fs::write(&sidecar_path, serde_json::to_vec_pretty(&sidecar)?)
                .await
                .with_context(|| format!("Failed to write {}", sidecar_path.display()))?;
        }

        debug!(
            "Stored {} bytes at {} (remote tier: {})",
            length,
            path.display(),
            remote.is_some()
        );
        Ok(())
    }
}

/// Stream `payload` into a temporary file next to `path`, then rename it over `path`.
async fn write_atomically(path: &Path, mut payload: SyntheticStream) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("Payload path {} has no parent", path.display()))?;
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    let result = async {
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        let written = tokio::io::copy(&mut payload, &mut file)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        file.flush().await?;
        if written != payload.len() {
            anyhow::bail!(
                "Short write to {}: {written} of {} bytes",
                tmp_path.display(),
                payload.len()
            );
        }
        tokio::fs::rename(&tmp_path, path)
            .await
            .with_context(|| format!("Failed to move payload into {}", path.display()))?;
        Ok::<(), anyhow::Error>(())
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use payload_generator::BitmapHeader;
    use tempfile::TempDir;

    fn payload(seed: u64) -> SyntheticStream {
        SyntheticStream::with_size(1, seed).unwrap()
    }

    #[tokio::test]
    async fn test_put_writes_full_payload() {
        let dir = TempDir::new().unwrap();
        let sink = FilesystemSink::new(dir.path());

        sink.put("Movies/1", "cover1.png", payload(2), None)
            .await
            .unwrap();

        let path = sink.payload_path("Movies/1", "cover1.png");
        assert!(path.ends_with("Movies_1/cover1.png"));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, payload(2).len());
        assert!(BitmapHeader::parse(&bytes).is_ok());
        assert!(!path.with_file_name("cover1.png.remote.json").exists());
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let sink = FilesystemSink::new(dir.path());

        sink.put("Movies/1", "cover1.png", payload(2), None)
            .await
            .unwrap();
        let first = std::fs::read(sink.payload_path("Movies/1", "cover1.png")).unwrap();
        sink.put("Movies/1", "cover1.png", payload(2), None)
            .await
            .unwrap();
        let second = std::fs::read(sink.payload_path("Movies/1", "cover1.png")).unwrap();

        assert_eq!(first, second);
        let entries = std::fs::read_dir(dir.path().join("Movies_1")).unwrap().count();
        assert_eq!(entries, 1, "temporary files must not be left behind");
    }

    #[tokio::test]
    async fn test_remote_tier_copy_and_sidecar() {
        let dir = TempDir::new().unwrap();
        let remote_dir = TempDir::new().unwrap();
        let sink = FilesystemSink::new(dir.path()).with_remote_root(remote_dir.path());
        let remote = RemoteTier::new("conf-identifier", Utc::now() - Duration::days(1));

        sink.put("Movies/7", "cover2.png", payload(8), Some(&remote))
            .await
            .unwrap();

        let primary = std::fs::read(sink.payload_path("Movies/7", "cover2.png")).unwrap();
        let remote_path = sink
            .remote_path("Movies/7", "cover2.png", &remote)
            .unwrap();
        assert!(remote_path.starts_with(remote_dir.path().join("conf-identifier")));
        let mirrored = std::fs::read(&remote_path).unwrap();
        assert_eq!(primary, mirrored);

        let sidecar_path = dir.path().join("Movies_7").join("cover2.png.remote.json");
        let sidecar: RemoteSidecar =
            serde_json::from_slice(&std::fs::read(sidecar_path).unwrap()).unwrap();
        assert_eq!(sidecar.destination_id, "conf-identifier");
        assert_eq!(sidecar.remote_at, remote.remote_at);
        assert_eq!(sidecar.length, primary.len() as u64);
    }
}
