//! attachment-seed library
//!
//! Seeds a store with large synthetic attachments: one deterministic bitmap
//! payload per record, uploaded in bounded windows that are retried from a
//! checkpoint until every record up to the cap is stored.
//!
//! # Crates
//!
//! - `payload_generator` - deterministic bitmap streams of a requested size
//! - `bulk_upload` - the windowed upload driver, routing and checkpointing
//! - `payload_sink` - local filesystem, S3 and dry-run sinks
//! - `csv_records` - movies CSV as a restartable record source, movie documents
//!
//! # CLI Usage
//!
//! ```bash
//! # Upload one payload per movie to a local directory
//! attachment-seed upload --csv movies.csv --output-dir attachments --max-records 2000
//!
//! # Upload to S3 with a smaller window
//! attachment-seed upload --csv movies.csv --sink s3 --bucket my-bucket --window-size 100
//!
//! # Store the movie documents, then upload their attachments
//! attachment-seed upload --csv movies.csv --seed-movies --documents-dir documents
//!
//! # Write a single payload to disk
//! attachment-seed generate --size-mb 46 --seed 5 --output cover.bmp
//! ```

use anyhow::Context;
use bulk_upload::{DriverReport, Sink, TracingReporter};
use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use csv_records::{CsvRecordSource, MovieSeeder, SeedOutcome, DEFAULT_MAX_MOVIES};
use payload_generator::SyntheticStream;
use payload_sink::{DryRunSink, FilesystemSink, S3Sink};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub use bulk_upload;
pub use csv_records;
pub use payload_generator;
pub use payload_sink;

/// Where payloads are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    /// Local directory
    Local,
    /// S3 bucket (credentials from the default AWS chain)
    S3,
    /// Validate payload headers only
    DryRun,
}

#[derive(Args, Clone, Debug)]
pub struct SinkOpts {
    /// Sink to upload payloads to
    #[arg(long, value_enum, default_value = "local")]
    pub sink: SinkKind,

    /// Output directory for the local sink
    #[arg(long, default_value = "attachments", env = "ATTACHMENT_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Directory mirroring remote-tier payloads for the local sink
    #[arg(long)]
    pub remote_dir: Option<PathBuf>,

    /// Bucket for the S3 sink
    #[arg(long, env = "ATTACHMENT_BUCKET")]
    pub bucket: Option<String>,

    /// Key prefix for the S3 sink
    #[arg(long, default_value = "attachments")]
    pub prefix: String,

    /// Key prefix for remote-tier copies in the S3 sink
    #[arg(long, default_value = "remote")]
    pub remote_prefix: String,
}

impl SinkOpts {
    /// Build the configured sink.
    pub async fn build_sink(&self) -> anyhow::Result<Arc<dyn Sink>> {
        match self.sink {
            SinkKind::Local => {
                let mut sink = FilesystemSink::new(&self.output_dir);
                if let Some(remote_dir) = &self.remote_dir {
                    sink = sink.with_remote_root(remote_dir);
                }
                info!("Writing payloads to {}", self.output_dir.display());
                Ok(Arc::new(sink))
            }
            SinkKind::S3 => {
                let bucket = self
                    .bucket
                    .clone()
                    .context("--bucket is required for the s3 sink")?;
                info!("Uploading payloads to s3://{bucket}/{}", self.prefix);
                let sink = S3Sink::new(bucket, self.prefix.clone())
                    .await?
                    .with_remote_prefix(self.remote_prefix.clone());
                Ok(Arc::new(sink))
            }
            SinkKind::DryRun => {
                info!("Dry run: payloads are validated and discarded");
                Ok(Arc::new(DryRunSink::new()))
            }
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct MovieSeedArgs {
    /// Directory receiving movie documents as Movies/<movieId>.json
    #[arg(long, default_value = "documents", env = "ATTACHMENT_DOCUMENTS_DIR")]
    pub documents_dir: PathBuf,

    /// Maximum number of movie documents to store
    #[arg(long, default_value_t = DEFAULT_MAX_MOVIES)]
    pub max_movies: u64,

    /// Store the documents again even if a previous run finished
    #[arg(long)]
    pub reseed: bool,
}

impl MovieSeedArgs {
    pub fn seeder(&self) -> MovieSeeder {
        MovieSeeder::new(&self.documents_dir)
            .with_max_movies(self.max_movies)
            .force(self.reseed)
    }
}

/// Store the movie documents of `csv`, unless an earlier run already did.
pub async fn seed_movies(csv: &Path, args: &MovieSeedArgs) -> anyhow::Result<SeedOutcome> {
    info!(
        "Seeding up to {} movies from {} into {}",
        args.max_movies,
        csv.display(),
        args.documents_dir.display()
    );
    args.seeder()
        .seed(&CsvRecordSource::new(csv), &TracingReporter)
        .await
        .with_context(|| format!("Seeding movies from {} failed", csv.display()))
}

/// Outcome of an upload run, written with `--summary`.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records_per_second: f64,
    #[serde(flatten)]
    pub report: DriverReport,
}

pub async fn write_summary(summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(summary).context("Failed to serialize run summary")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write run summary to {}", path.display()))
}

/// Write one synthetic payload to `output`, returning the number of bytes written.
pub async fn generate_payload(size_mb: u32, seed: u64, output: &Path) -> anyhow::Result<u64> {
    let mut stream = SyntheticStream::with_size(size_mb, seed)
        .with_context(|| format!("Invalid payload size {size_mb} MB"))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut file = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let written = tokio::io::copy(&mut stream, &mut file)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tokio::io::AsyncWriteExt::flush(&mut file).await?;

    info!(
        "Wrote {}x{} bitmap ({written} bytes) to {}",
        stream.spec().width(),
        stream.spec().height(),
        output.display()
    );
    Ok(written)
}
