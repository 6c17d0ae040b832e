//! Command-line interface for attachment-seed
//!
//! # Usage Examples
//!
//! ## Upload
//! ```bash
//! # One 46 MB payload per movie, 500 uploads in flight, stop after 2000 records
//! attachment-seed upload --csv movies.csv --output-dir attachments
//!
//! # S3 sink, retry a failing wave at most 5 times
//! attachment-seed upload --csv movies.csv --sink s3 --bucket seed-bucket \
//!   --max-wave-retries 5 --backoff 30s
//! ```
//!
//! ## Movies
//! ```bash
//! # Store up to 40,000 movie documents; later runs skip unless --reseed is given
//! attachment-seed movies --csv movies.csv --documents-dir documents
//! ```
//!
//! ## Generate
//! ```bash
//! attachment-seed generate --size-mb 46 --seed 5 --output cover.bmp
//! ```

use anyhow::Context;
use attachment_seed::{
    generate_payload, seed_movies, write_summary, MovieSeedArgs, RunSummary, SinkOpts,
};
use bulk_upload::{CommonUploadArgs, TracingReporter, WindowedBatchDriver};
use chrono::Utc;
use clap::{Parser, Subcommand};
use csv_records::CsvRecordSource;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "attachment-seed")]
#[command(about = "Seed a store with large synthetic attachments")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one synthetic payload per CSV record
    Upload {
        /// Movies CSV file (movieId,title,genres)
        #[arg(long)]
        csv: PathBuf,

        /// Write a JSON run summary to this file
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Store the movie documents before uploading
        #[arg(long)]
        seed_movies: bool,

        /// Movie document options (with --seed-movies)
        #[command(flatten)]
        movies: MovieSeedArgs,

        /// Sink options
        #[command(flatten)]
        sink: SinkOpts,

        /// Driver options
        #[command(flatten)]
        common: CommonUploadArgs,
    },
    /// Store one JSON document per movie
    Movies {
        /// Movies CSV file (movieId,title,genres)
        #[arg(long)]
        csv: PathBuf,

        #[command(flatten)]
        movies: MovieSeedArgs,
    },
    /// Write a single synthetic payload to a file
    Generate {
        /// Payload size in megabytes
        #[arg(long, default_value = "46")]
        size_mb: u32,

        /// Payload seed
        #[arg(long, default_value = "1")]
        seed: u64,

        /// Output file
        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Upload {
            csv,
            summary,
            seed_movies: seed_first,
            movies,
            sink,
            common,
        } => {
            if seed_first {
                seed_movies(&csv, &movies).await?;
            }
            run_upload(csv, summary, sink, common).await
        }
        Commands::Movies { csv, movies } => {
            seed_movies(&csv, &movies).await?;
            Ok(())
        }
        Commands::Generate {
            size_mb,
            seed,
            output,
        } => {
            generate_payload(size_mb, seed, &output).await?;
            Ok(())
        }
    }
}

async fn run_upload(
    csv: PathBuf,
    summary: Option<PathBuf>,
    sink: SinkOpts,
    common: CommonUploadArgs,
) -> anyhow::Result<()> {
    let config = common.driver_config();
    info!(
        "Starting upload from {}: window {}, cap {}, {} MB payloads",
        csv.display(),
        config.window_size,
        config.processing_cap,
        config.payload_size_mb
    );

    let started_at = Utc::now();
    let sink = sink.build_sink().await?;
    let driver = WindowedBatchDriver::new(config, sink, Arc::new(TracingReporter))
        .context("Invalid upload configuration")?;
    let report = driver
        .run(&CsvRecordSource::new(&csv))
        .await
        .with_context(|| format!("Upload from {} failed", csv.display()))?;

    let metrics = &report.metrics;
    info!(
        "Uploaded {} records ({} attempts, {} failed waves, {} scans) in {:.1}s ({:.1} records/s), checkpoint {}",
        metrics.records_uploaded,
        metrics.uploads_attempted,
        metrics.waves_failed,
        metrics.scans,
        metrics.total_duration.as_secs_f64(),
        metrics.records_per_second(),
        report.checkpoint
    );

    if let Some(path) = summary {
        let summary = RunSummary {
            source: csv.display().to_string(),
            started_at,
            finished_at: Utc::now(),
            records_per_second: metrics.records_per_second(),
            report,
        };
        write_summary(&summary, &path).await?;
        info!("Wrote run summary to {}", path.display());
    }
    Ok(())
}
