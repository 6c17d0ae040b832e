//! Movie documents written next to the attachments.
//!
//! Every movie with a parseable title is stored as pretty JSON under
//! `<root>/Movies/<movieId>.json`. A marker file records a finished seeding so a
//! second run leaves the documents alone.

use crate::movie::Movie;
use crate::source::CsvRecordSource;
use anyhow::{Context, Result};
use bulk_upload::ProgressReporter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Movies stored by default before seeding stops.
pub const DEFAULT_MAX_MOVIES: u64 = 40_000;

/// Default number of stored movies between progress lines.
pub const DEFAULT_REPORT_EVERY: u64 = 10_000;

const COLLECTION: &str = "Movies";
const MARKER_FILE: &str = ".seeded.json";

/// Written once seeding completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedMarker {
    pub saved: u64,
    pub seeded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded { saved: u64 },
    /// A previous run finished; nothing was written.
    AlreadySeeded(SeedMarker),
}

/// Stores movie documents from a CSV source as JSON files.
#[derive(Debug, Clone)]
pub struct MovieSeeder {
    root: PathBuf,
    max_movies: u64,
    report_every: u64,
    force: bool,
}

impl MovieSeeder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_movies: DEFAULT_MAX_MOVIES,
            report_every: DEFAULT_REPORT_EVERY,
            force: false,
        }
    }

    pub fn with_max_movies(mut self, max_movies: u64) -> Self {
        self.max_movies = max_movies;
        self
    }

    pub fn with_report_every(mut self, report_every: u64) -> Self {
        self.report_every = report_every.max(1);
        self
    }

    /// Seed again even when a previous run left its marker.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn collection_dir(&self) -> PathBuf {
        self.root.join(COLLECTION)
    }

    /// `<root>/Movies/<movieId>.json` for a movie id of `Movies/<movieId>`.
    pub fn document_path(&self, movie: &Movie) -> PathBuf {
        let local_id = movie
            .id
            .strip_prefix(COLLECTION)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(&movie.id);
        self.collection_dir()
            .join(format!("{}.json", local_id.replace(['/', '\\'], "_")))
    }

    fn marker_path(&self) -> PathBuf {
        self.collection_dir().join(MARKER_FILE)
    }

    /// The marker of a finished seeding, if any.
    pub async fn read_marker(&self) -> Result<Option<SeedMarker>> {
        let path = self.marker_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to read {}", path.display())))
            }
        };
        let marker = serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid seed marker {}", path.display()))?;
        Ok(Some(marker))
    }

    /// Store up to `max_movies` movies from `source`, in file order.
    pub async fn seed(
        &self,
        source: &CsvRecordSource,
        reporter: &dyn ProgressReporter,
    ) -> Result<SeedOutcome> {
        if !self.force {
            if let Some(marker) = self.read_marker().await? {
                info!(
                    "{} already holds {} movies seeded at {}, skipping",
                    self.collection_dir().display(),
                    marker.saved,
                    marker.seeded_at
                );
                return Ok(SeedOutcome::AlreadySeeded(marker));
            }
        }

        reporter.report(COLLECTION);
        let dir = self.collection_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        let mut saved: u64 = 0;
        for movie in source.movies()? {
            if saved >= self.max_movies {
                break;
            }
            let movie = movie?;
            let path = self.document_path(&movie);
            write_json(&path, &movie).await?;
            debug!("Stored {} at {}", movie.id, path.display());

            saved += 1;
            if saved % self.report_every == 0 {
                reporter.report(&format!("Saved {saved} movies..."));
            }
        }

        let marker = SeedMarker {
            saved,
            seeded_at: Utc::now(),
        };
        write_json(&self.marker_path(), &marker).await?;
        reporter.report(&format!("Done! Total saved: {saved}"));
        Ok(SeedOutcome::Seeded { saved })
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
