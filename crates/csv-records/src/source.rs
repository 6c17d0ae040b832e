//! Restartable CSV record source.

use crate::movie::{Movie, MovieRow};
use anyhow::{Context, Result};
use bulk_upload::{RecordIter, RecordSource};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Record source backed by a movies CSV file on disk.
///
/// Each [`RecordSource::open`] reopens the file, so every scan sees the rows
/// in file order. Rows whose title has no trailing `(year)` become placeholder
/// records: they keep their position but get no payload. Malformed CSV is
/// reported as an error item.
#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    path: PathBuf,
}

impl CsvRecordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterate over raw rows in file order.
    pub fn rows(&self) -> Result<impl Iterator<Item = Result<MovieRow>> + Send + 'static> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open CSV file {}", self.path.display()))?;
        info!("Reading records from {}", self.path.display());

        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(file);

        let rows = reader
            .into_deserialize::<MovieRow>()
            .enumerate()
            .map(|(line, row)| {
                row.map_err(|e| {
                    anyhow::Error::new(e).context(format!("Failed to parse CSV row {}", line + 1))
                })
            });
        Ok(rows)
    }

    /// Iterate over parseable movies in file order.
    pub fn movies(&self) -> Result<impl Iterator<Item = Result<Movie>> + Send + 'static> {
        let movies = self.rows()?.filter_map(|row| match row {
            Ok(row) => {
                let movie = row.to_movie();
                if movie.is_none() {
                    debug!("Skipping movie {}: no year in title {:?}", row.movie_id, row.title);
                }
                movie.map(Ok)
            }
            Err(e) => Some(Err(e)),
        });
        Ok(movies)
    }
}

impl RecordSource for CsvRecordSource {
    fn open(&self) -> Result<RecordIter<'_>> {
        let records = self.rows()?.map(|row| row.map(|row| row.to_record()));
        Ok(Box::new(records))
    }
}
