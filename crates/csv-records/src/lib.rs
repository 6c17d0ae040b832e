//! CSV record source for attachment-seed.
//!
//! Reads a `movies.csv` style file (`movieId,title,genres`) and turns every row
//! into an [`UploadRecord`] keyed `Movies/{movieId}`. Rows whose title does not
//! end in a four digit year become placeholders that get no payload.
//!
//! [`MovieSeeder`] writes the parseable movies as JSON documents, the records
//! the attachments belong to.

mod movie;
mod seed;
mod source;

pub use movie::{parse_title_year, Movie, MovieRow};
pub use seed::{MovieSeeder, SeedMarker, SeedOutcome, DEFAULT_MAX_MOVIES, DEFAULT_REPORT_EVERY};
pub use source::CsvRecordSource;

// Re-export the record types for convenience
pub use bulk_upload::{RecordSource, UploadRecord};
