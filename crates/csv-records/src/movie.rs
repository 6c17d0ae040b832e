//! Movie rows and their conversion into records.

use bulk_upload::UploadRecord;
use serde::{Deserialize, Serialize};

/// One raw CSV row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MovieRow {
    #[serde(rename = "movieId")]
    pub movie_id: u64,
    pub title: String,
    #[serde(default)]
    pub genres: String,
}

/// A parsed movie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub year: u16,
    pub genres: Vec<String>,
}

impl MovieRow {
    /// The record for this row: a placeholder when the title carries no year.
    pub fn to_record(&self) -> UploadRecord {
        match self.to_movie() {
            Some(movie) => movie.to_record(),
            None => UploadRecord::placeholder(
                format!("Movies/{}", self.movie_id),
                self.title.trim(),
            ),
        }
    }

    /// Convert the row, or `None` when the title carries no trailing year.
    pub fn to_movie(&self) -> Option<Movie> {
        let (title, year) = parse_title_year(&self.title)?;
        Some(Movie {
            id: format!("Movies/{}", self.movie_id),
            title,
            year,
            genres: self
                .genres
                .split('|')
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

impl Movie {
    pub fn to_record(&self) -> UploadRecord {
        UploadRecord::new(self.id.clone(), self.title.clone())
    }
}

/// Split `"Toy Story (1995)"` into `("Toy Story", 1995)`.
///
/// The title must end with a space followed by a parenthesised four digit year.
pub fn parse_title_year(raw: &str) -> Option<(String, u16)> {
    let rest = raw.strip_suffix(')')?;
    let split = rest.len().checked_sub(4)?;
    let (head, year) = (rest.get(..split)?, rest.get(split..)?);
    if !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let title = head.strip_suffix(" (")?;
    Some((title.trim().to_string(), year.parse().ok()?))
}
