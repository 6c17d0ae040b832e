//! In-run upload checkpoint.

use serde::Serialize;
use std::fmt;

/// Count of records known to be fully uploaded.
///
/// Only ever moves forward, and only when a whole wave succeeds. It lives for one
/// driver run; nothing is persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Checkpoint {
    completed: u64,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// True when the record at `index` was completed by an earlier wave.
    pub fn covers(&self, index: u64) -> bool {
        index < self.completed
    }

    /// Advance to `processed`. Returns false (and stays put) if that would move
    /// the checkpoint backwards.
    pub fn advance_to(&mut self, processed: u64) -> bool {
        if processed < self.completed {
            tracing::warn!(
                "Ignoring checkpoint regression from {} to {}",
                self.completed,
                processed
            );
            return false;
        }
        self.completed = processed;
        true
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.completed)
    }
}
