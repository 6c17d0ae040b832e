//! Fixed-size groups of concurrent uploads joined behind a barrier.

use crate::sink::Sink;
use crate::task::UploadTask;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Longest failure cause kept in a [`WaveOutcome`].
const MAX_CAUSE_LEN: usize = 100;

/// Result of awaiting one wave.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaveOutcome {
    pub succeeded: usize,
    pub failed: usize,
    /// First failure observed, truncated.
    pub cause: Option<String>,
}

impl WaveOutcome {
    pub fn is_failure(&self) -> bool {
        self.failed > 0
    }
}

/// Uploads in flight for the current window.
///
/// Tasks start as soon as they are pushed. A wave never holds more than
/// `capacity` tasks, and [`Wave::await_all`] waits for every one of them before
/// the caller may push again.
pub struct Wave {
    capacity: usize,
    sink: Arc<dyn Sink>,
    tasks: JoinSet<anyhow::Result<u64>>,
    first_index: Option<u64>,
    last_index: Option<u64>,
}

impl Wave {
    pub fn new(capacity: usize, sink: Arc<dyn Sink>) -> Self {
        Self {
            capacity: capacity.max(1),
            sink,
            tasks: JoinSet::new(),
            first_index: None,
            last_index: None,
        }
    }

    /// Start `task`. Must not be called on a full wave.
    pub fn push(&mut self, task: UploadTask) {
        debug_assert!(!self.is_full(), "wave already holds {} tasks", self.capacity);
        self.first_index.get_or_insert(task.index);
        self.last_index = Some(task.index);
        self.tasks.spawn(task.run(Arc::clone(&self.sink)));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tasks.len() >= self.capacity
    }

    /// Index range `[first, last]` of the tasks pushed since the last await.
    pub fn index_range(&self) -> Option<(u64, u64)> {
        self.first_index.zip(self.last_index)
    }

    /// Wait for every task in the wave and reset it for reuse.
    ///
    /// A single failed or panicked task fails the wave; the remaining tasks still
    /// run to completion.
    pub async fn await_all(&mut self) -> WaveOutcome {
        let mut outcome = WaveOutcome::default();

        while let Some(joined) = self.tasks.join_next().await {
            let failure = match joined {
                Ok(Ok(_index)) => {
                    outcome.succeeded += 1;
                    continue;
                }
                Ok(Err(e)) => format!("{e:#}"),
                Err(join_error) => format!("upload task aborted: {join_error}"),
            };
            outcome.failed += 1;
            if outcome.cause.is_none() {
                outcome.cause = Some(truncate(&failure, MAX_CAUSE_LEN));
            }
        }

        self.first_index = None;
        self.last_index = None;
        outcome
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((at, _)) => format!("{}...", &text[..at]),
        None => text.to_string(),
    }
}
