//! Windowed bulk upload driver for attachment-seed.
//!
//! This crate uploads one synthetic payload per record from a restartable
//! [`RecordSource`] to a [`Sink`], keeping at most one window of uploads in
//! flight and retrying failed windows from an in-run [`Checkpoint`].
//!
//! # Architecture
//!
//! ```text
//! RecordSource::open()            (rescanned after every failed wave)
//!        │
//!        ▼
//! ┌─────────────────────┐   index < checkpoint ──► skip
//! │ WindowedBatchDriver │
//! │  - Checkpoint       │──► RoutingPolicy::route(index, cap)
//! │  - DriverConfig     │
//! └─────────┬───────────┘
//!           │ UploadTask { index, record, StreamSpec, Destination }
//!           ▼
//!    ┌─────────────┐   JoinSet barrier    ┌──────────┐
//!    │    Wave     │ ───────────────────► │   Sink   │
//!    │ ≤ window    │ ◄── WaveOutcome ──── │  put()   │
//!    └─────────────┘                      └──────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use bulk_upload::{DriverConfig, TracingReporter, VecRecordSource, WindowedBatchDriver};
//! use std::sync::Arc;
//!
//! let driver = WindowedBatchDriver::new(DriverConfig::default(), sink, Arc::new(TracingReporter))?;
//! let report = driver.run(&VecRecordSource::sequential("Movies", 2000)).await?;
//! println!("checkpoint {}", report.checkpoint);
//! ```

pub mod args;
pub mod checkpoint;
pub mod config;
pub mod driver;
mod error;
pub mod metrics;
pub mod progress;
pub mod record;
pub mod routing;
pub mod sink;
pub mod task;
pub mod wave;

// Re-exports for convenience
pub use args::CommonUploadArgs;
pub use checkpoint::Checkpoint;
pub use config::{parse_duration, DriverConfig};
pub use driver::{DriverReport, WindowedBatchDriver};
pub use error::DriverError;
pub use metrics::UploadMetrics;
pub use progress::{ProgressReporter, TracingReporter};
pub use record::{RecordIter, RecordSource, UploadRecord, VecRecordSource};
pub use routing::{Destination, RoutingPolicy};
pub use sink::{RemoteTier, Sink};
pub use task::UploadTask;
pub use wave::{Wave, WaveOutcome};
