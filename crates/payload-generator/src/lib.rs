//! Synthetic payload generator for attachment-seed.
//!
//! This crate provides the `SyntheticStream`, a read-only, seekable byte stream of
//! an exact length that looks like a 32-bit top-down bitmap file. Only the 54 byte
//! header is held in memory; pixel data is synthesized on demand from `(seed, index)`
//! by [`byte_at`], so a 46 MB payload costs the same memory as a 1 MB one.
//!
//! # Architecture
//!
//! ```text
//! StreamSpec { target_size_mb, seed }
//!        │
//!        ├─────────────────────┐
//!        ▼                     ▼
//! ┌───────────────┐    ┌───────────────┐
//! │ BitmapHeader  │    │   byte_at()   │
//! │  54 bytes     │    │ (seed, index) │
//! └───────┬───────┘    └───────┬───────┘
//!         │                    │
//!         └─────────┬──────────┘
//!                   ▼
//!          ┌─────────────────┐
//!          │ SyntheticStream │
//!          │  Read + Seek    │
//!          │  AsyncRead      │
//!          └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use payload_generator::{StreamSpec, SyntheticStream};
//! use std::io::Read;
//!
//! let spec = StreamSpec::new(1, 5).unwrap();
//! let mut stream = SyntheticStream::new(spec);
//!
//! let mut magic = [0u8; 2];
//! stream.read_exact(&mut magic).unwrap();
//! assert_eq!(&magic, b"BM");
//! ```

pub mod bitmap;
pub mod byte_source;
pub mod error;
pub mod geometry;
pub mod stream;

// Re-exports for convenience
pub use bitmap::{BitmapHeader, FILE_HEADER_SIZE, HEADER_SIZE, INFO_HEADER_SIZE};
pub use byte_source::{byte_at, fill_bytes};
pub use error::StreamError;
pub use geometry::{StreamSpec, BYTES_PER_MB};
pub use stream::{StreamCursor, SyntheticStream, ASYNC_READ_CHUNK};
