//! Payload geometry derived from a target size.

use crate::bitmap::HEADER_SIZE;
use crate::error::StreamError;

/// One megabyte as used for target sizes.
pub const BYTES_PER_MB: u64 = 1_048_576;

/// Bytes per 32-bit pixel.
const BYTES_PER_PIXEL: u64 = 4;

/// Immutable description of a synthetic payload.
///
/// The image is as close to square as possible while staying at or below the
/// target size. The derived length is always `54 + width * height * 4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    target_size_mb: u32,
    seed: u64,
    width: u32,
    height: u32,
}

impl StreamSpec {
    /// Create a spec for a payload of roughly `target_size_mb` megabytes.
    pub fn new(target_size_mb: u32, seed: u64) -> Result<Self, StreamError> {
        if target_size_mb == 0 {
            return Err(StreamError::Configuration(
                "target size must be at least 1 MB".to_string(),
            ));
        }

        let target_bytes = u64::from(target_size_mb) * BYTES_PER_MB;
        let max_pixels = (target_bytes.saturating_sub(HEADER_SIZE as u64) / BYTES_PER_PIXEL).max(1);
        let width = ceil_sqrt(max_pixels);
        let height = (max_pixels / width).max(1);

        let width = u32::try_from(width).map_err(|_| {
            StreamError::Configuration(format!("width {width} does not fit a bitmap header"))
        })?;
        // Stored negated in the header, so it must fit an i32.
        let height = i32::try_from(height)
            .map(|h| h as u32)
            .map_err(|_| {
                StreamError::Configuration(format!("height {height} does not fit a bitmap header"))
            })?;

        let spec = Self {
            target_size_mb,
            seed,
            width,
            height,
        };
        if spec.len() > u64::from(u32::MAX) {
            return Err(StreamError::Configuration(format!(
                "payload length {} exceeds the 4 GiB bitmap limit",
                spec.len()
            )));
        }
        Ok(spec)
    }

    pub fn target_size_mb(&self) -> u32 {
        self.target_size_mb
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels (positive; the header stores it negated).
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size of the pixel array in bytes.
    pub fn image_bytes(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * BYTES_PER_PIXEL
    }

    /// Total stream length: header plus pixel array.
    pub fn len(&self) -> u64 {
        HEADER_SIZE as u64 + self.image_bytes()
    }

    /// Always false; a valid spec has at least one pixel.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Smallest `r` with `r * r >= n`.
fn ceil_sqrt(n: u64) -> u64 {
    let mut r = (n as f64).sqrt() as u64;
    while r * r > n {
        r -= 1;
    }
    while r * r < n {
        r += 1;
    }
    r
}
