//! Bitmap file and info header layout.
//!
//! All fields are little-endian, matching the BITMAPFILEHEADER (14 bytes) and
//! BITMAPINFOHEADER (40 bytes) layout that image parsers expect.

use crate::error::StreamError;
use crate::geometry::StreamSpec;

/// Size of the file header.
pub const FILE_HEADER_SIZE: usize = 14;

/// Size of the info header.
pub const INFO_HEADER_SIZE: usize = 40;

/// Combined header size; pixel data starts at this offset.
pub const HEADER_SIZE: usize = FILE_HEADER_SIZE + INFO_HEADER_SIZE;

/// "BM"
pub const MAGIC: [u8; 2] = [0x42, 0x4D];

/// 72 DPI expressed in pixels per metre.
pub const PIXELS_PER_METRE: i32 = 2835;

const BITS_PER_PIXEL: u16 = 32;

/// Decoded header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapHeader {
    pub file_size: u32,
    pub data_offset: u32,
    pub width: i32,
    /// Negative for top-down row order.
    pub height: i32,
    pub planes: u16,
    pub bits_per_pixel: u16,
    pub compression: u32,
    pub image_size: u32,
    pub x_pixels_per_metre: i32,
    pub y_pixels_per_metre: i32,
}

impl BitmapHeader {
    /// Header describing the payload of `spec`.
    pub fn from_spec(spec: &StreamSpec) -> Self {
        // StreamSpec::new bounds the length and dimensions, the casts cannot truncate.
        Self {
            file_size: spec.len() as u32,
            data_offset: HEADER_SIZE as u32,
            width: spec.width() as i32,
            height: -(spec.height() as i32),
            planes: 1,
            bits_per_pixel: BITS_PER_PIXEL,
            compression: 0,
            image_size: spec.image_bytes() as u32,
            x_pixels_per_metre: PIXELS_PER_METRE,
            y_pixels_per_metre: PIXELS_PER_METRE,
        }
    }

    /// Serialize to the 54 byte on-disk layout.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut w = FieldWriter::new(&mut out);

        // BITMAPFILEHEADER
        w.put(&MAGIC);
        w.put(&self.file_size.to_le_bytes());
        w.put(&0u16.to_le_bytes());
        w.put(&0u16.to_le_bytes());
        w.put(&self.data_offset.to_le_bytes());

        // BITMAPINFOHEADER
        w.put(&(INFO_HEADER_SIZE as u32).to_le_bytes());
        w.put(&self.width.to_le_bytes());
        w.put(&self.height.to_le_bytes());
        w.put(&self.planes.to_le_bytes());
        w.put(&self.bits_per_pixel.to_le_bytes());
        w.put(&self.compression.to_le_bytes());
        w.put(&self.image_size.to_le_bytes());
        w.put(&self.x_pixels_per_metre.to_le_bytes());
        w.put(&self.y_pixels_per_metre.to_le_bytes());
        // Palette size and important colours stay zero.
        w.put(&0u32.to_le_bytes());
        w.put(&0u32.to_le_bytes());

        debug_assert_eq!(w.pos, HEADER_SIZE);
        out
    }

    /// Parse and validate the first 54 bytes of a bitmap file.
    ///
    /// Accepts only what this crate produces: uncompressed 32 bpp with a
    /// 40 byte info header and pixel data directly after the headers.
    pub fn parse(bytes: &[u8]) -> Result<Self, StreamError> {
        if bytes.len() < HEADER_SIZE {
            return Err(StreamError::Range(format!(
                "bitmap header needs {HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0..2] != MAGIC {
            return Err(StreamError::InvalidHeader(format!(
                "bad bitmap magic {:02x?}",
                &bytes[0..2]
            )));
        }

        let info_size = le_u32(bytes, 14);
        if info_size != INFO_HEADER_SIZE as u32 {
            return Err(StreamError::InvalidHeader(format!(
                "unexpected info header size {info_size}"
            )));
        }

        let header = Self {
            file_size: le_u32(bytes, 2),
            data_offset: le_u32(bytes, 10),
            width: le_u32(bytes, 18) as i32,
            height: le_u32(bytes, 22) as i32,
            planes: le_u16(bytes, 26),
            bits_per_pixel: le_u16(bytes, 28),
            compression: le_u32(bytes, 30),
            image_size: le_u32(bytes, 34),
            x_pixels_per_metre: le_u32(bytes, 38) as i32,
            y_pixels_per_metre: le_u32(bytes, 42) as i32,
        };

        if header.data_offset != HEADER_SIZE as u32 {
            return Err(StreamError::InvalidHeader(format!(
                "unexpected pixel data offset {}",
                header.data_offset
            )));
        }
        if header.planes != 1 || header.bits_per_pixel != BITS_PER_PIXEL {
            return Err(StreamError::InvalidHeader(format!(
                "unsupported planes/bpp {}/{}",
                header.planes, header.bits_per_pixel
            )));
        }
        let expected = u64::from(header.width.unsigned_abs())
            * u64::from(header.height.unsigned_abs())
            * 4;
        if u64::from(header.image_size) != expected
            || u64::from(header.file_size) != expected + HEADER_SIZE as u64
        {
            return Err(StreamError::InvalidHeader(format!(
                "size fields disagree with {}x{} dimensions",
                header.width, header.height
            )));
        }

        Ok(header)
    }

    /// True when rows are stored top to bottom.
    pub fn is_top_down(&self) -> bool {
        self.height < 0
    }
}

struct FieldWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FieldWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }
}

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
