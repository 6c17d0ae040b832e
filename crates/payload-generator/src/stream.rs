//! Read-only, seekable synthetic bitmap stream.

use crate::bitmap::{BitmapHeader, HEADER_SIZE};
use crate::byte_source::fill_bytes;
use crate::error::StreamError;
use crate::geometry::StreamSpec;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Most bytes generated by one `poll_read`, so a large destination buffer
/// cannot hold a runtime worker for a whole payload.
pub const ASYNC_READ_CHUNK: usize = 64 * 1024;

/// Read pointer of one stream instance.
///
/// Invariant: `0 <= position <= length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCursor {
    position: u64,
    length: u64,
}

impl StreamCursor {
    fn new(length: u64) -> Self {
        Self {
            position: 0,
            length,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// Bytes left before end-of-stream.
    pub fn remaining(&self) -> u64 {
        self.length - self.position
    }

    /// Resolve a seek target, rejecting anything outside `[0, length]`.
    fn resolve(&self, target: SeekFrom) -> Result<u64, StreamError> {
        let (base, delta) = match target {
            SeekFrom::Start(offset) => (0i128, i128::from(offset)),
            SeekFrom::Current(offset) => (i128::from(self.position), i128::from(offset)),
            SeekFrom::End(offset) => (i128::from(self.length), i128::from(offset)),
        };
        let new_position = base + delta;
        if new_position < 0 || new_position > i128::from(self.length) {
            return Err(StreamError::Range(format!(
                "seek to {new_position} outside [0, {}]",
                self.length
            )));
        }
        Ok(new_position as u64)
    }
}

/// A synthetic bitmap file of an exact length.
///
/// Offsets below the header size return header bytes, everything after returns
/// `byte_at(seed, offset - 54)`. Only the header is stored, so memory use does not
/// depend on the payload length. Each instance owns its cursor; instances are
/// cheap to create and are never shared between uploads.
#[derive(Debug, Clone)]
pub struct SyntheticStream {
    spec: StreamSpec,
    header: [u8; HEADER_SIZE],
    cursor: StreamCursor,
}

impl SyntheticStream {
    /// Create a stream positioned at offset 0.
    pub fn new(spec: StreamSpec) -> Self {
        Self {
            header: BitmapHeader::from_spec(&spec).to_bytes(),
            cursor: StreamCursor::new(spec.len()),
            spec,
        }
    }

    /// Validate the parameters and create a stream.
    pub fn with_size(target_size_mb: u32, seed: u64) -> Result<Self, StreamError> {
        Ok(Self::new(StreamSpec::new(target_size_mb, seed)?))
    }

    pub fn spec(&self) -> &StreamSpec {
        &self.spec
    }

    pub fn cursor(&self) -> StreamCursor {
        self.cursor
    }

    pub fn position(&self) -> u64 {
        self.cursor.position
    }

    /// Total stream length in bytes.
    pub fn len(&self) -> u64 {
        self.cursor.length
    }

    /// Always false; a stream carries at least a header and one pixel.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn remaining(&self) -> u64 {
        self.cursor.remaining()
    }

    /// The 54 header bytes.
    pub fn header(&self) -> &[u8; HEADER_SIZE] {
        &self.header
    }

    /// Read up to `count` bytes into `buf[offset..offset + count]`.
    ///
    /// Returns the number of bytes read, which is smaller than `count` only when
    /// the read reaches end-of-stream. Buffer bounds that do not fit `buf` are a
    /// range error and nothing is read.
    pub fn read_into(
        &mut self,
        buf: &mut [u8],
        offset: usize,
        count: usize,
    ) -> Result<usize, StreamError> {
        let end = offset.checked_add(count).filter(|end| *end <= buf.len());
        let Some(end) = end else {
            return Err(StreamError::Range(format!(
                "offset {offset} + count {count} exceeds buffer of {} bytes",
                buf.len()
            )));
        };

        let n = (count as u64).min(self.cursor.remaining()) as usize;
        self.fill_at(self.cursor.position, &mut buf[offset..end][..n]);
        self.cursor.position += n as u64;
        Ok(n)
    }

    /// Move the cursor. Targets outside `[0, len]` fail and leave the cursor alone.
    pub fn seek_to(&mut self, target: SeekFrom) -> Result<u64, StreamError> {
        self.cursor.position = self.cursor.resolve(target)?;
        Ok(self.cursor.position)
    }

    /// Writes are never supported.
    pub fn write_from(&mut self, _buf: &[u8]) -> Result<usize, StreamError> {
        Err(StreamError::Unsupported("synthetic streams are read-only"))
    }

    /// Resizing is never supported.
    pub fn set_len(&mut self, _len: u64) -> Result<(), StreamError> {
        Err(StreamError::Unsupported("synthetic streams have a fixed length"))
    }

    /// Fill `dst` with the bytes starting at absolute offset `at`.
    fn fill_at(&self, at: u64, dst: &mut [u8]) {
        let mut written = 0;
        if at < HEADER_SIZE as u64 {
            let from = at as usize;
            let take = (HEADER_SIZE - from).min(dst.len());
            dst[..take].copy_from_slice(&self.header[from..from + take]);
            written = take;
        }
        if written < dst.len() {
            let pixel_index = at + written as u64 - HEADER_SIZE as u64;
            fill_bytes(self.spec.seed(), pixel_index, &mut dst[written..]);
        }
    }
}

impl io::Read for SyntheticStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len();
        Ok(self.read_into(buf, 0, len)?)
    }
}

impl io::Seek for SyntheticStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_to(pos)?)
    }
}

impl io::Write for SyntheticStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_from(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsyncRead for SyntheticStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let want = buf.remaining().min(ASYNC_READ_CHUNK) as u64;
        let n = want.min(this.cursor.remaining()) as usize;
        let dst = buf.initialize_unfilled_to(n);
        this.fill_at(this.cursor.position, dst);
        buf.advance(n);
        this.cursor.position += n as u64;
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::byte_at;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::io::{Read, Seek, Write};

    fn read_all(stream: &mut SyntheticStream) -> Vec<u8> {
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_full_read_has_exact_length() {
        let mut stream = SyntheticStream::with_size(1, 5).unwrap();
        let bytes = read_all(&mut stream);

        assert_eq!(bytes.len() as u64, stream.len());
        assert_eq!(stream.remaining(), 0);
        assert_eq!(&bytes[..HEADER_SIZE], stream.header());
        assert_eq!(bytes[HEADER_SIZE], byte_at(5, 0));
        assert_eq!(*bytes.last().unwrap(), byte_at(5, stream.spec().image_bytes() - 1));
    }

    #[test]
    fn test_chunked_reads_match_single_pass() {
        let mut whole = SyntheticStream::with_size(1, 11).unwrap();
        let expected = read_all(&mut whole);

        let mut rng = StdRng::seed_from_u64(42);
        let mut stream = SyntheticStream::with_size(1, 11).unwrap();
        let mut chunked = Vec::with_capacity(expected.len());
        let mut buf = vec![0u8; 70_000];
        loop {
            let count = rng.gen_range(1..buf.len());
            let n = stream.read_into(&mut buf, 0, count).unwrap();
            if n == 0 {
                break;
            }
            chunked.extend_from_slice(&buf[..n]);
        }

        assert_eq!(chunked, expected);
    }

    #[test]
    fn test_seek_then_read_matches_sequential() {
        let mut sequential = SyntheticStream::with_size(1, 3).unwrap();
        let expected = read_all(&mut sequential);

        let mut stream = SyntheticStream::with_size(1, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut positions: Vec<u64> = (0..200).map(|_| rng.gen_range(0..stream.len())).collect();
        positions.extend([0, 1, 53, 54, 55, stream.len() - 1]);

        for p in positions {
            stream.seek(SeekFrom::Start(p)).unwrap();
            let mut one = [0u8; 1];
            assert_eq!(stream.read(&mut one).unwrap(), 1);
            assert_eq!(one[0], expected[p as usize], "mismatch at {p}");
        }
    }

    #[test]
    fn test_read_across_header_boundary() {
        let mut stream = SyntheticStream::with_size(1, 8).unwrap();
        stream.seek(SeekFrom::Start(50)).unwrap();
        let mut buf = [0u8; 8];
        stream.read_exact(&mut buf).unwrap();

        assert_eq!(&buf[..4], &stream.header()[50..54]);
        for i in 0..4 {
            assert_eq!(buf[4 + i], byte_at(8, i as u64));
        }
    }

    #[test]
    fn test_short_read_at_end_of_stream() {
        let mut stream = SyntheticStream::with_size(1, 1).unwrap();
        stream.seek(SeekFrom::End(-10)).unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(stream.read_into(&mut buf, 4, 60).unwrap(), 10);
        assert_eq!(stream.read_into(&mut buf, 0, 64).unwrap(), 0);
        assert_eq!(stream.position(), stream.len());
    }

    #[test]
    fn test_seek_origins() {
        let mut stream = SyntheticStream::with_size(1, 1).unwrap();
        let len = stream.len();

        assert_eq!(stream.seek(SeekFrom::Start(100)).unwrap(), 100);
        assert_eq!(stream.seek(SeekFrom::Current(-40)).unwrap(), 60);
        assert_eq!(stream.seek(SeekFrom::End(0)).unwrap(), len);
        assert_eq!(stream.seek(SeekFrom::End(-(len as i64))).unwrap(), 0);
    }

    #[test]
    fn test_seek_out_of_range_fails() {
        let mut stream = SyntheticStream::with_size(1, 1).unwrap();
        stream.seek(SeekFrom::Start(10)).unwrap();

        let err = stream.seek_to(SeekFrom::Current(-11)).unwrap_err();
        assert!(matches!(err, StreamError::Range(_)));
        let err = stream.seek_to(SeekFrom::End(1)).unwrap_err();
        assert!(matches!(err, StreamError::Range(_)));
        let err = stream.seek(SeekFrom::Start(stream.len() + 1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        // Cursor is untouched by failed seeks.
        assert_eq!(stream.position(), 10);
    }

    #[test]
    fn test_invalid_buffer_bounds_fail() {
        let mut stream = SyntheticStream::with_size(1, 1).unwrap();
        let mut buf = [0u8; 16];

        let err = stream.read_into(&mut buf, 10, 7).unwrap_err();
        assert!(matches!(err, StreamError::Range(_)));
        let err = stream.read_into(&mut buf, usize::MAX, 2).unwrap_err();
        assert!(matches!(err, StreamError::Range(_)));
        assert_eq!(stream.position(), 0);

        assert_eq!(stream.read_into(&mut buf, 16, 0).unwrap(), 0);
    }

    #[test]
    fn test_writes_are_unsupported() {
        let mut stream = SyntheticStream::with_size(1, 1).unwrap();

        let err = stream.write(b"hello").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(matches!(
            stream.set_len(10),
            Err(StreamError::Unsupported(_))
        ));
        assert!(matches!(
            stream.write_from(&[]),
            Err(StreamError::Unsupported(_))
        ));
    }

    #[test]
    fn test_header_for_46mb_seed_5() {
        let mut stream = SyntheticStream::with_size(46, 5).unwrap();
        let mut head = [0u8; HEADER_SIZE];
        stream.read_exact(&mut head).unwrap();

        assert_eq!(&head[0..2], &[0x42, 0x4D]);
        let declared = u32::from_le_bytes([head[2], head[3], head[4], head[5]]);
        assert_eq!(u64::from(declared), stream.len());

        let spec = stream.spec();
        assert_eq!(
            u64::from(spec.width()) * u64::from(spec.height()) * 4 + 54,
            u64::from(declared)
        );
        assert!(BitmapHeader::parse(&head).is_ok());
    }

    #[tokio::test]
    async fn test_async_read_matches_sync_read() {
        let mut sync_stream = SyntheticStream::with_size(1, 21).unwrap();
        let expected = read_all(&mut sync_stream);

        let mut async_stream = SyntheticStream::with_size(1, 21).unwrap();
        let mut actual = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut async_stream, &mut actual)
            .await
            .unwrap();

        assert_eq!(actual, expected);
    }

    #[test]
    fn test_poll_read_is_bounded_per_call() {
        let mut stream = SyntheticStream::with_size(1, 21).unwrap();
        let mut buf = vec![0u8; 1 << 20];

        let n = {
            let mut read = tokio_test::task::spawn(tokio::io::AsyncReadExt::read(
                &mut stream,
                &mut buf,
            ));
            tokio_test::assert_ready_ok!(read.poll())
        };

        assert_eq!(n, ASYNC_READ_CHUNK);
        assert_eq!(stream.position(), ASYNC_READ_CHUNK as u64);
        let mut expected = vec![0u8; ASYNC_READ_CHUNK];
        SyntheticStream::with_size(1, 21)
            .unwrap()
            .read_exact(&mut expected)
            .unwrap();
        assert_eq!(&buf[..n], &expected[..]);
    }
}
