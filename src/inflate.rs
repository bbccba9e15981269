//! Inflate buffer pipeline.
//!
//! Memory-maps the input file and inflates it incrementally into a single
//! fixed-size working buffer. Decoders read through [`InflateBuffer::peek`],
//! [`InflateBuffer::take`] and [`InflateBuffer::advance`]; when a message is
//! not fully available they call [`InflateBuffer::refill`], which first
//! compacts consumed bytes out of the buffer and then inflates more input
//! into the tail.
//!
//! Input starting with the gzip magic (`1f 8b`) is inflated with a
//! multi-member gzip decoder; anything else is passed through unchanged,
//! which is how plain-text NYSE TAQ files are read.
//!
//! # Example
//!
//! ```
//! use tick_normalizer::InflateBuffer;
//!
//! let mut buf = InflateBuffer::new(b"hello".to_vec());
//! assert!(buf.fill(5).unwrap());
//! assert_eq!(buf.take(5), b"hello");
//! assert_eq!(buf.refill().unwrap(), 0);
//! ```
//!
//! # Performance
//!
//! A single 1 MiB buffer amortizes the per-call overhead of the inflater.
//! The buffer is allocated once and never resized; a message that cannot fit
//! in it is reported as [`DecodeError::MessageTooLarge`].

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::Path;

use flate2::bufread::MultiGzDecoder;
use memmap2::Mmap;

use crate::error::{DecodeError, Result};

/// Working buffer size for decompressed data.
///
/// Large enough that the inflater runs in big batches, small enough to stay
/// resident in cache-friendly memory regardless of input size.
pub const WORKING_BUFFER_SIZE: usize = 1024 * 1024; // 1 MiB

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Progress callback, called with the fraction of input consumed.
pub type ProgressFn = Box<dyn FnMut(f64)>;

enum Source<R: AsRef<[u8]>> {
    Gzip(MultiGzDecoder<Cursor<R>>),
    Plain(Cursor<R>),
}

impl<R: AsRef<[u8]>> Source<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Gzip(decoder) => decoder.read(out),
            Source::Plain(cursor) => cursor.read(out),
        }
    }

    /// Bytes of the raw input consumed so far.
    fn position(&self) -> u64 {
        match self {
            Source::Gzip(decoder) => decoder.get_ref().position(),
            Source::Plain(cursor) => cursor.position(),
        }
    }
}

/// Refillable window over a (possibly gzip-compressed) input.
pub struct InflateBuffer<R: AsRef<[u8]>> {
    source: Source<R>,
    buf: Box<[u8]>,
    /// First unconsumed byte
    start: usize,
    /// One past the last valid byte
    end: usize,
    /// Decompressed bytes consumed before `start`
    consumed: u64,
    input_len: u64,
    compressed: bool,
    eof: bool,
    progress: Option<ProgressFn>,
}

impl InflateBuffer<Mmap> {
    /// Map `path` read-only and prepare to inflate it.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Io`] naming the file if it cannot be opened
    /// or mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| DecodeError::io(path, &e))?;

        // SAFETY: the mapping is read-only and lives as long as the buffer;
        // input files are not modified while being converted.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| DecodeError::io(path, &e))?;

        log::debug!("Mapped {} ({} bytes)", path.display(), mmap.len());

        Ok(Self::new(mmap))
    }
}

impl<R: AsRef<[u8]>> InflateBuffer<R> {
    /// Wrap an in-memory input with the default working buffer size.
    pub fn new(input: R) -> Self {
        Self::with_capacity(input, WORKING_BUFFER_SIZE)
    }

    /// Wrap an input with a custom working buffer size.
    pub fn with_capacity(input: R, capacity: usize) -> Self {
        let bytes = input.as_ref();
        let input_len = bytes.len() as u64;
        let compressed = bytes.starts_with(&GZIP_MAGIC);

        let cursor = Cursor::new(input);
        let source = if compressed {
            Source::Gzip(MultiGzDecoder::new(cursor))
        } else {
            Source::Plain(cursor)
        };

        Self {
            source,
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
            start: 0,
            end: 0,
            consumed: 0,
            input_len,
            compressed,
            eof: false,
            progress: None,
        }
    }

    /// Report progress after each refill.
    pub fn with_progress(mut self, progress: impl FnMut(f64) + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Whether the input was detected as gzip.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Working buffer capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Offset of the cursor in the decompressed stream.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.consumed
    }

    /// Bytes available without refilling.
    #[inline]
    pub fn available(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Whether the input has been fully inflated.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Fraction of the raw input consumed so far.
    pub fn fraction_consumed(&self) -> f64 {
        if self.input_len == 0 {
            return 1.0;
        }
        self.source.position() as f64 / self.input_len as f64
    }

    /// Compact consumed bytes out of the buffer, then inflate more input
    /// into the tail.
    ///
    /// Returns the number of bytes produced; `0` means clean end of stream.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Inflate`] if the compressed stream is corrupt,
    /// [`DecodeError::MessageTooLarge`] if the buffer is full of
    /// unconsumed data.
    pub fn refill(&mut self) -> Result<usize> {
        self.compact();

        if self.eof {
            return Ok(0);
        }
        if self.end == self.buf.len() {
            return Err(DecodeError::MessageTooLarge(self.buf.len()));
        }

        let produced = loop {
            match self.source.read(&mut self.buf[self.end..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DecodeError::Inflate(e.to_string())),
            }
        };

        self.end += produced;
        if produced == 0 {
            self.eof = true;
        }

        let fraction = self.fraction_consumed();
        if let Some(progress) = self.progress.as_mut() {
            progress(fraction);
        }

        Ok(produced)
    }

    /// Refill until at least `n` bytes are available.
    ///
    /// Returns `false` if the stream ended first.
    pub fn fill(&mut self, n: usize) -> Result<bool> {
        if n > self.buf.len() {
            return Err(DecodeError::MessageTooLarge(n));
        }
        while self.end - self.start < n {
            if self.refill()? == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// First `n` available bytes, if present.
    #[inline]
    pub fn peek(&self, n: usize) -> Option<&[u8]> {
        self.available().get(..n)
    }

    /// Consume `n` bytes.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `n` bytes are available.
    #[inline]
    pub fn advance(&mut self, n: usize) {
        assert!(n <= self.end - self.start, "advance past end of buffer");
        self.start += n;
        self.consumed += n as u64;
    }

    /// Consume `n` bytes and return them.
    ///
    /// The slice stays valid until the next call that takes `&mut self`,
    /// since only [`refill`](Self::refill) moves data.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `n` bytes are available.
    #[inline]
    pub fn take(&mut self, n: usize) -> &[u8] {
        let start = self.start;
        self.advance(n);
        &self.buf[start..start + n]
    }

    fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        self.buf.copy_within(self.start..self.end, 0);
        self.end -= self.start;
        self.start = 0;
    }
}

impl<R: AsRef<[u8]>> fmt::Debug for InflateBuffer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InflateBuffer")
            .field("compressed", &self.compressed)
            .field("capacity", &self.buf.len())
            .field("available", &(self.end - self.start))
            .field("offset", &self.consumed)
            .field("eof", &self.eof)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn drain<R: AsRef<[u8]>>(buf: &mut InflateBuffer<R>) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let n = buf.available().len();
            out.extend_from_slice(buf.take(n));
            if buf.refill().unwrap() == 0 && buf.available().is_empty() {
                break;
            }
        }
        out
    }

    #[test]
    fn test_plain_passthrough() {
        let mut buf = InflateBuffer::new(b"plain text".to_vec());
        assert!(!buf.is_compressed());
        assert_eq!(drain(&mut buf), b"plain text");
    }

    #[test]
    fn test_gzip_detected_and_inflated() {
        let data: Vec<u8> = (0..10_000u32).flat_map(|i| i.to_be_bytes()).collect();
        let mut buf = InflateBuffer::new(gzip(&data));
        assert!(buf.is_compressed());
        assert_eq!(drain(&mut buf), data);
    }

    #[test]
    fn test_multi_member_gzip() {
        let mut input = gzip(b"first ");
        input.extend_from_slice(&gzip(b"second"));
        let mut buf = InflateBuffer::new(input);
        assert_eq!(drain(&mut buf), b"first second");
    }

    #[test]
    fn test_compaction_with_small_buffer() {
        let data: Vec<u8> = (0..255u8).cycle().take(5_000).collect();
        let mut buf = InflateBuffer::with_capacity(gzip(&data), 64);

        let mut out = Vec::new();
        while buf.fill(10).unwrap() {
            out.extend_from_slice(buf.take(10));
        }
        out.extend_from_slice(buf.available());

        assert_eq!(out, data);
        assert_eq!(buf.offset(), 5_000 - buf.available().len() as u64);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut buf = InflateBuffer::new(b"abcdef".to_vec());
        assert!(buf.fill(3).unwrap());
        assert_eq!(buf.peek(3), Some(&b"abc"[..]));
        assert_eq!(buf.peek(3), Some(&b"abc"[..]));
        buf.advance(2);
        assert_eq!(buf.peek(2), Some(&b"cd"[..]));
        assert_eq!(buf.offset(), 2);
    }

    #[test]
    fn test_message_too_large() {
        let mut buf = InflateBuffer::with_capacity(vec![0u8; 100], 16);
        assert!(matches!(buf.fill(17), Err(DecodeError::MessageTooLarge(17))));

        assert!(buf.fill(16).unwrap());
        assert!(matches!(buf.refill(), Err(DecodeError::MessageTooLarge(16))));
    }

    #[test]
    fn test_corrupt_gzip_is_inflate_error() {
        let mut input = gzip(&[7u8; 4096]);
        let len = input.len();
        for b in &mut input[10..len - 8] {
            *b = 0xff;
        }
        let mut buf = InflateBuffer::new(input);
        let mut result = Ok(1);
        while let Ok(n) = result {
            if n == 0 {
                break;
            }
            let available = buf.available().len();
            buf.advance(available);
            result = buf.refill();
        }
        assert!(matches!(result, Err(DecodeError::Inflate(_))));
    }

    #[test]
    fn test_progress_reaches_one() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut buf = InflateBuffer::new(gzip(&[1u8; 2048])).with_progress(move |f| {
            sink.borrow_mut().push(f);
        });
        drain(&mut buf);

        let seen = seen.borrow();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!((seen[seen.len() - 1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        let mut buf = InflateBuffer::new(Vec::new());
        assert!(!buf.fill(1).unwrap());
        assert_eq!(buf.refill().unwrap(), 0);
        assert!(buf.is_eof());
    }
}
