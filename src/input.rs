//! Buffered line input: one logical record's bytes at a time.
//!
//! A line is everything up to (not including) the next `\n`; one trailing
//! `\r` is stripped. Lines that are empty after stripping are skipped.

use memchr::memchr;
use std::io::BufRead;
use thiserror::Error;

/// Maximum length of a single input line in bytes.
pub const MAX_LINE: usize = 1 << 20;

/// Failures while pulling the next line from the source.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("line exceeds maximum length of {MAX_LINE} bytes")]
    LineTooLong,
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Pulls newline-delimited records out of a buffered byte source into a
/// reused line buffer.
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        LineReader {
            inner,
            buf: Vec::with_capacity(64 * 1024),
        }
    }

    /// Read the next non-empty line. Returns `None` at end of stream.
    /// The returned slice is valid until the next call.
    pub fn next_line(&mut self) -> Result<Option<&[u8]>, ReadError> {
        loop {
            self.buf.clear();
            let eof = self.fill_line()?;
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
            if self.buf.is_empty() {
                if eof {
                    return Ok(None);
                }
                continue;
            }
            if self.buf.len() > MAX_LINE {
                return Err(ReadError::LineTooLong);
            }
            return Ok(Some(&self.buf));
        }
    }

    /// Accumulate bytes up to the next `\n` (consumed, not stored).
    /// Returns true when the stream ended before a terminator.
    fn fill_line(&mut self) -> Result<bool, ReadError> {
        loop {
            let chunk = self.inner.fill_buf()?;
            if chunk.is_empty() {
                return Ok(true);
            }
            match memchr(b'\n', chunk) {
                Some(pos) => {
                    self.buf.extend_from_slice(&chunk[..pos]);
                    self.inner.consume(pos + 1);
                    return Ok(false);
                }
                None => {
                    let n = chunk.len();
                    self.buf.extend_from_slice(chunk);
                    self.inner.consume(n);
                    // One byte of slack for a trailing \r stripped later.
                    if self.buf.len() > MAX_LINE + 1 {
                        return Err(ReadError::LineTooLong);
                    }
                }
            }
        }
    }
}
