//! Aligned table output with bounded width sampling.
//!
//! Column widths start from the header and are refined over a buffered
//! prefix of the data bounded by `SAMPLE_BYTES` of cumulative field bytes
//! (or the row cap, whichever comes first). After the sample flushes, rows
//! stream through with no further width adjustment.

use std::io::{self, Write};

use crate::record::OwnedRecord;

/// Cumulative field-byte budget for the width sample.
pub const SAMPLE_BYTES: usize = 1 << 20;

const COLUMN_SEP: &[u8] = b" | ";
const SEPARATOR_JOIN: &[u8] = b"-+-";

/// Display width of a field: the number of UTF-8 codepoints. Lead bytes
/// count one, continuation bytes count zero, malformed lead-position bytes
/// count one.
pub fn display_width(field: &[u8]) -> usize {
    field.iter().filter(|&&b| (b & 0xC0) != 0x80).count()
}

pub struct TableWriter<W> {
    out: W,
    show_header: bool,
    row_cap: Option<u64>,
    widths: Vec<usize>,
    header: Option<OwnedRecord>,
    sample: Vec<OwnedRecord>,
    sample_bytes: usize,
    flushed: bool,
}

impl<W: Write> TableWriter<W> {
    pub fn new(out: W, row_cap: Option<u64>, show_header: bool) -> Self {
        TableWriter {
            out,
            show_header,
            row_cap,
            widths: Vec::new(),
            header: None,
            sample: Vec::new(),
            sample_bytes: 0,
            flushed: false,
        }
    }

    /// Seed the width array from the header row. Nothing is emitted until
    /// the sample flushes.
    pub fn header<'a, I>(&mut self, fields: I)
    where
        I: Iterator<Item = (&'a [u8], bool)>,
    {
        let rec = OwnedRecord::collect(fields);
        self.widths = rec.fields.iter().map(|f| display_width(f)).collect();
        if self.show_header {
            self.header = Some(rec);
        }
    }

    /// Feed one data row: buffered (refining widths) until the sample
    /// budget or row cap is hit, streamed verbatim afterwards.
    pub fn row<'a, I>(&mut self, fields: I) -> io::Result<()>
    where
        I: Iterator<Item = (&'a [u8], bool)>,
    {
        if self.flushed {
            return self.write_aligned(fields);
        }
        let rec = OwnedRecord::collect(fields);
        // The width array is fixed at the header's column count; columns a
        // jagged row adds past it are emitted verbatim with no width.
        for (i, field) in rec.fields.iter().enumerate().take(self.widths.len()) {
            let w = display_width(field);
            if w > self.widths[i] {
                self.widths[i] = w;
            }
        }
        self.sample_bytes += rec.byte_len();
        self.sample.push(rec);
        let cap_hit = self
            .row_cap
            .is_some_and(|cap| self.sample.len() as u64 >= cap);
        if self.sample_bytes >= SAMPLE_BYTES || cap_hit {
            self.flush_sample()?;
        }
        Ok(())
    }

    /// Emit anything still buffered. Idempotent.
    pub fn finish(&mut self) -> io::Result<()> {
        if !self.flushed {
            self.flush_sample()?;
        }
        Ok(())
    }

    fn flush_sample(&mut self) -> io::Result<()> {
        if let Some(header) = self.header.take() {
            self.write_aligned(header.iter())?;
            self.write_separator()?;
        }
        let sample = std::mem::take(&mut self.sample);
        for rec in &sample {
            self.write_aligned(rec.iter())?;
        }
        self.flushed = true;
        Ok(())
    }

    fn write_aligned<'a, I>(&mut self, fields: I) -> io::Result<()>
    where
        I: Iterator<Item = (&'a [u8], bool)>,
    {
        for (i, (field, _)) in fields.enumerate() {
            if i > 0 {
                self.out.write_all(COLUMN_SEP)?;
            }
            self.out.write_all(field)?;
            let target = self.widths.get(i).copied().unwrap_or(0);
            let width = display_width(field);
            if width < target {
                write_run(&mut self.out, b' ', target - width)?;
            }
        }
        self.out.write_all(b"\n")
    }

    fn write_separator(&mut self) -> io::Result<()> {
        for (i, &width) in self.widths.iter().enumerate() {
            if i > 0 {
                self.out.write_all(SEPARATOR_JOIN)?;
            }
            write_run(&mut self.out, b'-', width)?;
        }
        self.out.write_all(b"\n")
    }
}

fn write_run<W: Write>(w: &mut W, byte: u8, mut n: usize) -> io::Result<()> {
    const CHUNK: usize = 64;
    let run = [byte; CHUNK];
    while n > 0 {
        let k = n.min(CHUNK);
        w.write_all(&run[..k])?;
        n -= k;
    }
    Ok(())
}
