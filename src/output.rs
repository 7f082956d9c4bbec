//! Delimited output: minimal quoting, was-quoted preservation, and the
//! row sink shared by every mode.
//!
//! Writes fields directly to a `Write` sink with no intermediate `String`.

use memchr::{memchr, memchr2};
use std::io::{self, Write};

use crate::table::TableWriter;

/// True iff the field must be quoted under the minimal-quoting rule.
pub fn needs_quoting(field: &[u8]) -> bool {
    memchr2(b',', b'"', field).is_some() || memchr2(b'\n', b'\r', field).is_some()
}

/// Write one field with enclosing quotes, doubling inner quotes.
fn write_quoted<W: Write>(w: &mut W, field: &[u8]) -> io::Result<()> {
    w.write_all(b"\"")?;
    let mut start = 0;
    while let Some(off) = memchr(b'"', &field[start..]) {
        let q = start + off;
        w.write_all(&field[start..=q])?;
        w.write_all(b"\"")?;
        start = q + 1;
    }
    w.write_all(&field[start..])?;
    w.write_all(b"\"")
}

/// Emit a field under the minimal-quoting rule: quoted iff it contains
/// `,`, `"`, `\n`, or `\r`.
pub fn write_field<W: Write>(w: &mut W, field: &[u8]) -> io::Result<()> {
    if needs_quoting(field) {
        write_quoted(w, field)
    } else {
        w.write_all(field)
    }
}

/// Re-emit a field in its original form: originally-quoted fields are
/// re-quoted, originally-unquoted fields are written raw.
pub fn write_field_preserving<W: Write>(
    w: &mut W,
    field: &[u8],
    was_quoted: bool,
) -> io::Result<()> {
    if was_quoted {
        write_quoted(w, field)
    } else {
        w.write_all(field)
    }
}

/// Write a comma-joined, newline-terminated row of (field, was_quoted)
/// pairs.
pub fn write_row<'a, W, I>(w: &mut W, fields: I) -> io::Result<()>
where
    W: Write,
    I: Iterator<Item = (&'a [u8], bool)>,
{
    for (i, (field, quoted)) in fields.enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        write_field_preserving(w, field, quoted)?;
    }
    w.write_all(b"\n")
}

/// The row sink every mode writes through: delimited or aligned table.
pub enum Emitter<W: Write> {
    Csv { out: W, show_header: bool },
    Table(TableWriter<W>),
}

impl<W: Write> Emitter<W> {
    pub fn csv(out: W, show_header: bool) -> Self {
        Emitter::Csv { out, show_header }
    }

    pub fn table(out: W, row_cap: Option<u64>, show_header: bool) -> Self {
        Emitter::Table(TableWriter::new(out, row_cap, show_header))
    }

    /// Feed the header row. The table sink always consumes it to seed its
    /// widths; emission is governed by `show_header`.
    pub fn header<'a, I>(&mut self, fields: I) -> io::Result<()>
    where
        I: Iterator<Item = (&'a [u8], bool)>,
    {
        match self {
            Emitter::Csv { out, show_header } => {
                if *show_header {
                    write_row(out, fields)?;
                }
                Ok(())
            }
            Emitter::Table(table) => {
                table.header(fields);
                Ok(())
            }
        }
    }

    /// Feed one data row.
    pub fn row<'a, I>(&mut self, fields: I) -> io::Result<()>
    where
        I: Iterator<Item = (&'a [u8], bool)>,
    {
        match self {
            Emitter::Csv { out, .. } => write_row(out, fields),
            Emitter::Table(table) => table.row(fields),
        }
    }

    /// Flush anything still buffered (the table width sample).
    pub fn finish(&mut self) -> io::Result<()> {
        match self {
            Emitter::Csv { .. } => Ok(()),
            Emitter::Table(table) => table.finish(),
        }
    }
}
