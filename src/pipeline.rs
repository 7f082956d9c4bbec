//! Mode selection and the per-record processing loop.
//!
//! The core consumes a buffered byte source and a byte sink; argument
//! parsing, file opening, and exit codes live in the binary.

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

use crate::agg::{AggSpec, Aggregator};
use crate::filter::{self, FilterExpr, Predicate};
use crate::input::{LineReader, ReadError};
use crate::output::{self, Emitter};
use crate::record::{OwnedRecord, Record, RecordBuf};
use crate::sample::Reservoir;
use crate::schema::Header;
use crate::topn::TopN;

/// A fully parsed and validated invocation.
#[derive(Debug, Default)]
pub struct Options {
    /// Comma-separated selector list (`-s`).
    pub select: Option<String>,
    /// Conjunction of filter expressions (`-f`, repeatable).
    pub filters: Vec<FilterExpr>,
    /// Output row cap (`-n`/`--head`).
    pub head: Option<u64>,
    /// Ranking key selector (`--top`).
    pub top: Option<String>,
    /// Reservoir size (`--sample`).
    pub sample: Option<u64>,
    /// Aggregations (`--agg`, repeatable).
    pub aggs: Vec<AggSpec>,
    /// Aligned table output (`-t`).
    pub table: bool,
    /// Suppress the header row (`--no-header`).
    pub no_header: bool,
}

impl Options {
    /// No transform requested: nothing to parse, just copy bytes through.
    fn is_passthrough(&self) -> bool {
        self.select.is_none()
            && self.filters.is_empty()
            && self.top.is_none()
            && self.sample.is_none()
            && self.aggs.is_empty()
            && !self.table
    }
}

/// Run the pipeline: records from `input`, results to `out`. The caller
/// owns buffering and the final flush of `out`.
pub fn run<R: BufRead, W: Write>(opts: &Options, input: R, out: &mut W) -> Result<()> {
    if opts.is_passthrough() {
        return passthrough(input, out, opts.head, opts.no_header);
    }

    let mut reader = LineReader::new(input);
    let mut parser = RecordBuf::new();

    // Header is line 1; empty input produces no output at all.
    let header = {
        let Some(line) = reader.next_line().context("reading header")? else {
            return Ok(());
        };
        parser.parse(line).context("line 1")?;
        Header::from_record(&parser.record(line))
    };

    // Bind every selector, predicate, key, and aggregator field up front;
    // any failure names the offender and aborts before data is read.
    let select = opts
        .select
        .as_deref()
        .map(|list| header.resolve_list(list))
        .transpose()?;
    let predicates = opts
        .filters
        .iter()
        .map(|f| Ok(f.bind(header.resolve(&f.column)?)))
        .collect::<Result<Vec<Predicate>>>()?;
    let top_col = opts
        .top
        .as_deref()
        .map(|s| header.resolve(s))
        .transpose()?;
    let mut aggregators = opts
        .aggs
        .iter()
        .map(|s| Ok(Aggregator::new(s, header.resolve(&s.field)?)))
        .collect::<Result<Vec<Aggregator>>>()?;

    let show_header = !opts.no_header;
    let mut emitter = if opts.table {
        Emitter::table(out, opts.head, show_header)
    } else {
        Emitter::csv(out, show_header)
    };

    let mut lp = Loop {
        reader,
        parser,
        predicates,
        line_no: 1,
    };
    let select = select.as_deref();

    if let Some(col) = top_col {
        let limit = opts.head.unwrap_or(10) as usize;
        run_top(&mut lp, &header, select, col, limit, &mut emitter)?;
    } else if !aggregators.is_empty() {
        run_agg(&mut lp, &mut aggregators, &mut emitter)?;
    } else if let Some(n) = opts.sample {
        run_sample(&mut lp, &header, select, n as usize, &mut emitter)?;
    } else {
        run_stream(&mut lp, &header, select, opts.head, &mut emitter)?;
    }
    emitter.finish()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// The record loop
// ---------------------------------------------------------------------------

struct Loop<R> {
    reader: LineReader<R>,
    parser: RecordBuf,
    predicates: Vec<Predicate>,
    line_no: u64,
}

impl<R: BufRead> Loop<R> {
    /// Parse, filter, and hand each passing record to `f`; `f` returns
    /// false to stop early. A parse failure is fatal with its 1-based line
    /// number; an I/O failure on a subsequent line ends the stream quietly
    /// so already-produced output can flush.
    fn for_each(&mut self, mut f: impl FnMut(&Record) -> io::Result<bool>) -> Result<()> {
        loop {
            let line = match self.reader.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(()),
                Err(ReadError::Io(_)) => return Ok(()),
                Err(err @ ReadError::LineTooLong) => return Err(err.into()),
            };
            self.line_no += 1;
            self.parser
                .parse(line)
                .with_context(|| format!("line {}", self.line_no))?;
            let rec = self.parser.record(line);
            if !filter::matches_all(&self.predicates, &rec) {
                continue;
            }
            if !f(&rec)? {
                return Ok(());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

fn run_stream<R: BufRead, W: Write>(
    lp: &mut Loop<R>,
    header: &Header,
    select: Option<&[usize]>,
    head: Option<u64>,
    emitter: &mut Emitter<W>,
) -> Result<()> {
    emit_header(emitter, header, select)?;
    if head == Some(0) {
        return Ok(());
    }
    let mut emitted = 0u64;
    lp.for_each(|rec| {
        emit_record(emitter, rec, select)?;
        emitted += 1;
        Ok(head.is_none_or(|cap| emitted < cap))
    })
}

fn run_top<R: BufRead, W: Write>(
    lp: &mut Loop<R>,
    header: &Header,
    select: Option<&[usize]>,
    col: usize,
    limit: usize,
    emitter: &mut Emitter<W>,
) -> Result<()> {
    emit_header(emitter, header, select)?;
    let mut top = TopN::new(limit);
    lp.for_each(|rec| {
        let key = rec.field(col).unwrap_or(&[]);
        top.offer(key, || copy_projected(rec, select));
        Ok(true)
    })?;
    for row in top.into_rows() {
        emitter.row(row.iter())?;
    }
    Ok(())
}

fn run_sample<R: BufRead, W: Write>(
    lp: &mut Loop<R>,
    header: &Header,
    select: Option<&[usize]>,
    size: usize,
    emitter: &mut Emitter<W>,
) -> Result<()> {
    emit_header(emitter, header, select)?;
    let mut reservoir = Reservoir::new(size);
    lp.for_each(|rec| {
        reservoir.offer(|| copy_projected(rec, select));
        Ok(true)
    })?;
    for row in reservoir.into_rows() {
        emitter.row(row.iter())?;
    }
    Ok(())
}

fn run_agg<R: BufRead, W: Write>(
    lp: &mut Loop<R>,
    aggregators: &mut [Aggregator],
    emitter: &mut Emitter<W>,
) -> Result<()> {
    // Generated fields carry no was-quoted bit; quote them by the
    // minimal rule so labels with commas stay one column.
    emitter.header(
        aggregators
            .iter()
            .map(|a| (a.label().as_bytes(), output::needs_quoting(a.label().as_bytes()))),
    )?;
    lp.for_each(|rec| {
        for agg in aggregators.iter_mut() {
            agg.update(rec);
        }
        Ok(true)
    })?;
    for agg in aggregators.iter().filter(|a| a.tainted()) {
        eprintln!("warning: non-numeric value in {}", agg.label());
    }
    let mut values: Vec<Vec<u8>> = Vec::with_capacity(aggregators.len());
    for agg in aggregators.iter() {
        let mut buf = Vec::new();
        agg.render(&mut buf)?;
        values.push(buf);
    }
    emitter
        .row(
            values
                .iter()
                .map(|v| (v.as_slice(), output::needs_quoting(v))),
        )
        .map_err(Into::into)
}

// ---------------------------------------------------------------------------
// Fast pass-through
// ---------------------------------------------------------------------------

/// No transform requested. With no options at all this is a raw byte copy
/// (exact round trip); with a head cap or `--no-header` it goes line by
/// line: header first, then records verbatim until the cap.
fn passthrough<R: BufRead, W: Write>(
    mut input: R,
    out: &mut W,
    head: Option<u64>,
    no_header: bool,
) -> Result<()> {
    if head.is_none() && !no_header {
        io::copy(&mut input, out).context("copying input")?;
        return Ok(());
    }
    let mut reader = LineReader::new(input);
    let Some(line) = reader.next_line().context("reading header")? else {
        return Ok(());
    };
    if !no_header {
        out.write_all(line)?;
        out.write_all(b"\n")?;
    }
    let mut emitted = 0u64;
    while head.is_none_or(|cap| emitted < cap) {
        match reader.next_line() {
            Ok(Some(line)) => {
                out.write_all(line)?;
                out.write_all(b"\n")?;
                emitted += 1;
            }
            Ok(None) => break,
            Err(ReadError::Io(_)) => break,
            Err(err @ ReadError::LineTooLong) => return Err(err.into()),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Emission helpers
// ---------------------------------------------------------------------------

fn emit_header<W: Write>(
    emitter: &mut Emitter<W>,
    header: &Header,
    select: Option<&[usize]>,
) -> io::Result<()> {
    match select {
        Some(cols) => emitter.header(
            cols.iter()
                .map(|&c| (header.field(c), header.was_quoted(c))),
        ),
        None => emitter.header(header.fields()),
    }
}

fn emit_record<W: Write>(
    emitter: &mut Emitter<W>,
    rec: &Record,
    select: Option<&[usize]>,
) -> io::Result<()> {
    match select {
        Some(cols) => emitter.row(rec.project(cols)),
        None => emitter.row(rec.iter()),
    }
}

fn copy_projected(rec: &Record, select: Option<&[usize]>) -> OwnedRecord {
    match select {
        Some(cols) => OwnedRecord::collect(rec.project(cols)),
        None => OwnedRecord::collect(rec.iter()),
    }
}
