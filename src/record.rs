//! Record parsing: one CSV line into field slices plus a was-quoted mask.
//!
//! `RecordBuf` owns three reused buffers (field spans, quoted mask, quote
//! scratch) and never allocates on the hot path once warm. Unquoted fields
//! and quoted fields without `""` escapes resolve to slices of the input
//! line; only escaped quoted fields are unescaped into the scratch buffer.

use memchr::memchr;
use thiserror::Error;

/// Maximum number of fields in a single record.
pub const MAX_FIELDS: usize = 4096;

/// The closed set of record parse failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    #[error("quoted field is missing its closing quote")]
    UnterminatedQuote,
    #[error("unexpected byte after closing quote")]
    MalformedQuotedField,
    #[error("record has more than {MAX_FIELDS} fields")]
    TooManyFields,
}

/// Which buffer a field's bytes live in.
#[derive(Debug, Clone, Copy)]
enum Src {
    Line,
    Scratch,
}

#[derive(Debug, Clone, Copy)]
struct Span {
    src: Src,
    start: u32,
    end: u32,
}

/// Reused parse state. `parse` fills the spans, the quoted mask, and (for
/// escaped fields) the scratch buffer; `record` resolves them into a
/// borrowing view valid until the next `parse`.
#[derive(Default)]
pub struct RecordBuf {
    spans: Vec<Span>,
    quoted: Vec<bool>,
    scratch: Vec<u8>,
}

impl RecordBuf {
    pub fn new() -> Self {
        RecordBuf::default()
    }

    /// Parse one line into fields. Outputs alias `line` or the internal
    /// scratch; neither survives the next call.
    pub fn parse(&mut self, line: &[u8]) -> Result<(), RecordError> {
        self.spans.clear();
        self.quoted.clear();
        self.scratch.clear();

        let mut i = 0usize;
        loop {
            if self.spans.len() == MAX_FIELDS {
                return Err(RecordError::TooManyFields);
            }
            let more = if line.get(i) == Some(&b'"') {
                let (next, more) = self.parse_quoted(line, i)?;
                i = next;
                more
            } else {
                let (next, more) = self.parse_unquoted(line, i);
                i = next;
                more
            };
            if !more {
                return Ok(());
            }
        }
    }

    /// A field starting at a `"`. Scans for the closing quote treating `""`
    /// as an escaped quote; the fast path slices the line, the slow path
    /// unescapes into scratch.
    fn parse_quoted(&mut self, line: &[u8], i: usize) -> Result<(usize, bool), RecordError> {
        debug_assert_eq!(line[i], b'"');
        let mut j = i + 1;
        let mut escaped = false;
        let close = loop {
            match memchr(b'"', &line[j..]) {
                None => return Err(RecordError::UnterminatedQuote),
                Some(off) => {
                    let q = j + off;
                    if line.get(q + 1) == Some(&b'"') {
                        escaped = true;
                        j = q + 2;
                    } else {
                        break q;
                    }
                }
            }
        };

        if !escaped {
            self.push(Src::Line, i + 1, close, true);
        } else {
            let start = self.scratch.len();
            // Every `"` inside the region is half of a doubled pair: copy
            // through the first of each pair, skip the second.
            let mut k = i + 1;
            while k < close {
                match memchr(b'"', &line[k..close]) {
                    None => {
                        self.scratch.extend_from_slice(&line[k..close]);
                        k = close;
                    }
                    Some(off) => {
                        let q = k + off;
                        self.scratch.extend_from_slice(&line[k..=q]);
                        k = q + 2;
                    }
                }
            }
            self.push(Src::Scratch, start, self.scratch.len(), true);
        }

        match line.get(close + 1) {
            None => Ok((close + 1, false)),
            Some(&b',') => Ok((close + 2, true)),
            Some(_) => Err(RecordError::MalformedQuotedField),
        }
    }

    /// A bare field: everything up to the next `,` or end of line.
    fn parse_unquoted(&mut self, line: &[u8], i: usize) -> (usize, bool) {
        match memchr(b',', &line[i..]) {
            Some(off) => {
                let end = i + off;
                self.push(Src::Line, i, end, false);
                (end + 1, true)
            }
            None => {
                self.push(Src::Line, i, line.len(), false);
                (line.len(), false)
            }
        }
    }

    fn push(&mut self, src: Src, start: usize, end: usize, quoted: bool) {
        self.spans.push(Span {
            src,
            start: start as u32,
            end: end as u32,
        });
        self.quoted.push(quoted);
    }

    /// Bytes written to the quote scratch by the last parse. Zero whenever
    /// the line contained no `""` escapes.
    pub fn scratch_used(&self) -> usize {
        self.scratch.len()
    }

    /// A borrowing view over the last parsed record.
    pub fn record<'a>(&'a self, line: &'a [u8]) -> Record<'a> {
        Record { line, buf: self }
    }
}

/// One parsed record: field slices plus the was-quoted mask. Valid until
/// the owning `RecordBuf` parses the next line.
#[derive(Clone, Copy)]
pub struct Record<'a> {
    line: &'a [u8],
    buf: &'a RecordBuf,
}

impl<'a> Record<'a> {
    pub fn len(&self) -> usize {
        self.buf.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.spans.is_empty()
    }

    /// Field `i`, or `None` past the end of the record.
    pub fn field(&self, i: usize) -> Option<&'a [u8]> {
        self.buf.spans.get(i).map(|span| {
            let (start, end) = (span.start as usize, span.end as usize);
            match span.src {
                Src::Line => &self.line[start..end],
                Src::Scratch => &self.buf.scratch[start..end],
            }
        })
    }

    /// Whether field `i` was surrounded by quotes in the source line.
    /// False past the end of the record.
    pub fn was_quoted(&self, i: usize) -> bool {
        self.buf.quoted.get(i).copied().unwrap_or(false)
    }

    /// All fields with their was-quoted bits, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a [u8], bool)> {
        let rec = *self;
        (0..rec.len()).filter_map(move |i| rec.field(i).map(|f| (f, rec.was_quoted(i))))
    }

    /// The record narrowed to `cols`, in selector order. Columns past the
    /// end of the record come out as empty unquoted fields.
    pub fn project<'c>(&self, cols: &'c [usize]) -> impl Iterator<Item = (&'a [u8], bool)> + 'c
    where
        'a: 'c,
    {
        let rec = *self;
        cols.iter()
            .map(move |&c| (rec.field(c).unwrap_or(&[]), rec.was_quoted(c)))
    }
}

/// A deep-copied record, used by the bounded operators (top-N, reservoir,
/// table sample) that must retain rows across parser invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedRecord {
    pub fields: Vec<Vec<u8>>,
    pub quoted: Vec<bool>,
}

impl OwnedRecord {
    /// Deep-copy a stream of (field, was_quoted) pairs.
    pub fn collect<'a, I: Iterator<Item = (&'a [u8], bool)>>(fields: I) -> Self {
        let mut rec = OwnedRecord::default();
        for (field, quoted) in fields {
            rec.fields.push(field.to_vec());
            rec.quoted.push(quoted);
        }
        rec
    }

    /// Cumulative field bytes, the unit of the table sample budget.
    pub fn byte_len(&self) -> usize {
        self.fields.iter().map(|f| f.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], bool)> {
        self.fields
            .iter()
            .zip(self.quoted.iter())
            .map(|(f, &q)| (f.as_slice(), q))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &[u8]) -> Result<(Vec<Vec<u8>>, Vec<bool>), RecordError> {
        let mut buf = RecordBuf::new();
        buf.parse(line)?;
        let rec = buf.record(line);
        let fields = (0..rec.len()).map(|i| rec.field(i).unwrap().to_vec()).collect();
        let quoted = (0..rec.len()).map(|i| rec.was_quoted(i)).collect();
        Ok((fields, quoted))
    }

    fn fields(line: &[u8]) -> Vec<Vec<u8>> {
        parse(line).unwrap().0
    }

    #[test]
    fn single_field() {
        assert_eq!(fields(b"hello"), vec![b"hello".to_vec()]);
    }

    #[test]
    fn plain_fields() {
        assert_eq!(
            fields(b"a,b,c"),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );
    }

    #[test]
    fn empty_middle_field() {
        assert_eq!(
            fields(b"a,,c"),
            vec![b"a".to_vec(), b"".to_vec(), b"c".to_vec()]
        );
    }

    #[test]
    fn trailing_comma_yields_empty_field() {
        assert_eq!(fields(b"a,b,"), vec![b"a".to_vec(), b"b".to_vec(), b"".to_vec()]);
    }

    #[test]
    fn leading_comma_yields_empty_field() {
        assert_eq!(fields(b",a"), vec![b"".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn quoted_field() {
        let (f, q) = parse(b"\"hello\",x").unwrap();
        assert_eq!(f, vec![b"hello".to_vec(), b"x".to_vec()]);
        assert_eq!(q, vec![true, false]);
    }

    #[test]
    fn quoted_field_with_comma() {
        assert_eq!(
            fields(b"\"a,b\",c"),
            vec![b"a,b".to_vec(), b"c".to_vec()]
        );
    }

    #[test]
    fn quoted_empty_field() {
        let (f, q) = parse(b"\"\"").unwrap();
        assert_eq!(f, vec![b"".to_vec()]);
        assert_eq!(q, vec![true]);
    }

    #[test]
    fn escaped_quote() {
        assert_eq!(fields(b"\"a\"\"b\""), vec![b"a\"b".to_vec()]);
    }

    #[test]
    fn escaped_quotes_only() {
        assert_eq!(fields(b"\"\"\"\""), vec![b"\"".to_vec()]);
    }

    #[test]
    fn escaped_quote_then_comma() {
        assert_eq!(
            fields(b"\"say \"\"hi\"\"\",next"),
            vec![b"say \"hi\"".to_vec(), b"next".to_vec()]
        );
    }

    #[test]
    fn quoted_trailing_comma() {
        assert_eq!(fields(b"\"a\","), vec![b"a".to_vec(), b"".to_vec()]);
    }

    #[test]
    fn unterminated_quote() {
        assert_eq!(parse(b"\"abc"), Err(RecordError::UnterminatedQuote));
    }

    #[test]
    fn unterminated_after_escape() {
        assert_eq!(parse(b"\"a\"\""), Err(RecordError::UnterminatedQuote));
    }

    #[test]
    fn garbage_after_closing_quote() {
        assert_eq!(parse(b"\"a\"x,b"), Err(RecordError::MalformedQuotedField));
    }

    #[test]
    fn quote_mid_field_is_literal() {
        // A quote that doesn't open the field is an ordinary byte.
        assert_eq!(fields(b"a\"b,c"), vec![b"a\"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn too_many_fields() {
        let line = vec![b','; MAX_FIELDS]; // MAX_FIELDS + 1 empty fields
        assert_eq!(parse(&line), Err(RecordError::TooManyFields));
    }

    #[test]
    fn exactly_max_fields() {
        let line = vec![b','; MAX_FIELDS - 1];
        assert_eq!(parse(&line).unwrap().0.len(), MAX_FIELDS);
    }

    #[test]
    fn fast_path_writes_no_scratch() {
        let mut buf = RecordBuf::new();
        buf.parse(b"plain,\"quoted, no escapes\",tail").unwrap();
        assert_eq!(buf.scratch_used(), 0);
    }

    #[test]
    fn slow_path_writes_scratch_only_for_escaped() {
        let mut buf = RecordBuf::new();
        buf.parse(b"\"a\"\"b\",\"plain\"").unwrap();
        assert_eq!(buf.scratch_used(), 3); // a"b
        let line = b"\"a\"\"b\",\"plain\"";
        buf.parse(line).unwrap();
        let rec = buf.record(line);
        assert_eq!(rec.field(0).unwrap(), b"a\"b");
        assert_eq!(rec.field(1).unwrap(), b"plain");
    }

    #[test]
    fn multiple_escaped_fields_share_scratch() {
        let line = b"\"x\"\"y\",\"p\"\"q\"";
        let mut buf = RecordBuf::new();
        buf.parse(line).unwrap();
        let rec = buf.record(line);
        assert_eq!(rec.field(0).unwrap(), b"x\"y");
        assert_eq!(rec.field(1).unwrap(), b"p\"q");
    }

    #[test]
    fn field_out_of_range_is_none() {
        let line = b"a,b";
        let mut buf = RecordBuf::new();
        buf.parse(line).unwrap();
        let rec = buf.record(line);
        assert_eq!(rec.field(2), None);
        assert!(!rec.was_quoted(2));
    }

    #[test]
    fn buffers_reset_between_parses() {
        let mut buf = RecordBuf::new();
        buf.parse(b"\"a\"\"b\",c,d").unwrap();
        let line = b"x";
        buf.parse(line).unwrap();
        let rec = buf.record(line);
        assert_eq!(rec.len(), 1);
        assert_eq!(rec.field(0).unwrap(), b"x");
        assert_eq!(buf.scratch_used(), 0);
    }

    #[test]
    fn project_fills_missing_with_empty() {
        let line = b"a,b";
        let mut buf = RecordBuf::new();
        buf.parse(line).unwrap();
        let rec = buf.record(line);
        let cols = [1, 5, 0];
        let got: Vec<(Vec<u8>, bool)> = rec
            .project(&cols)
            .map(|(f, q)| (f.to_vec(), q))
            .collect();
        assert_eq!(
            got,
            vec![
                (b"b".to_vec(), false),
                (b"".to_vec(), false),
                (b"a".to_vec(), false)
            ]
        );
    }

    #[test]
    fn owned_record_roundtrip() {
        let line = b"a,\"b,c\"";
        let mut buf = RecordBuf::new();
        buf.parse(line).unwrap();
        let owned = OwnedRecord::collect(buf.record(line).iter());
        assert_eq!(owned.fields, vec![b"a".to_vec(), b"b,c".to_vec()]);
        assert_eq!(owned.quoted, vec![false, true]);
        assert_eq!(owned.byte_len(), 4);
    }
}
