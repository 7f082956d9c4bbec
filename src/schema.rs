//! Header storage and selector resolution.

use thiserror::Error;

use crate::record::Record;

/// Selector resolution failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("column index out of range: {selector} (valid range 1-{columns})")]
    IndexOutOfRange { selector: String, columns: usize },
}

/// The first non-empty record, copied into long-lived storage. Lives for
/// the whole run; everything downstream binds against it once.
#[derive(Debug, Clone)]
pub struct Header {
    fields: Vec<Vec<u8>>,
    quoted: Vec<bool>,
}

impl Header {
    pub fn from_record(rec: &Record) -> Self {
        let mut fields = Vec::with_capacity(rec.len());
        let mut quoted = Vec::with_capacity(rec.len());
        for (field, was_quoted) in rec.iter() {
            fields.push(field.to_vec());
            quoted.push(was_quoted);
        }
        Header { fields, quoted }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, i: usize) -> &[u8] {
        &self.fields[i]
    }

    pub fn was_quoted(&self, i: usize) -> bool {
        self.quoted[i]
    }

    /// All header fields with their was-quoted bits, in input order.
    pub fn fields(&self) -> impl Iterator<Item = (&[u8], bool)> {
        self.fields
            .iter()
            .zip(self.quoted.iter())
            .map(|(f, &q)| (f.as_slice(), q))
    }

    /// Resolve one selector to a zero-based column index. An all-digit
    /// selector is a 1-based index and must be in range; anything else
    /// matches the first byte-equal header name.
    pub fn resolve(&self, selector: &str) -> Result<usize, ResolveError> {
        if !selector.is_empty() && selector.bytes().all(|b| b.is_ascii_digit()) {
            let index = selector.parse::<u64>().unwrap_or(u64::MAX);
            if index >= 1 && index <= self.fields.len() as u64 {
                return Ok(index as usize - 1);
            }
            return Err(ResolveError::IndexOutOfRange {
                selector: selector.to_string(),
                columns: self.fields.len(),
            });
        }
        self.fields
            .iter()
            .position(|f| f.as_slice() == selector.as_bytes())
            .ok_or_else(|| ResolveError::UnknownColumn(selector.to_string()))
    }

    /// Resolve a comma-separated selector list in declaration order.
    pub fn resolve_list(&self, selectors: &str) -> Result<Vec<usize>, ResolveError> {
        selectors.split(',').map(|s| self.resolve(s)).collect()
    }
}
