//! Field value helpers: numeric interpretation, key ordering, rendering.

use std::cmp::Ordering;
use std::io::{self, Write};

/// Parse a field as a number. Any byte sequence `f64::from_str` accepts
/// counts; everything else (including empty fields) is non-numeric.
pub fn parse_num(field: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(field).ok()?;
    text.parse::<f64>().ok()
}

/// Order two key fields: numeric when both parse as numbers, raw byte
/// order otherwise. Applied pairwise, so mixed columns have no single
/// consistent order.
pub fn key_cmp(a: &[u8], a_num: Option<f64>, b: &[u8], b_num: Option<f64>) -> Ordering {
    match (a_num, b_num) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// Write a computed numeric value. Integral values in `i64` range render
/// without a fractional part; others go through ryu. Strict `<` on the
/// upper bound: `i64::MAX` as f64 rounds up to 2^63, which doesn't fit.
pub fn write_num<W: Write>(w: &mut W, f: f64) -> io::Result<()> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        let mut buf = itoa::Buffer::new();
        return w.write_all(buf.format(f as i64).as_bytes());
    }
    let mut buf = ryu::Buffer::new();
    w.write_all(buf.format(f).as_bytes())
}
