//! Streaming aggregation: `sum`, `min`, `max`, `count`, `mean` with a
//! taint bit for non-numeric input.

use anyhow::{bail, Result};
use std::io::{self, Write};

use crate::record::Record;
use crate::value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Sum,
    Min,
    Max,
    Count,
    Mean,
}

impl AggFunc {
    pub fn name(self) -> &'static str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Count => "count",
            AggFunc::Mean => "mean",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(AggFunc::Sum),
            "min" => Some(AggFunc::Min),
            "max" => Some(AggFunc::Max),
            "count" => Some(AggFunc::Count),
            "mean" => Some(AggFunc::Mean),
            _ => None,
        }
    }
}

/// An `--agg` expression before column binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggSpec {
    pub func: AggFunc,
    pub field: String,
}

/// Parse `func:field`. The split is at the first colon, so the field name
/// may itself contain colons.
pub fn parse(expr: &str) -> Result<AggSpec> {
    let Some((func_name, field)) = expr.split_once(':') else {
        bail!("invalid aggregation (expected func:field): {expr}");
    };
    let Some(func) = AggFunc::from_name(func_name) else {
        bail!("invalid aggregation function: {func_name}");
    };
    if field.is_empty() {
        bail!("invalid aggregation (empty field): {expr}");
    }
    Ok(AggSpec {
        func,
        field: field.to_string(),
    })
}

/// Running state for one aggregator: 48 bytes of accumulators, independent
/// of input size.
pub struct Aggregator {
    func: AggFunc,
    col: usize,
    label: String,
    total: f64,
    extreme: f64,
    count: u64,
    tainted: bool,
}

impl Aggregator {
    pub fn new(spec: &AggSpec, col: usize) -> Self {
        Aggregator {
            func: spec.func,
            col,
            label: format!("{}({})", spec.func.name(), spec.field),
            total: 0.0,
            extreme: 0.0,
            count: 0,
            tainted: false,
        }
    }

    /// The output column header, `<func>(<field>)`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tainted(&self) -> bool {
        self.tainted
    }

    /// Fold one record in. Missing fields behave as empty ones.
    pub fn update(&mut self, rec: &Record) {
        let field = rec.field(self.col).unwrap_or(&[]);
        if self.func == AggFunc::Count {
            if !field.is_empty() {
                self.count += 1;
            }
            return;
        }
        let Some(v) = value::parse_num(field) else {
            self.tainted = true;
            return;
        };
        match self.func {
            AggFunc::Sum | AggFunc::Mean => {
                self.total += v;
                self.count += 1;
            }
            AggFunc::Min => {
                if self.count == 0 || v < self.extreme {
                    self.extreme = v;
                }
                self.count += 1;
            }
            AggFunc::Max => {
                if self.count == 0 || v > self.extreme {
                    self.extreme = v;
                }
                self.count += 1;
            }
            AggFunc::Count => unreachable!("handled above"),
        }
    }

    /// Render the final value. Tainted non-count aggregators render empty;
    /// the caller owns the accompanying warning.
    pub fn render<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self.func {
            AggFunc::Count => {
                let mut buf = itoa::Buffer::new();
                w.write_all(buf.format(self.count).as_bytes())
            }
            _ if self.tainted => Ok(()),
            AggFunc::Sum => value::write_num(w, self.total),
            AggFunc::Mean => {
                let mean = if self.count == 0 {
                    0.0
                } else {
                    self.total / self.count as f64
                };
                value::write_num(w, mean)
            }
            AggFunc::Min | AggFunc::Max => {
                let v = if self.count == 0 { 0.0 } else { self.extreme };
                value::write_num(w, v)
            }
        }
    }
}
