//! Uniform reservoir sampling (Algorithm R).
//!
//! Fill the reservoir with the first N passing rows; for each later row at
//! overall index i, draw j ∈ [0, i] and replace slot j iff j < N. Every row
//! of an M-row stream ends up retained with probability min(1, N/M).

use rand::rngs::ThreadRng;
use rand::Rng;

use crate::record::OwnedRecord;

pub struct Reservoir {
    size: usize,
    seen: u64,
    rows: Vec<OwnedRecord>,
    rng: ThreadRng,
}

impl Reservoir {
    /// The thread RNG is a ChaCha-based CSPRNG.
    pub fn new(size: usize) -> Self {
        Reservoir {
            size,
            seen: 0,
            rows: Vec::with_capacity(size.min(1024)),
            rng: rand::rng(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Offer one passing row. `make_row` runs only when the row is kept.
    pub fn offer<F>(&mut self, make_row: F)
    where
        F: FnOnce() -> OwnedRecord,
    {
        let index = self.seen;
        self.seen += 1;
        if self.rows.len() < self.size {
            self.rows.push(make_row());
            return;
        }
        let j = self.rng.random_range(0..=index);
        if j < self.size as u64 {
            self.rows[j as usize] = make_row();
        }
    }

    /// The retained rows in reservoir order (not input order).
    pub fn into_rows(self) -> Vec<OwnedRecord> {
        self.rows
    }
}
