//! Bounded top-N selection over a key column.
//!
//! Keeps at most `limit` candidates. Under capacity, incoming rows are
//! deep-copied and appended; at capacity, a linear scan finds the current
//! minimum and the incoming row replaces it only when its key is strictly
//! greater. For the limits this tool allows (≤ 10,000) the linear scan
//! beats a heap on cache locality.

use std::cmp::Ordering;

use crate::record::OwnedRecord;
use crate::value;

struct Candidate {
    row: OwnedRecord,
    key: Vec<u8>,
    key_num: Option<f64>,
}

pub struct TopN {
    limit: usize,
    rows: Vec<Candidate>,
}

impl TopN {
    pub fn new(limit: usize) -> Self {
        TopN {
            limit,
            rows: Vec::with_capacity(limit.min(1024)),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Offer one passing row. `make_row` runs only when the row is kept,
    /// so rejected rows cost no copy.
    pub fn offer<F>(&mut self, key: &[u8], make_row: F)
    where
        F: FnOnce() -> OwnedRecord,
    {
        if self.limit == 0 {
            return;
        }
        let key_num = value::parse_num(key);
        if self.rows.len() < self.limit {
            self.rows.push(Candidate {
                row: make_row(),
                key: key.to_vec(),
                key_num,
            });
            return;
        }

        let mut min = 0;
        for i in 1..self.rows.len() {
            if cmp(&self.rows[i], &self.rows[min]) == Ordering::Less {
                min = i;
            }
        }
        let against = &self.rows[min];
        if value::key_cmp(key, key_num, &against.key, against.key_num) == Ordering::Greater {
            self.rows[min] = Candidate {
                row: make_row(),
                key: key.to_vec(),
                key_num,
            };
        }
    }

    /// The retained rows in descending key order; ties keep insertion
    /// order.
    pub fn into_rows(mut self) -> Vec<OwnedRecord> {
        sort_descending(&mut self.rows);
        self.rows.into_iter().map(|c| c.row).collect()
    }
}

fn cmp(a: &Candidate, b: &Candidate) -> Ordering {
    value::key_cmp(&a.key, a.key_num, &b.key, b.key_num)
}

/// Stable insertion sort, descending. The pairwise key order is not
/// transitive across mixed numeric/string columns, which std's sort
/// rejects at runtime.
fn sort_descending(rows: &mut [Candidate]) {
    for i in 1..rows.len() {
        let mut j = i;
        while j > 0 && cmp(&rows[j - 1], &rows[j]) == Ordering::Less {
            rows.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> OwnedRecord {
        OwnedRecord {
            fields: fields.iter().map(|f| f.as_bytes().to_vec()).collect(),
            quoted: vec![false; fields.len()],
        }
    }

    fn keys_of(rows: &[OwnedRecord]) -> Vec<String> {
        rows.iter()
            .map(|r| String::from_utf8(r.fields[0].clone()).unwrap())
            .collect()
    }

    fn run(limit: usize, keys: &[&str]) -> Vec<String> {
        let mut top = TopN::new(limit);
        for &k in keys {
            top.offer(k.as_bytes(), || row(&[k]));
        }
        keys_of(&top.into_rows())
    }

    #[test]
    fn under_capacity_keeps_everything() {
        assert_eq!(run(10, &["3", "1", "2"]), vec!["3", "2", "1"]);
    }

    #[test]
    fn numeric_descending_order() {
        assert_eq!(run(2, &["9", "8", "10", "7"]), vec!["10", "9"]);
    }

    #[test]
    fn numeric_order_beats_byte_order() {
        // Byte order would rank "9" above "10".
        assert_eq!(run(1, &["9", "10"]), vec!["10"]);
    }

    #[test]
    fn equal_keys_are_not_replaced() {
        // Replacement needs strictly greater, so the earliest of the tied
        // keys beyond the cutoff survives.
        assert_eq!(run(1, &["5", "5", "5"]), vec!["5"]);
        let mut top = TopN::new(1);
        top.offer(b"5", || row(&["5", "first"]));
        top.offer(b"5", || row(&["5", "second"]));
        let rows = top.into_rows();
        assert_eq!(rows[0].fields[1], b"first");
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut top = TopN::new(3);
        top.offer(b"5", || row(&["5", "a"]));
        top.offer(b"5", || row(&["5", "b"]));
        top.offer(b"9", || row(&["9", "c"]));
        let rows = top.into_rows();
        assert_eq!(rows[0].fields[1], b"c");
        assert_eq!(rows[1].fields[1], b"a");
        assert_eq!(rows[2].fields[1], b"b");
    }

    #[test]
    fn string_keys_sort_lexicographically() {
        assert_eq!(run(2, &["pear", "apple", "zebra"]), vec!["zebra", "pear"]);
    }

    #[test]
    fn rejected_rows_are_not_copied() {
        let mut top = TopN::new(1);
        top.offer(b"9", || row(&["9"]));
        top.offer(b"3", || panic!("low row must not be copied"));
        assert_eq!(keys_of(&top.into_rows()), vec!["9"]);
    }

    #[test]
    fn zero_limit_keeps_nothing() {
        let mut top = TopN::new(0);
        top.offer(b"9", || panic!("limit 0 must never copy"));
        assert!(top.into_rows().is_empty());
    }

    #[test]
    fn replacement_scans_full_buffer() {
        assert_eq!(
            run(3, &["5", "1", "3", "2", "4", "6"]),
            vec!["6", "5", "4"]
        );
    }

    #[test]
    fn mixed_keys_compare_pairwise() {
        // "x" vs numbers falls back to byte order pairwise.
        let got = run(2, &["1", "x", "2"]);
        assert_eq!(got.len(), 2);
        assert!(got.contains(&"x".to_string()));
    }
}
