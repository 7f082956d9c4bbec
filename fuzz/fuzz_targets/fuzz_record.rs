#![no_main]
use libfuzzer_sys::fuzz_target;
use cq::record::RecordBuf;

// Feed arbitrary bytes to the record parser as one line. It must only
// ever return one of the closed error variants, never panic, and every
// reported field must resolve to a valid slice.
fuzz_target!(|data: &[u8]| {
    let mut buf = RecordBuf::new();
    if buf.parse(data).is_ok() {
        let rec = buf.record(data);
        for i in 0..rec.len() {
            let _ = rec.field(i);
            let _ = rec.was_quoted(i);
        }
    }
});
