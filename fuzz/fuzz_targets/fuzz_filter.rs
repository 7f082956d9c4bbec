#![no_main]
use libfuzzer_sys::fuzz_target;

// Feed arbitrary UTF-8 strings to the filter-expression parser.
// Catches panics on odd operator placement and slicing mistakes.
fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = cq::filter::parse(s);
    }
});
