#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

use cq::pipeline::{self, Options};

// Run whole fuzz inputs through the streaming pipeline under a few fixed
// option sets. Errors are fine; panics and hangs are not.
fuzz_target!(|data: &[u8]| {
    let configs = [
        Options::default(),
        Options {
            select: Some("1".to_string()),
            head: Some(3),
            ..Options::default()
        },
        Options {
            top: Some("1".to_string()),
            head: Some(2),
            ..Options::default()
        },
    ];
    for opts in configs {
        let mut out = Vec::new();
        let _ = pipeline::run(&opts, Cursor::new(data), &mut out);
    }
});
