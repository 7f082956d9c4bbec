/// Streaming-behavior tests: early termination, reader limits, and parse
/// failures observed through the binary.
use std::io::Write;
use std::process::{Command, Stdio};

fn spawn(args: &[&str]) -> std::process::Child {
    Command::new(env!("CARGO_BIN_EXE_cq"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn cq")
}

/// Run cq feeding `input`, tolerating the process exiting before the whole
/// input is written (head-style queries stop reading mid-stream).
fn run_partial_consumer(args: &[&str], input: &[u8]) -> (i32, Vec<u8>, String) {
    let mut child = spawn(args);
    let mut stdin = child.stdin.take().unwrap();
    // The process may exit (closing the pipe) before it consumes all of
    // this; a broken pipe here is expected, not a failure.
    let _ = stdin.write_all(input);
    drop(stdin);
    let output = child.wait_with_output().expect("failed to wait for cq");
    (
        output.status.code().unwrap_or(-1),
        output.stdout,
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

#[test]
fn head_exits_without_reading_to_eof() {
    // Write a header and two rows, then keep stdin open. With a head cap
    // of one, cq must emit and exit while the stream is still live; this
    // test hangs if the cap fails to stop the read loop.
    let mut child = spawn(&["-n", "1"]);
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"h\nrow1\nrow2\n").unwrap();
    stdin.flush().unwrap();

    let output = {
        let status = child.wait().expect("failed to wait for cq");
        assert!(status.success());
        let mut out = Vec::new();
        use std::io::Read;
        child.stdout.take().unwrap().read_to_end(&mut out).unwrap();
        out
    };
    drop(stdin); // only closed after the process already exited
    assert_eq!(output, b"h\nrow1\n");
}

#[test]
fn top_mode_reads_the_whole_stream() {
    // Ranking cannot early-terminate: the best row may be last.
    let mut input = String::from("v\n");
    for i in 0..5000 {
        input.push_str(&format!("{i}\n"));
    }
    let (code, stdout, _) = run_partial_consumer(&["--top", "v", "-n", "1"], input.as_bytes());
    assert_eq!(code, 0);
    assert_eq!(stdout, b"v\n4999\n");
}

#[test]
fn line_too_long_fails_midstream() {
    let mut input = Vec::from(&b"a,b\nok,1\n"[..]);
    input.extend(std::iter::repeat(b'x').take((1 << 20) + 1));
    input.push(b'\n');
    let (code, _, stderr) = run_partial_consumer(&["-s", "a"], &input);
    assert_ne!(code, 0);
    assert!(stderr.contains("maximum length"), "stderr: {stderr}");
}

#[test]
fn line_at_exactly_one_mib_is_accepted() {
    let mut field = vec![b'y'; 1 << 20];
    field[3] = b','; // two fields, still exactly 1 MiB of line
    let mut input = Vec::from(&b"a,b\n"[..]);
    input.extend_from_slice(&field);
    input.push(b'\n');
    let (code, stdout, stderr) = run_partial_consumer(&["-s", "a"], &input);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert_eq!(stdout.len(), "a\n".len() + 3 + 1); // header + "yyy" + newline
}

#[test]
fn too_many_fields_names_the_line() {
    let mut input = String::from("a,b\n1,2\n");
    input.push_str(&",".repeat(4096)); // 4097 fields
    input.push('\n');
    let (code, _, stderr) = run_partial_consumer(&["-s", "a"], input.as_bytes());
    assert_ne!(code, 0);
    assert!(stderr.contains("line 3"), "stderr: {stderr}");
    assert!(stderr.contains("4096"), "stderr: {stderr}");
}

#[test]
fn malformed_quote_names_the_line() {
    let (code, _, stderr) =
        run_partial_consumer(&["-s", "a"], b"a,b\n\"ok\",1\n\"bad\"x,2\n");
    assert_ne!(code, 0);
    assert!(stderr.contains("line 3"), "stderr: {stderr}");
}

#[test]
fn output_before_a_parse_error_is_flushed() {
    // Rows emitted before the failing line must still reach stdout.
    let (code, stdout, _) = run_partial_consumer(&["-s", "a"], b"a\nfirst\n\"broken\n");
    assert_ne!(code, 0);
    assert_eq!(stdout, b"a\nfirst\n");
}

#[test]
fn large_stream_aggregates_in_constant_shape() {
    // 100k rows through the aggregator: one header line, one value line.
    let mut input = String::from("n\n");
    for i in 0..100_000u64 {
        input.push_str(&format!("{i}\n"));
    }
    let (code, stdout, _) = run_partial_consumer(&["--agg", "sum:n"], input.as_bytes());
    assert_eq!(code, 0);
    assert_eq!(stdout, b"sum(n)\n4999950000\n");
}
