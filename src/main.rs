use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, BufReader, BufWriter, Write};

use cq::pipeline::Options;

/// Stream CSV from stdin: project, filter, rank, sample, or aggregate.
#[derive(Parser)]
#[command(
    name = "cq",
    about = "A streaming CSV processor for shell pipelines",
    version
)]
struct Cli {
    /// Columns to keep, comma-separated (header names or 1-based indexes)
    #[arg(short = 's', long = "select", value_name = "COLS")]
    select: Option<String>,

    /// Keep rows matching "field op value"; op is one of = != < > <= >= ~
    #[arg(short = 'f', long = "filter", value_name = "EXPR", action = clap::ArgAction::Append)]
    filter: Vec<String>,

    /// Limit output to N rows (10 when N is omitted)
    #[arg(
        short = 'n',
        long = "head",
        value_name = "N",
        num_args = 0..=1,
        default_missing_value = "10"
    )]
    head: Option<u64>,

    /// Rank rows descending by this column; --head bounds the count
    #[arg(long = "top", value_name = "COL")]
    top: Option<String>,

    /// Keep a uniform random sample of N rows
    #[arg(long = "sample", value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    sample: Option<u64>,

    /// Aggregate a column as func:field; func is sum, min, max, count, or mean
    #[arg(long = "agg", value_name = "FUNC:FIELD", action = clap::ArgAction::Append)]
    agg: Vec<String>,

    /// Aligned table output
    #[arg(short = 't', long = "table")]
    table: bool,

    /// Suppress the header row in output
    #[arg(long = "no-header")]
    no_header: bool,
}

/// Cross-check flag combinations and compile the filter and aggregation
/// expressions. Incompatible combinations are diagnosed here, never
/// silently ignored.
fn build_options(cli: &Cli) -> Result<Options> {
    if !cli.agg.is_empty() {
        if cli.top.is_some() {
            bail!("--agg cannot be combined with --top");
        }
        if cli.head.is_some() {
            bail!("--agg cannot be combined with --head");
        }
    }
    if cli.sample.is_some() {
        if cli.top.is_some() {
            bail!("--sample cannot be combined with --top");
        }
        if !cli.agg.is_empty() {
            bail!("--sample cannot be combined with --agg");
        }
        if cli.head.is_some() {
            bail!("--sample cannot be combined with --head");
        }
    }
    if cli.top.is_some() {
        let limit = cli.head.unwrap_or(10);
        if limit > 10_000 {
            bail!("--top supports a --head of at most 10000 (got {limit})");
        }
    }

    let filters = cli
        .filter
        .iter()
        .map(|f| cq::filter::parse(f))
        .collect::<Result<Vec<_>>>()?;
    let aggs = cli
        .agg
        .iter()
        .map(|a| cq::agg::parse(a))
        .collect::<Result<Vec<_>>>()?;

    Ok(Options {
        select: cli.select.clone(),
        filters,
        head: cli.head,
        top: cli.top.clone(),
        sample: cli.sample,
        aggs,
        table: cli.table,
        no_header: cli.no_header,
    })
}

fn run(cli: &Cli) -> Result<()> {
    let opts = build_options(cli)?;

    let stdin = io::stdin().lock();
    let input = BufReader::with_capacity(256 * 1024, stdin);
    let stdout = io::stdout().lock();
    let mut out = BufWriter::with_capacity(128 * 1024, stdout);

    // Flush explicitly on both paths: rows already emitted stay emitted
    // even when a later line is fatal.
    let result = cq::pipeline::run(&opts, input, &mut out);
    let flushed = out.flush().context("flushing output");
    result?;
    flushed
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("cq: {err:#}");
        std::process::exit(1);
    }
}
