use anyhow::{Context, Result};
use clap::Parser;
use pwtable::table::build::{BuildOptions, BuildOutcome, build_table};
use pwtable::table::TableReader;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pwtable")]
#[command(about = "Build a precomputed digest-to-password lookup table")]
#[command(version)]
struct Cli {
    /// Table path prefix; reads <PREFIX>.json, writes <PREFIX>.key and <PREFIX>.data
    prefix: PathBuf,

    /// Config file to use instead of <PREFIX>.json
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Walk the finished table and print its occupancy
    #[arg(long)]
    stats: bool,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    pwtable::logging::init(if cli.verbose { "debug" } else { "info" });

    let options = BuildOptions {
        config: cli.config,
        progress: !cli.no_progress,
    };
    let outcome = build_table(&cli.prefix, &options)?;
    print_outcome(&cli.prefix, &outcome);

    if cli.stats {
        show_stats(&cli.prefix)?;
    }
    Ok(())
}

fn print_outcome(prefix: &Path, outcome: &BuildOutcome) {
    let layout = &outcome.layout;
    println!("Table:            {}", prefix.display());
    println!("Digest:           {}", outcome.digest);
    println!("Rule size:        {}", outcome.rule_size);
    println!("Generated:        {}", outcome.report.generated);
    println!("Inserted:         {}", outcome.report.inserted);
    if outcome.report.skipped > 0 {
        println!("Duplicates:       {}", outcome.report.skipped);
    }
    println!("Blocks:           {}", outcome.stats.blocks);
    println!(
        "Layout:           {} buckets, {} records/block, {}-byte keys, {}-byte values",
        layout.bucket_count, layout.block_capacity, layout.key_prefix_width, layout.value_width
    );
}

fn show_stats(prefix: &Path) -> Result<()> {
    let reader = TableReader::open(prefix).context("Failed to reopen table")?;
    let summary = reader.summary().context("Failed to walk table")?;

    let used = summary.used_buckets as f64 / reader.bucket_count() as f64;
    println!();
    println!("Records:          {}", summary.records);
    println!("Used buckets:     {} ({:.1}%)", summary.used_buckets, used * 100.0);
    println!("Longest chain:    {}", summary.longest_chain);
    if summary.used_buckets > 0 {
        println!(
            "Mean chain:       {:.2}",
            summary.records as f64 / summary.used_buckets as f64
        );
    }
    Ok(())
}
