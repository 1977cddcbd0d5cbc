//! Inspect a written DDF dataset: table sizes, sample rows, and the
//! consistency checks from [`unhcr_ddf::check`].
//!
//! ## Usage
//!
//! ```sh
//! cargo run --release --bin inspect -- --ddf-dir ../..
//! cargo run --release --bin inspect -- --ddf-dir out --sample-rows 10
//! ```

use std::path::PathBuf;

use clap::Parser;
use unhcr_ddf::check::{check_dataset, read_dataset};
use unhcr_ddf::common::Entity;

#[derive(Parser, Debug)]
#[command(about = "Inspect and check a DDF dataset")]
struct Args {
    /// Directory holding the DDF csv files.
    #[arg(long)]
    ddf_dir: PathBuf,

    /// Number of sample rows to print per table (0 to skip).
    #[arg(long, default_value_t = 5)]
    sample_rows: usize,
}

fn print_entities(title: &str, entities: &[Entity], sample_rows: usize) {
    println!("┌─ {title}: {} entities", entities.len());
    for e in entities.iter().take(sample_rows) {
        println!("│  {:<24} {}", e.id, e.name);
    }
    println!("└");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let dataset = read_dataset(&args.ddf_dir)?;

    let years = dataset.datapoints.iter().map(|d| d.year);
    let year_range = match (years.clone().min(), years.max()) {
        (Some(lo), Some(hi)) => format!("{lo}–{hi}"),
        _ => "(empty)".to_string(),
    };
    let total: u64 = dataset
        .datapoints
        .iter()
        .map(|d| d.displaced_population)
        .sum();

    // ── Overview ──────────────────────────────────────────────────────────
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Dataset: {}", args.ddf_dir.display());
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Datapoints:         {:>10}", dataset.datapoints.len());
    println!("║  Aggregated rows:    {:>10}", dataset.aggregated.len());
    println!("║  Countries:          {:>10}", dataset.asylum_residence.len());
    println!("║  Displacement types: {:>10}", dataset.displacement_type.len());
    println!("║  Years:              {year_range:>10}");
    println!("║  Population (sum):   {total:>10}");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    // ── Tables ────────────────────────────────────────────────────────────
    if args.sample_rows > 0 {
        let n = dataset.datapoints.len();
        println!("┌─ Datapoints (first {} of {n})", args.sample_rows.min(n));
        for d in dataset.datapoints.iter().take(args.sample_rows) {
            println!(
                "│  {:<12} {:<12} {:<28} {} {:>10}",
                d.asylum_residence, d.origin, d.displacement_type, d.year, d.displaced_population
            );
        }
        println!("└");

        print_entities("Countries", &dataset.asylum_residence, args.sample_rows);
        print_entities("Displacement types", &dataset.displacement_type, args.sample_rows);
        println!();
    }

    // ── Checks ────────────────────────────────────────────────────────────
    let report = check_dataset(&dataset);
    if report.is_ok() {
        println!("All checks passed.");
        return Ok(());
    }

    println!("{} problem(s):", report.violations.len());
    for v in &report.violations {
        println!("  - {v}");
    }
    Err(format!("{} consistency violations", report.violations.len()).into())
}
