//! Converts the UNHCR population statistics export into a DDF dataset.
//!
//! ## Input
//!
//! - the latin-1 time-series export (three preamble lines, then a CSV header)
//! - the open-numbers geo synonym table, fetched over HTTP unless a local
//!   snapshot is given with `--synonyms-file`
//!
//! ## Output
//!
//! Written to `--out-dir`:
//! - `ddf--datapoints--displaced_population--by--asylum_residence--origin--displacement_type--year.csv`
//! - `ddf--datapoints--displaced_population--by--asylum_residence--displacement_type--year.csv`
//! - `ddf--entities--asylum_residence.csv`, `ddf--entities--origin.csv`
//! - `ddf--entities--displacement_type.csv`
//! - `ddf--concepts.csv`
//!
//! ## Usage
//!
//! ```sh
//! cd etl/scripts && cargo run --release --bin etl
//! cargo run --release --bin etl -- --source popstats.csv --out-dir out --synonyms-file synonyms.csv
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use unhcr_ddf::pipeline::{DEFAULT_OUT_DIR, DEFAULT_SOURCE_PATH, EtlConfig, RunSummary, run};
use unhcr_ddf::synonyms::{DEFAULT_SYNONYMS_URL, FileSynonyms, SynonymClient, SynonymClientConfig};
use unhcr_ddf::transform::{DEFAULT_SUPPRESSED_VALUE, TransformOptions};

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(about = "Convert the UNHCR population statistics export into a DDF dataset")]
struct Args {
    /// Path to the UNHCR time-series export.
    #[arg(long, default_value = DEFAULT_SOURCE_PATH)]
    source: PathBuf,

    /// Directory the DDF files are written to.
    #[arg(long, default_value = DEFAULT_OUT_DIR)]
    out_dir: PathBuf,

    /// URL of the `synonym,geo` table.
    #[arg(long, default_value = DEFAULT_SYNONYMS_URL)]
    synonyms_url: String,

    /// Read the synonym table from a local file instead of fetching it.
    #[arg(long)]
    synonyms_file: Option<PathBuf>,

    /// Timeout for a single synonym request, in seconds.
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Value written for suppressed (`*`) counts.
    #[arg(long, default_value_t = DEFAULT_SUPPRESSED_VALUE)]
    suppressed_value: u64,

    /// Drop suppressed counts instead of substituting them.
    #[arg(long, default_value_t = false)]
    drop_suppressed: bool,
}

fn log_summary(summary: &RunSummary) {
    let t = &summary.transform;
    info!("Summary:");
    info!("  Source rows:          {}", t.rows_in);
    info!("  Duplicates dropped:   {}", t.duplicates_dropped);
    info!("  Suppressed replaced:  {}", t.suppressed_substituted);
    info!("  Missing dropped:      {}", t.missing_dropped);
    info!("  Datapoints:           {}", t.rows_out);
    info!("  Aggregated rows:      {}", summary.aggregated_rows);
    info!("  Countries:            {}", summary.country_entities);
    info!("  Displacement types:   {}", summary.displacement_type_entities);
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let config = EtlConfig {
        source_path: args.source,
        out_dir: args.out_dir,
        transform: TransformOptions {
            suppressed_value: (!args.drop_suppressed).then_some(args.suppressed_value),
        },
        show_progress: true,
    };

    let summary = match args.synonyms_file {
        Some(path) => {
            info!("Synonyms: {}", path.display());
            run(&config, &FileSynonyms { path }).await?
        }
        None => {
            info!("Synonyms: {}", args.synonyms_url);
            let client = SynonymClient::new(SynonymClientConfig {
                url: args.synonyms_url,
                request_timeout: Duration::from_secs(args.request_timeout_secs),
                ..Default::default()
            })?;
            run(&config, &client).await?
        }
    };

    log_summary(&summary);
    Ok(())
}
