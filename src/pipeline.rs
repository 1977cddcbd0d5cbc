//! The whole conversion: load → resolve → transform → aggregate → write.
//!
//! Nothing is written until every table has been built and validated, so a
//! failed run leaves the previous output untouched.

use std::path::PathBuf;
use std::time::Instant;

use thiserror::Error;
use tracing::info;

use crate::aggregate::aggregate_over_origin;
use crate::common::Datapoint;
use crate::ddf::{DdfDataset, concepts, country_entities, displacement_type_entities};
use crate::loader::{LoadError, load_source};
use crate::resolver::{CountryMapping, PopulationTypeMapping, ResolveError};
use crate::synonyms::{SynonymError, SynonymSource};
use crate::transform::{TransformError, TransformOptions, TransformStats, transform};
use crate::writer::{DdfWriter, WriteError};

pub const DEFAULT_SOURCE_PATH: &str = "../source/unhcr_popstats_export_time_series_all_data.csv";
pub const DEFAULT_OUT_DIR: &str = "../../";

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("loading source: {0}")]
    Load(#[from] LoadError),

    #[error("fetching synonyms: {0}")]
    Synonyms(#[from] SynonymError),

    #[error("resolving identifiers: {0}")]
    Resolve(#[from] ResolveError),

    #[error("transforming: {0}")]
    Transform(#[from] TransformError),

    #[error("writing output: {0}")]
    Write(#[from] WriteError),
}

#[derive(Clone, Debug)]
pub struct EtlConfig {
    pub source_path: PathBuf,
    pub out_dir: PathBuf,
    pub transform: TransformOptions,
    /// Draw a progress bar while writing files.
    pub show_progress: bool,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(DEFAULT_SOURCE_PATH),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            transform: TransformOptions::default(),
            show_progress: false,
        }
    }
}

/// What a run did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub synonyms: usize,
    pub countries: usize,
    pub population_types: usize,
    pub transform: TransformStats,
    pub aggregated_rows: usize,
    pub country_entities: usize,
    pub displacement_type_entities: usize,
    pub written: Vec<PathBuf>,
}

/// Assemble every output table from cleaned datapoints.
pub fn build_dataset(
    datapoints: Vec<Datapoint>,
    countries: &CountryMapping,
    population_types: &PopulationTypeMapping,
) -> DdfDataset {
    let aggregated = aggregate_over_origin(&datapoints);
    let country_table = country_entities(&datapoints, countries);
    let displacement_type = displacement_type_entities(&datapoints, population_types);
    DdfDataset {
        datapoints,
        aggregated,
        asylum_residence: country_table.clone(),
        origin: country_table,
        displacement_type,
        concepts: concepts(),
    }
}

pub async fn run<S: SynonymSource>(
    config: &EtlConfig,
    synonyms: &S,
) -> Result<RunSummary, EtlError> {
    let pipeline_start = Instant::now();
    info!("Source: {}", config.source_path.display());
    info!("Output: {}", config.out_dir.display());

    // ── Step 1: Load ────────────────────────────────────────────────────
    info!("Step 1: Loading source and synonyms...");
    let records = load_source(&config.source_path)?;
    let synonym_table = synonyms.fetch_synonyms().await?;
    info!("  {} synonyms", synonym_table.len());

    // ── Step 2: Resolve identifiers ─────────────────────────────────────
    info!("Step 2: Resolving identifiers...");
    let countries = CountryMapping::build(&records, &synonym_table)?;
    let population_types = PopulationTypeMapping::build(&records)?;
    info!(
        "  {} country names, {} population types",
        countries.len(),
        population_types.len()
    );

    // ── Step 3: Transform ───────────────────────────────────────────────
    info!("Step 3: Building datapoints...");
    let (datapoints, stats) =
        transform(&records, &countries, &population_types, config.transform)?;

    // ── Step 4: Aggregate and describe ──────────────────────────────────
    info!("Step 4: Aggregating over origin...");
    let dataset = build_dataset(datapoints, &countries, &population_types);
    info!(
        "  {} aggregated rows, {} countries, {} displacement types",
        dataset.aggregated.len(),
        dataset.asylum_residence.len(),
        dataset.displacement_type.len()
    );

    // ── Step 5: Write ───────────────────────────────────────────────────
    info!("Step 5: Writing dataset...");
    let written = DdfWriter::new(&config.out_dir)
        .with_progress(config.show_progress)
        .write(&dataset)?;

    info!(
        "Done! {} files in {:.2?}",
        written.len(),
        pipeline_start.elapsed()
    );

    Ok(RunSummary {
        synonyms: synonym_table.len(),
        countries: countries.len(),
        population_types: population_types.len(),
        transform: stats,
        aggregated_rows: dataset.aggregated.len(),
        country_entities: dataset.asylum_residence.len(),
        displacement_type_entities: dataset.displacement_type.len(),
        written,
    })
}
