//! Turns loaded source rows into the primary datapoint table.

use std::collections::BTreeSet;
use std::collections::HashSet;
use std::hash::Hash;

use thiserror::Error;
use tracing::{info, warn};

use crate::common::{Datapoint, Measure, RawRecord, Year};
use crate::resolver::{CountryMapping, PopulationTypeMapping, ResolveError};

/// Value written in place of a suppressed (`*`) count unless configured otherwise.
pub const DEFAULT_SUPPRESSED_VALUE: u64 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(
        "duplicate datapoint key (asylum_residence={asylum_residence}, origin={origin}, \
         displacement_type={displacement_type}, year={year})"
    )]
    DuplicateKey {
        asylum_residence: String,
        origin: String,
        displacement_type: String,
        year: Year,
    },
}

impl TransformError {
    fn duplicate(key: (&str, &str, &str, Year)) -> Self {
        let (asylum_residence, origin, displacement_type, year) = key;
        TransformError::DuplicateKey {
            asylum_residence: asylum_residence.to_string(),
            origin: origin.to_string(),
            displacement_type: displacement_type.to_string(),
            year,
        }
    }
}

/// Row counts observed while transforming, for the run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub rows_in: usize,
    pub duplicates_dropped: usize,
    pub suppressed_substituted: usize,
    pub missing_dropped: usize,
    pub rows_out: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOptions {
    /// Replacement for suppressed counts; `None` drops them like missing values.
    pub suppressed_value: Option<u64>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            suppressed_value: Some(DEFAULT_SUPPRESSED_VALUE),
        }
    }
}

/// Returns the first key that occurs more than once.
pub fn find_duplicate<K, I>(keys: I) -> Option<K>
where
    K: Eq + Hash,
    I: IntoIterator<Item = K>,
{
    let mut seen = HashSet::new();
    for key in keys {
        if seen.contains(&key) {
            return Some(key);
        }
        seen.insert(key);
    }
    None
}

fn raw_key(r: &RawRecord) -> (&str, &str, &str, Year) {
    (
        r.asylum_residence.trim(),
        r.origin.trim(),
        r.population_type.as_str(),
        r.year,
    )
}

/// Keep the first row for each (asylum_residence, origin, population type, year).
///
/// The export is known to contain exact duplicate rows for some keys.
// FIXME: drop this once the upstream export no longer repeats rows.
pub fn deduplicate(records: &[RawRecord]) -> Vec<&RawRecord> {
    let mut seen = BTreeSet::new();
    records.iter().filter(|r| seen.insert(raw_key(*r))).collect()
}

/// Build the sorted, cleaned datapoint table.
pub fn transform(
    records: &[RawRecord],
    countries: &CountryMapping,
    population_types: &PopulationTypeMapping,
    options: TransformOptions,
) -> Result<(Vec<Datapoint>, TransformStats), TransformError> {
    let mut stats = TransformStats {
        rows_in: records.len(),
        ..Default::default()
    };

    let unique = deduplicate(records);
    stats.duplicates_dropped = records.len() - unique.len();
    if stats.duplicates_dropped > 0 {
        warn!("  Dropped {} duplicate source rows", stats.duplicates_dropped);
    }
    if let Some(key) = find_duplicate(unique.iter().copied().map(raw_key)) {
        return Err(TransformError::duplicate(key));
    }

    let mut datapoints = Vec::with_capacity(unique.len());
    for r in unique {
        let asylum_residence = countries.resolve(&r.asylum_residence)?;
        let origin = countries.resolve(&r.origin)?;
        let displacement_type = population_types.resolve(&r.population_type)?;

        let displaced_population = match r.value {
            Measure::Count(n) => n,
            Measure::Suppressed => match options.suppressed_value {
                Some(v) => {
                    stats.suppressed_substituted += 1;
                    v
                }
                None => {
                    stats.missing_dropped += 1;
                    continue;
                }
            },
            Measure::Missing => {
                stats.missing_dropped += 1;
                continue;
            }
        };

        datapoints.push(Datapoint {
            asylum_residence: asylum_residence.to_string(),
            origin: origin.to_string(),
            displacement_type: displacement_type.to_string(),
            year: r.year,
            displaced_population,
        });
    }

    datapoints.sort();

    // Two spellings resolving to the same id would collide here.
    if let Some(key) = find_duplicate(datapoints.iter().map(datapoint_key)) {
        return Err(TransformError::duplicate(key));
    }

    stats.rows_out = datapoints.len();
    info!(
        "  {} datapoints ({} suppressed substituted, {} missing dropped)",
        stats.rows_out, stats.suppressed_substituted, stats.missing_dropped
    );
    Ok((datapoints, stats))
}

pub fn datapoint_key(d: &Datapoint) -> (&str, &str, &str, Year) {
    (
        d.asylum_residence.as_str(),
        d.origin.as_str(),
        d.displacement_type.as_str(),
        d.year,
    )
}
