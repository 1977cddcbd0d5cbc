//! Consistency checks over a written DDF dataset.
//!
//! Verifies what the pipeline promises about its output: unique datapoint
//! keys, no identifier without an entity row (and no entity row nothing refers
//! to), the fixed concept table, and a rollup that matches the primary table.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::aggregate::aggregate_over_origin;
use crate::common::*;
use crate::ddf::{DdfDataset, concepts};
use crate::transform::{datapoint_key, find_duplicate};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: expected header {expected:?}, found {found:?}")]
    Header {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    DuplicateDatapointKey(String),
    DuplicateAggregateKey(String),
    DuplicateEntity { domain: &'static str, id: String },
    UndefinedId { domain: &'static str, id: String },
    UnusedEntity { domain: &'static str, id: String },
    ConceptTableMismatch,
    AggregateMismatch,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DuplicateDatapointKey(k) => write!(f, "duplicate datapoint key {k}"),
            Violation::DuplicateAggregateKey(k) => write!(f, "duplicate aggregated key {k}"),
            Violation::DuplicateEntity { domain, id } => {
                write!(f, "{domain} entity \"{id}\" is listed more than once")
            }
            Violation::UndefinedId { domain, id } => {
                write!(f, "{domain} \"{id}\" is used by datapoints but has no entity row")
            }
            Violation::UnusedEntity { domain, id } => {
                write!(f, "{domain} entity \"{id}\" is not used by any datapoint")
            }
            Violation::ConceptTableMismatch => {
                write!(f, "concept table differs from the fixed table")
            }
            Violation::AggregateMismatch => {
                write!(f, "aggregated datapoints do not match the sum over origins")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub violations: Vec<Violation>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

// ============================================================================
// Reading
// ============================================================================

fn read_table<T: DeserializeOwned>(path: &Path, header: &[&str]) -> Result<Vec<T>, CheckError> {
    let csv_err = |source| CheckError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(csv_err)?;

    let found: Vec<String> = rdr.headers().map_err(csv_err)?.iter().map(String::from).collect();
    if found != header {
        return Err(CheckError::Header {
            path: path.to_path_buf(),
            expected: header.iter().map(|h| h.to_string()).collect(),
            found,
        });
    }

    rdr.deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(csv_err)
}

fn read_entities(path: &Path, domain: &str) -> Result<Vec<Entity>, CheckError> {
    let rows: Vec<(String, String)> = read_table(path, &[domain, NAME])?;
    Ok(rows
        .into_iter()
        .map(|(id, name)| Entity { id, name })
        .collect())
}

/// Load every table of a dataset written by [`crate::writer::DdfWriter`].
pub fn read_dataset(dir: &Path) -> Result<DdfDataset, CheckError> {
    use crate::writer::{AGGREGATED_HEADER, CONCEPT_HEADER, DATAPOINT_HEADER};

    Ok(DdfDataset {
        datapoints: read_table(&dir.join(DATAPOINTS_FILE), &DATAPOINT_HEADER)?,
        aggregated: read_table(&dir.join(AGGREGATED_FILE), &AGGREGATED_HEADER)?,
        asylum_residence: read_entities(
            &dir.join(ASYLUM_RESIDENCE_ENTITIES_FILE),
            ASYLUM_RESIDENCE,
        )?,
        origin: read_entities(&dir.join(ORIGIN_ENTITIES_FILE), ORIGIN)?,
        displacement_type: read_entities(
            &dir.join(DISPLACEMENT_TYPE_ENTITIES_FILE),
            DISPLACEMENT_TYPE,
        )?,
        concepts: read_table(&dir.join(CONCEPTS_FILE), &CONCEPT_HEADER)?,
    })
}

// ============================================================================
// Checking
// ============================================================================

fn check_domain(
    domain: &'static str,
    entities: &[Entity],
    referenced: &BTreeSet<&str>,
    used: &BTreeSet<&str>,
    violations: &mut Vec<Violation>,
) {
    if let Some(id) = find_duplicate(entities.iter().map(|e| e.id.as_str())) {
        violations.push(Violation::DuplicateEntity {
            domain,
            id: id.to_string(),
        });
    }

    let defined: BTreeSet<&str> = entities.iter().map(|e| e.id.as_str()).collect();
    for id in referenced.difference(&defined) {
        violations.push(Violation::UndefinedId {
            domain,
            id: id.to_string(),
        });
    }
    for id in defined.difference(used) {
        violations.push(Violation::UnusedEntity {
            domain,
            id: id.to_string(),
        });
    }
}

pub fn check_dataset(dataset: &DdfDataset) -> CheckReport {
    let mut violations = Vec::new();

    if let Some((a, o, t, y)) = find_duplicate(dataset.datapoints.iter().map(datapoint_key)) {
        violations.push(Violation::DuplicateDatapointKey(format!("({a}, {o}, {t}, {y})")));
    }
    if let Some((a, t, y)) = find_duplicate(
        dataset
            .aggregated
            .iter()
            .map(|r| (r.asylum_residence.as_str(), r.displacement_type.as_str(), r.year)),
    ) {
        violations.push(Violation::DuplicateAggregateKey(format!("({a}, {t}, {y})")));
    }

    let asylum: BTreeSet<&str> = dataset
        .datapoints
        .iter()
        .map(|d| d.asylum_residence.as_str())
        .chain(dataset.aggregated.iter().map(|r| r.asylum_residence.as_str()))
        .collect();
    let origin: BTreeSet<&str> = dataset.datapoints.iter().map(|d| d.origin.as_str()).collect();
    let countries: BTreeSet<&str> = asylum.union(&origin).copied().collect();
    let displacement_types: BTreeSet<&str> = dataset
        .datapoints
        .iter()
        .map(|d| d.displacement_type.as_str())
        .chain(dataset.aggregated.iter().map(|r| r.displacement_type.as_str()))
        .collect();

    // Both country domains list the shared country table.
    check_domain(
        ASYLUM_RESIDENCE,
        &dataset.asylum_residence,
        &asylum,
        &countries,
        &mut violations,
    );
    check_domain(ORIGIN, &dataset.origin, &origin, &countries, &mut violations);
    check_domain(
        DISPLACEMENT_TYPE,
        &dataset.displacement_type,
        &displacement_types,
        &displacement_types,
        &mut violations,
    );

    if dataset.concepts != concepts() {
        violations.push(Violation::ConceptTableMismatch);
    }

    let mut aggregated = dataset.aggregated.clone();
    aggregated.sort();
    if aggregated != aggregate_over_origin(&dataset.datapoints) {
        violations.push(Violation::AggregateMismatch);
    }

    CheckReport { violations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::DdfWriter;

    fn entity(id: &str, name: &str) -> Entity {
        Entity {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn dp(asylum: &str, origin: &str, year: i32, n: u64) -> Datapoint {
        Datapoint {
            asylum_residence: asylum.to_string(),
            origin: origin.to_string(),
            displacement_type: "refugees".to_string(),
            year: Year(year),
            displaced_population: n,
        }
    }

    fn valid_dataset() -> DdfDataset {
        let datapoints = vec![dp("tcd", "sdn", 2000, 5), dp("tcd", "caf", 2000, 7)];
        let countries = vec![
            entity("caf", "Central African Rep."),
            entity("sdn", "Sudan"),
            entity("tcd", "Chad"),
        ];
        DdfDataset {
            aggregated: aggregate_over_origin(&datapoints),
            datapoints,
            asylum_residence: countries.clone(),
            origin: countries,
            displacement_type: vec![entity("refugees", "Refugees (incl. refugee-like situations)")],
            concepts: concepts(),
        }
    }

    #[test]
    fn test_valid_dataset() {
        assert!(check_dataset(&valid_dataset()).is_ok());
    }

    #[test]
    fn test_undefined_and_unused_ids() {
        let mut dataset = valid_dataset();
        dataset.origin.retain(|e| e.id != "caf");
        dataset.displacement_type.push(entity("returnees", "Returnees"));

        let report = check_dataset(&dataset);
        assert_eq!(
            report.violations,
            vec![
                Violation::UndefinedId {
                    domain: ORIGIN,
                    id: "caf".to_string()
                },
                Violation::UnusedEntity {
                    domain: DISPLACEMENT_TYPE,
                    id: "returnees".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_duplicate_keys() {
        let mut dataset = valid_dataset();
        dataset.datapoints.push(dp("tcd", "sdn", 2000, 1));
        let report = check_dataset(&dataset);
        assert!(report.violations.contains(&Violation::DuplicateDatapointKey(
            "(tcd, sdn, refugees, 2000)".to_string()
        )));
        assert!(report.violations.contains(&Violation::AggregateMismatch));
    }

    #[test]
    fn test_concepts_must_be_fixed() {
        let mut dataset = valid_dataset();
        dataset.concepts.pop();
        assert_eq!(
            check_dataset(&dataset).violations,
            vec![Violation::ConceptTableMismatch]
        );
    }

    #[test]
    fn test_read_back_written_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = valid_dataset();
        DdfWriter::new(dir.path()).write(&dataset).unwrap();

        let read = read_dataset(dir.path()).unwrap();
        assert_eq!(read, dataset);
    }

    #[test]
    fn test_read_rejects_wrong_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ORIGIN_ENTITIES_FILE);
        std::fs::write(&path, "asylum_residence,name\ntcd,Chad\n").unwrap();
        assert!(matches!(
            read_entities(&path, ORIGIN),
            Err(CheckError::Header { .. })
        ));
    }
}
