//! Common types and constants used throughout the project.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Column and file names
// ============================================================================

pub const ASYLUM_RESIDENCE: &str = "asylum_residence";
pub const ORIGIN: &str = "origin";
pub const DISPLACEMENT_TYPE: &str = "displacement_type";
pub const DISPLACED_POPULATION: &str = "displaced_population";
pub const YEAR: &str = "year";
pub const NAME: &str = "name";

pub const DATAPOINTS_FILE: &str =
    "ddf--datapoints--displaced_population--by--asylum_residence--origin--displacement_type--year.csv";
pub const AGGREGATED_FILE: &str =
    "ddf--datapoints--displaced_population--by--asylum_residence--displacement_type--year.csv";
pub const ASYLUM_RESIDENCE_ENTITIES_FILE: &str = "ddf--entities--asylum_residence.csv";
pub const ORIGIN_ENTITIES_FILE: &str = "ddf--entities--origin.csv";
pub const DISPLACEMENT_TYPE_ENTITIES_FILE: &str = "ddf--entities--displacement_type.csv";
pub const CONCEPTS_FILE: &str = "ddf--concepts.csv";

/// UNHCR marks small counts it does not publish with this literal.
pub const SUPPRESSED_MARKER: &str = "*";

// ============================================================================
// Value NewTypes
// ============================================================================

/// Calendar year of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Year(pub i32);

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The population count cell of a source row.
///
/// The export distinguishes a suppressed count (`*`) from a cell that is
/// simply empty or not a number; only the former is ever substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Count(u64),
    Suppressed,
    Missing,
}

impl Measure {
    pub fn parse(cell: &str) -> Self {
        let cell = cell.trim();
        if cell == SUPPRESSED_MARKER {
            return Measure::Suppressed;
        }
        match cell.parse::<u64>() {
            Ok(n) => Measure::Count(n),
            Err(_) => Measure::Missing,
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// One row of the source export, as loaded. Country names and the population
/// type are kept verbatim; trimming happens at resolution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based line number in the source file, for error reporting.
    pub line: u64,
    pub year: Year,
    pub asylum_residence: String,
    pub origin: String,
    pub population_type: String,
    pub value: Measure,
}

/// A cleaned row of the primary datapoint table.
///
/// Field order and names are the column layout of [`DATAPOINTS_FILE`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Datapoint {
    pub asylum_residence: String,
    pub origin: String,
    pub displacement_type: String,
    pub year: Year,
    pub displaced_population: u64,
}

/// A row of the rollup over origins. Column layout of [`AGGREGATED_FILE`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregatedDatapoint {
    pub asylum_residence: String,
    pub displacement_type: String,
    pub year: Year,
    pub displaced_population: u64,
}

/// An entity: canonical identifier plus the human-readable name it came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Entity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptType {
    EntityDomain,
    Measure,
    Time,
    String,
}

/// A row of [`CONCEPTS_FILE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub concept: String,
    pub name: String,
    pub concept_type: ConceptType,
}
