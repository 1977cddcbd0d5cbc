//! Resolution of free-text source labels to DDF identifiers.
//!
//! Country names go through the geo synonym table and then a short list of
//! manual overrides for territories and pseudo-origins the synonym table does
//! not know. There is no fallback guess: a name found in neither is an error.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::debug;

use crate::common::RawRecord;
use crate::synonyms::SynonymTable;

/// Names the synonym table does not cover, with their identifiers.
pub const MANUAL_OVERRIDES: [(&str, &str); 5] = [
    ("Serbia and Kosovo (S/RES/1244 (1999))", "srb"),
    ("Bonaire", "bonaire"),
    ("Stateless", "stateless"),
    ("Various/Unknown", "various_unknown"),
    ("Tibetan", "tibetan"),
];

/// The one population type whose identifier is not its slug.
pub const REFUGEES_LABEL: &str = "Refugees (incl. refugee-like situations)";
pub const REFUGEES_ID: &str = "refugees";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no identifier for country \"{0}\" in the synonym table or the manual overrides")]
    NotFound(String),

    #[error("population type \"{0}\" has no usable identifier")]
    UnresolvableLabel(String),
}

/// Convert a label into identifier form: lowercase, every run of
/// non-alphanumeric characters collapsed to one `_`, no leading or trailing `_`.
pub fn to_concept_id(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_sep = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

// ============================================================================
// Country mapping
// ============================================================================

/// Trimmed country name → geo identifier, for every name in the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryMapping {
    by_name: BTreeMap<String, String>,
}

impl CountryMapping {
    /// Resolve every distinct name in either country column. Asylum and origin
    /// share one namespace.
    pub fn build(records: &[RawRecord], synonyms: &SynonymTable) -> Result<Self, ResolveError> {
        let names: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| [r.asylum_residence.trim(), r.origin.trim()])
            .collect();

        let mut by_name = BTreeMap::new();
        for name in names {
            let id = synonyms
                .get(name)
                .or_else(|| override_for(name))
                .ok_or_else(|| ResolveError::NotFound(name.to_string()))?;
            by_name.insert(name.to_string(), id.to_string());
        }

        debug!("Resolved {} country names", by_name.len());
        Ok(Self { by_name })
    }

    pub fn resolve(&self, name: &str) -> Result<&str, ResolveError> {
        self.by_name
            .get(name.trim())
            .map(String::as_str)
            .ok_or_else(|| ResolveError::NotFound(name.trim().to_string()))
    }

    /// `(name, id)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_name.iter().map(|(n, i)| (n.as_str(), i.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn override_for(name: &str) -> Option<&'static str> {
    MANUAL_OVERRIDES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, id)| *id)
}

// ============================================================================
// Population type mapping
// ============================================================================

/// Population type label → displacement type identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationTypeMapping {
    by_label: BTreeMap<String, String>,
}

impl PopulationTypeMapping {
    pub fn build(records: &[RawRecord]) -> Result<Self, ResolveError> {
        let labels: BTreeSet<&str> = records.iter().map(|r| r.population_type.as_str()).collect();

        let mut by_label = BTreeMap::new();
        for label in labels {
            let id = if label == REFUGEES_LABEL {
                REFUGEES_ID.to_string()
            } else {
                to_concept_id(label)
            };
            if id.is_empty() {
                return Err(ResolveError::UnresolvableLabel(label.to_string()));
            }
            by_label.insert(label.to_string(), id);
        }

        debug!("Resolved {} population types", by_label.len());
        Ok(Self { by_label })
    }

    pub fn resolve(&self, label: &str) -> Result<&str, ResolveError> {
        self.by_label
            .get(label)
            .map(String::as_str)
            .ok_or_else(|| ResolveError::UnresolvableLabel(label.to_string()))
    }

    /// `(label, id)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_label.iter().map(|(l, i)| (l.as_str(), i.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }
}
