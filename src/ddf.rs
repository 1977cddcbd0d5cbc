//! Entity and concept tables describing the datapoint files.

use std::collections::{BTreeMap, BTreeSet};

use crate::common::{
    ASYLUM_RESIDENCE, AggregatedDatapoint, Concept, ConceptType, DISPLACED_POPULATION,
    DISPLACEMENT_TYPE, Datapoint, Entity, NAME, ORIGIN, YEAR,
};
use crate::resolver::{CountryMapping, PopulationTypeMapping};

/// Every table of one DDF dataset, in memory.
///
/// `asylum_residence` and `origin` hold the same country table when produced
/// by the pipeline; they are separate so a dataset read back from disk can be
/// checked file by file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DdfDataset {
    pub datapoints: Vec<Datapoint>,
    pub aggregated: Vec<AggregatedDatapoint>,
    pub asylum_residence: Vec<Entity>,
    pub origin: Vec<Entity>,
    pub displacement_type: Vec<Entity>,
    pub concepts: Vec<Concept>,
}

/// The concept table. Independent of the data.
pub fn concepts() -> Vec<Concept> {
    [
        (ASYLUM_RESIDENCE, "Country / territory of asylum/residence", ConceptType::EntityDomain),
        (ORIGIN, "Origin", ConceptType::EntityDomain),
        (DISPLACEMENT_TYPE, "Displacement Type", ConceptType::EntityDomain),
        (DISPLACED_POPULATION, "Displaced Population", ConceptType::Measure),
        (YEAR, "Year", ConceptType::Time),
        (NAME, "Name", ConceptType::String),
        ("domain", "Domain", ConceptType::String),
    ]
    .into_iter()
    .map(|(concept, name, concept_type)| Concept {
        concept: concept.to_string(),
        name: name.to_string(),
        concept_type,
    })
    .collect()
}

/// Pick one display name per id out of `(name, id)` pairs that arrive in
/// name order, keeping only ids in `used`. The first name wins.
fn entities_for<'a>(
    pairs: impl Iterator<Item = (&'a str, &'a str)>,
    used: &BTreeSet<&str>,
) -> Vec<Entity> {
    let mut by_id: BTreeMap<&str, &str> = BTreeMap::new();
    for (name, id) in pairs {
        if used.contains(id) {
            by_id.entry(id).or_insert(name);
        }
    }
    by_id
        .into_iter()
        .map(|(id, name)| Entity {
            id: id.to_string(),
            name: name.to_string(),
        })
        .collect()
}

/// The country table shared by the `asylum_residence` and `origin` domains:
/// every id appearing in either country column of the datapoints.
pub fn country_entities(datapoints: &[Datapoint], countries: &CountryMapping) -> Vec<Entity> {
    let used: BTreeSet<&str> = datapoints
        .iter()
        .flat_map(|d| [d.asylum_residence.as_str(), d.origin.as_str()])
        .collect();
    entities_for(countries.iter(), &used)
}

pub fn displacement_type_entities(
    datapoints: &[Datapoint],
    population_types: &PopulationTypeMapping,
) -> Vec<Entity> {
    let used: BTreeSet<&str> = datapoints
        .iter()
        .map(|d| d.displacement_type.as_str())
        .collect();
    entities_for(population_types.iter(), &used)
}
