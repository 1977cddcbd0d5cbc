//! Rollup of the primary table over origins.

use std::collections::BTreeMap;

use crate::common::{AggregatedDatapoint, Datapoint, Year};

/// Sum `displaced_population` per (asylum_residence, displacement_type, year).
///
/// Output is sorted by that key.
pub fn aggregate_over_origin(datapoints: &[Datapoint]) -> Vec<AggregatedDatapoint> {
    let mut groups: BTreeMap<(&str, &str, Year), u64> = BTreeMap::new();
    for d in datapoints {
        *groups
            .entry((d.asylum_residence.as_str(), d.displacement_type.as_str(), d.year))
            .or_default() += d.displaced_population;
    }

    groups
        .into_iter()
        .map(
            |((asylum_residence, displacement_type, year), displaced_population)| {
                AggregatedDatapoint {
                    asylum_residence: asylum_residence.to_string(),
                    displacement_type: displacement_type.to_string(),
                    year,
                    displaced_population,
                }
            },
        )
        .collect()
}
