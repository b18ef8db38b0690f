use std::collections::BTreeMap;

use super::{scale, ControlRecord, SYNTHETIC_ID};

/// Average base-year controls per PUMA.
///
/// Each column of the returned record is `scale(sum, 1 / n)` over the `n`
/// zones of that PUMA, so the mean is rounded with the same policy used for
/// forecast scaling. Region and TAZ are set to [`SYNTHETIC_ID`].
pub fn compute_averages(records: &[ControlRecord]) -> BTreeMap<i32, ControlRecord> {
    let mut groups: BTreeMap<i32, Vec<&ControlRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.puma).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(puma, group)| (puma, group_average(puma, &group)))
        .collect()
}

fn group_average(puma: i32, group: &[&ControlRecord]) -> ControlRecord {
    let factor = 1.0 / group.len() as f64;
    let width = group
        .iter()
        .map(|r| r.additional_controls.len())
        .max()
        .unwrap_or(0);

    let mut households = 0i64;
    let mut population = 0i64;
    let mut additional = vec![0i64; width];
    for record in group {
        households += record.total_households;
        population += record.total_population;
        for (sum, value) in additional.iter_mut().zip(&record.additional_controls) {
            *sum += value;
        }
    }

    ControlRecord {
        region: SYNTHETIC_ID,
        puma,
        taz: SYNTHETIC_ID,
        total_households: scale(households, factor),
        total_population: scale(population, factor),
        additional_controls: additional.into_iter().map(|s| scale(s, factor)).collect(),
    }
}
