// src/zones/mod.rs
use std::{
    collections::{BTreeSet, HashMap},
    path::Path,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    csv_utils::{read_rows_from_lines, read_rows_from_path, split_header, Row},
    error::ControlResult,
};

/// A traffic analysis zone as described by the zone table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub taz: i32,
    pub planning_district: i32,
    pub puma: i32,
    pub base_year_population: f64,
}

impl Zone {
    /// Rows with fewer fields than this are skipped.
    pub const MINIMUM_ENTRIES: usize = 4;

    fn from_row(row: &Row, source_name: &str) -> ControlResult<Self> {
        Ok(Self {
            taz: row.parse(0, "TAZ", source_name)?,
            planning_district: row.parse(1, "PD", source_name)?,
            puma: row.parse(2, "PUMA", source_name)?,
            base_year_population: row.parse(3, "BaseYearPopulation", source_name)?,
        })
    }
}

/// Zones sorted by TAZ with dense indexes for zones and planning districts.
///
/// Built once from the zone table and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct ZoneSystem {
    zones: Vec<Zone>,
    taz_to_index: HashMap<i32, usize>,
    zone_to_pd: HashMap<usize, usize>,
    pd_to_zones: HashMap<usize, Vec<usize>>,
    number_of_pds: usize,
}

impl ZoneSystem {
    /// Load the zone table at `path` (`TAZ,PD,PUMA,BaseYearPopulation,...`).
    #[instrument(level = "info", skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path) -> ControlResult<Self> {
        let rows = read_rows_from_path(path)?;
        let system = Self::from_rows(rows, &path.display().to_string())?;
        info!(
            zones = system.number_of_zones(),
            pds = system.number_of_pds(),
            "loaded zone system"
        );
        Ok(system)
    }

    /// Build from in-memory lines; the first line is a header and is skipped.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> ControlResult<Self> {
        let rows = read_rows_from_lines(lines, "zone lines")?;
        Self::from_rows(rows, "zone lines")
    }

    fn from_rows(rows: Vec<Row>, source_name: &str) -> ControlResult<Self> {
        if rows.is_empty() {
            return Ok(Self::from_zones(Vec::new()));
        }
        let (_, data) = split_header(rows, source_name)?;
        let mut zones = Vec::with_capacity(data.len());
        for row in &data {
            if row.len() < Zone::MINIMUM_ENTRIES {
                debug!(line = row.line, fields = row.len(), "skipping short zone row");
                continue;
            }
            zones.push(Zone::from_row(row, source_name)?);
        }
        Ok(Self::from_zones(zones))
    }

    /// Index an already parsed set of zones.
    pub fn from_zones(mut zones: Vec<Zone>) -> Self {
        // stable, so duplicate TAZs keep their input order
        zones.sort_by_key(|z| z.taz);

        let mut taz_to_index = HashMap::with_capacity(zones.len());
        for (i, zone) in zones.iter().enumerate() {
            if taz_to_index.insert(zone.taz, i).is_some() {
                warn!(taz = zone.taz, "duplicate TAZ in zone table, last entry wins");
            }
        }

        let pd_to_index: HashMap<i32, usize> = zones
            .iter()
            .map(|z| z.planning_district)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .enumerate()
            .map(|(i, pd)| (pd, i))
            .collect();

        let zone_to_pd: HashMap<usize, usize> = zones
            .iter()
            .enumerate()
            .map(|(i, z)| (i, pd_to_index[&z.planning_district]))
            .collect();

        let mut pd_to_zones: HashMap<usize, Vec<usize>> = HashMap::new();
        for (zone_index, zone) in zones.iter().enumerate() {
            pd_to_zones
                .entry(pd_to_index[&zone.planning_district])
                .or_default()
                .push(zone_index);
        }

        Self {
            number_of_pds: pd_to_index.len(),
            zones,
            taz_to_index,
            zone_to_pd,
            pd_to_zones,
        }
    }

    /// Planning-district index of the zone at `zone_index`.
    #[inline]
    pub fn zone_index_to_pd_index(&self, zone_index: usize) -> Option<usize> {
        self.zone_to_pd.get(&zone_index).copied()
    }

    /// Index of the zone numbered `taz`.
    #[inline]
    pub fn taz_to_zone_index(&self, taz: i32) -> Option<usize> {
        self.taz_to_index.get(&taz).copied()
    }

    /// The zone at `zone_index`.
    ///
    /// # Panics
    /// If `zone_index` is out of range.
    #[inline]
    pub fn get_zone(&self, zone_index: usize) -> &Zone {
        &self.zones[zone_index]
    }

    pub fn zone_by_taz(&self, taz: i32) -> Option<&Zone> {
        self.taz_to_zone_index(taz).map(|i| &self.zones[i])
    }

    /// Zone indexes in the planning district `pd_index`, empty if unknown.
    pub fn zones_in_pd(&self, pd_index: usize) -> &[usize] {
        self.pd_to_zones
            .get(&pd_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All planning-district indexes, ascending.
    pub fn pd_indexes(&self) -> impl Iterator<Item = usize> {
        0..self.number_of_pds
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn number_of_zones(&self) -> usize {
        self.zones.len()
    }

    pub fn number_of_pds(&self) -> usize {
        self.number_of_pds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControlError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ZONES: [&str; 6] = [
        "TAZ,PD,PUMA,BaseYearPopulation",
        "30,7,100,250.5",
        "10,3,100,0",
        "20,7,101,1200",
        "40,3",
        "5,12,101,75",
    ];

    #[test]
    fn zones_are_sorted_and_indexed() {
        let system = ZoneSystem::from_lines(&ZONES).unwrap();
        assert_eq!(system.number_of_zones(), 4);
        let tazs: Vec<i32> = system.zones().iter().map(|z| z.taz).collect();
        assert_eq!(tazs, vec![5, 10, 20, 30]);
        assert_eq!(system.taz_to_zone_index(20), Some(2));
        assert_eq!(system.taz_to_zone_index(40), None);
        assert_eq!(system.get_zone(3).base_year_population, 250.5);
        assert_eq!(system.zone_by_taz(10).map(|z| z.puma), Some(100));
    }

    #[test]
    fn planning_districts_get_dense_ascending_indexes() {
        let system = ZoneSystem::from_lines(&ZONES).unwrap();
        assert_eq!(system.number_of_pds(), 3);
        // PDs 3, 7, 12 -> 0, 1, 2
        assert_eq!(system.zone_index_to_pd_index(0), Some(2)); // TAZ 5, PD 12
        assert_eq!(system.zone_index_to_pd_index(1), Some(0)); // TAZ 10, PD 3
        assert_eq!(system.zone_index_to_pd_index(9), None);
        assert_eq!(system.zones_in_pd(1), &[2, 3]);
        assert_eq!(system.zones_in_pd(0), &[1]);
        assert!(system.zones_in_pd(8).is_empty());
        assert_eq!(system.pd_indexes().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_taz_maps_to_last_entry() {
        let system =
            ZoneSystem::from_lines(&["TAZ,PD,PUMA,Pop", "1,1,1,10", "1,2,1,20"]).unwrap();
        assert_eq!(system.number_of_zones(), 2);
        assert_eq!(system.taz_to_zone_index(1), Some(1));
        assert_eq!(system.zone_by_taz(1).map(|z| z.base_year_population), Some(20.0));
    }

    #[test]
    fn bad_number_is_fatal() {
        let err = ZoneSystem::from_lines(&["TAZ,PD,PUMA,Pop", "1,x,1,10"]).unwrap_err();
        assert!(matches!(err, ControlError::InvalidNumber { ref column, .. } if column == "PD"));
    }

    #[test]
    fn loads_from_file() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "{}", ZONES.join("\n"))?;
        let system = ZoneSystem::load(file.path())?;
        assert_eq!(system.number_of_zones(), 4);
        Ok(())
    }
}
