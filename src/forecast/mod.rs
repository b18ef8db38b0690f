// src/forecast/mod.rs
use rayon::prelude::*;
use std::{collections::BTreeMap, path::Path, time::Instant};
use tracing::{debug, info, instrument};

use crate::{
    controls::{compute_averages, scale, ControlRecord, ControlTable},
    error::{ControlError, ControlResult},
    output::copy_atomically,
    report::Reporter,
    zones::ZoneSystem,
};

pub mod population;

pub use population::ForecastPopulation;

/// Zones with at most this many base-year residents use their PUMA's average.
pub const DEFAULT_MIN_BASE_POPULATION: f64 = 50.0;

/// Which base-year record a forecast row was scaled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleSource {
    /// The zone's own base-year record.
    Direct,
    /// The average record of the zone's PUMA.
    PumaAverage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScaledZone {
    pub record: ControlRecord,
    pub source: ScaleSource,
    pub factor: f64,
}

/// Forecast-year controls, one record per base-year record, in input order.
#[derive(Debug, Clone, Default)]
pub struct ForecastControls {
    pub table: ControlTable,
    pub direct: usize,
    pub fallback: usize,
}

impl ForecastControls {
    /// Write the TAZ control file, then copy it verbatim to the MAZ path.
    ///
    /// No finer-grained MAZ model exists, so both files carry the same rows.
    pub fn write(&self, taz_path: &Path, maz_path: &Path) -> ControlResult<()> {
        self.table.write(taz_path)?;
        copy_atomically(taz_path, maz_path)?;
        debug!(taz = %taz_path.display(), maz = %maz_path.display(), "wrote TAZ and MAZ controls");
        Ok(())
    }
}

/// Scale `source` by `factor`, stamping the given TAZ and region.
///
/// A row whose scaled population is not positive is written as all zeros; a
/// populated row always keeps at least one household.
pub fn scale_record(source: &ControlRecord, factor: f64, taz: i32, region: i32) -> ControlRecord {
    let population = scale(source.total_population, factor);
    let (total_households, total_population, additional_controls) = if population > 0 {
        (
            scale(source.total_households, factor).max(1),
            population,
            source
                .additional_controls
                .iter()
                .map(|&v| scale(v, factor))
                .collect(),
        )
    } else {
        (0, 0, vec![0; source.additional_controls.len()])
    };

    ControlRecord {
        region,
        puma: source.puma,
        taz,
        total_households,
        total_population,
        additional_controls,
    }
}

/// Scales base-year zone controls to a forecast population.
pub struct ForecastControlGenerator<'a> {
    zones: &'a ZoneSystem,
    population: &'a ForecastPopulation,
    min_base_population: f64,
}

impl<'a> ForecastControlGenerator<'a> {
    pub fn new(zones: &'a ZoneSystem, population: &'a ForecastPopulation) -> Self {
        Self {
            zones,
            population,
            min_base_population: DEFAULT_MIN_BASE_POPULATION,
        }
    }

    pub fn with_min_base_population(mut self, min_base_population: f64) -> Self {
        self.min_base_population = min_base_population;
        self
    }

    pub fn min_base_population(&self) -> f64 {
        self.min_base_population
    }

    /// Produce forecast controls for every record of `base`, in its order.
    #[instrument(level = "info", skip_all, fields(records = base.records.len()))]
    pub fn generate(
        &self,
        base: &ControlTable,
        reporter: &dyn Reporter,
    ) -> ControlResult<ForecastControls> {
        let start = Instant::now();
        let averages = compute_averages(&base.records);
        debug!(pumas = averages.len(), "computed PUMA averages");

        // scale in parallel, then surface the first failure in input order
        let scaled: Vec<ControlResult<ScaledZone>> = base
            .records
            .par_iter()
            .map(|record| self.scale_zone(record, &averages))
            .collect();
        let scaled = scaled.into_iter().collect::<ControlResult<Vec<_>>>()?;

        let fallback = scaled
            .iter()
            .filter(|z| z.source == ScaleSource::PumaAverage)
            .count();
        let direct = scaled.len() - fallback;
        let records = scaled.into_iter().map(|z| z.record).collect();

        info!(direct, fallback, elapsed = ?start.elapsed(), "scaled zone controls");
        reporter.report(&format!(
            "Scaled controls for {} zones ({} direct, {} from PUMA averages)",
            direct + fallback,
            direct,
            fallback
        ));

        Ok(ForecastControls {
            table: ControlTable {
                schema: base.schema.clone(),
                records,
            },
            direct,
            fallback,
        })
    }

    /// Decide how one zone is scaled and apply it.
    pub fn scale_zone(
        &self,
        record: &ControlRecord,
        averages: &BTreeMap<i32, ControlRecord>,
    ) -> ControlResult<ScaledZone> {
        let zone = self
            .zones
            .zone_by_taz(record.taz)
            .ok_or(ControlError::UnknownZone { taz: record.taz })?;
        let target = self.population.target(zone.taz)?;

        if zone.base_year_population > self.min_base_population {
            if zone.base_year_population == 0.0 {
                return Err(ControlError::DivisionByZero {
                    taz: zone.taz,
                    denominator: "base-year",
                });
            }
            let factor = target / zone.base_year_population;
            Ok(ScaledZone {
                record: scale_record(record, factor, record.taz, record.region),
                source: ScaleSource::Direct,
                factor,
            })
        } else {
            let average = averages.get(&zone.puma).ok_or(ControlError::UnknownPuma {
                taz: zone.taz,
                puma: zone.puma,
            })?;
            if average.total_population == 0 {
                return Err(ControlError::DivisionByZero {
                    taz: zone.taz,
                    denominator: "PUMA-average",
                });
            }
            let factor = target / average.total_population as f64;
            Ok(ScaledZone {
                record: scale_record(average, factor, record.taz, record.region),
                source: ScaleSource::PumaAverage,
                factor,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{controls::ControlSchema, report::CollectingReporter, zones::Zone};
    use tempfile::tempdir;

    fn zone(taz: i32, puma: i32, base: f64) -> Zone {
        Zone {
            taz,
            planning_district: 1,
            puma,
            base_year_population: base,
        }
    }

    fn record(taz: i32, puma: i32, hh: i64, pop: i64, extra: &[i64]) -> ControlRecord {
        ControlRecord {
            region: 9,
            puma,
            taz,
            total_households: hh,
            total_population: pop,
            additional_controls: extra.to_vec(),
        }
    }

    fn table(records: Vec<ControlRecord>, extra: &[&str]) -> ControlTable {
        ControlTable {
            schema: ControlSchema::new(extra.iter().map(|s| s.to_string()).collect()),
            records,
        }
    }

    #[test]
    fn three_zone_puma_scenario() {
        crate::init_test_logging();
        let zones = ZoneSystem::from_zones(vec![zone(1, 1, 0.0), zone(2, 1, 100.0), zone(3, 1, 0.0)]);
        let population: ForecastPopulation = [(1, 10.0), (2, 10.0), (3, 10.0)].into_iter().collect();
        let base = table(
            vec![
                record(1, 1, 0, 0, &[]),
                record(2, 1, 40, 100, &[]),
                record(3, 1, 0, 0, &[]),
            ],
            &[],
        );
        let reporter = CollectingReporter::default();
        let forecast = ForecastControlGenerator::new(&zones, &population)
            .generate(&base, &reporter)
            .unwrap();

        assert_eq!(forecast.direct, 1);
        assert_eq!(forecast.fallback, 2);
        for (i, r) in forecast.table.records.iter().enumerate() {
            assert_eq!(r.taz, i as i32 + 1);
            assert_eq!(r.region, 9);
            assert_eq!(r.puma, 1);
            assert_eq!(r.total_households, 4);
            assert_eq!(r.total_population, 10);
        }
        assert_eq!(reporter.messages().len(), 1);
    }

    #[test]
    fn direct_scaling_reproduces_target_population() {
        let zones = ZoneSystem::from_zones(vec![zone(5, 1, 120.0)]);
        let population: ForecastPopulation = [(5, 287.4)].into_iter().collect();
        let scaled = ForecastControlGenerator::new(&zones, &population)
            .scale_zone(&record(5, 1, 50, 120, &[60, 60]), &BTreeMap::new())
            .unwrap();
        assert_eq!(scaled.source, ScaleSource::Direct);
        assert_eq!(scaled.record.total_population, 287);
        assert_eq!(scaled.record.additional_controls, vec![144, 144]);
    }

    #[test]
    fn zero_forecast_population_zeroes_every_column() {
        let zones = ZoneSystem::from_zones(vec![zone(5, 1, 800.0)]);
        let population: ForecastPopulation = [(5, 0.0)].into_iter().collect();
        let scaled = ForecastControlGenerator::new(&zones, &population)
            .scale_zone(&record(5, 1, 300, 800, &[500, 300, 1000]), &BTreeMap::new())
            .unwrap();
        assert_eq!(scaled.record.total_households, 0);
        assert_eq!(scaled.record.total_population, 0);
        assert_eq!(scaled.record.additional_controls, vec![0, 0, 0]);
    }

    #[test]
    fn populated_zone_keeps_one_household() {
        let source = record(5, 1, 1, 100, &[]);
        // 1 * 0.01 rounds to 0 households while population stays positive
        let scaled = scale_record(&source, 0.01, 5, 9);
        assert_eq!(scaled.total_population, 1);
        assert_eq!(scaled.total_households, 1);
    }

    #[test]
    fn fallback_stamps_real_identity() {
        let zones = ZoneSystem::from_zones(vec![zone(7, 3, 10.0)]);
        let population: ForecastPopulation = [(7, 20.0)].into_iter().collect();
        let mut averages = BTreeMap::new();
        averages.insert(3, compute_averages(&[record(8, 3, 4, 10, &[2])])[&3].clone());
        let scaled = ForecastControlGenerator::new(&zones, &population)
            .scale_zone(&record(7, 3, 1, 10, &[1]), &averages)
            .unwrap();
        assert_eq!(scaled.source, ScaleSource::PumaAverage);
        assert_eq!(scaled.record.taz, 7);
        assert_eq!(scaled.record.region, 9);
        assert_eq!(scaled.record.puma, 3);
        assert_eq!(scaled.record.total_households, 8);
        assert_eq!(scaled.record.total_population, 20);
        assert_eq!(scaled.record.additional_controls, vec![4]);
    }

    #[test]
    fn threshold_is_configurable() {
        let zones = ZoneSystem::from_zones(vec![zone(7, 3, 10.0)]);
        let population: ForecastPopulation = [(7, 20.0)].into_iter().collect();
        let scaled = ForecastControlGenerator::new(&zones, &population)
            .with_min_base_population(0.0)
            .scale_zone(&record(7, 3, 4, 10, &[]), &BTreeMap::new())
            .unwrap();
        assert_eq!(scaled.source, ScaleSource::Direct);
        assert_eq!(scaled.factor, 2.0);
    }

    #[test]
    fn input_errors_are_reported() {
        let zones = ZoneSystem::from_zones(vec![zone(1, 1, 0.0), zone(2, 2, 500.0)]);
        let population: ForecastPopulation = [(1, 10.0)].into_iter().collect();
        let generator = ForecastControlGenerator::new(&zones, &population);

        let err = generator
            .scale_zone(&record(3, 1, 1, 1, &[]), &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ControlError::UnknownZone { taz: 3 }));

        let err = generator
            .scale_zone(&record(2, 2, 1, 1, &[]), &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ControlError::MissingForecastEntry { taz: 2 }));

        let err = generator
            .scale_zone(&record(1, 1, 1, 1, &[]), &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ControlError::UnknownPuma { taz: 1, puma: 1 }));

        let mut averages = BTreeMap::new();
        averages.insert(1, compute_averages(&[record(1, 1, 0, 0, &[])])[&1].clone());
        let err = generator
            .scale_zone(&record(1, 1, 0, 0, &[]), &averages)
            .unwrap_err();
        assert!(matches!(err, ControlError::DivisionByZero { taz: 1, .. }));
    }

    #[test]
    fn zero_base_population_with_negative_threshold_is_rejected() {
        let zones = ZoneSystem::from_zones(vec![zone(1, 1, 0.0)]);
        let population: ForecastPopulation = [(1, 10.0)].into_iter().collect();
        let err = ForecastControlGenerator::new(&zones, &population)
            .with_min_base_population(-1.0)
            .scale_zone(&record(1, 1, 1, 1, &[]), &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::DivisionByZero { denominator: "base-year", .. }
        ));
    }

    #[test]
    fn maz_file_is_a_copy_of_taz_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let forecast = ForecastControls {
            table: table(vec![record(1, 1, 4, 10, &[3])], &["workers"]),
            direct: 1,
            fallback: 0,
        };
        let taz = dir.path().join("taz_controls.csv");
        let maz = dir.path().join("maz_controls.csv");
        forecast.write(&taz, &maz)?;
        assert_eq!(std::fs::read(&taz)?, std::fs::read(&maz)?);
        assert_eq!(
            std::fs::read_to_string(&taz)?,
            "region,puma,taz,maz,totalhh,totpop,workers\n9,1,1,1,4,10,3\n"
        );
        Ok(())
    }
}
