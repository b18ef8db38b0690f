use anyhow::Result;
use popsyn_forecast::{
    meta::{MetaGrouping, MetaSchema},
    report::CollectingReporter,
    run_preprocessor, Configuration, ControlError,
};
use std::{fs, path::Path};
use tempfile::tempdir;

fn write(path: &Path, text: &str) -> Result<()> {
    fs::create_dir_all(path.parent().expect("parent"))?;
    fs::write(path, text)?;
    Ok(())
}

/// Three zones in one PUMA; only TAZ 2 is populated in the base year.
fn scenario(root: &Path) -> Result<Configuration> {
    let config = Configuration {
        input_directory: root.join("input"),
        scenario_directory: root.join("scenario"),
        output_directory: root.join("output"),
        ..Configuration::default()
    };
    write(
        &config.zones_path(),
        "TAZ,PD,PUMA,BaseYearPopulation\n1,1,1,0\n2,1,1,100\n3,2,1,0\n",
    )?;
    write(
        &config.base_year_controls_path(),
        "region,puma,taz,maz,totalhh,totpop,workers\n\
         1,1,1,1,0,0,0\n\
         1,1,2,2,40,100,60\n\
         1,1,3,3,0,0,0\n",
    )?;
    write(
        &config.forecast_population_path(),
        "TAZ,Population\n1,10\n2,10\n3,10\n",
    )?;
    Ok(config)
}

#[test]
fn three_zone_scenario_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    let config = scenario(dir.path())?;
    let reporter = CollectingReporter::default();

    let summary = run_preprocessor(&config, &reporter)?;
    assert_eq!(summary.zones, 3);
    assert_eq!(summary.direct_scaled, 1);
    assert_eq!(summary.puma_fallback, 2);
    assert_eq!(summary.meta_records, 1);
    assert_eq!(summary.total_households, 12);
    assert_eq!(summary.total_population, 30);
    assert!(summary.finished_at >= summary.started_at);

    // averages: hh 13, pop 33, workers 20; scaled by 10/33
    // direct: 40, 100, 60 scaled by 0.1
    assert_eq!(
        fs::read_to_string(config.taz_controls_path())?,
        "region,puma,taz,maz,totalhh,totpop,workers\n\
         1,1,1,1,4,10,6\n\
         1,1,2,2,4,10,6\n\
         1,1,3,3,4,10,6\n"
    );
    assert_eq!(
        fs::read(config.taz_controls_path())?,
        fs::read(config.maz_controls_path())?
    );
    assert_eq!(
        fs::read_to_string(config.meta_controls_path())?,
        "region,puma,totalhh,totpop,workers\n1,1,12,30,18\n"
    );

    let written: popsyn_forecast::RunSummary =
        serde_json::from_str(&fs::read_to_string(config.summary_path())?)?;
    assert_eq!(written, summary);
    assert!(!reporter.messages().is_empty());
    Ok(())
}

#[test]
fn reruns_are_byte_identical() -> Result<()> {
    let dir = tempdir()?;
    let config = scenario(dir.path())?;
    let reporter = CollectingReporter::default();

    run_preprocessor(&config, &reporter)?;
    let first = (
        fs::read(config.taz_controls_path())?,
        fs::read(config.meta_controls_path())?,
    );
    run_preprocessor(&config, &reporter)?;
    let second = (
        fs::read(config.taz_controls_path())?,
        fs::read(config.meta_controls_path())?,
    );
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn reduced_meta_schema_by_region() -> Result<()> {
    let dir = tempdir()?;
    let config = Configuration {
        meta_schema: MetaSchema::Reduced,
        meta_grouping: MetaGrouping::Region,
        ..scenario(dir.path())?
    };
    run_preprocessor(&config, &CollectingReporter::default())?;
    assert_eq!(
        fs::read_to_string(config.meta_controls_path())?,
        "REGION,totalhh,totpop\n1,12,30\n"
    );
    Ok(())
}

#[test]
fn missing_forecast_entry_writes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let config = scenario(dir.path())?;
    write(&config.forecast_population_path(), "TAZ,Population\n1,10\n2,10\n")?;

    let err = run_preprocessor(&config, &CollectingReporter::default()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ControlError>(),
        Some(ControlError::MissingForecastEntry { taz: 3 })
    ));
    assert!(!config.taz_controls_path().exists());
    assert!(!config.meta_controls_path().exists());
    Ok(())
}
