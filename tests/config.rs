use labsift::SiftError;
use labsift::config::{SiftConfig, WbcPolicy};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn from_file_overlays_defaults() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("labsift.json");
    fs::write(
        &path,
        r#"{
            "output_dir": "reports",
            "previous": "archive/results.csv.gz",
            "wbc_diff": "include",
            "companion_columns": ["DOB"]
        }"#,
    )?;

    let config = SiftConfig::from_file(&path)?;
    assert_eq!(config.output_dir, PathBuf::from("reports"));
    assert_eq!(config.previous, Some(PathBuf::from("archive/results.csv.gz")));
    assert_eq!(config.wbc_diff, WbcPolicy::Include);
    assert_eq!(config.companion_columns, ["DOB"]);
    assert_eq!(config.queue_capacity, SiftConfig::default().queue_capacity);
    assert_eq!(config.previous_dir(), config.output_dir.as_path());
    Ok(())
}

#[test]
fn from_file_validates() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("bad.json");
    fs::write(&path, r#"{"progress_interval_ms": 0}"#)?;
    let err = SiftConfig::from_file(&path).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SiftError>(),
        Some(SiftError::Configuration(_))
    ));
    Ok(())
}

#[test]
fn unknown_policy_is_a_parse_error() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("policy.json");
    fs::write(&path, r#"{"wbc_diff": "sometimes"}"#)?;
    let err = SiftConfig::from_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("policy.json"));
    Ok(())
}

#[test]
fn config_round_trips_through_json() -> anyhow::Result<()> {
    let config = SiftConfig {
        workers: Some(3),
        no_filter: true,
        ..SiftConfig::default()
    };
    let json = serde_json::to_string(&config)?;
    assert_eq!(serde_json::from_str::<SiftConfig>(&json)?, config);
    Ok(())
}
