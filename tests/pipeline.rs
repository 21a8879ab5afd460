use labsift::classify::Category;
use labsift::config::{SiftConfig, WbcPolicy};
use labsift::io::RowSource;
use labsift::pipeline::{INCREMENT_FILE, NEW_IDS_FILE, RESULTS_FILE, category_file, run};
use labsift::testing::{
    MSI_SNIPPET, PDL1_SNIPPET, lab_row, read_csv, sample_header, scenario_rows, write_csv_fixture,
};
use labsift::unique::{new_unique_file_name, unique_file_name};
use labsift::{Header, Row, RunSummary, SiftError};
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::tempdir;

fn config(out: &Path) -> SiftConfig {
    SiftConfig {
        output_dir: out.to_path_buf(),
        workers: Some(2),
        queue_capacity: 4,
        progress_interval_ms: 50,
        ..SiftConfig::default()
    }
}

fn run_rows(config: &SiftConfig, input: &Path, rows: &[Row]) -> anyhow::Result<RunSummary> {
    write_csv_fixture(input, &sample_header(), rows)?;
    run(config, RowSource::open(input)?)
}

fn rows_of(path: &Path) -> anyhow::Result<Vec<Row>> {
    Ok(read_csv(path)?.1)
}

fn ids_of(path: &Path) -> anyhow::Result<Vec<String>> {
    Ok(rows_of(path)?.into_iter().map(|r| r[0].clone()).collect())
}

#[test]
fn scenario_is_routed_by_category() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("out");
    let cfg = config(&out);
    let summary = run_rows(&cfg, &dir.path().join("input.csv"), &scenario_rows())?;

    assert_eq!(summary.rows_read, 6);
    assert_eq!(summary.processed, 6);
    for category in Category::ALL {
        assert_eq!(summary.count(category), 1, "{category}");
    }
    assert_eq!(summary.diff_worthy, 3);

    let rows = scenario_rows();
    for (category, row) in [
        (Category::Wbc, &rows[1]),
        (Category::Cpd, &rows[2]),
        (Category::PdL1, &rows[3]),
        (Category::Msi, &rows[4]),
    ] {
        let (names, written) = read_csv(out.join(category_file(category)))?;
        assert_eq!(names, sample_header().names());
        assert_eq!(&written, &[row.clone()], "{category}");
    }

    let results: BTreeSet<Row> = rows_of(&out.join(RESULTS_FILE))?.into_iter().collect();
    let expected: BTreeSet<Row> = rows[1..5].iter().cloned().collect();
    assert_eq!(results, expected);
    assert_eq!(summary.written_to(RESULTS_FILE), Some(4));
    Ok(())
}

#[test]
fn first_run_reports_every_diff_worthy_patient() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("out");
    let summary = run_rows(&config(&out), &dir.path().join("input.csv"), &scenario_rows())?;

    assert_eq!(summary.new_identifiers, Some(3));
    assert_eq!(ids_of(&out.join(NEW_IDS_FILE))?, ["1003", "1004", "1005"]);
    assert_eq!(rows_of(&out.join(INCREMENT_FILE))?.len(), 3);

    assert_eq!(rows_of(&out.join(unique_file_name("pdl1")))?, [vec![PDL1_SNIPPET.to_string()]]);
    assert_eq!(rows_of(&out.join(new_unique_file_name("msi")))?, [vec![MSI_SNIPPET.to_string()]]);
    let pdl1 = summary.pdl1.expect("pdl1 tracker ran");
    assert_eq!((pdl1.unique, pdl1.new), (1, 1));
    Ok(())
}

#[test]
fn wbc_policy_include_diffs_wbc_rows() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("out");
    let cfg = SiftConfig {
        wbc_diff: WbcPolicy::Include,
        ..config(&out)
    };
    let summary = run_rows(&cfg, &dir.path().join("input.csv"), &scenario_rows())?;
    assert_eq!(summary.diff_worthy, 4);
    assert_eq!(ids_of(&out.join(NEW_IDS_FILE))?, ["1002", "1003", "1004", "1005"]);
    Ok(())
}

#[test]
fn rerun_against_own_output_finds_nothing_new() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("out");
    let input = dir.path().join("input.csv");
    run_rows(&config(&out), &input, &scenario_rows())?;

    let archived = dir.path().join("previous-results.csv");
    std::fs::copy(out.join(RESULTS_FILE), &archived)?;
    let cfg = SiftConfig {
        previous: Some(archived),
        ..config(&out)
    };
    let summary = run(&cfg, RowSource::open(&input)?)?;

    assert_eq!(summary.new_identifiers, Some(0));
    assert!(ids_of(&out.join(NEW_IDS_FILE))?.is_empty());
    assert_eq!(rows_of(&out.join(INCREMENT_FILE))?.len(), 3);
    assert!(rows_of(&out.join(new_unique_file_name("pdl1")))?.is_empty());
    assert!(rows_of(&out.join(new_unique_file_name("msi")))?.is_empty());
    assert_eq!(rows_of(&out.join(unique_file_name("pdl1")))?.len(), 1);
    Ok(())
}

#[test]
fn absent_previous_file_counts_every_row_as_new() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("out");
    let cfg = SiftConfig {
        previous: Some(dir.path().join("absent.csv")),
        ..config(&out)
    };
    let summary = run_rows(&cfg, &dir.path().join("input.csv"), &scenario_rows())?;

    assert_eq!(summary.new_identifiers, Some(3));
    assert_eq!(ids_of(&out.join(NEW_IDS_FILE))?, ["1003", "1004", "1005"]);
    assert_eq!(rows_of(&out.join(INCREMENT_FILE))?.len(), 3);
    Ok(())
}

#[test]
fn previous_may_be_the_output_file_itself() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("out");
    let input = dir.path().join("input.csv");
    run_rows(&config(&out), &input, &scenario_rows())?;

    let cfg = SiftConfig {
        previous: Some(out.join(RESULTS_FILE)),
        ..config(&out)
    };
    let summary = run(&cfg, RowSource::open(&input)?)?;
    assert_eq!(summary.new_identifiers, Some(0));
    assert_eq!(rows_of(&out.join(RESULTS_FILE))?.len(), 4);
    Ok(())
}

#[test]
fn grown_input_reports_only_the_increment() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("out");
    let input = dir.path().join("input.csv");
    run_rows(&config(&out), &input, &scenario_rows())?;

    let mut grown = scenario_rows();
    grown.push(lab_row(
        "1007",
        "Surgical Pathology Report",
        "Report",
        "PD-L1 SP263: Tumor proportion score: <1%",
    ));
    let cfg = SiftConfig {
        previous: Some(out.join(RESULTS_FILE)),
        ..config(&out)
    };
    let summary = run_rows(&cfg, &input, &grown)?;

    assert_eq!(ids_of(&out.join(NEW_IDS_FILE))?, ["1007"]);
    assert_eq!(
        rows_of(&out.join(new_unique_file_name("pdl1")))?,
        [vec!["Tumor proportion score: <1%".to_string()]]
    );
    assert_eq!(rows_of(&out.join(unique_file_name("pdl1")))?.len(), 2);
    assert_eq!(summary.count(Category::PdL1), 2);
    Ok(())
}

#[test]
fn no_filter_writes_every_row() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("out");
    let cfg = SiftConfig {
        no_filter: true,
        ..config(&out)
    };
    let summary = run_rows(&cfg, &dir.path().join("input.csv"), &scenario_rows())?;

    assert_eq!(summary.processed, 6);
    assert!(summary.categories.is_empty());
    assert_eq!(rows_of(&out.join(RESULTS_FILE))?.len(), 6);
    assert_eq!(ids_of(&out.join(NEW_IDS_FILE))?.len(), 6);
    assert!(!out.join(category_file(Category::Wbc)).exists());
    assert!(!out.join(unique_file_name("pdl1")).exists());
    assert!(summary.pdl1.is_none());
    Ok(())
}

#[test]
fn without_baseline_diff_can_be_skipped() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("out");
    let cfg = SiftConfig {
        diff_without_baseline: false,
        ..config(&out)
    };
    let summary = run_rows(&cfg, &dir.path().join("input.csv"), &scenario_rows())?;
    assert_eq!(summary.new_identifiers, None);
    assert!(!out.join(NEW_IDS_FILE).exists());
    assert!(!out.join(INCREMENT_FILE).exists());
    assert_eq!(summary.diff_worthy, 3);
    Ok(())
}

#[test]
fn missing_identifier_column_fails_before_writing() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("out");
    let input = dir.path().join("input.csv");
    let header = Header::new(["OrderTypeMnemonic", "TestTypeMnemonic", "Value"])?;
    write_csv_fixture(
        &input,
        &header,
        &[vec!["CBC".into(), "WBC".into(), "7.1".into()]],
    )?;

    let err = run(&config(&out), RowSource::open(&input)?).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SiftError>(),
        Some(SiftError::IdentifierColumn)
    ));
    assert!(!out.join(RESULTS_FILE).exists());
    Ok(())
}

#[test]
fn ragged_input_fails_the_run() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("out");
    let input = dir.path().join("input.csv");
    let mut text = sample_header().names().join(",");
    text.push_str("\n1,2,3\n");
    std::fs::write(&input, text)?;
    assert!(run(&config(&out), RowSource::open(&input)?).is_err());
    Ok(())
}

#[test]
fn metrics_file_holds_the_summary() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("out");
    let metrics = dir.path().join("metrics.json");
    let cfg = SiftConfig {
        metrics_file: Some(metrics.clone()),
        ..config(&out)
    };
    let summary = run_rows(&cfg, &dir.path().join("input.csv"), &scenario_rows())?;
    let saved: RunSummary = serde_json::from_str(&std::fs::read_to_string(&metrics)?)?;
    assert_eq!(saved, summary);
    Ok(())
}
