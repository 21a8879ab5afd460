use labsift::stage::queue;
use labsift::testing::read_csv;
use labsift::unique::{UNIQUE_HEADER, new_unique_file_name, unique_file_name};
use labsift::{LoadSettings, RecordStore, TrackerSummary, UniqueStringTracker};
use std::time::Duration;
use tempfile::tempdir;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn settings() -> LoadSettings {
    LoadSettings {
        workers: 2,
        queue_capacity: 8,
        progress_interval: Duration::from_millis(50),
    }
}

#[test]
fn repeats_in_one_run_are_reported_once() -> anyhow::Result<()> {
    let mut tracker = UniqueStringTracker::new("pdl1", RecordStore::new());
    tracker.observe_group(&strings(&["A", "B"]))?;
    tracker.observe_group(&strings(&["C", "A"]))?;
    assert_eq!(tracker.unique(), strings(&["A", "B", "C"]));
    assert_eq!(tracker.new_strings(), strings(&["A", "B", "C"]));
    Ok(())
}

#[test]
fn baseline_strings_are_not_new() -> anyhow::Result<()> {
    let dir = tempdir()?;

    let mut first = UniqueStringTracker::from_baseline_file("msi", dir.path(), &settings())?;
    first.observe_group(&strings(&["A", "B"]))?;
    first.write_outputs(dir.path())?;

    let mut second = UniqueStringTracker::from_baseline_file("msi", dir.path(), &settings())?;
    second.observe_group(&strings(&["A", "B", "C"]))?;
    assert_eq!(second.unique(), strings(&["A", "B", "C"]));
    assert_eq!(second.new_strings(), strings(&["C"]));
    Ok(())
}

#[test]
fn missing_baseline_file_means_everything_is_new() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let mut tracker =
        UniqueStringTracker::from_baseline_file("pdl1", dir.path().join("nowhere"), &settings())?;
    let seen = tracker.observe("Tumor Proportion Score: 1%")?;
    assert!(seen.first_in_run && seen.new_vs_baseline);
    Ok(())
}

#[test]
fn stage_writes_both_lists() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let baseline = RecordStore::new();
    baseline.add(&strings(&["B"]))?;
    let tracker = UniqueStringTracker::new("pdl1", baseline);

    let (tx, rx) = queue(1);
    let stage = tracker.spawn(rx, dir.path().to_path_buf())?;
    for group in [vec!["A", "B"], vec![], vec!["B", "C"]] {
        tx.send(strings(&group))?;
    }
    drop(tx);
    assert_eq!(stage.join()?, TrackerSummary { unique: 3, new: 2 });

    let (names, rows) = read_csv(dir.path().join(unique_file_name("pdl1")))?;
    assert_eq!(names, [UNIQUE_HEADER]);
    assert_eq!(rows, [strings(&["A"]), strings(&["B"]), strings(&["C"])]);

    let (_, rows) = read_csv(dir.path().join(new_unique_file_name("pdl1")))?;
    assert_eq!(rows, [strings(&["A"]), strings(&["C"])]);
    Ok(())
}
