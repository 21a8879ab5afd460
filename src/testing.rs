//! Fixtures for tests of labsift runs.
//!
//! - [`sample_header`]: the column layout of a laboratory result extract
//! - [`lab_row`]: a row for that header with the fields rules look at
//! - [`scenario_rows`]: one row per category, in rule order
//! - [`write_csv_fixture`] / [`read_csv`]: move rows through files on disk
//!
//! ```
//! use labsift::classify::{Category, Classifier};
//! use labsift::testing::{sample_header, scenario_rows};
//!
//! let classifier = Classifier::new(&sample_header()).unwrap();
//! let categories: Vec<Category> = scenario_rows()
//!     .iter()
//!     .map(|row| classifier.classify(row).category)
//!     .collect();
//! assert_eq!(categories, Category::ALL);
//! ```

use crate::header::{Header, Row};
use crate::io::{RowSink, RowSource};
use anyhow::Result;
use std::path::Path;

/// Columns of a laboratory result extract.
pub const SAMPLE_COLUMNS: [&str; 17] = [
    "MRN",
    "MRNFacility",
    "MedViewPatientID",
    "PatientName",
    "DOB",
    "Sex",
    "DrawnDate",
    "DiagServiceID",
    "AccessionNumber",
    "HNAMOrderID",
    "OrderTypeLocalID",
    "OrderTypeMnemonic",
    "TestTypeLocalID",
    "TestTypeMnemonic",
    "ResultDate",
    "Value",
    "Status",
];

/// PD-L1 report text used by [`scenario_rows`].
pub const PDL1_VALUE: &str = "PD-L1 (22C3) IHC\nTumor Proportion Score: 60%\nInterpretation: high expression";
/// Snippet extracted from [`PDL1_VALUE`].
pub const PDL1_SNIPPET: &str = "Tumor Proportion Score: 60%";

/// MSI report text used by [`scenario_rows`].
pub const MSI_VALUE: &str = "Microsatellite Instability Analysis. The findings are consistent with \
                             microsatellite stable status.";
/// Snippet extracted from [`MSI_VALUE`].
pub const MSI_SNIPPET: &str = "The findings are consistent with microsatellite stable status.";

/// Header built from [`SAMPLE_COLUMNS`].
#[must_use]
pub fn sample_header() -> Header {
    Header::new(SAMPLE_COLUMNS).expect("sample columns are unique")
}

/// A row for [`sample_header`]. Descriptive fields are derived from `mrn`.
#[must_use]
pub fn lab_row(mrn: &str, order_type: &str, test_type: &str, value: &str) -> Row {
    vec![
        mrn.to_string(),
        format!("{mrn}-UH"),
        format!("MV{mrn}"),
        format!("Patient {mrn}"),
        "1970-01-01".into(),
        "F".into(),
        "2021-03-04 08:15:00".into(),
        "LAB".into(),
        format!("A-{mrn}"),
        format!("H{mrn}"),
        "100".into(),
        order_type.into(),
        "200".into(),
        test_type.into(),
        "2021-03-05 10:00:00".into(),
        value.into(),
        "Final".into(),
    ]
}

/// One row per [`Category`](crate::classify::Category), in rule order:
/// excluded, WBC, CPD, PD-L1, MSI, unmatched. Each row has its own MRN.
#[must_use]
pub fn scenario_rows() -> Vec<Row> {
    vec![
        lab_row("1001", "CMV", "CMV PCR", "Not detected"),
        lab_row("1002", "CBC", "WBC", "7.2"),
        lab_row("1003", "Solid Tumor NGS Report", "Report", "See scanned report"),
        lab_row("1004", "Surgical Pathology Report", "Report", PDL1_VALUE),
        lab_row("1005", "Surgical Pathology Report", "Report", MSI_VALUE),
        lab_row("1006", "Basic Metabolic Panel", "Sodium", "140"),
    ]
}

/// Write `header` and `rows` to `path` as CSV.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_csv_fixture(path: impl AsRef<Path>, header: &Header, rows: &[Row]) -> Result<()> {
    let mut sink = RowSink::create(path, header.names())?;
    for row in rows {
        sink.write_row(row)?;
    }
    sink.finish()?;
    Ok(())
}

/// Read a CSV file back as its header names and rows.
///
/// # Errors
/// Returns an error if the file cannot be read or is malformed.
pub fn read_csv(path: impl AsRef<Path>) -> Result<(Vec<String>, Vec<Row>)> {
    let source = RowSource::open(path)?;
    let names = source.header().names().to_vec();
    Ok((names, source.collect_rows()?))
}
