//! Static rule tables and report patterns.
//!
//! Name tables are exact-match lookups. Report detection is a two-step test: a
//! cheap substring pre-filter on the value field, then a regular expression.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Upper bound on result snippets extracted from one value field.
pub const MAX_SNIPPETS: usize = 10;

/// Order types dropped from every output.
pub static EXCLUDED_ORDER_TYPES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "CMV",
        "RVP",
        "HIVQNT",
        "HCVQNT",
        "SDIFF",
        "CFPLUS Report",
        "Case - HIV Quantitation",
        "Case - Respiratory Virus Panel",
        "Case - Epstein-Barr Virus Quantitation",
        "HBV DNA",
        "Case - Cytomegalovirus Quantitation",
        "HCVGENO",
        "BME Post Report",
        "Case - HCV Quantitation",
        "BCR Quant Report",
        "HyperCoag Report",
        "CML Report",
        "TCRPCR Report",
        "FLT3 Report",
        "Case - Cystic Fibrosis",
        "BRAF Report",
        "BRCA1/BRCA2/ESR1 Report",
        "Heme NGS Report",
        "SPAD",
        "Immunophen Report",
    ]
    .into_iter()
    .collect()
});

/// White blood cell and lymphocyte count test types.
pub static WBC_TEST_TYPES: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ["WBC", "WBC Corr", "Lymph Man"].into_iter().collect());

/// Comprehensive profiling report order types.
pub static CPD_ORDER_TYPES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    ["Solid Tumor NGS Report", "Fusion Transcript Report"]
        .into_iter()
        .collect()
});

const PDL1_PREFILTER: &[&str] = &["PD", "Pd", "pD", "pd"];
const MSI_PREFILTER: &[&str] = &["Microsatellite", "microsatellite"];

static PDL1_REPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)pd-?l1").expect("valid PD-L1 report regex"));

static PDL1_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(tumor proportion score|combined positive score \(cps\)|cps score):? ?[><~]* ?[0-9\-\.]+ ?%?",
    )
    .expect("valid PD-L1 result regex")
});

static MSI_REPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[Mm]icrosatellite[ ]+[Ii]nstability").expect("valid MSI report regex")
});

static MSI_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\.:]+findings[^\.]+[Mm]icrosat[^\.]+.").expect("valid MSI result regex")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\s)+").expect("valid whitespace regex"));

/// Free-text report families detected in the value field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReportKind {
    PdL1,
    Msi,
}

impl ReportKind {
    fn prefilter(self) -> &'static [&'static str] {
        match self {
            Self::PdL1 => PDL1_PREFILTER,
            Self::Msi => MSI_PREFILTER,
        }
    }

    fn report(self) -> &'static Regex {
        match self {
            Self::PdL1 => &PDL1_REPORT,
            Self::Msi => &MSI_REPORT,
        }
    }

    fn result(self) -> &'static Regex {
        match self {
            Self::PdL1 => &PDL1_RESULT,
            Self::Msi => &MSI_RESULT,
        }
    }

    /// Whether `value` is a report of this kind.
    #[must_use]
    pub fn matches(self, value: &str) -> bool {
        self.prefilter().iter().any(|needle| value.contains(needle))
            && self.report().is_match(value)
    }

    /// Up to [`MAX_SNIPPETS`] result snippets from `value`, whitespace-normalized.
    #[must_use]
    pub fn extract(self, value: &str) -> Vec<String> {
        self.result()
            .find_iter(value)
            .take(MAX_SNIPPETS)
            .map(|m| normalize_whitespace(m.as_str()))
            .collect()
    }
}

/// Collapse every ASCII whitespace run (line breaks included) to one space and
/// trim spaces, carriage returns and newlines from both ends. Unicode spaces
/// such as U+00A0 are kept as-is, so unique-string files stay byte-stable
/// across runs.
#[must_use]
pub fn normalize_whitespace(s: &str) -> String {
    WHITESPACE
        .replace_all(s, " ")
        .trim_matches(|c: char| matches!(c, ' ' | '\r' | '\n'))
        .to_string()
}
