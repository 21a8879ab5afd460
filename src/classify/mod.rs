//! Priority-ordered row classification.
//!
//! Each row lands in exactly one [`Category`]. Rules are held in an ordered
//! table and evaluated top to bottom; the first rule that matches decides the
//! category and nothing after it runs:
//!
//! 1. [`Category::Excluded`] - order type on the deny-list
//! 2. [`Category::Wbc`] - white blood cell / lymphocyte test type
//! 3. [`Category::Cpd`] - comprehensive profiling report order type
//! 4. [`Category::PdL1`] - value field reads as a PD-L1 report
//! 5. [`Category::Msi`] - value field reads as a microsatellite instability report
//! 6. [`Category::Unmatched`] - none of the above
//!
//! PD-L1 and MSI matches also yield result snippets pulled from the value field.
//!
//! Classification is pure: the same row always produces the same
//! [`Classification`]. Routing rows to outputs is the job of [`pool`].

pub mod pool;
pub mod rules;

use crate::config::WbcPolicy;
use crate::error::SiftError;
use crate::header::Header;
use rules::{CPD_ORDER_TYPES, EXCLUDED_ORDER_TYPES, ReportKind, WBC_TEST_TYPES};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

pub use rules::{MAX_SNIPPETS, normalize_whitespace};

/// Column holding the order type name.
pub const ORDER_TYPE_COLUMN: &str = "OrderTypeMnemonic";
/// Column holding the test type name.
pub const TEST_TYPE_COLUMN: &str = "TestTypeMnemonic";
/// Column holding the free-text result.
pub const VALUE_COLUMN: &str = "Value";

/// Output category of a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Excluded,
    Wbc,
    Cpd,
    PdL1,
    Msi,
    Unmatched,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Excluded,
        Self::Wbc,
        Self::Cpd,
        Self::PdL1,
        Self::Msi,
        Self::Unmatched,
    ];

    /// Short lowercase name, also the output file stem for emitted categories.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Excluded => "excluded",
            Self::Wbc => "wbc",
            Self::Cpd => "cpd",
            Self::PdL1 => "pdl1",
            Self::Msi => "msi",
            Self::Unmatched => "unmatched",
        }
    }

    /// Whether rows of this category count as new data for incremental diffing.
    #[must_use]
    pub fn is_diff_worthy(self, wbc: WbcPolicy) -> bool {
        match self {
            Self::Cpd | Self::PdL1 | Self::Msi => true,
            Self::Wbc => wbc == WbcPolicy::Include,
            Self::Excluded | Self::Unmatched => false,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of classifying one row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    /// Normalized result snippets; only PD-L1 and MSI rows carry any.
    pub snippets: Vec<String>,
}

impl Classification {
    fn plain(category: Category) -> Self {
        Self {
            category,
            snippets: Vec::new(),
        }
    }
}

/// Which field a rule reads and how it tests it.
#[derive(Clone, Copy)]
enum Predicate {
    OrderTypeIn(&'static LazyLock<HashSet<&'static str>>),
    TestTypeIn(&'static LazyLock<HashSet<&'static str>>),
    Report(ReportKind),
}

#[derive(Clone, Copy)]
struct Rule {
    category: Category,
    predicate: Predicate,
}

/// Rules in priority order.
static RULES: [Rule; 5] = [
    Rule {
        category: Category::Excluded,
        predicate: Predicate::OrderTypeIn(&EXCLUDED_ORDER_TYPES),
    },
    Rule {
        category: Category::Wbc,
        predicate: Predicate::TestTypeIn(&WBC_TEST_TYPES),
    },
    Rule {
        category: Category::Cpd,
        predicate: Predicate::OrderTypeIn(&CPD_ORDER_TYPES),
    },
    Rule {
        category: Category::PdL1,
        predicate: Predicate::Report(ReportKind::PdL1),
    },
    Rule {
        category: Category::Msi,
        predicate: Predicate::Report(ReportKind::Msi),
    },
];

/// Positions of the columns the rules read.
#[derive(Clone, Copy, Debug)]
struct RuleColumns {
    order_type: usize,
    test_type: usize,
    value: usize,
}

/// Applies [`RULES`] to rows of one header.
#[derive(Clone, Debug)]
pub struct Classifier {
    columns: RuleColumns,
}

impl Classifier {
    /// Resolve the rule columns against `header`.
    ///
    /// # Errors
    /// Returns [`SiftError::MissingColumn`] if `OrderTypeMnemonic`,
    /// `TestTypeMnemonic` or `Value` is absent.
    pub fn new(header: &Header) -> Result<Self, SiftError> {
        Ok(Self {
            columns: RuleColumns {
                order_type: header.require(ORDER_TYPE_COLUMN)?,
                test_type: header.require(TEST_TYPE_COLUMN)?,
                value: header.require(VALUE_COLUMN)?,
            },
        })
    }

    /// Classify one row. Fields missing from a short row read as empty.
    #[must_use]
    pub fn classify(&self, row: &[String]) -> Classification {
        let field = |i: usize| row.get(i).map_or("", String::as_str);
        for rule in &RULES {
            let hit = match rule.predicate {
                Predicate::OrderTypeIn(names) => {
                    names.contains(field(self.columns.order_type)).then(Vec::new)
                }
                Predicate::TestTypeIn(names) => {
                    names.contains(field(self.columns.test_type)).then(Vec::new)
                }
                Predicate::Report(kind) => {
                    let value = field(self.columns.value);
                    kind.matches(value).then(|| kind.extract(value))
                }
            };
            if let Some(snippets) = hit {
                return Classification {
                    category: rule.category,
                    snippets,
                };
            }
        }
        Classification::plain(Category::Unmatched)
    }
}
