use labsift::classify::{Category, Classifier};
use labsift::config::WbcPolicy;
use labsift::testing::{
    MSI_SNIPPET, PDL1_SNIPPET, PDL1_VALUE, lab_row, sample_header, scenario_rows,
};
use labsift::{Header, SiftError};

fn classifier() -> anyhow::Result<Classifier> {
    Ok(Classifier::new(&sample_header())?)
}

#[test]
fn scenario_rows_cover_every_category() -> anyhow::Result<()> {
    let c = classifier()?;
    let categories: Vec<Category> = scenario_rows()
        .iter()
        .map(|row| c.classify(row).category)
        .collect();
    assert_eq!(categories, Category::ALL);
    Ok(())
}

#[test]
fn classification_is_deterministic() -> anyhow::Result<()> {
    let c = classifier()?;
    for row in scenario_rows() {
        assert_eq!(c.classify(&row), c.classify(&row));
    }
    Ok(())
}

#[test]
fn snippets_come_only_from_report_rows() -> anyhow::Result<()> {
    let c = classifier()?;
    let snippets: Vec<Vec<String>> = scenario_rows()
        .iter()
        .map(|row| c.classify(row).snippets)
        .collect();
    assert_eq!(snippets[3], vec![PDL1_SNIPPET]);
    assert_eq!(snippets[4], vec![MSI_SNIPPET]);
    for (i, s) in snippets.iter().enumerate() {
        if i != 3 && i != 4 {
            assert!(s.is_empty(), "row {i} carried snippets {s:?}");
        }
    }
    Ok(())
}

#[test]
fn excluded_order_type_wins_over_report_text() -> anyhow::Result<()> {
    let c = classifier()?;
    let row = lab_row("2001", "Heme NGS Report", "WBC", PDL1_VALUE);
    let out = c.classify(&row);
    assert_eq!(out.category, Category::Excluded);
    assert!(out.snippets.is_empty());
    Ok(())
}

#[test]
fn cpd_order_type_wins_over_pdl1_text() -> anyhow::Result<()> {
    let c = classifier()?;
    let row = lab_row("2002", "Fusion Transcript Report", "Report", PDL1_VALUE);
    assert_eq!(c.classify(&row).category, Category::Cpd);
    Ok(())
}

#[test]
fn pdl1_mention_without_score_still_classifies() -> anyhow::Result<()> {
    let c = classifier()?;
    let row = lab_row("2003", "Surgical Pathology Report", "Report", "PDL1 stain pending");
    let out = c.classify(&row);
    assert_eq!(out.category, Category::PdL1);
    assert!(out.snippets.is_empty());
    Ok(())
}

#[test]
fn multiline_snippets_are_normalized() -> anyhow::Result<()> {
    let c = classifier()?;
    let value = "Microsatellite Instability (MSI) Analysis.\r\nResult:\r\n  The findings are\r\n \
                 consistent with\n microsatellite stable.\r\n";
    let row = lab_row("2004", "Molecular Report", "Report", value);
    assert_eq!(
        c.classify(&row).snippets,
        vec!["The findings are consistent with microsatellite stable."]
    );
    Ok(())
}

#[test]
fn lowercase_msi_phrase_is_detected() -> anyhow::Result<()> {
    let c = classifier()?;
    let value = "microsatellite  instability by PCR: the findings indicate microsatellite instability-high.";
    let row = lab_row("2005", "Molecular Report", "Report", value);
    let out = c.classify(&row);
    assert_eq!(out.category, Category::Msi);
    assert_eq!(
        out.snippets,
        vec!["the findings indicate microsatellite instability-high."]
    );
    Ok(())
}

#[test]
fn report_categories_are_diff_worthy() {
    for category in Category::ALL {
        let expected = matches!(category, Category::Cpd | Category::PdL1 | Category::Msi);
        assert_eq!(category.is_diff_worthy(WbcPolicy::Exclude), expected, "{category}");
    }
}

#[test]
fn classifier_requires_rule_columns() -> anyhow::Result<()> {
    let header = Header::new(["MRN", "OrderTypeMnemonic", "TestTypeMnemonic"])?;
    let err = Classifier::new(&header).unwrap_err();
    assert!(matches!(err, SiftError::MissingColumn(ref name) if name == "Value"));
    Ok(())
}
