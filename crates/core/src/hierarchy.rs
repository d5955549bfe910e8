use crate::error::RecordError;
use crate::models::{ClassifiedRow, HsRecord, RunContext, ROOT_PARENT};
use crate::normalize::normalize_description;
use std::collections::HashSet;

pub fn clean_code(code: &str) -> String {
    code.replace('.', "").replace(['\n', '\r'], "").trim().to_string()
}

pub fn parent_code(code_clean: &str) -> Result<String, RecordError> {
    if !code_clean.chars().all(|c| c.is_ascii_digit()) {
        return Err(RecordError::NonDigit(code_clean.to_string()));
    }

    match code_clean.len() {
        8 => Ok(code_clean[..6].to_string()),
        6 => Ok(code_clean[..4].to_string()),
        4 => Ok(code_clean[..2].to_string()),
        2 => Ok(ROOT_PARENT.to_string()),
        length => Err(RecordError::UnsupportedLevel {
            code: code_clean.to_string(),
            length,
        }),
    }
}

pub fn build_record(row: &ClassifiedRow, context: &RunContext) -> Result<HsRecord, RecordError> {
    let code_clean = clean_code(&row.code);
    let parent = parent_code(&code_clean)?;
    // parent_code only accepts 2, 4, 6 or 8 ASCII digits
    let level = code_clean.len() as u8;

    Ok(HsRecord {
        code: row.code.clone(),
        code_clean,
        level,
        parent,
        description: normalize_description(row.description.as_deref()),
        section: context.section.clone(),
        extracted_at: context.extracted_at,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanRecord {
    pub code_clean: String,
    pub parent: String,
    pub section: String,
}

/// Cross-file check of the hierarchy. Sibling chapters populate ancestors
/// independently, so this runs on the combined dataset, after the fact.
pub fn validate_hierarchy(records: &[HsRecord]) -> Vec<OrphanRecord> {
    let known: HashSet<&str> = records
        .iter()
        .map(|record| record.code_clean.as_str())
        .collect();

    records
        .iter()
        .filter(|record| record.parent != ROOT_PARENT && !known.contains(record.parent.as_str()))
        .map(|record| OrphanRecord {
            code_clean: record.code_clean.clone(),
            parent: record.parent.clone(),
            section: record.section.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RowKind;
    use chrono::Utc;

    fn context() -> RunContext {
        RunContext {
            section: "Section I".to_string(),
            extracted_at: Utc::now(),
        }
    }

    fn row(code: &str, description: Option<&str>) -> ClassifiedRow {
        ClassifiedRow {
            kind: RowKind::Heading4,
            code: code.to_string(),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn parents_truncate_by_tier() {
        assert_eq!(parent_code("01012100").as_deref(), Ok("010121"));
        assert_eq!(parent_code("010121").as_deref(), Ok("0101"));
        assert_eq!(parent_code("0101").as_deref(), Ok("01"));
        assert_eq!(parent_code("01").as_deref(), Ok("TOTAL"));
    }

    #[test]
    fn other_widths_are_rejected() {
        for code in ["", "0", "010", "01012", "0101211", "0101210000"] {
            assert!(
                matches!(parent_code(code), Err(RecordError::UnsupportedLevel { .. })),
                "code {code:?}"
            );
        }
        assert_eq!(
            parent_code("01a1"),
            Err(RecordError::NonDigit("01a1".to_string()))
        );
    }

    #[test]
    fn heading_row_becomes_level_four_record() {
        let context = context();
        let record = build_record(
            &row("01.01", Some("Live horses, asses, mules...")),
            &context,
        )
        .expect("heading should build");

        assert_eq!(record.code, "01.01");
        assert_eq!(record.code_clean, "0101");
        assert_eq!(record.level, 4);
        assert_eq!(record.parent, "01");
        assert_eq!(record.description, "Live horses, asses, mules...");
        assert_eq!(record.section, "Section I");
        assert_eq!(record.extracted_at, context.extracted_at);
    }

    #[test]
    fn wrapped_subheading_code_is_cleaned() {
        let record = build_record(&row("0902.10.11\n", Some("- - - Green tea (+)")), &context())
            .expect("subheading should build");
        assert_eq!(record.code_clean, "09021011");
        assert_eq!(record.level, 8);
        assert_eq!(record.parent, "090210");
        assert_eq!(record.description, "Green tea");
    }

    #[test]
    fn seven_digit_code_is_dropped() {
        let result = build_record(&row("0902.101", None), &context());
        assert_eq!(
            result,
            Err(RecordError::UnsupportedLevel {
                code: "0902101".to_string(),
                length: 7
            })
        );
    }

    #[test]
    fn heading_and_subheading_link_up() {
        let context = context();
        let heading = build_record(&row("01.01", Some("Live horses")), &context)
            .expect("heading should build");
        let subheading = build_record(&row("0101.10", Some("- Horses")), &context)
            .expect("subheading should build");

        assert_eq!(heading.level, 4);
        assert_eq!(subheading.level, 6);
        assert_eq!(subheading.parent, heading.code_clean);
    }

    #[test]
    fn validation_reports_missing_ancestors_only() {
        let context = context();
        let records = vec![
            build_record(&row("01.01", None), &context).expect("builds"),
            build_record(&row("0101.21", None), &context).expect("builds"),
            build_record(&row("02.01", None), &context).expect("builds"),
        ];

        let orphans = validate_hierarchy(&records);
        let orphan_codes: Vec<_> = orphans.iter().map(|o| o.code_clean.as_str()).collect();
        assert_eq!(orphan_codes, vec!["0101", "0201"]);
        assert!(orphans.iter().all(|o| o.section == "Section I"));
    }
}
