use crate::error::ExtractError;
use crate::models::{ClassifiedRow, ExtractionOptions, RawRow, RowKind};
use regex::Regex;

/// Decides whether a raw table row carries a heading, a subheading, or noise.
#[derive(Debug, Clone)]
pub struct RowClassifier {
    heading: Regex,
    subheading: Regex,
    heading_column: usize,
    subheading_column: usize,
    description_column: usize,
}

impl RowClassifier {
    pub fn new(options: &ExtractionOptions) -> Result<Self, ExtractError> {
        Ok(Self {
            heading: Regex::new(options.heading_regex)?,
            subheading: Regex::new(options.subheading_regex)?,
            heading_column: options.heading_column,
            subheading_column: options.subheading_column,
            description_column: options.description_column,
        })
    }

    pub fn kind_of(&self, row: &RawRow) -> RowKind {
        if self.subheading_code(row).is_some() {
            RowKind::Subheading6Plus
        } else if self.heading_code(row).is_some() {
            RowKind::Heading4
        } else {
            RowKind::Noise
        }
    }

    /// Returns `None` for noise rows. When both code columns match, the
    /// subheading column wins since it is the deeper code.
    pub fn classify(&self, row: &RawRow) -> Option<ClassifiedRow> {
        let (kind, code) = match (self.subheading_code(row), self.heading_code(row)) {
            (Some(code), _) => (RowKind::Subheading6Plus, code),
            (None, Some(code)) => (RowKind::Heading4, code),
            (None, None) => return None,
        };

        Some(ClassifiedRow {
            kind,
            code: code.to_string(),
            description: row.cell(self.description_column).map(str::to_string),
        })
    }

    fn heading_code<'a>(&self, row: &'a RawRow) -> Option<&'a str> {
        row.cell(self.heading_column)
            .filter(|value| self.heading.is_match(value))
    }

    fn subheading_code<'a>(&self, row: &'a RawRow) -> Option<&'a str> {
        row.cell(self.subheading_column)
            .filter(|value| self.subheading.is_match(value))
    }
}
