use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Number of cells retained from one physical table row. Cells past this
/// width are dropped; cells the extractor did not emit stay `None`.
pub const RAW_ROW_WIDTH: usize = 8;

/// Parent value carried by the 2-digit chapter tier.
pub const ROOT_PARENT: &str = "TOTAL";

/// One physical table row as emitted by a table extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: [Option<String>; RAW_ROW_WIDTH],
}

impl RawRow {
    pub fn from_cells<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let mut row = Self::default();
        for (slot, cell) in row.cells.iter_mut().zip(cells) {
            *slot = cell.map(Into::into);
        }
        row
    }

    /// Returns the cell text when the column exists and holds a non-empty value.
    pub fn cell(&self, index: usize) -> Option<&str> {
        self.cells
            .get(index)
            .and_then(|cell| cell.as_deref())
            .filter(|value| !value.is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.cells
            .iter()
            .all(|cell| cell.as_deref().map_or(true, |value| value.trim().is_empty()))
    }

    /// Appends `text` to the cell at `index`, separated by a newline the way
    /// lattice extractors render wrapped cell content.
    pub fn append_to_cell(&mut self, index: usize, text: &str) {
        let Some(slot) = self.cells.get_mut(index) else {
            return;
        };
        match slot {
            Some(existing) if !existing.is_empty() => {
                existing.push('\n');
                existing.push_str(text);
            }
            _ => *slot = Some(text.to_string()),
        }
    }
}

/// All rows a table extractor found on one page.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub page: u32,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowKind {
    /// Four-digit heading written as `XX.XX`.
    Heading4,
    /// Subheading written as `XXXX.XX`, `XXXX.XX.XX` and similar.
    Subheading6Plus,
    Noise,
}

/// A row that survived classification together with the code text that
/// made it survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRow {
    pub kind: RowKind,
    pub code: String,
    pub description: Option<String>,
}

/// Values shared by every record produced from one file of a run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub section: String,
    pub extracted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HsRecord {
    pub code: String,
    pub code_clean: String,
    pub level: u8,
    pub parent: String,
    pub description: String,
    pub section: String,
    pub extracted_at: DateTime<Utc>,
}

/// One line of the combined dataset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub section: String,
    pub hscode: String,
    pub description: String,
    pub parent: String,
    pub level: u8,
    pub datetime_extracted: DateTime<Utc>,
}

impl From<&HsRecord> for DatasetRow {
    fn from(record: &HsRecord) -> Self {
        Self {
            section: record.section.clone(),
            hscode: record.code_clean.clone(),
            description: record.description.clone(),
            parent: record.parent.clone(),
            level: record.level,
            datetime_extracted: record.extracted_at,
        }
    }
}

/// A catalog entry in the line-delimited interchange format consumed by the
/// search backend's bulk import.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub hscode: String,
    pub description: String,
    pub parent: Option<String>,
    pub level: i32,
    pub section: Option<String>,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub heading_column: usize,
    pub subheading_column: usize,
    pub description_column: usize,
    pub heading_regex: &'static str,
    pub subheading_regex: &'static str,
    pub section_regex: &'static str,
    pub document_extension: &'static str,
    pub file_keyword: &'static str,
    pub skip_keyword: &'static str,
    /// Left x-coordinates (PDF points) where columns 1.. begin.
    pub column_edges: Vec<f32>,
    /// Maximum baseline distance for two text fragments to share a line.
    pub line_tolerance: f32,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            heading_column: 0,
            subheading_column: 1,
            description_column: 3,
            heading_regex: r"^\d{2}\.\d{2}\n?$",
            subheading_regex: r"^\d{4}\.[0-9.]{2,5}\n?$",
            // the numeral ends at the first non-letter: `Section XVI_Machinery` is XVI
            section_regex: r"(?i)\bsection\s+([ivxlcdm]+)(?:[^a-z]|$)",
            document_extension: "pdf",
            file_keyword: "chapter",
            skip_keyword: "preamble",
            column_edges: vec![75.0, 140.0, 185.0, 420.0],
            line_tolerance: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
    pub query_by: Vec<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            top_k,
            query_by: vec!["description".to_string(), "hscode".to_string()],
        }
    }
}

/// A ranked catalog entry returned by a hybrid query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub hscode: String,
    pub description: String,
    pub parent: Option<String>,
    pub level: Option<i64>,
    pub section: Option<String>,
    pub text_match: Option<f64>,
    pub vector_distance: Option<f64>,
}

/// Backend response for one hybrid query. `raw` is passed through to HTTP
/// callers untouched; `hits` is the typed view of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub found: u64,
    pub hits: Vec<SearchHit>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_rows_leave_missing_cells_absent() {
        let row = RawRow::from_cells([Some("01.01"), None]);
        assert_eq!(row.cell(0), Some("01.01"));
        assert_eq!(row.cell(1), None);
        assert_eq!(row.cell(3), None);
        assert_eq!(row.cell(RAW_ROW_WIDTH + 4), None);
    }

    #[test]
    fn empty_cells_read_as_absent() {
        let row = RawRow::from_cells([Some(""), Some("0101.21")]);
        assert_eq!(row.cell(0), None);
        assert!(!row.is_blank());
        assert!(RawRow::from_cells([Some(" "), None::<&str>]).is_blank());
    }

    #[test]
    fn appended_text_is_newline_joined() {
        let mut row = RawRow::from_cells([Some("01.01"), None, None, Some("Live horses,")]);
        row.append_to_cell(3, "asses, mules");
        row.append_to_cell(2, "u");
        assert_eq!(row.cell(3), Some("Live horses,\nasses, mules"));
        assert_eq!(row.cell(2), Some("u"));
    }

    #[test]
    fn root_documents_omit_missing_optional_fields() {
        let document = IndexedDocument {
            hscode: "01".to_string(),
            description: "Live animals".to_string(),
            parent: None,
            level: 2,
            section: None,
            embedding: vec![0.5],
        };
        let encoded = serde_json::to_string(&document).expect("document should serialize");
        assert_eq!(
            encoded,
            r#"{"hscode":"01","description":"Live animals","level":2,"embedding":[0.5]}"#
        );
    }
}
