use crate::error::ExtractError;
use crate::models::{ExtractionOptions, RawRow, Table, RAW_ROW_WIDTH};
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::content::Operation;
use lopdf::{Document, Object};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Source of raw table rows for one tariff document.
pub trait TableExtractor {
    fn extract_tables(&self, path: &Path) -> Result<Vec<Table>, ExtractError>;
}

/// Rebuilds table rows from positioned text in each page's content stream.
///
/// Fragments are grouped into visual lines by baseline and into columns by
/// `column_edges`. A line with nothing in a code column continues the row
/// above it, so wrapped descriptions come back as one newline-joined cell.
#[derive(Debug, Clone)]
pub struct LopdfTableExtractor {
    column_edges: Vec<f32>,
    line_tolerance: f32,
    code_columns: [usize; 2],
}

impl LopdfTableExtractor {
    pub fn new(options: &ExtractionOptions) -> Self {
        Self {
            column_edges: options.column_edges.clone(),
            line_tolerance: options.line_tolerance,
            code_columns: [options.heading_column, options.subheading_column],
        }
    }
}

impl Default for LopdfTableExtractor {
    fn default() -> Self {
        Self::new(&ExtractionOptions::default())
    }
}

impl TableExtractor for LopdfTableExtractor {
    fn extract_tables(&self, path: &Path) -> Result<Vec<Table>, ExtractError> {
        let document =
            Document::load(path).map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        let mut tables = Vec::new();
        for (page_no, page_id) in document.get_pages() {
            let content = document
                .get_and_decode_page_content(page_id)
                .map_err(|error| ExtractError::PdfParse(error.to_string()))?;

            let fragments = collect_fragments(&content.operations);
            let rows = self.rows_from_fragments(fragments);
            debug!(page = page_no, rows = rows.len(), "reconstructed page table");

            if !rows.is_empty() {
                tables.push(Table {
                    page: page_no,
                    rows,
                });
            }
        }

        Ok(tables)
    }
}

impl LopdfTableExtractor {
    fn column_for(&self, x: f32) -> usize {
        self.column_edges.iter().filter(|edge| x >= **edge).count()
    }

    fn rows_from_fragments(&self, mut fragments: Vec<TextFragment>) -> Vec<RawRow> {
        fragments.sort_by(|left, right| {
            right
                .y
                .total_cmp(&left.y)
                .then_with(|| left.x.total_cmp(&right.x))
        });

        let mut lines: Vec<Vec<TextFragment>> = Vec::new();
        for fragment in fragments {
            match lines.last_mut() {
                Some(line) if (line[0].y - fragment.y).abs() <= self.line_tolerance => {
                    line.push(fragment)
                }
                _ => lines.push(vec![fragment]),
            }
        }

        let mut rows: Vec<RawRow> = Vec::new();
        for mut line in lines {
            line.sort_by(|left, right| left.x.total_cmp(&right.x));

            let mut cells: [Option<String>; RAW_ROW_WIDTH] = Default::default();
            for fragment in line {
                let column = self.column_for(fragment.x);
                let Some(cell) = cells.get_mut(column) else {
                    continue;
                };
                match cell {
                    Some(existing) => {
                        existing.push(' ');
                        existing.push_str(&fragment.text);
                    }
                    None => *cell = Some(fragment.text),
                }
            }

            let starts_row = self
                .code_columns
                .iter()
                .any(|column| cells.get(*column).is_some_and(|cell| cell.is_some()));

            match rows.last_mut() {
                Some(previous) if !starts_row => {
                    for (index, cell) in cells.iter().enumerate() {
                        if let Some(text) = cell {
                            previous.append_to_cell(index, text);
                        }
                    }
                }
                _ => rows.push(RawRow::from_cells(cells)),
            }
        }

        rows.retain(|row| !row.is_blank());
        rows
    }
}

#[derive(Debug, Clone)]
struct TextFragment {
    x: f32,
    y: f32,
    text: String,
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Walks text-positioning and text-showing operators. The current
/// transformation matrix is assumed to be the identity.
fn collect_fragments(operations: &[Operation]) -> Vec<TextFragment> {
    let mut fragments = Vec::new();
    let mut line_matrix = IDENTITY;
    let mut leading = 0.0f32;

    for operation in operations {
        let operands = &operation.operands;
        match operation.operator.as_str() {
            "BT" => line_matrix = IDENTITY,
            "Tm" => {
                if let Some(values) = floats::<6>(operands) {
                    line_matrix = values;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = floats::<2>(operands) {
                    line_matrix = translate(line_matrix, tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = floats::<2>(operands) {
                    leading = -ty;
                    line_matrix = translate(line_matrix, tx, ty);
                }
            }
            "TL" => {
                if let Some([value]) = floats::<1>(operands) {
                    leading = value;
                }
            }
            "T*" => line_matrix = translate(line_matrix, 0.0, -leading),
            "Tj" | "TJ" => push_fragment(&mut fragments, line_matrix, operands),
            "'" => {
                line_matrix = translate(line_matrix, 0.0, -leading);
                push_fragment(&mut fragments, line_matrix, operands);
            }
            "\"" => {
                line_matrix = translate(line_matrix, 0.0, -leading);
                push_fragment(&mut fragments, line_matrix, operands.get(2..).unwrap_or(&[]));
            }
            _ => {}
        }
    }

    fragments
}

fn push_fragment(fragments: &mut Vec<TextFragment>, matrix: [f32; 6], operands: &[Object]) {
    let text = operands.iter().map(shown_text).collect::<String>();
    let text = text.trim();
    if text.is_empty() {
        return;
    }

    fragments.push(TextFragment {
        x: matrix[4],
        y: matrix[5],
        text: text.to_string(),
    });
}

fn shown_text(object: &Object) -> String {
    match object {
        Object::String(bytes, _) => decode_pdf_string(bytes),
        Object::Array(items) => {
            let mut text = String::new();
            for item in items {
                match item {
                    Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
                    // large negative kerning is a visual word gap
                    other => {
                        if other.as_float().is_ok_and(|adjust| adjust <= -200.0) {
                            text.push(' ');
                        }
                    }
                }
            }
            text
        }
        _ => String::new(),
    }
}

fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();
        return String::from_utf16_lossy(&units);
    }

    bytes.iter().map(|byte| char::from(*byte)).collect()
}

fn floats<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    if operands.len() < N {
        return None;
    }
    let mut values = [0.0f32; N];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = operand.as_float().ok()?;
    }
    Some(values)
}

fn translate(matrix: [f32; 6], tx: f32, ty: f32) -> [f32; 6] {
    let [a, b, c, d, e, f] = matrix;
    [a, b, c, d, tx * a + ty * c + e, tx * b + ty * d + f]
}

#[derive(Debug, Clone)]
pub struct TableServiceConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct TableServiceRequest {
    pdf_base64: String,
    source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TableServiceResponse {
    #[serde(default)]
    tables: Vec<Vec<Vec<Option<String>>>>,
}

/// Sends the document to an HTTP table-extraction service (a lattice
/// extractor run out of process) and reads back rows of cells per table.
pub struct TableServiceExtractor {
    config: TableServiceConfig,
    client: Client,
}

impl TableServiceExtractor {
    pub fn new(config: TableServiceConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn from_env() -> Option<Self> {
        parse_table_service_config().map(Self::new)
    }
}

impl TableExtractor for TableServiceExtractor {
    fn extract_tables(&self, path: &Path) -> Result<Vec<Table>, ExtractError> {
        let pdf = std::fs::read(path)?;
        let payload = TableServiceRequest {
            pdf_base64: STANDARD.encode(pdf),
            source_path: path.to_string_lossy().to_string(),
        };

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;

        if !response.status().is_success() {
            return Err(ExtractError::TableService(format!(
                "request to {} returned {}",
                self.config.endpoint,
                response.status()
            )));
        }

        let payload: TableServiceResponse = response.json()?;
        Ok(payload_to_tables(payload))
    }
}

fn payload_to_tables(payload: TableServiceResponse) -> Vec<Table> {
    payload
        .tables
        .into_iter()
        .enumerate()
        .filter_map(|(index, rows)| {
            let rows = rows
                .into_iter()
                .map(RawRow::from_cells)
                .filter(|row| !row.is_blank())
                .collect::<Vec<_>>();
            if rows.is_empty() {
                None
            } else {
                Some(Table {
                    page: (index + 1) as u32,
                    rows,
                })
            }
        })
        .collect()
}

fn parse_table_service_config() -> Option<TableServiceConfig> {
    let endpoint = std::env::var("TABLE_SERVICE_ENDPOINT").ok()?;
    let endpoint = endpoint.trim().to_string();
    if endpoint.is_empty() {
        return None;
    }

    let api_key = std::env::var("TABLE_SERVICE_API_KEY")
        .ok()
        .and_then(|value| {
            let key = value.trim().to_string();
            if key.is_empty() {
                None
            } else {
                Some(key)
            }
        });

    Some(TableServiceConfig { endpoint, api_key })
}

/// Local content-stream extractor first; the table service (when configured)
/// takes over for documents the local pass cannot parse or finds no tables in.
pub struct FallbackTableExtractor<P, S> {
    primary: P,
    secondary: Option<S>,
}

impl<P, S> FallbackTableExtractor<P, S> {
    pub fn new(primary: P, secondary: Option<S>) -> Self {
        Self { primary, secondary }
    }
}

impl FallbackTableExtractor<LopdfTableExtractor, TableServiceExtractor> {
    pub fn from_env(options: &ExtractionOptions) -> Self {
        Self::new(LopdfTableExtractor::new(options), TableServiceExtractor::from_env())
    }
}

impl<P, S> TableExtractor for FallbackTableExtractor<P, S>
where
    P: TableExtractor,
    S: TableExtractor,
{
    fn extract_tables(&self, path: &Path) -> Result<Vec<Table>, ExtractError> {
        let extracted = self.primary.extract_tables(path);

        let Some(secondary) = &self.secondary else {
            return extracted;
        };

        match extracted {
            Ok(tables) if !tables.is_empty() => Ok(tables),
            Ok(_) => {
                debug!(path = %path.display(), "no local tables; asking table service");
                secondary.extract_tables(path)
            }
            Err(ExtractError::PdfParse(parse_error)) => {
                warn!(path = %path.display(), error = %parse_error, "local parse failed; asking table service");
                secondary.extract_tables(path).map_err(|service_error| {
                    ExtractError::PdfParse(format!(
                        "{parse_error}; table service fallback failed: {service_error}"
                    ))
                })
            }
            Err(error) => Err(error),
        }
    }
}
