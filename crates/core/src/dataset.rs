use crate::error::ExtractError;
use crate::models::{DatasetRow, HsRecord};
use std::fs;
use std::path::Path;

/// Writes the combined dataset, replacing any earlier file. Records are
/// written in the order given.
pub fn write_dataset(path: &Path, records: &[HsRecord]) -> Result<usize, ExtractError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(DatasetRow::from(record))?;
    }
    if records.is_empty() {
        writer.write_record([
            "section",
            "hscode",
            "description",
            "parent",
            "level",
            "datetime_extracted",
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| ExtractError::Io(error.into_error()))?;
    fs::write(path, bytes)?;
    Ok(records.len())
}

/// Reads a combined dataset back, skipping rows without a code.
pub fn read_dataset(path: &Path) -> Result<Vec<DatasetRow>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for row in reader.deserialize::<DatasetRow>() {
        let row = row?;
        if row.hscode.trim().is_empty() {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}
