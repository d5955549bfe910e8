use crate::classifier::RowClassifier;
use crate::dataset::write_dataset;
use crate::error::ExtractError;
use crate::extractor::TableExtractor;
use crate::hierarchy::build_record;
use crate::models::{ExtractionOptions, HsRecord, RunContext};
use crate::report::{FileReport, FileStatus, RunReport};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone)]
pub struct SectionFiles {
    pub dir_name: String,
    pub section: String,
    pub files: Vec<PathBuf>,
}

#[derive(Debug)]
pub enum FileOutcome {
    Extracted { records: Vec<HsRecord> },
    Skipped { reason: String },
}

#[derive(Debug)]
pub struct ExtractionRun {
    pub report: RunReport,
    pub records: Vec<HsRecord>,
}

impl ExtractionRun {
    pub fn is_empty_run(&self) -> bool {
        self.report.succeeded() == 0
    }
}

pub fn canonical_section(dir_name: &str, section_re: &Regex) -> String {
    section_re
        .captures(dir_name)
        .and_then(|capture| capture.get(1))
        .map(|numeral| format!("Section {}", numeral.as_str().to_uppercase()))
        .unwrap_or_else(|| dir_name.to_string())
}

pub fn is_tariff_file(file_name: &str, options: &ExtractionOptions) -> bool {
    let lowered = file_name.to_lowercase();
    let extension = format!(".{}", options.document_extension.to_lowercase());
    lowered.contains(&options.file_keyword.to_lowercase()) && lowered.ends_with(&extension)
}

fn is_skipped_dir(entry: &DirEntry, skip_keyword: &str) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_string_lossy()
            .to_lowercase()
            .contains(&skip_keyword.to_lowercase())
}

pub fn discover_sections(
    root: &Path,
    options: &ExtractionOptions,
) -> Result<Vec<SectionFiles>, ExtractError> {
    if !root.is_dir() {
        return Err(ExtractError::InvalidArgument(format!(
            "tariff folder not found: {}",
            root.display()
        )));
    }

    let section_re = Regex::new(options.section_regex)?;
    let mut sections: BTreeMap<PathBuf, SectionFiles> = BTreeMap::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let skipped = is_skipped_dir(entry, options.skip_keyword);
            if skipped {
                info!(folder = %entry.file_name().to_string_lossy(), "skipping preamble folder");
            }
            !skipped
        });

    for entry in walker.filter_map(|item| item.ok()) {
        if entry.file_type().is_dir() {
            let dir_name = entry.file_name().to_string_lossy().to_string();
            sections.insert(
                entry.path().to_path_buf(),
                SectionFiles {
                    section: canonical_section(&dir_name, &section_re),
                    dir_name,
                    files: Vec::new(),
                },
            );
            continue;
        }

        if !entry.file_type().is_file() || entry.depth() < 2 {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !is_tariff_file(&file_name, options) {
            continue;
        }

        if let Some(section) = entry
            .path()
            .parent()
            .and_then(|parent| sections.get_mut(parent))
        {
            section.files.push(entry.path().to_path_buf());
        }
    }

    Ok(sections.into_values().collect())
}

pub fn process_file<T: TableExtractor>(
    path: &Path,
    extractor: &T,
    classifier: &RowClassifier,
    context: &RunContext,
) -> FileOutcome {
    match extract_file_records(path, extractor, classifier, context) {
        Ok(records) => FileOutcome::Extracted { records },
        Err(error) => FileOutcome::Skipped {
            reason: error.to_string(),
        },
    }
}

fn extract_file_records<T: TableExtractor>(
    path: &Path,
    extractor: &T,
    classifier: &RowClassifier,
    context: &RunContext,
) -> Result<Vec<HsRecord>, ExtractError> {
    let tables = extractor.extract_tables(path)?;
    if tables.is_empty() {
        return Err(ExtractError::NoTables);
    }

    let classified = tables
        .iter()
        .flat_map(|table| table.rows.iter())
        .filter_map(|row| classifier.classify(row))
        .collect::<Vec<_>>();

    if classified.is_empty() {
        return Err(ExtractError::NoRows);
    }

    let mut records = Vec::with_capacity(classified.len());
    for row in &classified {
        match build_record(row, context) {
            Ok(record) => records.push(record),
            Err(record_error) => error!(
                path = %path.display(),
                code = %row.code.escape_debug(),
                error = %record_error,
                "dropping malformed row"
            ),
        }
    }

    Ok(records)
}

pub fn extract_catalog<T: TableExtractor>(
    root: &Path,
    options: &ExtractionOptions,
    extractor: &T,
) -> Result<ExtractionRun, ExtractError> {
    extract_catalog_at(root, options, extractor, Utc::now())
}

pub fn extract_catalog_at<T: TableExtractor>(
    root: &Path,
    options: &ExtractionOptions,
    extractor: &T,
    run_at: DateTime<Utc>,
) -> Result<ExtractionRun, ExtractError> {
    let classifier = RowClassifier::new(options)?;
    let sections = discover_sections(root, options)?;
    info!(folder = %root.display(), run_at = %run_at.to_rfc3339(), "starting batch extraction");

    let mut report = RunReport::new(run_at);
    let mut records = Vec::new();

    for section in sections {
        info!(folder = %section.dir_name, section = %section.section, files = section.files.len(), "scanning folder");
        let context = RunContext {
            section: section.section.clone(),
            extracted_at: run_at,
        };

        for path in &section.files {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .ok_or_else(|| ExtractError::MissingFileName(path.display().to_string()))?;
            info!(file = %format!("{}/{}", section.dir_name, file_name), "processing");

            let status = match process_file(path, extractor, &classifier, &context) {
                FileOutcome::Extracted {
                    records: file_records,
                } => {
                    info!(file = %file_name, rows = file_records.len(), "staged rows");
                    let rows = file_records.len();
                    records.extend(file_records);
                    FileStatus::Succeeded { rows }
                }
                FileOutcome::Skipped { reason } => {
                    warn!(file = %file_name, reason = %reason, "failed to process file");
                    FileStatus::Failed { reason }
                }
            };

            report.files.push(FileReport {
                section_dir: section.dir_name.clone(),
                file_name,
                status,
            });
        }
    }

    // lexicographic on the digit string; stable, so ties keep file order
    records.sort_by(|left, right| left.code_clean.cmp(&right.code_clean));

    Ok(ExtractionRun { report, records })
}

/// Writes the report, then the combined dataset when at least one file
/// succeeded. A run with no successful file leaves any earlier dataset
/// untouched and returns [`ExtractError::RunEmpty`].
pub fn persist_run(
    run: &ExtractionRun,
    dataset_path: &Path,
    report_path: &Path,
) -> Result<usize, ExtractError> {
    fs::write(report_path, run.report.render())?;
    info!(path = %report_path.display(), "wrote extraction log");

    if run.is_empty_run() {
        error!(attempted = run.report.files.len(), "no data was extracted from any pdf");
        return Err(ExtractError::RunEmpty {
            attempted: run.report.files.len(),
        });
    }

    let written = write_dataset(dataset_path, &run.records)?;
    info!(path = %dataset_path.display(), rows = written, "saved combined dataset");
    Ok(written)
}
