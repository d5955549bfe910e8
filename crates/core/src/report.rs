use chrono::{DateTime, Utc};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Succeeded { rows: usize },
    Failed { reason: String },
}

/// One attempted tariff file, identified the way the report prints it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub section_dir: String,
    pub file_name: String,
    pub status: FileStatus,
}

impl FileReport {
    pub fn label(&self) -> String {
        format!("{}/{}", self.section_dir, self.file_name)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, FileStatus::Succeeded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_at: DateTime<Utc>,
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn new(run_at: DateTime<Utc>) -> Self {
        Self {
            run_at,
            files: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|file| file.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- EXTRACTION LOG ---");
        let _ = writeln!(out, "Run finished on: {}", self.run_at.to_rfc3339());
        let _ = writeln!(out);
        let _ = writeln!(out, "Successfully processed: {}", self.succeeded());
        let _ = writeln!(out, "Failed to process: {}", self.failed());

        let _ = writeln!(out);
        let _ = writeln!(out, "--- SUCCESSFUL FILES ---");
        let successes = self
            .files
            .iter()
            .filter_map(|file| match &file.status {
                FileStatus::Succeeded { rows } => Some(format!("{} ({rows} rows)", file.label())),
                FileStatus::Failed { .. } => None,
            })
            .collect::<Vec<_>>();
        write_entries(&mut out, &successes);

        let _ = writeln!(out);
        let _ = writeln!(out, "--- FAILED FILES ---");
        let failures = self
            .files
            .iter()
            .filter_map(|file| match &file.status {
                FileStatus::Failed { reason } => Some(format!("{} - ERROR: {reason}", file.label())),
                FileStatus::Succeeded { .. } => None,
            })
            .collect::<Vec<_>>();
        write_entries(&mut out, &failures);

        out
    }
}

fn write_entries(out: &mut String, entries: &[String]) {
    if entries.is_empty() {
        let _ = writeln!(out, "None");
        return;
    }
    for entry in entries {
        let _ = writeln!(out, "- {entry}");
    }
}
