use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("table extraction service failed: {0}")]
    TableService(String),

    #[error("No tables were found in the PDF (file might be empty)")]
    NoTables,

    #[error("No valid HS code data rows found after filtering")]
    NoRows,

    #[error("no data was extracted from any of the {attempted} attempted file(s)")]
    RunEmpty { attempted: usize },
}

/// A classified row that cannot be placed in the 2/4/6/8 digit hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("code {code:?} has {length} digits; expected 2, 4, 6 or 8")]
    UnsupportedLevel { code: String, length: usize },

    #[error("code {0:?} contains non-digit characters")]
    NonDigit(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("store not available yet: {0}")]
    NotReady(String),
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;
