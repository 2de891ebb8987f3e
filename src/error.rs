use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of the image fetcher for one URL. Cloneable so every task awaiting
/// the same in-flight fetch sees the same error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to fetch image {url}: {message}")]
pub struct ImageFetchError {
    pub url: String,
    pub message: String,
}

impl ImageFetchError {
    pub fn new(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrontmatterError {
    #[error("expected 2 separator lines, found {found}")]
    SeparatorCount { found: usize },
    #[error("invalid metadata block: {0}")]
    InvalidYaml(String),
}

/// Errors that drop a single record's document.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Image(#[from] ImageFetchError),
}

#[derive(Debug, Error)]
#[error("failed to write {}: {source}", path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Non-fatal problems collected during a run and reported in the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    UnknownSheet(String),
    MalformedFrontmatter { record: String, error: FrontmatterError },
    MissingTitle { sheet: String },
    RecordFailed { record: String, message: String },
    WriteFailed { path: String, message: String },
    DuplicatePath { path: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnknownSheet(sheet) => write!(f, "missing metadata for sheet {}", sheet),
            Warning::MalformedFrontmatter { record, error } => {
                write!(f, "malformed frontmatter in {}: {}", record, error)
            }
            Warning::MissingTitle { sheet } => write!(f, "missing title in sheet {}", sheet),
            Warning::RecordFailed { record, message } => {
                write!(f, "record {} dropped: {}", record, message)
            }
            Warning::WriteFailed { path, message } => write!(f, "write {} failed: {}", path, message),
            Warning::DuplicatePath { path } => {
                write!(f, "{} already written by another record, skipped", path)
            }
        }
    }
}
