use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("failed to open source {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source did not contain a header row")]
    MissingHeader,

    #[error("header row invalid: expected columns {expected:?}, found {found:?}")]
    HeaderMismatch {
        expected: Vec<&'static str>,
        found: Vec<String>,
    },

    #[error("data row on line {line} has {found} fields, expected {expected}")]
    ColumnCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("CSV error on line {line}: {source}")]
    Csv {
        line: u64,
        #[source]
        source: csv::Error,
    },
}

impl ParserError {
    /// 1-based source line the error refers to, when one is known.
    pub fn line(&self) -> Option<u64> {
        match self {
            ParserError::ColumnCount { line, .. } | ParserError::Csv { line, .. } => Some(*line),
            ParserError::HeaderMismatch { .. } => Some(1),
            ParserError::Open { .. } | ParserError::MissingHeader => None,
        }
    }
}
