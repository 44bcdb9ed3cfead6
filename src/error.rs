use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SalvageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Invalid workbook: {0}")]
    InvalidWorkbook(String),

    #[error("Malformed XML in {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: quick_xml::Error,
    },
}

impl SalvageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SalvageError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn xml(part: &str, source: impl Into<quick_xml::Error>) -> Self {
        SalvageError::Xml {
            part: part.to_string(),
            source: source.into(),
        }
    }

    /// Whether the error came from storage rather than archive structure.
    pub fn is_io(&self) -> bool {
        matches!(self, SalvageError::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, SalvageError>;
