use crate::fragmentation::FragmentationError;
use crate::models::chemistry::ChemistryError;
use crate::models::peptide::PeptideId;
use std::fmt::Display;

/// Errors raised while building or serving a fragment index.
///
/// Conditions that are expected during a search are not errors: a peak
/// with too many candidates gives an empty query result, and an
/// unsupported link is reported through unset link sites.
#[derive(Debug)]
pub enum XlqueryError {
    /// Fragment generation failed during a build. Fragmentation is
    /// deterministic, so this means the configuration is broken and no
    /// part of the index can be used.
    ConfigurationDefect {
        peptide: PeptideId,
        source: FragmentationError,
    },
    /// The stop flag was raised before the build finished.
    Cancelled,
    Storage(rusqlite::Error),
    Io(std::io::Error),
    UnknownGenerator {
        id: String,
    },
    Chemistry(ChemistryError),
    InvalidOptions {
        msg: String,
    },
}

impl Display for XlqueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XlqueryError::ConfigurationDefect { peptide, source } => {
                write!(f, "Fragmentation of peptide {} failed: {}", peptide, source)
            }
            XlqueryError::Cancelled => write!(f, "Cancelled before completion"),
            XlqueryError::Storage(e) => write!(f, "Fragment store error: {}", e),
            XlqueryError::Io(e) => write!(f, "I/O error: {}", e),
            XlqueryError::UnknownGenerator { id } => {
                write!(f, "No fragment or loss generator registered as '{}'", id)
            }
            XlqueryError::Chemistry(e) => write!(f, "{}", e),
            XlqueryError::InvalidOptions { msg } => write!(f, "Invalid options: {}", msg),
        }
    }
}

impl std::error::Error for XlqueryError {}

pub type Result<T> = std::result::Result<T, XlqueryError>;

impl From<rusqlite::Error> for XlqueryError {
    fn from(e: rusqlite::Error) -> Self {
        XlqueryError::Storage(e)
    }
}

impl From<std::io::Error> for XlqueryError {
    fn from(e: std::io::Error) -> Self {
        XlqueryError::Io(e)
    }
}

impl From<ChemistryError> for XlqueryError {
    fn from(e: ChemistryError) -> Self {
        XlqueryError::Chemistry(e)
    }
}
