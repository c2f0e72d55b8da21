use std::path::PathBuf;
use xlquery::XlqueryError;
use xlquery::fragmentation::FragmentationError;

#[derive(Debug)]
pub enum XlseekError {
    Xlquery(XlqueryError),
    Fragmentation(FragmentationError),
    PeptideNotFound {
        descriptor: String,
    },
    InvalidSpectrum {
        id: String,
        msg: String,
    },
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    ParseError {
        msg: String,
    },
}

impl std::fmt::Display for XlseekError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for XlseekError {}

pub type Result<T> = std::result::Result<T, XlseekError>;

impl From<XlqueryError> for XlseekError {
    fn from(x: XlqueryError) -> Self {
        Self::Xlquery(x)
    }
}

impl From<FragmentationError> for XlseekError {
    fn from(x: FragmentationError) -> Self {
        Self::Fragmentation(x)
    }
}

impl From<serde_json::Error> for XlseekError {
    fn from(val: serde_json::Error) -> Self {
        XlseekError::ParseError {
            msg: val.to_string(),
        }
    }
}
