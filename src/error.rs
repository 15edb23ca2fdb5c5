use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ReportError {
    MissingInput(PathBuf),
    Json(serde_json::Error),
    MissingTemplate(PathBuf),
    MalformedTemplate(String),
    InvalidConfiguration(String),
    UnplaceableFlowable(String),
    Pdf(lopdf::Error),
    Http(reqwest::Error),
    Io(std::io::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::MissingInput(path) => {
                write!(f, "input file not found: {}", path.display())
            }
            ReportError::Json(err) => write!(f, "invalid inspection json: {}", err),
            ReportError::MissingTemplate(path) => {
                write!(f, "template pdf not found: {}", path.display())
            }
            ReportError::MalformedTemplate(message) => {
                write!(f, "malformed template pdf: {}", message)
            }
            ReportError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            ReportError::UnplaceableFlowable(message) => {
                write!(f, "flowable cannot fit on any page: {}", message)
            }
            ReportError::Pdf(err) => write!(f, "pdf error: {}", err),
            ReportError::Http(err) => write!(f, "http client error: {}", err),
            ReportError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Json(err) => Some(err),
            ReportError::Pdf(err) => Some(err),
            ReportError::Http(err) => Some(err),
            ReportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReportError {
    fn from(value: std::io::Error) -> Self {
        ReportError::Io(value)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(value: serde_json::Error) -> Self {
        ReportError::Json(value)
    }
}

impl From<lopdf::Error> for ReportError {
    fn from(value: lopdf::Error) -> Self {
        ReportError::Pdf(value)
    }
}

impl From<reqwest::Error> for ReportError {
    fn from(value: reqwest::Error) -> Self {
        ReportError::Http(value)
    }
}
