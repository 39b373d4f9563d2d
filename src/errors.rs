use thiserror::Error;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("site file not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid site file: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum SubjectError {
    #[error("missing subject")]
    Missing,
    #[error("invalid subject: {0}")]
    Invalid(String),
}
