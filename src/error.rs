// Error types for idorscan
// Configuration problems are fatal before any request is issued;
// per-request transport failures are recorded on the result instead

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("http client error: {0}")]
    Client(String),

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("report i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_yaml::Error> for ScanError {
    fn from(err: serde_yaml::Error) -> Self {
        ScanError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Serialization(err.to_string())
    }
}
