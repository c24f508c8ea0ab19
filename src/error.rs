use thiserror::Error;

#[derive(Error, Debug)]
pub enum KpiDigestError {
    #[error("Invalid layout for table '{table}': {details}")]
    InvalidLayout { table: String, details: String },

    #[error("Invalid review table layout: {0}")]
    InvalidReviewLayout(String),

    #[error("Invalid target for metric '{key}': {details}")]
    InvalidTarget { key: String, details: String },

    #[error("Duplicate layout for service '{service}' and cadence {cadence}")]
    DuplicateLayout { service: String, cadence: String },

    #[error("Invalid detection thresholds: {0}")]
    InvalidThresholds(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KpiDigestError>;
