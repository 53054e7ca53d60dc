use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("refresh mode needs to be one of [\"all\", \"last\", \"custom\"], it can't be: {0}")]
    InvalidRefreshMode(String),

    #[error("invalid years provided: {invalid:?}. Years must be among: {valid:?}")]
    InvalidYearSelection {
        invalid: Vec<String>,
        valid: Vec<String>,
    },

    #[error("year {0} is not part of the EDC dataset")]
    UnknownYear(String),

    #[error("could not check freshness of the {year} dataset: {reason}")]
    FreshnessCheckFailed { year: String, reason: String },

    #[error("dataset datetime unavailable for {year}: {reason}")]
    DatasetDatetimeUnavailable { year: String, reason: String },

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("failed to extract {}: {reason}", .archive.display())]
    ExtractionFailed { archive: PathBuf, reason: String },

    #[error("environment needs to be one of [\"dev\", \"prod\"], it can't be: {0}")]
    InvalidEnvironment(String),

    #[error(transparent)]
    Db(#[from] duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
