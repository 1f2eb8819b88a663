use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory '{0}' does not exist")]
    DirectoryNotFound(PathBuf),

    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("No image files found in {dir} (looking for extensions: {extensions})")]
    NoImageFilesFound { dir: PathBuf, extensions: String },

    #[error("No images to upload: all {0} candidate files failed to prepare")]
    NothingToUpload(usize),

    #[error("Invalid batch size: {0}. Must be at least 1")]
    InvalidBatchSize(usize),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("An API token is required")]
    MissingToken,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid crop: {0}")]
    InvalidCrop(String),

    #[error("Walkdir error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("No data found for {0}")]
    NotFound(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, UploadError>;

/// Failure to turn one source file into an upload record. Never aborts a run.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file name of {0} is not valid UTF-8")]
    InvalidFileName(PathBuf),
}

/// Outcome of a single failed batch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("payload too large (HTTP 413)")]
    PayloadTooLarge,

    #[error("{0}")]
    Failed(String),
}

impl TransportError {
    pub fn failed(message: impl Into<String>) -> Self {
        TransportError::Failed(message.into())
    }

    pub fn is_too_large(&self) -> bool {
        matches!(self, TransportError::PayloadTooLarge)
    }
}
