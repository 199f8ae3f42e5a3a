use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutofillError {
    #[error("Failed to connect to Chrome: {0}")]
    ConnectionFailed(String),

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Stale element reference: {0}")]
    StaleElement(u64),

    #[error("No page available")]
    NoPage,

    #[error("File upload failed: {0}")]
    UploadFailed(String),

    #[error("Invalid values document: {0}")]
    InvalidValues(String),

    #[error("Progress stuck at {location}")]
    Stuck {
        location: String,
        screenshot: Option<PathBuf>,
    },

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AutofillError>;
