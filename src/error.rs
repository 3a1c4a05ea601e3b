//! Error types for loading, laying out and submitting a selection.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification, tagged onto logged failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidImage,
    ImageLoad,
    Layout,
    Validation,
    Transport,
    Backend,
    Configuration,
}

/// Submit preconditions that were not met.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please upload an image first.")]
    NoFile,
    #[error("Points not initialized correctly or image not fully loaded.")]
    PointsNotReady,
    #[error("Image dimensions or scale factors not set. Please re-upload.")]
    ScaleUndefined,
    #[error("A request is already in progress.")]
    SubmissionInFlight,
}

/// Everything that can end the current attempt. None of these are retried.
#[derive(Error, Debug)]
pub enum Error {
    /// The image decoded but reports a zero natural dimension
    #[error("Image data is invalid or not fully loaded ({width}x{height}).")]
    InvalidImage { width: u32, height: u32 },

    /// The file could not be read or decoded
    #[error("Could not load the selected image file. {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Nothing was measured on screen after the layout settled
    #[error("Image failed to render with correct dimensions ({width}x{height}).")]
    Layout { width: f32, height: f32 },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Network failure talking to the processing service
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response without a usable error body
    #[error("HTTP error! status: {0}")]
    HttpStatus(u16),

    /// The response could not be understood
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The service answered with its own error message
    #[error("{message}")]
    Backend { status: Option<u16>, message: String },

    /// A required surface or setting is missing at start-up
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidImage { .. } => ErrorKind::InvalidImage,
            Error::ImageLoad { .. } => ErrorKind::ImageLoad,
            Error::Layout { .. } => ErrorKind::Layout,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Transport(_) | Error::HttpStatus(_) | Error::MalformedResponse(_) => {
                ErrorKind::Transport
            }
            Error::Backend { .. } => ErrorKind::Backend,
            Error::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Text shown on the status line.
    pub fn status_text(&self) -> String {
        match self {
            // Validation and soft backend failures read as instructions, not errors
            Error::Validation(v) => v.to_string(),
            Error::Backend { status: None, message } => message.clone(),
            Error::Configuration(_) => format!("Critical Error: {self}"),
            _ => format!("Error: {self}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
