//! Error types for the alarm protocol
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for alarm protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the alarm protocol
#[derive(Error, Debug)]
pub enum Error {
    /// Archive sink errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// Mail sender errors
    #[error("Mailer error: {0}")]
    Mailer(String),

    /// Media store errors
    #[error("Media store error: {0}")]
    MediaStore(String),

    /// Log store errors
    #[error("Log store error: {0}")]
    LogStore(String),

    /// Document rendering errors
    #[error("Renderer error: {0}")]
    Renderer(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors from file-backed stores
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an archive error
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    /// Create a mailer error
    pub fn mailer(msg: impl Into<String>) -> Self {
        Self::Mailer(msg.into())
    }

    /// Create a media store error
    pub fn media_store(msg: impl Into<String>) -> Self {
        Self::MediaStore(msg.into())
    }

    /// Create a log store error
    pub fn log_store(msg: impl Into<String>) -> Self {
        Self::LogStore(msg.into())
    }

    /// Create a renderer error
    pub fn renderer(msg: impl Into<String>) -> Self {
        Self::Renderer(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
