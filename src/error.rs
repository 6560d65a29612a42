// src/error.rs

//! Error types for detection and plan resolution

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during buildpack detection
#[derive(Error, Debug)]
pub enum Error {
    /// No candidate group passed detection
    #[error("no buildpack group passed detection")]
    FailedDetection,

    /// A non-optional buildpack failed in an unexpected way
    #[error("{0}")]
    Buildpack(String),

    /// A referenced buildpack has no descriptor on disk
    #[error("buildpack '{id}@{version}' not found under {}", .root.display())]
    BuildpackNotFound {
        id: String,
        version: String,
        root: PathBuf,
    },

    /// A descriptor exists but cannot be parsed
    #[error("malformed descriptor at {}: {reason}", .path.display())]
    MalformedDescriptor { path: PathBuf, reason: String },

    /// Detection was cancelled cooperatively
    #[error("detection cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    /// Wrap a buildpack-originated failure message
    pub fn buildpack(msg: impl Into<String>) -> Self {
        Error::Buildpack(msg.into())
    }

    /// True for failures that abandon a single group but allow the
    /// order walk to continue with the next candidate.
    pub fn is_failed_detection(&self) -> bool {
        matches!(self, Error::FailedDetection)
    }
}
