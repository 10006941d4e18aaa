//! Upload module
//!
//! Turns image and file descriptors handed over by the forum into OSS
//! objects: validate, read or resize, resolve a key, PUT, map the result.

use crate::config::UploadLimits;
use crate::metrics;
use crate::resize::ResizeError;
use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub mod file;
pub mod image;
pub mod key;
pub mod uploader;

pub use file::FileIntake;
pub use image::ImageIntake;
pub use key::{IdGenerator, UuidGenerator};
pub use uploader::Uploader;

/// Prefix for errors raised past input validation
pub const PACKAGE: &str = env!("CARGO_PKG_NAME");

/// Upload errors
///
/// Validation errors are returned as-is. Everything from the key resolver
/// onwards carries the package prefix and is logged where it is raised.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("[[error:file-too-big, {limit}]]")]
    FileTooLarge { limit: String },

    #[error("{} :: no known content type for '{}'", PACKAGE, .0)]
    InvalidFilename(String),

    #[error("{} :: {}", PACKAGE, .0)]
    ImageProcessing(#[from] ResizeError),

    #[error("{} :: {}", PACKAGE, .0)]
    Storage(#[from] StorageError),

    #[error("{} :: {}", PACKAGE, .0)]
    Read(#[from] std::io::Error),
}

impl UploadError {
    /// Short label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::InvalidInput(_) => "invalid_input",
            UploadError::FileTooLarge { .. } => "file_too_large",
            UploadError::InvalidFilename(_) => "invalid_filename",
            UploadError::ImageProcessing(_) => "image_processing",
            UploadError::Storage(_) => "storage",
            UploadError::Read(_) => "read",
        }
    }
}

/// Log and count an error raised past validation
pub(crate) fn report(err: UploadError) -> UploadError {
    metrics::record_error(err.kind());
    tracing::error!(error = %err, kind = err.kind(), "Upload failed");
    err
}

/// Which extension point an upload came through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    File,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::File => "file",
        }
    }
}

/// Upload result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Filename as given by the caller
    pub name: String,
    /// Public URL of the stored object
    pub url: String,
}

/// An image handed over by the forum.
///
/// Either a local upload (`path`) or a remote picture (`url`), e.g. an
/// avatar imported from another site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub url: Option<String>,
    /// Size in bytes as reported by the forum
    #[serde(default)]
    pub size: u64,
}

/// A generic file handed over by the forum
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub size: u64,
}

/// Reject sizes above the configured ceiling
pub(crate) fn check_size(limits: &UploadLimits, size: u64) -> Result<(), UploadError> {
    match limits.max_bytes() {
        Some(max) if size > max => {
            let limit = limits.max_display();
            metrics::record_error("file_too_large");
            tracing::error!(size, limit = %limit, "error:file-too-big");
            Err(UploadError::FileTooLarge { limit })
        }
        _ => Ok(()),
    }
}

/// Name used for a local upload: the given name, else the file name of the path
pub(crate) fn local_name(name: Option<&str>, path: &std::path::Path) -> Option<String> {
    name.filter(|n| !n.is_empty())
        .map(String::from)
        .or_else(|| path.file_name().map(|f| f.to_string_lossy().into_owned()))
}
