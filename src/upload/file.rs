//! File intake
//!
//! Validates a generic file upload, reads it from disk, and stores it.

use super::{
    check_size, local_name, report, FileDescriptor, UploadError, UploadKind, UploadResult,
    Uploader,
};
use crate::config::UploadLimits;
use bytes::Bytes;

/// Handles files uploaded through the forum's file extension point
pub struct FileIntake<'a> {
    limits: &'a UploadLimits,
    uploader: &'a Uploader,
}

impl<'a> FileIntake<'a> {
    pub fn new(limits: &'a UploadLimits, uploader: &'a Uploader) -> Self {
        Self { limits, uploader }
    }

    /// Validate, read, and upload a file.
    ///
    /// Validation happens before the file is touched.
    pub async fn handle(&self, file: Option<FileDescriptor>) -> Result<UploadResult, UploadError> {
        let file = file.ok_or_else(|| UploadError::InvalidInput("invalid file".into()))?;
        let path = file
            .path
            .as_deref()
            .ok_or_else(|| UploadError::InvalidInput("invalid file path".into()))?;

        check_size(self.limits, file.size)?;

        let name = local_name(file.name.as_deref(), path)
            .ok_or_else(|| UploadError::InvalidInput("invalid file path".into()))?;

        let buffer = tokio::fs::read(path)
            .await
            .map_err(|e| report(UploadError::Read(e)))?;

        self.uploader
            .upload(&name, Bytes::from(buffer), UploadKind::File)
            .await
    }
}
