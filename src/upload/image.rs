//! Image intake
//!
//! Local uploads are stored as they are. Remote images (for example an
//! avatar picked from another site) are downloaded, squared off to the
//! profile image dimension, re-encoded as PNG, and stored under the last
//! segment of their URL.

use super::{
    check_size, local_name, report, ImageDescriptor, UploadError, UploadKind, UploadResult,
    Uploader,
};
use crate::config::UploadLimits;
use crate::resize::{ImageResizer, ResizeError};
use bytes::Bytes;

/// Handles images uploaded through the forum's image extension point
pub struct ImageIntake<'a> {
    limits: &'a UploadLimits,
    uploader: &'a Uploader,
    resizer: &'a dyn ImageResizer,
    http_client: &'a reqwest::Client,
}

impl<'a> ImageIntake<'a> {
    pub fn new(
        limits: &'a UploadLimits,
        uploader: &'a Uploader,
        resizer: &'a dyn ImageResizer,
        http_client: &'a reqwest::Client,
    ) -> Self {
        Self {
            limits,
            uploader,
            resizer,
            http_client,
        }
    }

    /// Validate, read or resize, and upload an image.
    ///
    /// The size check runs before any read, download, or resize.
    pub async fn handle(&self, image: Option<ImageDescriptor>) -> Result<UploadResult, UploadError> {
        let image = image.ok_or_else(|| {
            tracing::error!("invalid image");
            UploadError::InvalidInput("invalid image".into())
        })?;

        check_size(self.limits, image.size)?;

        match image.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => self.handle_remote(url).await,
            None => self.handle_local(&image).await,
        }
    }

    async fn handle_local(&self, image: &ImageDescriptor) -> Result<UploadResult, UploadError> {
        let path = image
            .path
            .as_deref()
            .ok_or_else(|| UploadError::InvalidInput("invalid image path".into()))?;
        let name = local_name(image.name.as_deref(), path)
            .ok_or_else(|| UploadError::InvalidInput("invalid image path".into()))?;

        let buffer = tokio::fs::read(path)
            .await
            .map_err(|e| report(UploadError::Read(e)))?;

        self.uploader
            .upload(&name, Bytes::from(buffer), UploadKind::Image)
            .await
    }

    async fn handle_remote(&self, url: &str) -> Result<UploadResult, UploadError> {
        let filename = remote_filename(url);
        let dimension = self.limits.profile_image_dimension();

        let resized = self
            .fetch_and_resize(url, dimension)
            .await
            .map_err(|e| report(UploadError::ImageProcessing(e)))?;

        self.uploader
            .upload(filename, resized, UploadKind::Image)
            .await
    }

    #[tracing::instrument(name = "image.fetch_and_resize", skip(self), err)]
    async fn fetch_and_resize(&self, url: &str, dimension: u32) -> Result<Bytes, ResizeError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ResizeError::FetchError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResizeError::FetchError(format!(
                "GET {} returned {}",
                url, status
            )));
        }

        let source = response
            .bytes()
            .await
            .map_err(|e| ResizeError::FetchError(e.to_string()))?;

        self.resizer.resize(source, dimension).await
    }
}

/// Last path segment of a URL, used as the upload name
pub fn remote_filename(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}
