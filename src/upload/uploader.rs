//! Upload operation
//!
//! Stores one buffered object under a fresh key and maps the outcome to an
//! [`UploadResult`].
//!
//! # Example
//!
//! ```no_run
//! use aliyun_oss_uploadr::config::OssSettings;
//! use aliyun_oss_uploadr::storage::ClientHandle;
//! use aliyun_oss_uploadr::upload::{Uploader, UploadKind};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handle = Arc::new(ClientHandle::new(OssSettings::from_env()));
//! let uploader = Uploader::new(handle);
//!
//! let result = uploader
//!     .upload("notes.txt", Bytes::from("Hello, World!"), UploadKind::File)
//!     .await?;
//! println!("{} -> {}", result.name, result.url);
//! # Ok(())
//! # }
//! ```

use super::key::{self, IdGenerator, UuidGenerator};
use super::{report, UploadError, UploadKind, UploadResult};
use crate::metrics;
use crate::storage::{ClientHandle, PutObjectRequest, PutObjectResponse, StorageError};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

/// Upload operation bound to a client handle
pub struct Uploader {
    client: Arc<ClientHandle>,
    ids: Arc<dyn IdGenerator>,
}

impl Uploader {
    /// Uploader with random UUID keys
    pub fn new(client: Arc<ClientHandle>) -> Self {
        Self::with_id_generator(client, Arc::new(UuidGenerator))
    }

    pub fn with_id_generator(client: Arc<ClientHandle>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { client, ids }
    }

    pub fn client(&self) -> &ClientHandle {
        &self.client
    }

    /// Store `body` under a new key derived from `filename`.
    ///
    /// Makes at most one PUT. Failures are logged, counted, and returned
    /// with the package prefix.
    #[tracing::instrument(
        name = "upload.put",
        skip(self, body),
        fields(
            upload.kind = kind.as_str(),
            upload.bytes = body.len(),
            oss.key = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload(
        &self,
        filename: &str,
        body: Bytes,
        kind: UploadKind,
    ) -> Result<UploadResult, UploadError> {
        let settings = self.client.settings();
        let start_time = Instant::now();
        let bytes_written = body.len() as u64;

        let resolved = key::resolve_key(settings, filename, &self.ids.next_id()).map_err(report)?;
        tracing::Span::current().record("oss.key", resolved.key.as_str());

        let upload_result: Result<PutObjectResponse, StorageError> = async {
            let bucket = settings
                .bucket
                .clone()
                .filter(|b| !b.is_empty())
                .ok_or_else(|| StorageError::ConfigError("bucket is not configured".into()))?;
            let client = self.client.get()?;
            client
                .put_object(PutObjectRequest::public_read(
                    bucket,
                    resolved.key.as_str(),
                    body,
                    resolved.content_type.as_str(),
                ))
                .await
        }
        .await;

        let duration = start_time.elapsed();
        metrics::record_upload_duration(kind.as_str(), duration.as_secs_f64());

        match upload_result {
            Ok(response) => {
                metrics::record_upload_success(kind.as_str(), bytes_written);

                let url = key::resolve_url(settings, &resolved.key, &response.url);
                tracing::info!(
                    key = %resolved.key,
                    url = %url,
                    bytes_written,
                    duration_ms = duration.as_millis() as u64,
                    "Upload completed"
                );

                Ok(UploadResult {
                    name: filename.to_string(),
                    url,
                })
            }
            Err(e) => {
                metrics::record_upload_failure(kind.as_str());
                Err(report(UploadError::Storage(e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OssSettings;
    use crate::storage::ObjectStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        requests: Mutex<Vec<PutObjectRequest>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put_object(
            &self,
            request: PutObjectRequest,
        ) -> Result<PutObjectResponse, StorageError> {
            let url = format!(
                "https://{}.oss-cn-hangzhou.aliyuncs.com/{}",
                request.bucket, request.key
            );
            self.requests.lock().push(request);
            Ok(PutObjectResponse {
                url,
                etag: "\"etag\"".into(),
            })
        }
    }

    struct FixedId;

    impl IdGenerator for FixedId {
        fn next_id(&self) -> String {
            "fixed".into()
        }
    }

    fn uploader(settings: OssSettings, store: Arc<RecordingStore>) -> Uploader {
        let handle = ClientHandle::with_factory(settings, move |_| {
            let client: Arc<dyn ObjectStore> = store.clone();
            Ok(client)
        });
        Uploader::with_id_generator(Arc::new(handle), Arc::new(FixedId))
    }

    fn settings() -> OssSettings {
        OssSettings {
            bucket: Some("forum".into()),
            path: Some("uploads".into()),
            ..OssSettings::default()
        }
    }

    #[tokio::test]
    async fn test_upload_builds_public_read_request() {
        let store = Arc::new(RecordingStore::default());
        let uploader = uploader(settings(), store.clone());

        let result = uploader
            .upload("cat.png", Bytes::from_static(b"png-bytes"), UploadKind::File)
            .await
            .unwrap();

        assert_eq!(result.name, "cat.png");
        assert_eq!(
            result.url,
            "https://forum.oss-cn-hangzhou.aliyuncs.com/uploads/fixed.png"
        );

        let requests = store.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].bucket, "forum");
        assert_eq!(requests[0].key, "uploads/fixed.png");
        assert_eq!(requests[0].content_type, "image/png");
        assert_eq!(requests[0].acl, "public-read");
        assert_eq!(requests[0].content_length(), 9);
    }

    #[tokio::test]
    async fn test_custom_host_overrides_store_url() {
        let store = Arc::new(RecordingStore::default());
        let mut settings = settings();
        settings.host = Some("cdn.example.com".into());
        let uploader = uploader(settings, store);

        let result = uploader
            .upload("cat.png", Bytes::from_static(b"x"), UploadKind::Image)
            .await
            .unwrap();
        assert_eq!(result.url, "http://cdn.example.com/uploads/fixed.png");
    }

    #[tokio::test]
    async fn test_missing_bucket_is_storage_error() {
        let store = Arc::new(RecordingStore::default());
        let mut settings = settings();
        settings.bucket = None;
        let uploader = uploader(settings, store.clone());

        let err = uploader
            .upload("cat.png", Bytes::from_static(b"x"), UploadKind::File)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Storage(_)));
        assert!(err.to_string().starts_with("aliyun-oss-uploadr :: "));
        assert!(store.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_filename_never_reaches_store() {
        let store = Arc::new(RecordingStore::default());
        let uploader = uploader(settings(), store.clone());

        let err = uploader
            .upload("blob.unknownext", Bytes::from_static(b"x"), UploadKind::File)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidFilename(_)));
        assert!(store.requests.lock().is_empty());
    }
}
