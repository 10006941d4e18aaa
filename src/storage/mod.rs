//! OSS storage module
//!
//! Provides the Aliyun OSS client used for uploads and the lazily built
//! client handle shared by every upload operation.
//!
//! # Example
//!
//! ```no_run
//! use aliyun_oss_uploadr::storage::{ObjectStore, OssClient, OssClientConfig, PutObjectRequest};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OssClient::new(OssClientConfig {
//!     region: "oss-cn-hangzhou".to_string(),
//!     access_key_id: "access-key".to_string(),
//!     access_key_secret: "secret-key".to_string(),
//!     endpoint: None,
//!     timeout: None,
//! })?;
//!
//! let response = client
//!     .put_object(PutObjectRequest::public_read(
//!         "forum-assets",
//!         "uploads/hello.txt",
//!         Bytes::from("Hello, World!"),
//!         "text/plain",
//!     ))
//!     .await?;
//! println!("Uploaded to {}", response.url);
//! # Ok(())
//! # }
//! ```
//!
//! # Tracing
//!
//! `put_object` creates a span named `oss.put_object` with the bucket, key,
//! byte count, and (after the call) the ETag and HTTP status.

use crate::config::OssSettings;
use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

mod handle;
pub mod signer;

pub use handle::{ClientFactory, ClientHandle};

/// ACL applied to every uploaded object
pub const PUBLIC_READ: &str = "public-read";

/// Characters escaped in object keys; `/` keeps its path meaning
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("OSS returned {status} {code}: {message} (RequestId: {request_id})")]
    ServiceError {
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },

    #[error("Signing error: {0}")]
    SigningError(String),
}

/// A single PUT of a fully buffered object
#[derive(Debug, Clone, PartialEq)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub content_type: String,
    pub acl: String,
}

impl PutObjectRequest {
    /// Request with the `public-read` ACL
    pub fn public_read(
        bucket: impl Into<String>,
        key: impl Into<String>,
        body: Bytes,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            body,
            content_type: content_type.into(),
            acl: PUBLIC_READ.to_string(),
        }
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

/// OSS PutObject response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectResponse {
    /// Address of the stored object as the service reports it
    pub url: String,
    pub etag: String,
}

/// Object store seam used by the upload operation
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, request: PutObjectRequest) -> Result<PutObjectResponse, StorageError>;
}

/// OSS client configuration
#[derive(Debug, Clone)]
pub struct OssClientConfig {
    pub region: String,
    pub access_key_id: String,
    pub access_key_secret: String,
    pub endpoint: Option<String>,
    pub timeout: Option<Duration>,
}

impl From<&OssSettings> for OssClientConfig {
    fn from(settings: &OssSettings) -> Self {
        Self {
            region: settings.region.clone(),
            access_key_id: settings.access_key_id.clone(),
            access_key_secret: settings.secret_access_key.clone(),
            endpoint: settings.endpoint.clone(),
            timeout: settings.timeout_seconds.map(Duration::from_secs),
        }
    }
}

/// Aliyun OSS client
///
/// Construction is local; no request is made until the first upload.
pub struct OssClient {
    config: OssClientConfig,
    http_client: reqwest::Client,
}

impl OssClient {
    /// Create a new OSS client
    pub fn new(config: OssClientConfig) -> Result<Self, StorageError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn from_settings(settings: &OssSettings) -> Result<Self, StorageError> {
        Self::new(OssClientConfig::from(settings))
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    /// Public address of an object.
    ///
    /// `https://{bucket}.{region}.aliyuncs.com/{key}`, or path-style
    /// `{endpoint}/{bucket}/{key}` when an endpoint is configured.
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        let key = utf8_percent_encode(key, KEY_ENCODE_SET);
        match self.config.endpoint {
            Some(ref endpoint) => {
                format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
            }
            None => format!(
                "https://{}.{}.aliyuncs.com/{}",
                bucket, self.config.region, key
            ),
        }
    }
}

#[async_trait]
impl ObjectStore for OssClient {
    #[tracing::instrument(
        name = "oss.put_object",
        skip(self, request),
        fields(
            oss.bucket = %request.bucket,
            oss.key = %request.key,
            http.method = "PUT",
            upload.bytes = request.body.len(),
            oss.etag = tracing::field::Empty,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn put_object(&self, request: PutObjectRequest) -> Result<PutObjectResponse, StorageError> {
        if request.bucket.is_empty() {
            return Err(StorageError::ConfigError("bucket is not configured".into()));
        }

        let url = self.object_url(&request.bucket, &request.key);
        let date = signer::http_date();
        let authorization = signer::authorization(
            &self.config.access_key_id,
            &self.config.access_key_secret,
            &signer::SigningRequest {
                verb: "PUT",
                content_md5: "",
                content_type: &request.content_type,
                date: &date,
                oss_headers: vec![("x-oss-object-acl", request.acl.as_str())],
                resource: signer::canonical_resource(&request.bucket, &request.key),
            },
        )
        .map_err(|e| StorageError::SigningError(e.to_string()))?;

        // Content-Length is derived from the buffered body
        let content_length = request.content_length();
        let response = self
            .http_client
            .put(&url)
            .header(reqwest::header::DATE, &date)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::CONTENT_TYPE, &request.content_type)
            .header("x-oss-object-acl", &request.acl)
            .body(request.body)
            .send()
            .await
            .map_err(|e| StorageError::RequestError(e.to_string()))?;

        let status = response.status();
        let span = tracing::Span::current();
        span.record("http.status_code", status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(service_error(status.as_u16(), &body));
        }

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        span.record("oss.etag", etag.as_str());

        tracing::debug!(
            etag = %etag,
            bytes = content_length,
            content_type = %request.content_type,
            "PutObject completed"
        );

        Ok(PutObjectResponse { url, etag })
    }
}

/// OSS error document
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ErrorBody {
    code: String,
    message: String,
    request_id: String,
}

fn service_error(status: u16, body: &str) -> StorageError {
    let parsed: ErrorBody = quick_xml::de::from_str(body).unwrap_or_default();
    StorageError::ServiceError {
        status,
        code: if parsed.code.is_empty() {
            "Unknown".to_string()
        } else {
            parsed.code
        },
        message: parsed.message,
        request_id: parsed.request_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: Option<&str>) -> OssClient {
        OssClient::new(OssClientConfig {
            region: "oss-cn-hangzhou".into(),
            access_key_id: "id".into(),
            access_key_secret: "secret".into(),
            endpoint: endpoint.map(String::from),
            timeout: None,
        })
        .unwrap()
    }

    #[test]
    fn test_default_object_url() {
        let client = client(None);
        assert_eq!(
            client.object_url("forum", "uploads/a.png"),
            "https://forum.oss-cn-hangzhou.aliyuncs.com/uploads/a.png"
        );
    }

    #[test]
    fn test_endpoint_object_url() {
        let client = client(Some("http://localhost:9000/"));
        assert_eq!(
            client.object_url("forum", "a b.png"),
            "http://localhost:9000/forum/a%20b.png"
        );
    }

    #[test]
    fn test_service_error_parses_xml() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>AccessDenied</Code>
  <Message>The bucket you are attempting to access must be addressed using the specified endpoint.</Message>
  <RequestId>5C3D9175B6FC201293AD4890</RequestId>
</Error>"#;
        match service_error(403, body) {
            StorageError::ServiceError {
                status,
                code,
                request_id,
                ..
            } => {
                assert_eq!(status, 403);
                assert_eq!(code, "AccessDenied");
                assert_eq!(request_id, "5C3D9175B6FC201293AD4890");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_service_error_without_body() {
        let err = service_error(500, "");
        assert!(err.to_string().contains("500 Unknown"));
    }

    #[test]
    fn test_public_read_request() {
        let request = PutObjectRequest::public_read("b", "k", Bytes::from("abc"), "text/plain");
        assert_eq!(request.acl, "public-read");
        assert_eq!(request.content_length(), 3);
    }
}
