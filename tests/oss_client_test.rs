//! OSS Client HTTP Tests
//!
//! Runs `OssClient::put_object` against a wiremock server standing in for
//! the OSS endpoint (path-style addressing through `endpoint`).

#[cfg(test)]
mod tests {
    use aliyun_oss_uploadr::storage::{
        ObjectStore, OssClient, OssClientConfig, PutObjectRequest, StorageError,
    };
    use bytes::Bytes;
    use wiremock::matchers::{body_bytes, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn client(server: &MockServer) -> OssClient {
        OssClient::new(OssClientConfig {
            region: "oss-cn-hangzhou".into(),
            access_key_id: "test-access-key".into(),
            access_key_secret: "test-secret".into(),
            endpoint: Some(server.uri()),
            timeout: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_put_object_sends_signed_request() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/forum-assets/uploads/abc.png"))
            .and(header("content-type", "image/png"))
            .and(header("x-oss-object-acl", "public-read"))
            .and(header_exists("date"))
            .and(body_bytes(b"png-bytes".to_vec()))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"5B3C1A2E\""))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server)
            .put_object(PutObjectRequest::public_read(
                "forum-assets",
                "uploads/abc.png",
                Bytes::from_static(b"png-bytes"),
                "image/png",
            ))
            .await
            .unwrap();

        assert_eq!(
            response.url,
            format!("{}/forum-assets/uploads/abc.png", server.uri())
        );
        assert_eq!(response.etag, "\"5B3C1A2E\"");
    }

    #[tokio::test]
    async fn test_authorization_header_format() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(|request: &Request| {
                let auth = request
                    .headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if auth.starts_with("OSS test-access-key:") && auth.ends_with('=') {
                    ResponseTemplate::new(200)
                } else {
                    ResponseTemplate::new(403)
                }
            })
            .mount(&server)
            .await;

        let result = client(&server)
            .put_object(PutObjectRequest::public_read(
                "forum-assets",
                "uploads/a.txt",
                Bytes::from_static(b"a"),
                "text/plain",
            ))
            .await;

        assert!(result.is_ok(), "unexpected result: {result:?}");
    }

    #[tokio::test]
    async fn test_error_document_is_parsed() {
        let server = MockServer::start().await;
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>NoSuchBucket</Code>
  <Message>The specified bucket does not exist.</Message>
  <RequestId>5C3D8D2A0ACA54D87B43C048</RequestId>
  <HostId>missing.oss-cn-hangzhou.aliyuncs.com</HostId>
</Error>"#;
        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(404).set_body_raw(body.as_bytes().to_vec(), "application/xml"),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .put_object(PutObjectRequest::public_read(
                "missing",
                "uploads/a.txt",
                Bytes::from_static(b"a"),
                "text/plain",
            ))
            .await
            .unwrap_err();

        match err {
            StorageError::ServiceError {
                status,
                code,
                request_id,
                ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, "NoSuchBucket");
                assert_eq!(request_id, "5C3D8D2A0ACA54D87B43C048");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_bucket_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server)
            .put_object(PutObjectRequest::public_read(
                "",
                "uploads/a.txt",
                Bytes::from_static(b"a"),
                "text/plain",
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_error() {
        let client = OssClient::new(OssClientConfig {
            region: "oss-cn-hangzhou".into(),
            access_key_id: "id".into(),
            access_key_secret: "secret".into(),
            endpoint: Some("http://127.0.0.1:1".into()),
            timeout: Some(std::time::Duration::from_secs(2)),
        })
        .unwrap();

        let err = client
            .put_object(PutObjectRequest::public_read(
                "forum",
                "a.txt",
                Bytes::from_static(b"a"),
                "text/plain",
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::RequestError(_)));
    }
}
