//! OSS header signature
//!
//! Requests are authenticated with
//! `Authorization: OSS <AccessKeyId>:<Signature>` where the signature is
//! `base64(hmac-sha1(AccessKeySecret, StringToSign))` and
//!
//! ```text
//! StringToSign = VERB + "\n"
//!              + Content-MD5 + "\n"
//!              + Content-Type + "\n"
//!              + Date + "\n"
//!              + CanonicalizedOSSHeaders
//!              + CanonicalizedResource
//! ```

use base64::Engine;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// The parts of a request that are covered by the signature
#[derive(Debug, Clone, Default)]
pub struct SigningRequest<'a> {
    pub verb: &'a str,
    pub content_md5: &'a str,
    pub content_type: &'a str,
    /// RFC 1123 date, identical to the `Date` header sent
    pub date: &'a str,
    /// `x-oss-*` headers; other headers are ignored
    pub oss_headers: Vec<(&'a str, &'a str)>,
    pub resource: String,
}

impl SigningRequest<'_> {
    /// Build the string to sign
    pub fn string_to_sign(&self) -> String {
        let mut out = String::with_capacity(128);
        out.push_str(self.verb);
        out.push('\n');
        out.push_str(self.content_md5);
        out.push('\n');
        out.push_str(self.content_type);
        out.push('\n');
        out.push_str(self.date);
        out.push('\n');
        out.push_str(&canonical_oss_headers(&self.oss_headers));
        out.push_str(&self.resource);
        out
    }
}

/// `/{bucket}/{key}` as it appears in the string to sign
pub fn canonical_resource(bucket: &str, key: &str) -> String {
    format!("/{}/{}", bucket, key)
}

/// Lowercased, sorted `name:value\n` lines for every `x-oss-` header
fn canonical_oss_headers(headers: &[(&str, &str)]) -> String {
    let mut lines: Vec<(String, &str)> = headers
        .iter()
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim()))
        .filter(|(name, _)| name.starts_with("x-oss-"))
        .collect();
    lines.sort_by(|a, b| a.0.cmp(&b.0));

    lines
        .into_iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect()
}

/// Compute the base64 signature for a string to sign
pub fn sign(access_key_secret: &str, string_to_sign: &str) -> Result<String, InvalidLength> {
    let mut mac = HmacSha1::new_from_slice(access_key_secret.as_bytes())?;
    mac.update(string_to_sign.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Value of the `Authorization` header
pub fn authorization(
    access_key_id: &str,
    access_key_secret: &str,
    request: &SigningRequest<'_>,
) -> Result<String, InvalidLength> {
    let signature = sign(access_key_secret, &request.string_to_sign())?;
    Ok(format!("OSS {}:{}", access_key_id, signature))
}

/// Current time in the format OSS expects for the `Date` header
pub fn http_date() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
