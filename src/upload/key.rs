//! Object key and public URL resolution
//!
//! Keys have the form `{prefix}{id}.{ext}`:
//!
//! - `prefix` is the configured upload path with a trailing `/` and without
//!   a leading `/` (`"/uploads"` and `"uploads/"` both become `uploads/`)
//! - `id` is a fresh random identifier, so uploads never overwrite each other
//! - `ext` is the canonical extension of the content type guessed from the
//!   filename, so `photo.jpeg` is stored as `.jpg`

use super::UploadError;
use crate::config::OssSettings;
use mime_guess::Mime;

/// Source of unique object identifiers
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// A resolved object key with the content type it was derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub key: String,
    pub content_type: String,
}

/// Key prefix for the configured upload path
pub fn normalize_prefix(path: Option<&str>) -> String {
    let prefix = match path {
        Some(p) if !p.is_empty() => {
            if p.ends_with('/') {
                p.to_string()
            } else {
                format!("{}/", p)
            }
        }
        _ => "/".to_string(),
    };

    // Keys must not start with a slash
    match prefix.strip_prefix('/') {
        Some(rest) => rest.to_string(),
        None => prefix,
    }
}

/// Extension stored for a content type.
///
/// Common types map to their usual extension. Anything else keeps the
/// filename's own extension when the type lists it, and otherwise the first
/// extension registered for the type.
pub fn canonical_extension(mime: &Mime, filename: &str) -> Option<String> {
    let preferred = match mime.essence_str() {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "image/bmp" => Some("bmp"),
        "image/tiff" => Some("tiff"),
        "image/x-icon" | "image/vnd.microsoft.icon" => Some("ico"),
        "text/plain" => Some("txt"),
        "text/html" => Some("html"),
        "text/css" => Some("css"),
        "text/csv" => Some("csv"),
        "text/markdown" => Some("md"),
        "text/javascript" | "application/javascript" => Some("js"),
        "application/json" => Some("json"),
        "application/pdf" => Some("pdf"),
        "application/zip" => Some("zip"),
        "audio/mpeg" => Some("mp3"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        _ => None,
    };
    if let Some(ext) = preferred {
        return Some(ext.to_string());
    }

    let known = mime_guess::get_mime_extensions(mime)?;
    let own = std::path::Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());

    match own {
        Some(ref ext) if known.iter().any(|k| *k == ext.as_str()) => own,
        _ => known.first().map(|e| e.to_string()),
    }
}

/// Compute the object key and content type for `filename`
pub fn resolve_key(settings: &OssSettings, filename: &str, id: &str) -> Result<ResolvedKey, UploadError> {
    let mime = mime_guess::from_path(filename)
        .first()
        .ok_or_else(|| UploadError::InvalidFilename(filename.to_string()))?;
    let ext = canonical_extension(&mime, filename)
        .ok_or_else(|| UploadError::InvalidFilename(filename.to_string()))?;

    Ok(ResolvedKey {
        key: format!("{}{}.{}", normalize_prefix(settings.path.as_deref()), id, ext),
        content_type: mime.essence_str().to_string(),
    })
}

/// Public URL for a stored object.
///
/// A configured host always wins (`http://` is assumed when it has no
/// scheme); otherwise the URL reported by the store is used unchanged.
pub fn resolve_url(settings: &OssSettings, key: &str, stored_url: &str) -> String {
    match settings.public_host() {
        Some(host) if host.starts_with("http") => format!("{}/{}", host, key),
        Some(host) => format!("http://{}/{}", host, key),
        None => stored_url.to_string(),
    }
}
