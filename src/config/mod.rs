//! Configuration module for Aliyun OSS Uploadr
//!
//! Settings come from two places: the OSS credentials and bucket layout are
//! read from the process environment (or a YAML file that expands `${VAR}`
//! placeholders), and the upload limits mirror the host forum configuration
//! (`maximumFileSize`, `profileImageDimension`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Region used when `OSS_DEFAULT_REGION` is not set
pub const DEFAULT_REGION: &str = "oss-cn-hangzhou";

/// Avatar edge length used when `profile_image_dimension` is unset or unparsable
pub const DEFAULT_PROFILE_IMAGE_DIMENSION: u32 = 128;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub oss: OssSettings,
    #[serde(default)]
    pub uploads: UploadLimits,
    #[serde(default)]
    pub resize: ResizeConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Build configuration from the process environment with default limits
    pub fn from_env() -> Self {
        Self {
            oss: OssSettings::from_env(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref host) = self.oss.host {
            if host.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "oss.host cannot be blank".into(),
                ));
            }
        }

        if let Some(ref endpoint) = self.oss.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid oss.endpoint '{}': must start with http:// or https://",
                    endpoint
                )));
            }
        }

        if let Some(kib) = self
            .uploads
            .maximum_file_size
            .as_ref()
            .and_then(NumericSetting::as_integer)
        {
            if kib < 0 {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid maximum_file_size {}: must not be negative",
                    kib
                )));
            }
        }

        if let Some(NumericSetting::Number(n)) = self.uploads.profile_image_dimension {
            if n <= 0 {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid profile_image_dimension {}: must be positive",
                    n
                )));
            }
        }

        if self.resize.program.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "resize.program cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

// ============================================================================
// OSS Settings
// ============================================================================

/// OSS credentials and bucket layout.
///
/// Read once at startup and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OssSettings {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub bucket: Option<String>,
    /// Key prefix for uploaded objects, e.g. `uploads/`
    #[serde(default)]
    pub path: Option<String>,
    /// Public host that replaces the URL reported by OSS, e.g. a CDN domain
    #[serde(default)]
    pub host: Option<String>,
    /// Service base URL; when set, objects are addressed path-style
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for OssSettings {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            region: default_region(),
            bucket: None,
            path: None,
            host: None,
            endpoint: None,
            timeout_seconds: None,
        }
    }
}

impl OssSettings {
    /// Read settings from the environment.
    ///
    /// - `OSS_ACCESS_KEY_ID`
    /// - `OSS_SECRET_ACCESS_KEY`
    /// - `OSS_DEFAULT_REGION` (default `oss-cn-hangzhou`)
    /// - `OSS_UPLOADS_BUCKET`
    /// - `OSS_UPLOADS_PATH`
    /// - `OSS_UPLOADS_HOST`
    /// - `OSS_ENDPOINT`
    ///
    /// Empty variables are treated as unset.
    pub fn from_env() -> Self {
        Self {
            access_key_id: env_var("OSS_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: env_var("OSS_SECRET_ACCESS_KEY").unwrap_or_default(),
            region: env_var("OSS_DEFAULT_REGION").unwrap_or_else(default_region),
            bucket: env_var("OSS_UPLOADS_BUCKET"),
            path: env_var("OSS_UPLOADS_PATH"),
            host: env_var("OSS_UPLOADS_HOST"),
            endpoint: env_var("OSS_ENDPOINT"),
            timeout_seconds: None,
        }
    }

    /// Custom public host, if one is configured and non-empty
    pub fn public_host(&self) -> Option<&str> {
        self.host.as_deref().filter(|h| !h.is_empty())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

// ============================================================================
// Upload Limits
// ============================================================================

/// A host setting that may be written either as a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericSetting {
    Number(i64),
    Float(f64),
    Text(String),
}

impl NumericSetting {
    /// Parse the leading integer, ignoring trailing garbage (`"2048kb"` is 2048).
    /// Fractions are truncated toward zero.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            NumericSetting::Number(n) => Some(*n),
            NumericSetting::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            NumericSetting::Float(_) => None,
            NumericSetting::Text(s) => parse_leading_int(s),
        }
    }
}

impl std::fmt::Display for NumericSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericSetting::Number(n) => write!(f, "{}", n),
            NumericSetting::Float(n) => write!(f, "{}", n),
            NumericSetting::Text(s) => f.write_str(s),
        }
    }
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Upload limits taken from the host forum configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadLimits {
    /// Ceiling in KiB
    #[serde(default)]
    pub maximum_file_size: Option<NumericSetting>,
    /// Edge length in pixels for resized remote images
    #[serde(default)]
    pub profile_image_dimension: Option<NumericSetting>,
}

impl UploadLimits {
    /// Ceiling in bytes, or `None` when no usable limit is configured.
    ///
    /// Negative values are rejected by [`Config::validate`]; here they clamp
    /// to 0. Ceilings beyond `u64::MAX` bytes saturate.
    pub fn max_bytes(&self) -> Option<u64> {
        self.maximum_file_size
            .as_ref()
            .and_then(NumericSetting::as_integer)
            .map(|kib| (kib.max(0) as u64).saturating_mul(1024))
    }

    /// The ceiling as configured, for user-facing messages
    pub fn max_display(&self) -> String {
        self.maximum_file_size
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    pub fn profile_image_dimension(&self) -> u32 {
        self.profile_image_dimension
            .as_ref()
            .and_then(NumericSetting::as_integer)
            .filter(|d| *d > 0)
            .and_then(|d| u32::try_from(d).ok())
            .unwrap_or(DEFAULT_PROFILE_IMAGE_DIMENSION)
    }
}

// ============================================================================
// Resize Configuration
// ============================================================================

/// External image tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeConfig {
    /// ImageMagick-compatible program. Default: `convert`
    #[serde(default = "default_resize_program")]
    pub program: String,
    /// Upper bound on one resize run. Default: 30
    #[serde(default = "default_resize_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            program: default_resize_program(),
            timeout_seconds: default_resize_timeout(),
        }
    }
}

fn default_resize_program() -> String {
    "convert".to_string()
}

fn default_resize_timeout() -> u64 {
    30
}
