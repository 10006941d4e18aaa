//! Aliyun OSS Uploadr Library
//!
//! Forum upload hooks that store images and files in Aliyun Object Storage
//! Service instead of on local disk.
//!
//! # Features
//!
//! - **Image & File Hooks**: Size ceiling, local read, remote avatar resize
//! - **Unique Keys**: `{path}/{uuid}.{ext}`, never overwriting an object
//! - **Custom Host**: Serve uploads from a CDN domain instead of the bucket URL
//! - **Lazy Client**: One OSS client per plugin, rebuilt after deactivation
//!
//! # Example
//!
//! ```no_run
//! use aliyun_oss_uploadr::{Config, Plugin};
//! use aliyun_oss_uploadr::upload::ImageDescriptor;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let plugin = Plugin::new(Config::from_env())?;
//!     let result = plugin
//!         .upload_image(Some(ImageDescriptor {
//!             url: Some("http://example.com/photo.jpg".into()),
//!             size: 1000,
//!             ..Default::default()
//!         }))
//!         .await?;
//!     println!("{}", result.url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod plugin;
pub mod resize;
pub mod storage;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use plugin::Plugin;
pub use upload::{UploadError, UploadResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
