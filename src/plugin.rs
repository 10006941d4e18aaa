//! Forum plugin surface
//!
//! [`Plugin`] is the context object the host calls into. It is built once
//! from [`Config`] and owns everything the upload hooks share: settings, the
//! lazily created OSS client, the resizer, and the HTTP client used to
//! download remote images.
//!
//! # Example
//!
//! ```no_run
//! use aliyun_oss_uploadr::{Config, Plugin};
//! use aliyun_oss_uploadr::upload::FileDescriptor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let plugin = Plugin::new(Config::from_env())?;
//! plugin.load();
//!
//! let result = plugin
//!     .upload_file(Some(FileDescriptor {
//!         name: Some("report.pdf".into()),
//!         path: Some("/tmp/upload-1234".into()),
//!         size: 52_000,
//!     }))
//!     .await?;
//! println!("{}", result.url);
//!
//! plugin.deactivate();
//! # Ok(())
//! # }
//! ```

use crate::config::{Config, OssSettings};
use crate::resize::{ImageMagickResizer, ImageResizer};
use crate::storage::{ClientFactory, ClientHandle, ObjectStore, StorageError};
use crate::upload::{
    FileDescriptor, FileIntake, IdGenerator, ImageDescriptor, ImageIntake, UploadError,
    UploadResult, Uploader, UuidGenerator,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Admin page route
pub const ADMIN_ROUTE: &str = "/plugins/ali-oss";

/// Entry in the admin navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavEntry {
    pub route: String,
    pub icon: String,
    pub name: String,
}

/// Admin header passed through the menu hook.
///
/// Only `plugins` is touched; other sections are carried through unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminHeader {
    #[serde(default)]
    pub plugins: Vec<NavEntry>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// The plugin context
pub struct Plugin {
    config: Config,
    uploader: Uploader,
    resizer: Arc<dyn ImageResizer>,
    http_client: reqwest::Client,
}

impl Plugin {
    /// Plugin with the OSS client, ImageMagick resizer, and UUID keys
    pub fn new(config: Config) -> Result<Self, StorageError> {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> PluginBuilder {
        PluginBuilder {
            config,
            client_factory: None,
            resizer: None,
            ids: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &ClientHandle {
        self.uploader.client()
    }

    /// Called when the host loads the plugin
    pub fn load(&self) {
        let oss = &self.config.oss;
        tracing::info!(
            region = %oss.region,
            bucket = oss.bucket.as_deref().unwrap_or(""),
            path = oss.path.as_deref().unwrap_or(""),
            host = oss.public_host().unwrap_or(""),
            "Aliyun OSS uploads enabled"
        );
        if oss.bucket.is_none() {
            tracing::warn!("OSS_UPLOADS_BUCKET is not set; uploads will fail");
        }
    }

    /// Called when the host deactivates the plugin; the next upload builds a
    /// fresh client
    pub fn deactivate(&self) {
        self.uploader.client().reset();
        tracing::info!("Aliyun OSS uploads deactivated");
    }

    /// Image upload hook
    pub async fn upload_image(
        &self,
        image: Option<ImageDescriptor>,
    ) -> Result<UploadResult, UploadError> {
        ImageIntake::new(
            &self.config.uploads,
            &self.uploader,
            self.resizer.as_ref(),
            &self.http_client,
        )
        .handle(image)
        .await
    }

    /// File upload hook
    pub async fn upload_file(
        &self,
        file: Option<FileDescriptor>,
    ) -> Result<UploadResult, UploadError> {
        FileIntake::new(&self.config.uploads, &self.uploader)
            .handle(file)
            .await
    }

    /// Admin menu hook: adds the plugin's settings page
    pub fn admin_menu(&self, mut header: AdminHeader) -> AdminHeader {
        header.plugins.push(NavEntry {
            route: ADMIN_ROUTE.to_string(),
            icon: "fa-envelope-o".to_string(),
            name: "Aliyun OSS".to_string(),
        });
        header
    }
}

type BoxedFactory = Box<ClientFactory>;

/// Builder for [`Plugin`] with replaceable collaborators
pub struct PluginBuilder {
    config: Config,
    client_factory: Option<BoxedFactory>,
    resizer: Option<Arc<dyn ImageResizer>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl PluginBuilder {
    /// Replace the OSS client factory
    pub fn client_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&OssSettings) -> Result<Arc<dyn ObjectStore>, StorageError> + Send + Sync + 'static,
    {
        self.client_factory = Some(Box::new(factory));
        self
    }

    pub fn resizer(mut self, resizer: Arc<dyn ImageResizer>) -> Self {
        self.resizer = Some(resizer);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<Plugin, StorageError> {
        let settings = self.config.oss.clone();
        let handle = match self.client_factory {
            Some(factory) => ClientHandle::with_factory(settings, factory),
            None => ClientHandle::new(settings),
        };

        let uploader = Uploader::with_id_generator(
            Arc::new(handle),
            self.ids.unwrap_or_else(|| Arc::new(UuidGenerator)),
        );

        let resizer = self
            .resizer
            .unwrap_or_else(|| Arc::new(ImageMagickResizer::new(&self.config.resize)));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.resize.timeout_seconds))
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Plugin {
            config: self.config,
            uploader,
            resizer,
            http_client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_menu_appends_entry() {
        let plugin = Plugin::new(Config::default()).unwrap();
        let header: AdminHeader = serde_json::from_value(serde_json::json!({
            "plugins": [{"route": "/plugins/other", "icon": "fa-cog", "name": "Other"}],
            "authentication": []
        }))
        .unwrap();

        let header = plugin.admin_menu(header);
        assert_eq!(header.plugins.len(), 2);
        assert_eq!(header.plugins[1].route, "/plugins/ali-oss");
        assert_eq!(header.plugins[1].name, "Aliyun OSS");
        assert!(header.other.contains_key("authentication"));
    }

    #[test]
    fn test_deactivate_resets_client() {
        let plugin = Plugin::new(Config::default()).unwrap();
        plugin.client().get().unwrap();
        assert!(plugin.client().is_initialized());

        plugin.deactivate();
        assert!(!plugin.client().is_initialized());
    }
}
