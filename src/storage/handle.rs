//! Lazily constructed storage client handle
//!
//! # Design
//!
//! - One client per handle, built from `OssSettings` on first use
//! - Construction happens under a write lock with a second check, so racing
//!   first callers build exactly one client
//! - `reset()` drops the client; the next `get()` builds a fresh one
//!
//! # Example
//!
//! ```
//! use aliyun_oss_uploadr::config::OssSettings;
//! use aliyun_oss_uploadr::storage::ClientHandle;
//!
//! let handle = ClientHandle::new(OssSettings::default());
//! assert!(!handle.is_initialized());
//!
//! let _client = handle.get().unwrap();
//! assert!(handle.is_initialized());
//!
//! handle.reset();
//! assert!(!handle.is_initialized());
//! ```

use super::{ObjectStore, OssClient, StorageError};
use crate::config::OssSettings;
use parking_lot::RwLock;
use std::sync::Arc;

/// Builds a client from settings
pub type ClientFactory =
    dyn Fn(&OssSettings) -> Result<Arc<dyn ObjectStore>, StorageError> + Send + Sync;

/// Create-once, replace-on-reset client handle
pub struct ClientHandle {
    settings: OssSettings,
    factory: Arc<ClientFactory>,
    slot: RwLock<Option<Arc<dyn ObjectStore>>>,
}

impl ClientHandle {
    /// Handle that builds an [`OssClient`]
    pub fn new(settings: OssSettings) -> Self {
        Self::with_factory(settings, |settings: &OssSettings| {
            let client: Arc<dyn ObjectStore> = Arc::new(OssClient::from_settings(settings)?);
            Ok(client)
        })
    }

    /// Handle with a custom client factory
    pub fn with_factory<F>(settings: OssSettings, factory: F) -> Self
    where
        F: Fn(&OssSettings) -> Result<Arc<dyn ObjectStore>, StorageError> + Send + Sync + 'static,
    {
        Self {
            settings,
            factory: Arc::new(factory),
            slot: RwLock::new(None),
        }
    }

    /// Return the client, building it on first use
    pub fn get(&self) -> Result<Arc<dyn ObjectStore>, StorageError> {
        if let Some(client) = self.slot.read().as_ref() {
            return Ok(Arc::clone(client));
        }

        let mut slot = self.slot.write();
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        let client = (self.factory)(&self.settings)?;
        tracing::debug!(region = %self.settings.region, "OSS client created");
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Drop the current client
    pub fn reset(&self) {
        if self.slot.write().take().is_some() {
            tracing::debug!("OSS client released");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.read().is_some()
    }

    pub fn settings(&self) -> &OssSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{PutObjectRequest, PutObjectResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullStore;

    #[async_trait]
    impl ObjectStore for NullStore {
        async fn put_object(
            &self,
            request: PutObjectRequest,
        ) -> Result<PutObjectResponse, StorageError> {
            Ok(PutObjectResponse {
                url: request.key,
                etag: String::new(),
            })
        }
    }

    fn counting_handle() -> (ClientHandle, Arc<AtomicUsize>) {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let handle = ClientHandle::with_factory(OssSettings::default(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            let client: Arc<dyn ObjectStore> = Arc::new(NullStore);
            Ok(client)
        });
        (handle, built)
    }

    #[test]
    fn test_lazy_construction() {
        let (handle, built) = counting_handle();
        assert_eq!(built.load(Ordering::SeqCst), 0);

        handle.get().unwrap();
        handle.get().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_rebuilds() {
        let (handle, built) = counting_handle();
        handle.get().unwrap();
        handle.reset();
        assert!(!handle.is_initialized());

        handle.get().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_factory_error_leaves_handle_empty() {
        let handle = ClientHandle::with_factory(OssSettings::default(), |_| {
            Err(StorageError::ConfigError("no client".into()))
        });
        assert!(handle.get().is_err());
        assert!(!handle.is_initialized());
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let (handle, built) = counting_handle();
        let handle = Arc::new(handle);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handle = Arc::clone(&handle);
                std::thread::spawn(move || {
                    handle.get().unwrap();
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(built.load(Ordering::SeqCst), 1);
    }
}
