//! API module - HTTP handlers and routes.

pub mod handlers;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::services::access_policy::{AccessPolicy, ConfigAccessPolicy};
use crate::services::package_file_service::{PackageFileService, PackageFileStore};
use crate::services::package_service::{PackageService, PackageStore};
use crate::services::upload_proxy::UploadProxy;
use crate::storage::filesystem::FilesystemStorage;
use crate::storage::StorageBackend;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub packages: PackageService,
    pub package_files: PackageFileService,
    pub storage: Arc<dyn StorageBackend>,
    pub access_policy: Arc<dyn AccessPolicy>,
    pub upload_proxy: UploadProxy,
    pub store_timeout: Duration,
}

impl AppState {
    pub fn new(
        package_store: Arc<dyn PackageStore>,
        package_file_store: Arc<dyn PackageFileStore>,
        storage: Arc<dyn StorageBackend>,
        access_policy: Arc<dyn AccessPolicy>,
        upload_proxy: UploadProxy,
        store_timeout: Duration,
    ) -> Self {
        Self {
            packages: PackageService::new(package_store, store_timeout),
            package_files: PackageFileService::new(package_file_store, store_timeout),
            storage,
            access_policy,
            upload_proxy,
            store_timeout,
        }
    }

    /// Wire the given stores with the filesystem file store, config-driven
    /// access policy and upload proxy described by `config`.
    pub fn from_config(
        config: &Config,
        package_store: Arc<dyn PackageStore>,
        package_file_store: Arc<dyn PackageFileStore>,
    ) -> Self {
        Self::new(
            package_store,
            package_file_store,
            Arc::new(FilesystemStorage::new(&config.storage_path)),
            Arc::new(ConfigAccessPolicy::from_config(config)),
            UploadProxy::new(
                config.upload_proxy_secret.clone(),
                config.upload_temp_path.clone(),
                config.max_upload_size_bytes,
            ),
            config.store_timeout(),
        )
    }
}

pub type SharedState = Arc<AppState>;
