//! Package file store.
//!
//! Files are unique per `(package_id, file_name)`. Creating a second file
//! with the same name is rejected by the store itself and surfaces as a
//! storage error; this layer does not check beforehand.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::package::{NewPackageFile, Package, PackageFile};
use crate::services::with_timeout;

const PACKAGE_FILE_COLUMNS: &str =
    "id, package_id, file_name, size, file_sha1, file_md5, file_type, file_store_key, created_at";

/// Backing store for package file rows.
#[async_trait]
pub trait PackageFileStore: Send + Sync {
    async fn find_by_name(&self, package_id: Uuid, file_name: &str)
        -> Result<Option<PackageFile>>;

    async fn create(&self, package_id: Uuid, new: NewPackageFile) -> Result<PackageFile>;
}

fn duplicate_file(file_name: &str) -> AppError {
    AppError::Storage(format!("Package file '{}' already exists", file_name))
}

/// Postgres package file store.
pub struct PgPackageFileStore {
    db: PgPool,
}

impl PgPackageFileStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PackageFileStore for PgPackageFileStore {
    async fn find_by_name(
        &self,
        package_id: Uuid,
        file_name: &str,
    ) -> Result<Option<PackageFile>> {
        let sql = format!(
            "SELECT {PACKAGE_FILE_COLUMNS} FROM package_files \
             WHERE package_id = $1 AND file_name = $2"
        );
        let file = sqlx::query_as::<_, PackageFile>(&sql)
            .bind(package_id)
            .bind(file_name)
            .fetch_optional(&self.db)
            .await?;
        Ok(file)
    }

    async fn create(&self, package_id: Uuid, new: NewPackageFile) -> Result<PackageFile> {
        let sql = format!(
            r#"
            INSERT INTO package_files (package_id, file_name, size, file_sha1, file_md5, file_type, file_store_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PACKAGE_FILE_COLUMNS}
            "#
        );
        sqlx::query_as::<_, PackageFile>(&sql)
            .bind(package_id)
            .bind(&new.file_name)
            .bind(new.size)
            .bind(&new.file_sha1)
            .bind(&new.file_md5)
            .bind(&new.file_type)
            .bind(&new.file_store_key)
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    duplicate_file(&new.file_name)
                }
                other => AppError::Database(other),
            })
    }
}

/// In-process package file store for tests and single-node development.
#[derive(Default)]
pub struct MemoryPackageFileStore {
    files: RwLock<HashMap<(Uuid, String), PackageFile>>,
}

impl MemoryPackageFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All files attached to a package, ordered by name.
    pub async fn files_for(&self, package_id: Uuid) -> Vec<PackageFile> {
        let files = self.files.read().await;
        let mut matching: Vec<_> = files
            .values()
            .filter(|f| f.package_id == package_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        matching
    }

    /// Total number of stored files.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl PackageFileStore for MemoryPackageFileStore {
    async fn find_by_name(
        &self,
        package_id: Uuid,
        file_name: &str,
    ) -> Result<Option<PackageFile>> {
        let files = self.files.read().await;
        Ok(files.get(&(package_id, file_name.to_string())).cloned())
    }

    async fn create(&self, package_id: Uuid, new: NewPackageFile) -> Result<PackageFile> {
        let mut files = self.files.write().await;
        let key = (package_id, new.file_name.clone());
        if files.contains_key(&key) {
            return Err(duplicate_file(&new.file_name));
        }
        let file = new.into_package_file(package_id);
        files.insert(key, file.clone());
        Ok(file)
    }
}

/// Package file lookups and creation with store timeouts.
#[derive(Clone)]
pub struct PackageFileService {
    store: Arc<dyn PackageFileStore>,
    timeout: Duration,
}

impl PackageFileService {
    pub fn new(store: Arc<dyn PackageFileStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Look up a file of `package` by name; absent is `NotFound`.
    pub async fn find(&self, package: &Package, file_name: &str) -> Result<PackageFile> {
        with_timeout(
            self.timeout,
            "package file lookup",
            self.store.find_by_name(package.id, file_name),
        )
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "File '{}' not found in package '{}'",
                file_name, package.path
            ))
        })
    }

    pub async fn create(&self, package: &Package, new: NewPackageFile) -> Result<PackageFile> {
        let file = with_timeout(
            self.timeout,
            "package file create",
            self.store.create(package.id, new),
        )
        .await?;

        info!(
            package_id = %package.id,
            file_id = %file.id,
            file_name = %file.file_name,
            size = file.size,
            "Created package file"
        );
        Ok(file)
    }
}
