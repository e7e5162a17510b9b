//! Package store.
//!
//! Packages are keyed by `(project_id, path)`. Lookups never create rows;
//! uploads of primary artifacts go through [`PackageService::find_or_create`],
//! which relies on the unique constraint to stay correct when several
//! processes race on the same path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::formats::maven::PackageIdentity;
use crate::models::package::{NewPackage, Package};
use crate::services::access_policy::Actor;
use crate::services::with_timeout;

/// Attempts at insert-then-refetch before giving up. A second miss only
/// happens if the conflicting row is deleted between the two statements.
const FIND_OR_CREATE_ATTEMPTS: usize = 3;

const PACKAGE_COLUMNS: &str = "id, project_id, name, path, version, app_group, app_name, \
                               app_version, created_by, created_at";

/// Backing store for package rows.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Exact lookup by project and path.
    async fn find(&self, project_id: i64, path: &str) -> Result<Option<Package>>;

    /// Return the package for `new.path`, inserting it if absent. Concurrent
    /// callers with the same `(project_id, path)` all get the same row.
    async fn find_or_create(&self, new: NewPackage) -> Result<Package>;

    /// Cheap liveness check used by the readiness endpoint.
    async fn ping(&self) -> Result<()>;
}

/// Postgres package store.
pub struct PgPackageStore {
    db: PgPool,
}

impl PgPackageStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn try_insert(&self, new: &NewPackage) -> Result<Option<Package>> {
        let sql = format!(
            r#"
            INSERT INTO packages (project_id, name, path, version, app_group, app_name, app_version, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (project_id, path) DO NOTHING
            RETURNING {PACKAGE_COLUMNS}
            "#
        );
        let package = sqlx::query_as::<_, Package>(&sql)
            .bind(new.project_id)
            .bind(&new.name)
            .bind(&new.path)
            .bind(&new.version)
            .bind(&new.coordinates.app_group)
            .bind(&new.coordinates.app_name)
            .bind(&new.coordinates.app_version)
            .bind(new.created_by)
            .fetch_optional(&self.db)
            .await?;
        Ok(package)
    }
}

#[async_trait]
impl PackageStore for PgPackageStore {
    async fn find(&self, project_id: i64, path: &str) -> Result<Option<Package>> {
        let sql = format!(
            "SELECT {PACKAGE_COLUMNS} FROM packages WHERE project_id = $1 AND path = $2"
        );
        let package = sqlx::query_as::<_, Package>(&sql)
            .bind(project_id)
            .bind(path)
            .fetch_optional(&self.db)
            .await?;
        Ok(package)
    }

    async fn find_or_create(&self, new: NewPackage) -> Result<Package> {
        for _ in 0..FIND_OR_CREATE_ATTEMPTS {
            if let Some(created) = self.try_insert(&new).await? {
                info!(
                    package_id = %created.id,
                    project_id = created.project_id,
                    path = %created.path,
                    "Created package"
                );
                return Ok(created);
            }

            // Lost the race: another request inserted the row first.
            if let Some(existing) = self.find(new.project_id, &new.path).await? {
                debug!(package_id = %existing.id, path = %existing.path, "Package already exists");
                return Ok(existing);
            }
        }

        Err(AppError::Internal(format!(
            "Could not find or create package at '{}'",
            new.path
        )))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

/// In-process package store for tests and single-node development.
#[derive(Default)]
pub struct MemoryPackageStore {
    packages: RwLock<HashMap<(i64, String), Package>>,
}

impl MemoryPackageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored packages.
    pub async fn len(&self) -> usize {
        self.packages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.packages.read().await.is_empty()
    }
}

#[async_trait]
impl PackageStore for MemoryPackageStore {
    async fn find(&self, project_id: i64, path: &str) -> Result<Option<Package>> {
        let packages = self.packages.read().await;
        Ok(packages.get(&(project_id, path.to_string())).cloned())
    }

    async fn find_or_create(&self, new: NewPackage) -> Result<Package> {
        let mut packages = self.packages.write().await;
        let package = packages
            .entry((new.project_id, new.path.clone()))
            .or_insert_with(|| new.into_package());
        Ok(package.clone())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Package lookups with store timeouts and not-found handling.
#[derive(Clone)]
pub struct PackageService {
    store: Arc<dyn PackageStore>,
    timeout: Duration,
}

impl PackageService {
    pub fn new(store: Arc<dyn PackageStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Look up an existing package; absent is `NotFound`.
    pub async fn find(&self, project_id: i64, path: &str) -> Result<Package> {
        with_timeout(self.timeout, "package lookup", self.store.find(project_id, path))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Package '{}' not found", path)))
    }

    /// Find the package at `path`, creating it with `identity` if needed.
    pub async fn find_or_create(
        &self,
        project_id: i64,
        actor: Option<&Actor>,
        path: &str,
        identity: PackageIdentity,
    ) -> Result<Package> {
        if let Some(existing) =
            with_timeout(self.timeout, "package lookup", self.store.find(project_id, path)).await?
        {
            return Ok(existing);
        }

        let new = NewPackage::new(project_id, path, identity, actor.map(|a| a.id));
        with_timeout(
            self.timeout,
            "package find-or-create",
            self.store.find_or_create(new),
        )
        .await
    }

    pub async fn ping(&self) -> Result<()> {
        with_timeout(self.timeout, "package store ping", self.store.ping()).await
    }
}
