//! Package and package file models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::formats::maven::{MavenCoordinates, PackageIdentity};

/// Package entity, unique per `(project_id, path)`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Package {
    pub id: Uuid,
    pub project_id: i64,
    pub name: String,
    pub path: String,
    /// `None` for the artifact-level metadata package.
    pub version: Option<String>,
    pub app_group: Option<String>,
    pub app_name: String,
    pub app_version: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Attributes for a package that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPackage {
    pub project_id: i64,
    pub path: String,
    pub name: String,
    pub version: Option<String>,
    pub coordinates: MavenCoordinates,
    pub created_by: Option<Uuid>,
}

impl NewPackage {
    pub fn new(
        project_id: i64,
        path: impl Into<String>,
        identity: PackageIdentity,
        created_by: Option<Uuid>,
    ) -> Self {
        let coordinates = MavenCoordinates::from_identity(&identity);
        Self {
            project_id,
            path: path.into(),
            name: identity.name,
            version: identity.version,
            coordinates,
            created_by,
        }
    }

    /// Materialize as a stored row with a fresh id.
    pub fn into_package(self) -> Package {
        Package {
            id: Uuid::new_v4(),
            project_id: self.project_id,
            name: self.name,
            path: self.path,
            version: self.version,
            app_group: self.coordinates.app_group,
            app_name: self.coordinates.app_name,
            app_version: self.coordinates.app_version,
            created_by: self.created_by,
            created_at: Utc::now(),
        }
    }
}

/// One uploaded file of a package, unique per `(package_id, file_name)`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct PackageFile {
    pub id: Uuid,
    pub package_id: Uuid,
    pub file_name: String,
    pub size: i64,
    pub file_sha1: String,
    pub file_md5: String,
    pub file_type: String,
    /// Key of the payload in the file store.
    #[serde(skip)]
    pub file_store_key: String,
    pub created_at: DateTime<Utc>,
}

/// Attributes for a file being attached to a package.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPackageFile {
    pub file_name: String,
    pub size: i64,
    pub file_sha1: String,
    pub file_md5: String,
    pub file_type: String,
    pub file_store_key: String,
}

impl NewPackageFile {
    pub fn into_package_file(self, package_id: Uuid) -> PackageFile {
        PackageFile {
            id: Uuid::new_v4(),
            package_id,
            file_name: self.file_name,
            size: self.size,
            file_sha1: self.file_sha1,
            file_md5: self.file_md5,
            file_type: self.file_type,
            file_store_key: self.file_store_key,
            created_at: Utc::now(),
        }
    }
}
