//! Maven repository layout.
//!
//! Maven clients address files as `<path>/<file_name>`, where `path` is the
//! repository-relative directory (`com/example/my-app/1.0` for a versioned
//! artifact, `com/example/my-app` for the artifact-level metadata file).
//! Nothing in the layout is fixed beyond the final segment, so package
//! identity is inferred from the last `/` of the directory path.

use serde::Serialize;

/// Artifact-level metadata file, written once per deploy without a version
/// segment in its path.
pub const METADATA_FILE_NAME: &str = "maven-metadata.xml";

/// Checksum side-file suffix of a requested file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumFormat {
    /// The artifact itself.
    None,
    /// `<file>.md5`
    Md5,
    /// `<file>.sha1`
    Sha1,
}

/// Split a requested file name into the artifact it refers to and the
/// checksum format, if any.
///
/// Only the text after the last `.` is considered, and only the exact
/// lowercase suffixes `md5` and `sha1` are checksum formats.
pub fn extract_format(file_name: &str) -> (&str, ChecksumFormat) {
    match file_name.rsplit_once('.') {
        Some((base, "md5")) => (base, ChecksumFormat::Md5),
        Some((base, "sha1")) => (base, ChecksumFormat::Sha1),
        _ => (file_name, ChecksumFormat::None),
    }
}

/// Name and version a package is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageIdentity {
    pub name: String,
    pub version: Option<String>,
}

/// Resolve package identity for an upload of `base_name` under `path`.
///
/// `maven-metadata.xml` always belongs to an unversioned package named after
/// the full path. Any other file takes its version from the last path
/// segment. A path with no `/` yields no version even for regular files.
pub fn resolve_package_identity(path: &str, base_name: &str) -> PackageIdentity {
    if base_name == METADATA_FILE_NAME {
        return PackageIdentity {
            name: path.to_string(),
            version: None,
        };
    }

    match path.rsplit_once('/') {
        Some((name, version)) => PackageIdentity {
            name: name.to_string(),
            version: Some(version.to_string()),
        },
        None => PackageIdentity {
            name: path.to_string(),
            version: None,
        },
    }
}

/// Maven coordinates recorded alongside a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MavenCoordinates {
    /// groupId, e.g. `com.example`. `None` when the name has a single segment.
    pub app_group: Option<String>,
    /// artifactId, the last segment of the package name.
    pub app_name: String,
    pub app_version: Option<String>,
}

impl MavenCoordinates {
    pub fn from_identity(identity: &PackageIdentity) -> Self {
        let (app_group, app_name) = match identity.name.rsplit_once('/') {
            Some((group, artifact)) => (Some(group.replace('/', ".")), artifact.to_string()),
            None => (None, identity.name.clone()),
        };

        Self {
            app_group,
            app_name,
            app_version: identity.version.clone(),
        }
    }
}

/// Split the wildcard tail of a `/packages/maven/*path` route into the
/// directory path and the file name.
///
/// Returns `None` unless both parts are non-empty.
pub fn split_request_path(tail: &str) -> Option<(&str, &str)> {
    let tail = tail.trim_start_matches('/');
    let (path, file_name) = tail.rsplit_once('/')?;
    if path.is_empty() || file_name.is_empty() {
        return None;
    }
    Some((path, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // extract_format
    // -----------------------------------------------------------------------

    #[test]
    fn test_extract_format_plain_artifact() {
        assert_eq!(
            extract_format("my-app-1.0.jar"),
            ("my-app-1.0.jar", ChecksumFormat::None)
        );
    }

    #[test]
    fn test_extract_format_sha1() {
        assert_eq!(
            extract_format("my-app-1.0.jar.sha1"),
            ("my-app-1.0.jar", ChecksumFormat::Sha1)
        );
    }

    #[test]
    fn test_extract_format_md5() {
        assert_eq!(
            extract_format("maven-metadata.xml.md5"),
            ("maven-metadata.xml", ChecksumFormat::Md5)
        );
    }

    #[test]
    fn test_extract_format_is_case_sensitive() {
        assert_eq!(
            extract_format("my-app-1.0.jar.SHA1"),
            ("my-app-1.0.jar.SHA1", ChecksumFormat::None)
        );
    }

    #[test]
    fn test_extract_format_other_checksums_are_artifacts() {
        assert_eq!(
            extract_format("my-app-1.0.jar.sha256"),
            ("my-app-1.0.jar.sha256", ChecksumFormat::None)
        );
    }

    #[test]
    fn test_extract_format_only_last_suffix() {
        assert_eq!(
            extract_format("a.sha1.jar"),
            ("a.sha1.jar", ChecksumFormat::None)
        );
        assert_eq!(extract_format("a.md5.sha1"), ("a.md5", ChecksumFormat::Sha1));
    }

    #[test]
    fn test_extract_format_no_dot() {
        assert_eq!(extract_format("README"), ("README", ChecksumFormat::None));
    }

    // -----------------------------------------------------------------------
    // resolve_package_identity
    // -----------------------------------------------------------------------

    #[test]
    fn test_resolve_versioned_artifact() {
        let identity =
            resolve_package_identity("my-company/my-app/1.0-SNAPSHOT", "my-app-1.0.jar");
        assert_eq!(identity.name, "my-company/my-app");
        assert_eq!(identity.version.as_deref(), Some("1.0-SNAPSHOT"));
    }

    #[test]
    fn test_resolve_root_metadata() {
        let identity = resolve_package_identity("com/x/my-app", METADATA_FILE_NAME);
        assert_eq!(identity.name, "com/x/my-app");
        assert_eq!(identity.version, None);
    }

    #[test]
    fn test_resolve_path_without_slash() {
        for path in ["my-app", "single", "1.0"] {
            for file in ["my-app-1.0.jar", METADATA_FILE_NAME] {
                let identity = resolve_package_identity(path, file);
                assert_eq!(identity.name, path);
                assert_eq!(identity.version, None, "{path}/{file}");
            }
        }
    }

    #[test]
    fn test_resolve_versioned_metadata_is_still_root() {
        // The version-level metadata file resolves the same way as the
        // artifact-level one: the whole path becomes the name.
        let identity = resolve_package_identity("com/x/my-app/1.0-SNAPSHOT", METADATA_FILE_NAME);
        assert_eq!(identity.name, "com/x/my-app/1.0-SNAPSHOT");
        assert_eq!(identity.version, None);
    }

    // -----------------------------------------------------------------------
    // MavenCoordinates
    // -----------------------------------------------------------------------

    #[test]
    fn test_coordinates_from_identity() {
        let identity = resolve_package_identity("org/apache/maven/maven-core/3.8.1", "x.jar");
        let coords = MavenCoordinates::from_identity(&identity);
        assert_eq!(coords.app_group.as_deref(), Some("org.apache.maven"));
        assert_eq!(coords.app_name, "maven-core");
        assert_eq!(coords.app_version.as_deref(), Some("3.8.1"));
    }

    #[test]
    fn test_coordinates_single_segment() {
        let identity = resolve_package_identity("my-app", "x.jar");
        let coords = MavenCoordinates::from_identity(&identity);
        assert_eq!(coords.app_group, None);
        assert_eq!(coords.app_name, "my-app");
        assert_eq!(coords.app_version, None);
    }

    // -----------------------------------------------------------------------
    // split_request_path
    // -----------------------------------------------------------------------

    #[test]
    fn test_split_request_path() {
        assert_eq!(
            split_request_path("com/x/my-app/1.0/my-app-1.0.jar"),
            Some(("com/x/my-app/1.0", "my-app-1.0.jar"))
        );
        assert_eq!(
            split_request_path("/com/x/my-app/maven-metadata.xml"),
            Some(("com/x/my-app", "maven-metadata.xml"))
        );
    }

    #[test]
    fn test_split_request_path_requires_both_parts() {
        assert_eq!(split_request_path("my-app-1.0.jar"), None);
        assert_eq!(split_request_path("com/x/"), None);
        assert_eq!(split_request_path(""), None);
    }
}
