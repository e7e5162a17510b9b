//! Upload proxy handshake.
//!
//! Artifact bodies never reach this service. A trusted proxy in front of it
//! first asks whether an upload may proceed (`PUT .../authorize`), streams
//! the body into its temporary directory, and then replays the upload
//! request with query parameters describing the stored payload. Every
//! request the proxy forwards carries an HS256 JWT signed with the shared
//! secret in the [`PROXY_API_REQUEST_HEADER`] header.
//!
//! The two phases are not linked by any token held here; the proxy's own
//! boundary is what ties an authorization to the upload that follows.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use axum::http::HeaderMap;
use bytes::Bytes;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AppError, Result};

/// Header carrying the proxy's signed request token.
pub const PROXY_API_REQUEST_HEADER: &str = "upload-proxy-api-request";

/// Content type of the authorization response; only the proxy consumes it.
pub const PROXY_CONTENT_TYPE: &str = "application/vnd.upload-proxy+json";

/// Issuer the proxy puts in its request tokens.
pub const PROXY_ISSUER: &str = "upload-proxy";

/// Claims of the proxy request token.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProxyClaims {
    pub iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Phase-one response telling the proxy where to put the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthorizationDescriptor {
    pub temp_path: PathBuf,
    pub maximum_size: u64,
    /// The proxy must report the payload size on the follow-up request.
    pub has_length: bool,
}

/// Proxy-injected query parameters of the phase-two upload request.
#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    #[serde(rename = "file.path")]
    pub path: Option<String>,
    #[serde(rename = "file.name")]
    pub name: Option<String>,
    #[serde(rename = "file.type")]
    pub content_type: Option<String>,
    #[serde(rename = "file.size")]
    pub size: Option<u64>,
    #[serde(rename = "file.md5")]
    pub md5: Option<String>,
    #[serde(rename = "file.sha1")]
    pub sha1: Option<String>,
    #[serde(rename = "file.sha256")]
    pub sha256: Option<String>,
}

/// A payload the proxy has already written to temporary storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Absolute location inside the proxy's temp directory.
    pub path: PathBuf,
    /// File name the client declared.
    pub original_name: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
}

impl UploadedFile {
    /// Read the whole payload. Only used for checksum side files and for
    /// digests the proxy did not report.
    pub async fn read(&self) -> Result<Bytes> {
        tokio::fs::read(&self.path)
            .await
            .map(Bytes::from)
            .map_err(payload_error)
    }

    /// Confirm the payload is on disk and as large as the proxy declared.
    /// Returns its length in bytes.
    pub async fn check_payload(&self) -> Result<u64> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(payload_error)?;
        if !metadata.is_file() {
            return Err(missing_payload());
        }

        let len = metadata.len();
        match self.size {
            Some(declared) if declared != len => Err(AppError::Validation(format!(
                "Uploaded file is {} bytes but {} were declared",
                len, declared
            ))),
            _ => Ok(len),
        }
    }
}

fn missing_payload() -> AppError {
    AppError::Validation("Uploaded file is missing from temporary storage".into())
}

fn payload_error(e: std::io::Error) -> AppError {
    match e.kind() {
        std::io::ErrorKind::NotFound => missing_payload(),
        _ => AppError::StoreUnavailable(format!("Failed to read uploaded file: {}", e)),
    }
}

/// Verifies proxy requests and issues upload authorizations.
#[derive(Clone)]
pub struct UploadProxy {
    secret: String,
    temp_path: PathBuf,
    max_upload_size: u64,
}

impl UploadProxy {
    pub fn new(secret: impl Into<String>, temp_path: impl Into<PathBuf>, max_upload_size: u64) -> Self {
        Self {
            secret: secret.into(),
            temp_path: temp_path.into(),
            max_upload_size,
        }
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Reject requests that were not forwarded by the upload proxy.
    pub fn verify_request(&self, headers: &HeaderMap) -> Result<()> {
        let token = headers
            .get(PROXY_API_REQUEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::UntrustedProxy("Upload proxy header missing".into()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[PROXY_ISSUER]);
        validation.required_spec_claims =
            HashSet::from(["iss".to_string(), "exp".to_string()]);

        decode::<ProxyClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            warn!(error = %e, "Rejected upload proxy token");
            AppError::UntrustedProxy("Invalid upload proxy token".into())
        })?;

        Ok(())
    }

    /// Descriptor returned to the proxy on a successful authorization.
    pub fn authorization(&self) -> AuthorizationDescriptor {
        AuthorizationDescriptor {
            temp_path: self.temp_path.clone(),
            maximum_size: self.max_upload_size,
            has_length: true,
        }
    }

    /// Turn proxy parameters into an uploaded file, checking that the
    /// payload location stays within the temp directory.
    pub fn uploaded_file(&self, params: UploadParams) -> Result<UploadedFile> {
        let raw_path = params
            .path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::Validation("Uploaded file is missing".into()))?;

        let path = self.resolve_temp_path(Path::new(&raw_path))?;

        if let Some(size) = params.size {
            if size > self.max_upload_size {
                return Err(AppError::Validation(format!(
                    "Uploaded file exceeds maximum size of {} bytes",
                    self.max_upload_size
                )));
            }
        }

        Ok(UploadedFile {
            path,
            original_name: params.name,
            content_type: params.content_type.filter(|t| !t.is_empty()),
            size: params.size,
            md5: params.md5.filter(|d| !d.is_empty()),
            sha1: params.sha1.filter(|d| !d.is_empty()),
            sha256: params.sha256.filter(|d| !d.is_empty()),
        })
    }

    fn resolve_temp_path(&self, path: &Path) -> Result<PathBuf> {
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            return Err(AppError::Validation("Invalid uploaded file path".into()));
        }

        if path.is_absolute() {
            if !path.starts_with(&self.temp_path) {
                return Err(AppError::Validation(
                    "Uploaded file is outside the upload directory".into(),
                ));
            }
            Ok(path.to_path_buf())
        } else {
            Ok(self.temp_path.join(path))
        }
    }
}
