//! Maven repository protocol handlers.
//!
//! Implements the endpoints `mvn deploy` and dependency resolution talk to.
//!
//! Routes are mounted at `/projects/{id}/packages/maven/...`:
//!   GET  .../*path/{file_name}           — Download artifact or checksum
//!   PUT  .../*path/{file_name}/authorize — Upload proxy pre-authorization
//!   PUT  .../*path/{file_name}           — Upload artifact or verify checksum
//!
//! A deploy of one artifact arrives as several requests: the artifact, its
//! `.sha1` and `.md5` side files, then the artifact-level
//! `maven-metadata.xml` under the path without the version segment. Side
//! files are verified against the digests recorded for the artifact rather
//! than stored.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::formats::maven::{
    extract_format, resolve_package_identity, split_request_path, ChecksumFormat,
};
use crate::models::package::NewPackageFile;
use crate::services::access_policy::{authorize, Capability};
use crate::services::checksum::{
    md5_hex, sha1_hex, sha256_hex, verify_sha1_side_file, ChecksumVerdict,
};
use crate::services::upload_proxy::{UploadParams, UploadedFile, PROXY_CONTENT_TYPE};
use crate::services::with_timeout;

/// Trailing segment that turns an upload path into its authorization request.
const AUTHORIZE_SEGMENT: &str = "authorize";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

static X_CHECKSUM_SHA1: HeaderName = HeaderName::from_static("x-checksum-sha1");
static X_CHECKSUM_MD5: HeaderName = HeaderName::from_static("x-checksum-md5");

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Routes relative to `/projects`.
pub fn router() -> Router<SharedState> {
    Router::new().route("/:project_id/packages/maven/*path", get(download).put(upload))
}

/// Directory path and file name of a request, or 404 if the tail has no
/// directory part.
fn request_target(tail: &str) -> Result<(&str, &str)> {
    split_request_path(tail).ok_or_else(|| {
        AppError::NotFound("Expected a path of the form <path>/<file_name>".into())
    })
}

// ---------------------------------------------------------------------------
// GET — Download artifact or checksum
// ---------------------------------------------------------------------------

async fn download(
    State(state): State<SharedState>,
    Path((project_id, tail)): Path<(i64, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    let (path, file_name) = request_target(&tail)?;
    authorize(
        state.access_policy.as_ref(),
        &headers,
        project_id,
        Capability::ReadPackage,
    )
    .await?;

    let (base_name, format) = extract_format(file_name);
    let package = state.packages.find(project_id, path).await?;
    let package_file = state.package_files.find(&package, base_name).await?;

    debug!(
        project_id,
        package_id = %package.id,
        file_name,
        ?format,
        "Maven download"
    );

    let response = match format {
        ChecksumFormat::Md5 => plain_text(package_file.file_md5),
        ChecksumFormat::Sha1 => plain_text(package_file.file_sha1),
        ChecksumFormat::None => {
            let content = with_timeout(
                state.store_timeout,
                "file store read",
                state.storage.get(&package_file.file_store_key),
            )
            .await?;

            (
                StatusCode::OK,
                [
                    (CONTENT_TYPE, DEFAULT_CONTENT_TYPE.to_string()),
                    (CONTENT_LENGTH, content.len().to_string()),
                    (
                        CONTENT_DISPOSITION,
                        content_disposition(&package_file.file_name),
                    ),
                    (X_CHECKSUM_SHA1.clone(), package_file.file_sha1),
                    (X_CHECKSUM_MD5.clone(), package_file.file_md5),
                ],
                Body::from(content),
            )
                .into_response()
        }
    };

    Ok(response)
}

fn plain_text(body: String) -> Response {
    (StatusCode::OK, [(CONTENT_TYPE, "text/plain")], body).into_response()
}

/// `attachment` disposition with the file name as a quoted-string.
fn content_disposition(file_name: &str) -> String {
    let mut quoted = String::with_capacity(file_name.len());
    for c in file_name.chars().filter(|c| !c.is_control()) {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    format!("attachment; filename=\"{}\"", quoted)
}

// ---------------------------------------------------------------------------
// PUT — Upload artifact, verify checksum, or authorize an upload
// ---------------------------------------------------------------------------

async fn upload(
    State(state): State<SharedState>,
    Path((project_id, tail)): Path<(i64, String)>,
    headers: HeaderMap,
    Query(params): Query<UploadParams>,
) -> Result<Response> {
    let (path, file_name) = request_target(&tail)?;

    if file_name == AUTHORIZE_SEGMENT {
        // `path` is itself `<path>/<file_name>` here.
        request_target(path)?;
        return authorize_upload(&state, project_id, &headers).await;
    }

    let actor = authorize(
        state.access_policy.as_ref(),
        &headers,
        project_id,
        Capability::CreatePackage,
    )
    .await?;
    state.upload_proxy.verify_request(&headers)?;
    let uploaded = state.upload_proxy.uploaded_file(params)?;

    let (base_name, format) = extract_format(file_name);

    match format {
        ChecksumFormat::Sha1 => {
            uploaded.check_payload().await?;
            verify_checksum(&state, project_id, path, base_name, &uploaded).await
        }
        ChecksumFormat::Md5 => {
            // The MD5 side file follows the SHA-1 one; SHA-1 verification
            // already covered the artifact.
            debug!(project_id, path, file_name, "Ignoring MD5 side file");
            Ok(StatusCode::OK.into_response())
        }
        ChecksumFormat::None => {
            // Nothing is created for a payload that is missing or short.
            uploaded.check_payload().await?;

            let package = state
                .packages
                .find_or_create(
                    project_id,
                    actor.as_ref(),
                    path,
                    resolve_package_identity(path, base_name),
                )
                .await?;

            let new_file = store_upload(&state, base_name, &uploaded).await?;
            let package_file = state.package_files.create(&package, new_file).await?;

            info!(
                project_id,
                package_id = %package.id,
                path = %package.path,
                file_name = %package_file.file_name,
                size = package_file.size,
                "Maven upload"
            );

            Ok((StatusCode::OK, Json(package_file)).into_response())
        }
    }
}

async fn authorize_upload(
    state: &SharedState,
    project_id: i64,
    headers: &HeaderMap,
) -> Result<Response> {
    state.upload_proxy.verify_request(headers)?;
    authorize(
        state.access_policy.as_ref(),
        headers,
        project_id,
        Capability::CreatePackage,
    )
    .await?;

    let descriptor = state.upload_proxy.authorization();
    let body = serde_json::to_vec(&descriptor)
        .map_err(|e| AppError::Internal(format!("Failed to encode authorization: {}", e)))?;

    Ok((StatusCode::OK, [(CONTENT_TYPE, PROXY_CONTENT_TYPE)], body).into_response())
}

/// Check an uploaded `.sha1` side file against the recorded artifact digest.
/// Never creates or changes anything.
async fn verify_checksum(
    state: &SharedState,
    project_id: i64,
    path: &str,
    base_name: &str,
    uploaded: &UploadedFile,
) -> Result<Response> {
    let package = state.packages.find(project_id, path).await?;
    let package_file = state.package_files.find(&package, base_name).await?;

    let uploaded_sha256 = match &uploaded.sha256 {
        Some(digest) => digest.clone(),
        None => {
            let payload =
                with_timeout(state.store_timeout, "uploaded file read", uploaded.read()).await?;
            sha256_hex(&payload)
        }
    };

    match verify_sha1_side_file(&package_file.file_sha1, &uploaded_sha256) {
        ChecksumVerdict::Match => Ok(StatusCode::NO_CONTENT.into_response()),
        ChecksumVerdict::Mismatch => {
            warn!(
                project_id,
                package_id = %package.id,
                file_name = base_name,
                "SHA-1 side file does not match stored artifact"
            );
            Err(AppError::Conflict(format!(
                "Checksum of '{}' does not match the uploaded file",
                base_name
            )))
        }
    }
}

/// Move the proxy's payload into the file store and describe it for the
/// package file row. Digests and size the proxy did not report are
/// computed from the stored payload.
async fn store_upload(
    state: &SharedState,
    file_name: &str,
    uploaded: &UploadedFile,
) -> Result<NewPackageFile> {
    let key = Uuid::new_v4().simple().to_string();
    let stored_size = with_timeout(
        state.store_timeout,
        "file store write",
        state.storage.adopt_file(&key, &uploaded.path),
    )
    .await?;

    let (file_sha1, file_md5) = match (&uploaded.sha1, &uploaded.md5) {
        (Some(sha1), Some(md5)) => (sha1.to_ascii_lowercase(), md5.to_ascii_lowercase()),
        (sha1, md5) => {
            let content =
                with_timeout(state.store_timeout, "file store read", state.storage.get(&key))
                    .await?;
            (
                sha1.as_ref()
                    .map(|d| d.to_ascii_lowercase())
                    .unwrap_or_else(|| sha1_hex(&content)),
                md5.as_ref()
                    .map(|d| d.to_ascii_lowercase())
                    .unwrap_or_else(|| md5_hex(&content)),
            )
        }
    };

    Ok(NewPackageFile {
        file_name: file_name.to_string(),
        size: i64::try_from(stored_size)
            .map_err(|_| AppError::Validation(format!("Invalid file size {}", stored_size)))?,
        file_sha1,
        file_md5,
        file_type: uploaded
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        file_store_key: key,
    })
}
