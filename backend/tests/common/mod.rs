//! Common test utilities for Maven protocol tests
//!
//! This module provides shared infrastructure for testing:
//! - A router wired to in-memory stores and a temporary file store
//! - Upload proxy token and parameter helpers
//! - Authentication header helpers

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use base64::Engine;
use bytes::Bytes;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use maven_registry_backend::api::{routes, AppState};
use maven_registry_backend::services::access_policy::{AccessPolicy, ConfigAccessPolicy};
use maven_registry_backend::services::checksum::{md5_hex, sha1_hex};
use maven_registry_backend::services::package_file_service::MemoryPackageFileStore;
use maven_registry_backend::services::package_service::MemoryPackageStore;
use maven_registry_backend::services::upload_proxy::{
    ProxyClaims, UploadProxy, PROXY_API_REQUEST_HEADER, PROXY_ISSUER,
};
use maven_registry_backend::storage::filesystem::FilesystemStorage;

pub const PROXY_SECRET: &str = "test-proxy-secret-at-least-32-bytes";
pub const DEPLOY_USER: &str = "ci";
pub const DEPLOY_TOKEN: &str = "deploy-token-123";
pub const PROJECT_ID: i64 = 1;

/// Test context holding the router and direct handles on its stores
pub struct TestContext {
    pub app: Router,
    pub packages: Arc<MemoryPackageStore>,
    pub package_files: Arc<MemoryPackageFileStore>,
    pub storage_dir: TempDir,
    pub upload_dir: TempDir,
}

impl TestContext {
    /// Anonymous reads denied, every project enabled
    pub fn new() -> Self {
        Self::with_policy(Arc::new(ConfigAccessPolicy::new(
            HashMap::from([(DEPLOY_USER.to_string(), DEPLOY_TOKEN.to_string())]),
            false,
            HashSet::new(),
        )))
    }

    pub fn with_policy(policy: Arc<dyn AccessPolicy>) -> Self {
        let storage_dir = tempfile::tempdir().expect("storage dir");
        let upload_dir = tempfile::tempdir().expect("upload dir");
        let packages = Arc::new(MemoryPackageStore::new());
        let package_files = Arc::new(MemoryPackageFileStore::new());

        let state = AppState::new(
            packages.clone(),
            package_files.clone(),
            Arc::new(FilesystemStorage::new(storage_dir.path())),
            policy,
            UploadProxy::new(PROXY_SECRET, upload_dir.path(), 64 * 1024 * 1024),
            Duration::from_secs(5),
        );

        Self {
            app: routes::create_router(Arc::new(state)),
            packages,
            package_files,
            storage_dir,
            upload_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Place a payload in the upload directory the way the proxy would and
    /// return its name relative to that directory
    pub fn stage_upload(&self, content: &[u8]) -> String {
        let name = Uuid::new_v4().simple().to_string();
        std::fs::write(self.upload_dir.path().join(&name), content).expect("stage upload");
        name
    }

    /// Proxy-forwarded upload of `content` as `<path>/<file_name>`, with
    /// the digests the proxy reports for it
    pub async fn upload(&self, path: &str, file_name: &str, content: &[u8]) -> Response<Body> {
        let staged = self.stage_upload(content);
        let query = format!(
            "file.path={}&file.name={}&file.size={}&file.sha1={}&file.md5={}",
            staged,
            file_name,
            content.len(),
            sha1_hex(content),
            md5_hex(content)
        );
        self.send(upload_request(path, file_name, &query)).await
    }

    pub async fn download(&self, path: &str, file_name: &str) -> Response<Body> {
        self.send(
            Request::get(maven_uri(path, file_name))
                .header("authorization", basic_auth(DEPLOY_USER, DEPLOY_TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub fn maven_uri(path: &str, file_name: &str) -> String {
    format!(
        "/projects/{}/packages/maven/{}/{}",
        PROJECT_ID, path, file_name
    )
}

/// PUT with deploy credentials and a valid proxy token
pub fn upload_request(path: &str, file_name: &str, query: &str) -> Request<Body> {
    Request::put(format!("{}?{}", maven_uri(path, file_name), query))
        .header("authorization", basic_auth(DEPLOY_USER, DEPLOY_TOKEN))
        .header(PROXY_API_REQUEST_HEADER, proxy_token(PROXY_SECRET))
        .body(Body::empty())
        .unwrap()
}

pub fn proxy_token(secret: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = ProxyClaims {
        iss: PROXY_ISSUER.to_string(),
        iat: Some(now),
        exp: Some(now + 300),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode proxy token")
}

pub fn basic_auth(username: &str, password: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", encoded)
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body")
}
