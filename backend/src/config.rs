//! Application configuration loaded from environment variables.

use crate::error::{AppError, Result};
use std::collections::{HashMap, HashSet};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MAX_UPLOAD_SIZE: u64 = 3 * 1024 * 1024 * 1024; // 3 GiB

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Server bind address (host:port)
    pub bind_address: String,

    /// Log level
    pub log_level: String,

    /// Root directory of the package file store
    pub storage_path: PathBuf,

    /// Directory the upload proxy writes incoming payloads to
    pub upload_temp_path: PathBuf,

    /// Shared secret used to verify requests forwarded by the upload proxy
    pub upload_proxy_secret: String,

    /// Largest payload the upload proxy is told to accept
    pub max_upload_size_bytes: u64,

    /// Upper bound for any single call into the database or file store
    pub store_timeout_secs: u64,

    /// Deploy credentials, username to token
    pub deploy_tokens: HashMap<String, String>,

    /// Allow anonymous downloads
    pub public_read: bool,

    /// Projects with the package registry enabled. Empty means every project.
    pub enabled_projects: HashSet<i64>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("log_level", &self.log_level)
            .field("storage_path", &self.storage_path)
            .field("upload_temp_path", &self.upload_temp_path)
            .field("upload_proxy_secret", &"[REDACTED]")
            .field("max_upload_size_bytes", &self.max_upload_size_bytes)
            .field("store_timeout_secs", &self.store_timeout_secs)
            .field(
                "deploy_tokens",
                &self.deploy_tokens.keys().collect::<Vec<_>>(),
            )
            .field("public_read", &self.public_read)
            .field("enabled_projects", &self.enabled_projects)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| AppError::Config("DATABASE_URL not set".into()))?,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            storage_path: env::var("STORAGE_PATH")
                .unwrap_or_else(|_| "/var/lib/maven-registry/packages".into())
                .into(),
            upload_temp_path: env::var("UPLOAD_TEMP_PATH")
                .unwrap_or_else(|_| "/var/lib/maven-registry/tmp/uploads".into())
                .into(),
            upload_proxy_secret: env::var("UPLOAD_PROXY_SECRET")
                .map_err(|_| AppError::Config("UPLOAD_PROXY_SECRET not set".into()))?,
            max_upload_size_bytes: env::var("MAX_UPLOAD_SIZE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE),
            store_timeout_secs: env::var("STORE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .unwrap_or(30),
            deploy_tokens: parse_deploy_tokens(
                &env::var("MAVEN_DEPLOY_TOKENS").unwrap_or_default(),
            )?,
            public_read: env::var("PUBLIC_READ")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            enabled_projects: parse_project_ids(
                &env::var("PACKAGES_ENABLED_PROJECTS").unwrap_or_default(),
            )?,
        })
    }

    /// Store call timeout as a `Duration`.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

/// Parse `user:token,user:token` pairs.
fn parse_deploy_tokens(raw: &str) -> Result<HashMap<String, String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once(':')
                .filter(|(user, token)| !user.is_empty() && !token.is_empty())
                .map(|(user, token)| (user.to_string(), token.to_string()))
                .ok_or_else(|| {
                    AppError::Config(format!(
                        "MAVEN_DEPLOY_TOKENS entry '{}' is not user:token",
                        user_of(entry)
                    ))
                })
        })
        .collect()
}

// Never echo the token half of a bad entry back into logs.
fn user_of(entry: &str) -> &str {
    entry.split(':').next().unwrap_or_default()
}

fn parse_project_ids(raw: &str) -> Result<HashSet<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<i64>().map_err(|_| {
                AppError::Config(format!("PACKAGES_ENABLED_PROJECTS: invalid project id '{}'", id))
            })
        })
        .collect()
}
