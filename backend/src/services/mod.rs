//! Business logic services.

pub mod access_policy;
pub mod checksum;
pub mod package_file_service;
pub mod package_service;
pub mod upload_proxy;

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{AppError, Result};

/// Await a call into the database or file store, giving up after `timeout`.
///
/// An elapsed timeout surfaces as [`AppError::StoreUnavailable`] so clients
/// see a retryable 503 rather than a hung connection.
pub async fn with_timeout<F, T>(timeout: Duration, operation: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation,
                timeout_secs = timeout.as_secs_f64(),
                "Store call timed out"
            );
            Err(AppError::StoreUnavailable(format!(
                "{} timed out after {:?}",
                operation, timeout
            )))
        }
    }
}
