//! Access policy.
//!
//! Handlers ask a single injected [`AccessPolicy`] whether the package
//! registry is enabled for a project and whether the caller holds a given
//! capability. Nothing here is global state; tests swap in their own
//! policy through [`crate::api::AppState`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use axum::http::HeaderMap;
use base64::Engine;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};

/// Header Maven users can set instead of HTTP Basic credentials.
pub const DEPLOY_TOKEN_HEADER: &str = "deploy-token";

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub username: String,
}

impl Actor {
    /// Actor with an id derived from the username, stable across restarts.
    pub fn named(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, username.as_bytes()),
            username,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ReadPackage,
    CreatePackage,
}

#[async_trait]
pub trait AccessPolicy: Send + Sync {
    /// Resolve the caller from request headers. `Ok(None)` is anonymous;
    /// credentials that are present but wrong are an error.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Actor>>;

    /// Whether the package registry feature is on for the project.
    async fn packages_enabled(&self, project_id: i64) -> Result<bool>;

    async fn can(
        &self,
        actor: Option<&Actor>,
        project_id: i64,
        capability: Capability,
    ) -> Result<bool>;
}

/// Run the full gate for a request: authenticate, feature check, then
/// capability check. Returns the actor on success.
pub async fn authorize(
    policy: &dyn AccessPolicy,
    headers: &HeaderMap,
    project_id: i64,
    capability: Capability,
) -> Result<Option<Actor>> {
    let actor = policy.authenticate(headers).await?;

    if !policy.packages_enabled(project_id).await? {
        return Err(AppError::Authorization(
            "Packages are not enabled for this project".into(),
        ));
    }

    if policy.can(actor.as_ref(), project_id, capability).await? {
        return Ok(actor);
    }

    match actor {
        // Let Maven retry with credentials.
        None => Err(AppError::Authentication("Authentication required".into())),
        Some(actor) => Err(AppError::Authorization(format!(
            "User '{}' may not {} packages in project {}",
            actor.username,
            match capability {
                Capability::ReadPackage => "read",
                Capability::CreatePackage => "create",
            },
            project_id
        ))),
    }
}

pub(crate) fn extract_basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic ").or(v.strip_prefix("basic ")))
        .and_then(|b64| base64::engine::general_purpose::STANDARD.decode(b64).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|s| {
            let (user, pass) = s.split_once(':')?;
            Some((user.to_string(), pass.to_string()))
        })
}

fn tokens_equal(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

/// Policy backed by the deploy tokens and project list in [`Config`].
///
/// Anyone holding a deploy token may read and create packages in every
/// enabled project; anonymous reads are allowed when `public_read` is set.
pub struct ConfigAccessPolicy {
    deploy_tokens: HashMap<String, String>,
    public_read: bool,
    enabled_projects: HashSet<i64>,
}

impl ConfigAccessPolicy {
    pub fn new(
        deploy_tokens: HashMap<String, String>,
        public_read: bool,
        enabled_projects: HashSet<i64>,
    ) -> Self {
        Self {
            deploy_tokens,
            public_read,
            enabled_projects,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.deploy_tokens.clone(),
            config.public_read,
            config.enabled_projects.clone(),
        )
    }

    fn actor_for_token(&self, token: &str) -> Option<Actor> {
        self.deploy_tokens
            .iter()
            .find(|(_, expected)| tokens_equal(expected, token))
            .map(|(user, _)| Actor::named(user.clone()))
    }
}

#[async_trait]
impl AccessPolicy for ConfigAccessPolicy {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Actor>> {
        if let Some((username, password)) = extract_basic_credentials(headers) {
            return match self.deploy_tokens.get(&username) {
                Some(expected) if tokens_equal(expected, &password) => {
                    Ok(Some(Actor::named(username)))
                }
                _ => Err(AppError::Authentication("Invalid credentials".into())),
            };
        }

        if let Some(token) = headers
            .get(DEPLOY_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            return self
                .actor_for_token(token)
                .map(Some)
                .ok_or_else(|| AppError::Authentication("Invalid deploy token".into()));
        }

        Ok(None)
    }

    async fn packages_enabled(&self, project_id: i64) -> Result<bool> {
        Ok(self.enabled_projects.is_empty() || self.enabled_projects.contains(&project_id))
    }

    async fn can(
        &self,
        actor: Option<&Actor>,
        _project_id: i64,
        capability: Capability,
    ) -> Result<bool> {
        Ok(match capability {
            Capability::ReadPackage => self.public_read || actor.is_some(),
            Capability::CreatePackage => actor.is_some(),
        })
    }
}
