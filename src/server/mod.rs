//! Operations on the running Nexus server.
//!
//! Once the Deployment has an available replica, the operator prepares the
//! server through its REST API:
//!
//! - `nexus-operator` user, created with the default admin credentials
//! - community Maven proxies (`apache`, `red-hat-ga`, `jboss-public`)
//! - those proxies added to the `maven-public` group
//!
//! Every step is idempotent. Results are folded into
//! `status.serverOperationsStatus`; failures never fail a reconcile.

pub mod rest;
pub mod types;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::crd::{Nexus, ServerOperationsStatus};
use crate::resources::security::{PASSWORD_KEY, USERNAME_KEY, secret_value};
use crate::resources::services::service_url;

pub use rest::RestServerOperator;
pub use types::{Credentials, MavenProxyRepository};

/// Credentials Nexus ships with when random admin passwords are off.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Group the community repositories are added to.
pub const MAVEN_PUBLIC_GROUP: &str = "maven-public";

/// Community proxies: name and remote URL.
pub const COMMUNITY_REPOSITORIES: [(&str, &str); 3] = [
    (
        "apache",
        "https://repository.apache.org/content/repositories/releases/",
    ),
    ("red-hat-ga", "https://maven.repository.redhat.com/ga/"),
    (
        "jboss-public",
        "https://repository.jboss.org/nexus/content/groups/public/",
    ),
];

/// Errors from the Nexus REST API.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status} for {url}")]
    Status { status: u16, url: String },

    #[error("credentials rejected for {0}")]
    Unauthorized(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(String),
}

/// Idempotent REST operations on a Nexus server at `base_url`.
#[async_trait]
pub trait ServerOperator: Send + Sync {
    /// Create `user` as an administrator unless it exists.
    async fn ensure_operator_user(
        &self,
        base_url: &str,
        admin: &Credentials,
        user: &Credentials,
    ) -> Result<(), ServerError>;

    /// Create each repository that doesn't exist yet.
    async fn ensure_proxy_repositories(
        &self,
        base_url: &str,
        credentials: &Credentials,
        repositories: &[MavenProxyRepository],
    ) -> Result<(), ServerError>;

    /// Add the missing `members` to the Maven group `group`.
    async fn ensure_group_members(
        &self,
        base_url: &str,
        credentials: &Credentials,
        group: &str,
        members: &[&str],
    ) -> Result<(), ServerError>;
}

/// Operator user credentials from the managed Secret.
pub fn operator_credentials(secret: Option<&Secret>) -> Result<Credentials, ServerError> {
    let secret = secret.ok_or_else(|| {
        ServerError::MissingCredentials("operator credentials Secret not found".to_string())
    })?;
    let username = secret_value(secret, USERNAME_KEY);
    let password = secret_value(secret, PASSWORD_KEY);
    match (username, password) {
        (Some(username), Some(password)) => Ok(Credentials::new(username, password)),
        _ => Err(ServerError::MissingCredentials(format!(
            "Secret {} lacks {USERNAME_KEY} or {PASSWORD_KEY}",
            secret.name_any()
        ))),
    }
}

/// URL of the `maven-public` group inside the cluster.
pub fn maven_public_url(nexus: &Nexus) -> String {
    format!("{}/repository/{MAVEN_PUBLIC_GROUP}/", service_url(nexus))
}

/// Run whatever server operations are still pending and return the
/// resulting status. Steps already marked done are skipped.
pub async fn run_server_operations(
    operator: &dyn ServerOperator,
    nexus: &Nexus,
    secret: Option<&Secret>,
) -> ServerOperationsStatus {
    let mut status = nexus
        .status
        .as_ref()
        .map(|s| s.server_operations_status.clone())
        .unwrap_or_default();
    let switches = &nexus.spec.server_operations;

    if switches.disable_operator_user_creation {
        debug!(name = %nexus.name_any(), "Server operations disabled");
        return status;
    }

    match run_steps(operator, nexus, secret, &mut status).await {
        Ok(()) => status.reason = None,
        Err(e) => {
            warn!(name = %nexus.name_any(), error = %e, "Server operations failed");
            status.reason = Some(e.to_string());
        }
    }
    status
}

async fn run_steps(
    operator: &dyn ServerOperator,
    nexus: &Nexus,
    secret: Option<&Secret>,
    status: &mut ServerOperationsStatus,
) -> Result<(), ServerError> {
    let base_url = service_url(nexus);
    let credentials = operator_credentials(secret)?;

    if !status.operator_user_created {
        let admin = Credentials::new(DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD);
        operator
            .ensure_operator_user(&base_url, &admin, &credentials)
            .await?;
        status.operator_user_created = true;
    }

    if nexus.spec.server_operations.disable_repository_creation {
        return Ok(());
    }

    if !status.community_repositories_created {
        let repositories: Vec<MavenProxyRepository> = COMMUNITY_REPOSITORIES
            .iter()
            .map(|(name, url)| MavenProxyRepository::release(name, url))
            .collect();
        operator
            .ensure_proxy_repositories(&base_url, &credentials, &repositories)
            .await?;
        status.community_repositories_created = true;
    }

    if !status.maven_central_updated {
        let members: Vec<&str> = COMMUNITY_REPOSITORIES.iter().map(|(name, _)| *name).collect();
        operator
            .ensure_group_members(&base_url, &credentials, MAVEN_PUBLIC_GROUP, &members)
            .await?;
        status.maven_central_updated = true;
        status.maven_public_url = Some(maven_public_url(nexus));
    }

    Ok(())
}
