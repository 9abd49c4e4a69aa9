//! `ServerOperator` over the Nexus REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, info, instrument};

use super::types::{Credentials, MavenGroupRepository, MavenProxyRepository, RepositorySummary, User};
use super::{ServerError, ServerOperator};

const REST_PATH: &str = "/service/rest/v1";
const ADMIN_ROLE: &str = "nx-admin";

/// Talks to Nexus with reqwest.
#[derive(Clone, Debug)]
pub struct RestServerOperator {
    client: Client,
}

impl RestServerOperator {
    pub fn new() -> Result<Self, ServerError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ServerError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn request(
        &self,
        method: Method,
        base_url: &str,
        path: &str,
        credentials: &Credentials,
    ) -> (RequestBuilder, String) {
        let url = format!("{}{REST_PATH}{path}", base_url.trim_end_matches('/'));
        let builder = self
            .client
            .request(method, &url)
            .basic_auth(&credentials.username, Some(&credentials.password));
        (builder, url)
    }

    async fn users(
        &self,
        base_url: &str,
        credentials: &Credentials,
        user_id: &str,
    ) -> Result<Vec<User>, ServerError> {
        let (request, url) = self.request(
            Method::GET,
            base_url,
            &format!("/security/users?userId={user_id}"),
            credentials,
        );
        Ok(check(request.send().await?, url).await?.json().await?)
    }
}

/// Map non-success responses to errors.
async fn check(response: Response, url: String) -> Result<Response, ServerError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ServerError::Unauthorized(url)),
        status => Err(ServerError::Status {
            status: status.as_u16(),
            url,
        }),
    }
}

#[async_trait]
impl ServerOperator for RestServerOperator {
    #[instrument(skip(self, admin, user))]
    async fn ensure_operator_user(
        &self,
        base_url: &str,
        admin: &Credentials,
        user: &Credentials,
    ) -> Result<(), ServerError> {
        // Once the user exists it can answer for itself, even if the admin
        // password has since been changed
        match self.users(base_url, user, &user.username).await {
            Ok(users) if users.iter().any(|u| u.user_id == user.username) => {
                debug!("Operator user already exists");
                return Ok(());
            }
            Ok(_) | Err(ServerError::Unauthorized(_)) => {}
            Err(e) => return Err(e),
        }

        let existing = self.users(base_url, admin, &user.username).await?;
        if existing.iter().any(|u| u.user_id == user.username) {
            return Ok(());
        }

        let body = User {
            user_id: user.username.clone(),
            first_name: "Nexus".to_string(),
            last_name: "Operator".to_string(),
            email_address: format!("{}@example.com", user.username),
            password: Some(user.password.clone()),
            status: "active".to_string(),
            roles: vec![ADMIN_ROLE.to_string()],
        };
        let (request, url) = self.request(Method::POST, base_url, "/security/users", admin);
        check(request.json(&body).send().await?, url).await?;
        info!(user = %user.username, "Created operator user");
        Ok(())
    }

    #[instrument(skip(self, credentials, repositories))]
    async fn ensure_proxy_repositories(
        &self,
        base_url: &str,
        credentials: &Credentials,
        repositories: &[MavenProxyRepository],
    ) -> Result<(), ServerError> {
        let (request, url) = self.request(Method::GET, base_url, "/repositories", credentials);
        let existing: Vec<RepositorySummary> = check(request.send().await?, url).await?.json().await?;

        for repository in repositories {
            if existing.iter().any(|r| r.name == repository.name) {
                continue;
            }
            let (request, url) =
                self.request(Method::POST, base_url, "/repositories/maven/proxy", credentials);
            check(request.json(repository).send().await?, url).await?;
            info!(repository = %repository.name, "Created proxy repository");
        }
        Ok(())
    }

    #[instrument(skip(self, credentials, members))]
    async fn ensure_group_members(
        &self,
        base_url: &str,
        credentials: &Credentials,
        group: &str,
        members: &[&str],
    ) -> Result<(), ServerError> {
        let path = format!("/repositories/maven/group/{group}");
        let (request, url) = self.request(Method::GET, base_url, &path, credentials);
        let mut current: MavenGroupRepository = check(request.send().await?, url).await?.json().await?;

        let missing: Vec<String> = members
            .iter()
            .filter(|m| !current.group.member_names.iter().any(|n| n.as_str() == **m))
            .map(|m| m.to_string())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        current.group.member_names.extend(missing);
        let (request, url) = self.request(Method::PUT, base_url, &path, credentials);
        check(request.json(&current).send().await?, url).await?;
        info!(group, "Added community repositories to group");
        Ok(())
    }
}
