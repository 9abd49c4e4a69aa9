//! Nexus REST API payloads.
//!
//! Only the fields the operator reads or writes are modelled; everything
//! else the server returns is ignored.

use serde::{Deserialize, Serialize};

/// Login credentials for the REST API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// A user, as returned by `GET /service/rest/v1/security/users`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A repository, as returned by `GET /service/rest/v1/repositories`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RepositorySummary {
    pub name: String,
    #[serde(default)]
    pub format: String,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Storage {
    pub blob_store_name: String,
    pub strict_content_type_validation: bool,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            blob_store_name: "default".to_string(),
            strict_content_type_validation: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxySettings {
    pub remote_url: String,
    pub content_max_age: i32,
    pub metadata_max_age: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NegativeCache {
    pub enabled: bool,
    pub time_to_live: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpClientSettings {
    pub blocked: bool,
    pub auto_block: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenSettings {
    pub version_policy: String,
    pub layout_policy: String,
}

/// Body of `POST /service/rest/v1/repositories/maven/proxy`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenProxyRepository {
    pub name: String,
    pub online: bool,
    pub storage: Storage,
    pub proxy: ProxySettings,
    pub negative_cache: NegativeCache,
    pub http_client: HttpClientSettings,
    pub maven: MavenSettings,
}

impl MavenProxyRepository {
    /// A release proxy of `remote_url` with the server defaults.
    pub fn release(name: &str, remote_url: &str) -> Self {
        Self {
            name: name.to_string(),
            online: true,
            storage: Storage::default(),
            proxy: ProxySettings {
                remote_url: remote_url.to_string(),
                content_max_age: -1,
                metadata_max_age: 1440,
            },
            negative_cache: NegativeCache {
                enabled: true,
                time_to_live: 1440,
            },
            http_client: HttpClientSettings {
                blocked: false,
                auto_block: true,
            },
            maven: MavenSettings {
                version_policy: "RELEASE".to_string(),
                layout_policy: "STRICT".to_string(),
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembers {
    #[serde(default)]
    pub member_names: Vec<String>,
}

/// A Maven group, read from and written back to
/// `/service/rest/v1/repositories/maven/group/{name}`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenGroupRepository {
    pub name: String,
    #[serde(default = "default_online")]
    pub online: bool,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub group: GroupMembers,
}

fn default_online() -> bool {
    true
}
