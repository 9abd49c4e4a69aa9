//! ServiceAccount and credentials Secret generation.
//!
//! The Secret holds the credentials of the `nexus-operator` user the
//! operator creates on the Nexus server. The password is generated once; the
//! API server keeps it in `data` and later reconciles never overwrite it.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::ResourceExt;
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::crd::Nexus;
use crate::resources::common::child_metadata;

/// Name of the user the operator creates on the Nexus server.
pub const OPERATOR_USERNAME: &str = "nexus-operator";
/// Secret key holding the username.
pub const USERNAME_KEY: &str = "username";
/// Secret key holding the password.
pub const PASSWORD_KEY: &str = "password";

const PASSWORD_LENGTH: usize = 24;

/// Generate the ServiceAccount used by the Nexus pod.
pub fn generate_service_account(resource: &Nexus) -> ServiceAccount {
    ServiceAccount {
        metadata: child_metadata(resource, resource.service_account_name()),
        ..Default::default()
    }
}

/// Generate the operator user credentials Secret, named after the CR.
pub fn generate_secret(resource: &Nexus) -> Secret {
    Secret {
        metadata: child_metadata(resource, resource.name_any()),
        type_: Some("Opaque".to_string()),
        string_data: Some(BTreeMap::from([
            (USERNAME_KEY.to_string(), OPERATOR_USERNAME.to_string()),
            (PASSWORD_KEY.to_string(), generate_password()),
        ])),
        ..Default::default()
    }
}

/// Read a key from a deployed Secret, looking at `data` then `stringData`.
pub fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    if let Some(value) = secret.data.as_ref().and_then(|data| data.get(key)) {
        return String::from_utf8(value.0.clone()).ok();
    }
    secret
        .string_data
        .as_ref()
        .and_then(|data| data.get(key))
        .cloned()
}

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}
