//! Defaulting and validation of the Nexus spec.
//!
//! Runs at the start of every reconcile, since no admission webhook is
//! installed. Normalization is pure apart from the capability and tag
//! lookups, both of which degrade instead of failing.

use kube::ResourceExt;
use tracing::{info, warn};

use crate::capabilities::{Capabilities, CapabilityProvider};
use crate::controller::error::{Error, Result};
use crate::crd::{ExposeType, NEXUS_CERTIFIED_IMAGE, NEXUS_COMMUNITY_IMAGE, Nexus, NexusSpec, ProbeSpec};
use crate::tags::{TagError, TagSource};
use crate::version::{split_image, with_tag};

/// Nexus OSS can't be clustered.
pub const MAX_REPLICAS: i32 = 1;

const PULL_POLICIES: [&str; 3] = ["Always", "IfNotPresent", "Never"];

/// A normalized CR and whether normalization changed its spec.
#[derive(Clone, Debug)]
pub struct Normalized {
    pub nexus: Nexus,
    pub changed: bool,
}

/// Fill defaults, resolve the automatic update target and validate.
pub async fn normalize(
    nexus: &Nexus,
    capabilities: &dyn CapabilityProvider,
    tags: &dyn TagSource,
) -> Result<Normalized> {
    let capabilities = capabilities.capabilities_or_default().await;

    let mut normalized = nexus.clone();
    let name = nexus.name_any();
    apply_defaults(&name, &mut normalized.spec, &capabilities);
    resolve_automatic_update(&name, &mut normalized.spec, tags).await;
    validate(&normalized.spec, &capabilities)?;

    let changed = normalized.spec != nexus.spec;
    Ok(Normalized {
        nexus: normalized,
        changed,
    })
}

/// Fill every unset field with its default.
pub fn apply_defaults(name: &str, spec: &mut NexusSpec, capabilities: &Capabilities) {
    if spec.image.is_empty() {
        spec.image = if spec.use_red_hat_image {
            NEXUS_CERTIFIED_IMAGE.to_string()
        } else {
            NEXUS_COMMUNITY_IMAGE.to_string()
        };
    }

    if let Some(policy) = &spec.image_pull_policy
        && !PULL_POLICIES.contains(&policy.as_str())
    {
        warn!(name, policy = %policy, "Invalid image pull policy, using the cluster default");
        spec.image_pull_policy = None;
    }

    if spec.persistence.volume_size.is_empty() {
        spec.persistence.volume_size = "10Gi".to_string();
    }

    if spec.networking.expose && spec.networking.expose_as.is_none() {
        spec.networking.expose_as = Some(if capabilities.openshift {
            ExposeType::Route
        } else {
            ExposeType::Ingress
        });
    }

    spec.liveness_probe.get_or_insert_with(ProbeSpec::default);
    spec.readiness_probe.get_or_insert_with(ProbeSpec::default);
    spec.service_account_name.get_or_insert_with(|| name.to_string());

    // The operator user needs the default admin password
    if spec.generate_random_admin_password {
        spec.server_operations.disable_operator_user_creation = true;
    }
}

/// Pin the image to the latest micro of the followed minor, or disable
/// automatic updates when the registry has no release for it.
///
/// A tag source outage changes nothing: the CR keeps its image and update
/// settings until the tags can be read again.
pub async fn resolve_automatic_update(name: &str, spec: &mut NexusSpec, tags: &dyn TagSource) {
    if spec.automatic_update.disabled {
        return;
    }

    let (repository, _) = split_image(&spec.image);
    if repository != NEXUS_COMMUNITY_IMAGE {
        info!(name, image = %spec.image, "Automatic updates need the community image, disabling them");
        disable_automatic_update(spec);
        return;
    }

    let minor = match spec.automatic_update.minor_version {
        Some(minor) => minor,
        None => match tags.latest_minor().await {
            Ok(minor) => minor,
            Err(TagError::NoTags) => {
                warn!(name, "No Nexus release published, disabling automatic updates");
                disable_automatic_update(spec);
                return;
            }
            Err(e) => {
                warn!(name, error = %e, "Can't read published tags, leaving automatic updates as they are");
                return;
            }
        },
    };

    match tags.latest_micro(minor).await {
        Ok(Some(tag)) => {
            spec.automatic_update.minor_version = Some(minor);
            spec.image = with_tag(NEXUS_COMMUNITY_IMAGE, &tag);
        }
        Ok(None) => {
            warn!(name, minor, "No release known for this minor, disabling automatic updates");
            disable_automatic_update(spec);
        }
        Err(e) => {
            warn!(name, minor, error = %e, "Can't read published tags, keeping the current image");
        }
    }
}

fn disable_automatic_update(spec: &mut NexusSpec) {
    spec.automatic_update.disabled = true;
    spec.automatic_update.minor_version = None;
}

/// Reject combinations the managers can't honor.
pub fn validate(spec: &NexusSpec, capabilities: &Capabilities) -> Result<()> {
    validate_replicas(spec)?;
    validate_networking(spec, capabilities)?;
    Ok(())
}

fn validate_replicas(spec: &NexusSpec) -> Result<()> {
    if spec.replicas < 0 {
        return Err(Error::Validation(format!(
            "replicas must not be negative, got {}",
            spec.replicas
        )));
    }
    if spec.replicas > MAX_REPLICAS {
        return Err(Error::Validation(format!(
            "replicas {} exceeds maximum {MAX_REPLICAS}: Nexus OSS can't be clustered",
            spec.replicas
        )));
    }
    Ok(())
}

fn validate_networking(spec: &NexusSpec, capabilities: &Capabilities) -> Result<()> {
    let networking = &spec.networking;
    if !networking.expose {
        return Ok(());
    }

    match networking.expose_as {
        Some(ExposeType::Ingress) => {
            if !capabilities.ingress_available {
                return Err(Error::Validation(
                    "Ingress exposure requested but this cluster doesn't serve Ingresses".to_string(),
                ));
            }
            if networking.host.as_deref().is_none_or(str::is_empty) {
                return Err(Error::Validation(
                    "networking.host is required when exposing as Ingress".to_string(),
                ));
            }
        }
        Some(ExposeType::Route) => {
            if !capabilities.route_available {
                return Err(Error::Validation(
                    "Route exposure requested but this cluster doesn't serve Routes".to_string(),
                ));
            }
        }
        Some(ExposeType::NodePort) => {
            if networking.node_port.is_none_or(|port| port <= 0) {
                return Err(Error::Validation(
                    "networking.nodePort is required when exposing as NodePort".to_string(),
                ));
            }
        }
        None => {
            return Err(Error::Validation(
                "networking.exposeAs is required when exposing".to_string(),
            ));
        }
    }
    Ok(())
}
