//! Error types for the controller.
//!
//! Defines the reconcile error taxonomy with classification for retry
//! behavior.

use std::time::Duration;
use thiserror::Error;

use crate::resources::ResourceKey;
use crate::server::ServerError;
use crate::tags::TagError;

/// Error type for controller operations
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Fetching a deployed resource failed for a reason other than not found
    #[error("Failed to fetch {key}: {source}")]
    Fetch {
        key: ResourceKey,
        #[source]
        source: kube::Error,
    },

    /// Creating, updating or deleting a child resource failed
    #[error("Failed to {action} {key}: {source}")]
    Apply {
        action: &'static str,
        key: ResourceKey,
        #[source]
        source: kube::Error,
    },

    /// The capability provider could not answer
    #[error("Capability discovery failed: {0}")]
    Capability(String),

    /// Managers are wired inconsistently (e.g. two overrides for one kind)
    #[error("Manager configuration error: {0}")]
    ManagerConfig(String),

    /// A manager was asked for resources the CR should never have asked for
    #[error("Cannot generate required resources: {0}")]
    RequiredResources(String),

    /// Validation error in resource spec
    #[error("Validation error: {0}")]
    Validation(String),

    /// Tag source failure
    #[error("Tag source error: {0}")]
    Tags(#[from] TagError),

    /// Nexus REST client setup failure
    #[error("Nexus server error: {0}")]
    Server(#[from] ServerError),

    /// Optimistic-concurrency retries did not succeed in time
    #[error("Timed out after {timeout:?} persisting {target} of {name}")]
    PersistTimeout {
        target: &'static str,
        name: String,
        timeout: Duration,
    },
}

fn kube_code(error: &kube::Error) -> Option<u16> {
    match error {
        kube::Error::Api(response) => Some(response.code),
        _ => None,
    }
}

impl Error {
    fn kube_source(&self) -> Option<&kube::Error> {
        match self {
            Error::Kube(e) => Some(e),
            Error::Fetch { source, .. } | Error::Apply { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        self.kube_source().and_then(kube_code) == Some(404)
    }

    /// Check if this error is an optimistic-concurrency conflict
    pub fn is_conflict(&self) -> bool {
        self.kube_source().and_then(kube_code) == Some(409)
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(e) | Error::Fetch { source: e, .. } | Error::Apply { source: e, .. } => {
                // Retry on network errors, conflicts, rate limiting, and server errors
                matches!(
                    e,
                    kube::Error::Api(api_err)
                        if api_err.code >= 500 || api_err.code == 429 || api_err.code == 409
                ) || matches!(e, kube::Error::Service(_))
            }
            Error::Capability(_)
            | Error::PersistTimeout { .. }
            | Error::Tags(_)
            | Error::Server(_) => true,
            Error::Validation(_) | Error::ManagerConfig(_) | Error::RequiredResources(_) => false,
        }
    }

    /// Get the recommended requeue duration for this error
    pub fn requeue_after(&self) -> Duration {
        if self.is_retryable() {
            Duration::from_secs(30)
        } else {
            Duration::from_secs(300)
        }
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, Error>;
