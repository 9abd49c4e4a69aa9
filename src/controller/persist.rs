//! Conflict-safe writes of the Nexus CR.
//!
//! A write that loses an optimistic-concurrency race re-reads the CR, lays
//! the desired spec or status over the fresh copy and tries again. Any other
//! error ends the loop, and so does the `RetryPolicy` timeout.

use std::future::Future;
use std::time::Duration;

use kube::ResourceExt;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::controller::error::{Error, Result};
use crate::crd::Nexus;
use crate::store::ClusterStore;

/// Which part of the CR a write replaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistTarget {
    Spec,
    Status,
}

impl PersistTarget {
    fn as_str(self) -> &'static str {
        match self {
            PersistTarget::Spec => "spec",
            PersistTarget::Status => "status",
        }
    }

    /// Copy this part of `desired` onto `current`.
    fn overlay(self, desired: &Nexus, current: &mut Nexus) {
        match self {
            PersistTarget::Spec => current.spec = desired.spec.clone(),
            PersistTarget::Status => current.status = desired.status.clone(),
        }
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// A non-retryable error.
    Failed(E),
    /// Retryable errors until the policy timeout ran out.
    TimedOut { attempts: u32 },
}

/// How long and how often to retry an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Run `attempt` (called with the attempt number, from 0) until it
    /// succeeds or fails with an error `should_retry` rejects. Attempts are
    /// `interval` apart; no attempt starts after `timeout`.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        mut attempt: F,
        should_retry: P,
    ) -> std::result::Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let start = Instant::now();
        let mut attempts = 0;
        loop {
            match attempt(attempts).await {
                Ok(value) => return Ok(value),
                Err(e) if !should_retry(&e) => return Err(RetryError::Failed(e)),
                Err(_) => attempts += 1,
            }
            if start.elapsed() + self.interval > self.timeout {
                return Err(RetryError::TimedOut { attempts });
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

fn is_conflict(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 409)
}

/// Persist the spec of `desired`, returning the stored object.
pub async fn persist_spec(
    store: &dyn ClusterStore,
    desired: &Nexus,
    policy: RetryPolicy,
) -> Result<Nexus> {
    persist(store, desired, PersistTarget::Spec, policy).await
}

/// Persist the status of `desired`, returning the stored object.
pub async fn persist_status(
    store: &dyn ClusterStore,
    desired: &Nexus,
    policy: RetryPolicy,
) -> Result<Nexus> {
    persist(store, desired, PersistTarget::Status, policy).await
}

#[instrument(skip(store, desired, policy), fields(name = %desired.name_any(), target = target.as_str()))]
async fn persist(
    store: &dyn ClusterStore,
    desired: &Nexus,
    target: PersistTarget,
    policy: RetryPolicy,
) -> Result<Nexus> {
    let namespace = desired.namespace().unwrap_or_default();
    let name = desired.name_any();

    let write = |attempt: u32| {
        let (namespace, name) = (namespace.as_str(), name.as_str());
        async move {
            let candidate = if attempt == 0 {
                desired.clone()
            } else {
                debug!(attempt, "Write conflicted, retrying on a fresh copy");
                let mut current = store.get_nexus(namespace, name).await?;
                target.overlay(desired, &mut current);
                current
            };
            match target {
                PersistTarget::Spec => store.replace_nexus(&candidate).await,
                PersistTarget::Status => store.replace_nexus_status(&candidate).await,
            }
        }
    };

    policy
        .run(write, is_conflict)
        .await
        .map_err(|e| match e {
            RetryError::Failed(e) => Error::Kube(e),
            RetryError::TimedOut { .. } => Error::PersistTimeout {
                target: target.as_str(),
                name: name.clone(),
                timeout: policy.timeout,
            },
        })
}
