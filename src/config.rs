//! Operator configuration.
//!
//! Everything comes from environment variables set by the operator's own
//! Deployment:
//!
//! - `WATCH_NAMESPACE`: namespace to watch (all namespaces when unset or empty)
//! - `POD_NAME`: leader election identity (hostname when unset)
//! - `POD_NAMESPACE`: namespace of the leader election lease (`default`)
//! - `HEALTH_PORT`: port of the health and metrics server (8080)
//! - `TAG_REFRESH_INTERVAL_SECS`: image tag refresh interval (6 hours)

use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::tags::DEFAULT_REFRESH_INTERVAL;

pub const DEFAULT_HEALTH_PORT: u16 = 8080;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    pub watch_namespace: Option<String>,
    pub pod_name: String,
    pub pod_namespace: String,
    pub health_port: u16,
    pub tag_refresh_interval: Duration,
}

impl OperatorConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read configuration through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty());

        let pod_name = lookup("POD_NAME").unwrap_or_else(|| {
            warn!("POD_NAME not set, using hostname");
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        });
        let pod_namespace = lookup("POD_NAMESPACE").unwrap_or_else(|| {
            warn!("POD_NAMESPACE not set, using 'default'");
            "default".to_string()
        });

        let health_port = match lookup("HEALTH_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "HEALTH_PORT",
                expected: "a port number",
                value,
            })?,
            None => DEFAULT_HEALTH_PORT,
        };

        let tag_refresh_interval = match lookup("TAG_REFRESH_INTERVAL_SECS") {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "TAG_REFRESH_INTERVAL_SECS",
                        expected: "a positive number of seconds",
                        value,
                    });
                }
            },
            None => DEFAULT_REFRESH_INTERVAL,
        };

        Ok(Self {
            watch_namespace,
            pod_name,
            pod_namespace,
            health_port,
            tag_refresh_interval,
        })
    }
}
