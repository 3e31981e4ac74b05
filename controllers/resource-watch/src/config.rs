//! Controller configuration.
//!
//! Read from environment variables:
//! - `WATCH_RESOURCES`: comma-separated resource names (required)
//! - `WATCH_NAMESPACE`: restrict namespaced kinds to one namespace
//! - `CACHE_SYNC_TIMEOUT_SECS`: bound on each informer's initial sync (default 60)
//! - `STATUS_INTERVAL_SECS`: period of the status report and retry pass (default 30)

use crate::error::ControllerError;
use std::time::Duration;

const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STATUS_INTERVAL_SECS: u64 = 30;

/// Runtime configuration for the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Resource names to keep informers running for
    pub resources: Vec<String>,
    /// Namespace for namespaced kinds, all namespaces when unset
    pub namespace: Option<String>,
    /// Bound on each informer's initial sync
    pub sync_timeout: Duration,
    /// Period of the status report and retry pass
    pub status_interval: Duration,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns the value of a variable if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resources: Vec<String> = lookup("WATCH_RESOURCES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if resources.is_empty() {
            return Err(ControllerError::InvalidConfig(
                "WATCH_RESOURCES environment variable is required".to_string(),
            ));
        }

        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());
        let sync_timeout = parse_secs(&lookup, "CACHE_SYNC_TIMEOUT_SECS", DEFAULT_SYNC_TIMEOUT_SECS)?;
        let status_interval = parse_secs(&lookup, "STATUS_INTERVAL_SECS", DEFAULT_STATUS_INTERVAL_SECS)?;

        Ok(Self {
            resources,
            namespace,
            sync_timeout,
            status_interval,
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, ControllerError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_secs(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ControllerError::InvalidConfig(format!(
            "{} must be a positive number of seconds, got {:?}",
            key, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("WATCH_RESOURCES", "pods")])).expect("valid config");
        assert_eq!(config.resources, vec!["pods".to_string()]);
        assert_eq!(config.namespace, None);
        assert_eq!(config.sync_timeout, Duration::from_secs(60));
        assert_eq!(config.status_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_resource_list_is_trimmed() {
        let config = Config::from_lookup(lookup(&[
            ("WATCH_RESOURCES", " pods, secrets ,,deployments.apps "),
            ("WATCH_NAMESPACE", "team-a"),
            ("CACHE_SYNC_TIMEOUT_SECS", "5"),
        ]))
        .expect("valid config");
        assert_eq!(config.resources, vec!["pods", "secrets", "deployments.apps"]);
        assert_eq!(config.namespace.as_deref(), Some("team-a"));
        assert_eq!(config.sync_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_resources_is_rejected() {
        let err = Config::from_lookup(lookup(&[("WATCH_RESOURCES", " , ")])).expect_err("no resources");
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("WATCH_RESOURCES", "pods"),
            ("CACHE_SYNC_TIMEOUT_SECS", "0"),
        ]))
        .expect_err("zero timeout");
        assert!(err.to_string().contains("CACHE_SYNC_TIMEOUT_SECS"));
    }
}
