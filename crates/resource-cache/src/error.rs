//! Resource cache errors

use crate::descriptor::GroupVersionResource;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors returned by a discovery collaborator
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No served resource matches the name
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The name matches resources in more than one API group
    #[error("resource {name} is ambiguous, candidates: {}", .candidates.join(", "))]
    Ambiguous {
        /// Name that was looked up
        name: String,
        /// Qualified descriptors that matched
        candidates: Vec<String>,
    },

    /// Kubernetes API error while running discovery
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),
}

/// Errors returned by the resource cache.
///
/// Every variant carries the resource name it was detected for, so batch
/// callers can retry only the failed subset.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Discovery could not map the name to a unique descriptor
    #[error("cannot find API resource {resource}: {source}")]
    ResourceResolution {
        /// Resource name requested by the caller
        resource: String,
        /// Underlying discovery failure
        #[source]
        source: DiscoveryError,
    },

    /// The informer started but never reported a synchronized store
    #[error("informer for {resource} ({gvr}) hasn't synced")]
    Synchronization {
        /// Resource name requested by the caller
        resource: String,
        /// Descriptor the informer was created for
        gvr: GroupVersionResource,
    },
}

impl CacheError {
    /// Resource name this error was detected for.
    pub fn resource(&self) -> &str {
        match self {
            Self::ResourceResolution { resource, .. } | Self::Synchronization { resource, .. } => {
                resource
            }
        }
    }

    /// Whether calling create again later may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Synchronization { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_names_resource() {
        let err = CacheError::ResourceResolution {
            resource: "bogus-kind".to_string(),
            source: DiscoveryError::NotFound("bogus-kind".to_string()),
        };
        assert_eq!(err.resource(), "bogus-kind");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("bogus-kind"));
    }

    #[test]
    fn test_sync_error_is_retryable() {
        let err = CacheError::Synchronization {
            resource: "pods".to_string(),
            gvr: GroupVersionResource::new("", "v1", "pods", "Pod"),
        };
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "informer for pods (v1, Resource=pods) hasn't synced");
    }

    #[test]
    fn test_ambiguous_lists_candidates() {
        let err = DiscoveryError::Ambiguous {
            name: "events".to_string(),
            candidates: vec!["v1, Resource=events".to_string(), "events.k8s.io/v1, Resource=events".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("v1, Resource=events, events.k8s.io/v1, Resource=events"));
    }
}
