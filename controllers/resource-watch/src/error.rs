//! Controller-specific error types.
//!
//! Errors from the resource cache itself are reported per resource and logged;
//! only failures that stop the controller from running end up here.

use kube::Error as KubeError;
use resource_cache::DiscoveryError;
use thiserror::Error;

/// Errors that can occur in the Resource Watch Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// API discovery failed
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
