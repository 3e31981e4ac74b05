//! Resource name discovery.
//!
//! The cache never talks to the API server directly to find out what a
//! resource name means; it asks a [`Discovery`] implementation. The
//! production implementation, [`KubeDiscovery`], runs `kube` API discovery
//! and matches names against the recommended version of every group.

use crate::descriptor::{GroupVersionResource, ResolvedResource};
use crate::error::DiscoveryError;
use kube::Client;
use kube::discovery::{Discovery as ApiDiscovery, Scope};
use parking_lot::RwLock;
use tracing::{debug, info};

/// Resolves resource names to qualified descriptors.
///
/// Implementations must fail deterministically for unknown or ambiguous names
/// and must not have side effects beyond the lookup.
#[async_trait::async_trait]
pub trait Discovery: Send + Sync {
    /// Resolve `name` to its descriptor and scope.
    async fn resolve(&self, name: &str) -> Result<ResolvedResource, DiscoveryError>;
}

/// Discovery backed by the Kubernetes API discovery endpoints.
///
/// Discovery runs once at construction; call [`KubeDiscovery::refresh`] to
/// pick up newly installed CRDs.
pub struct KubeDiscovery {
    client: Client,
    resources: RwLock<Vec<ResolvedResource>>,
}

impl std::fmt::Debug for KubeDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeDiscovery")
            .field("resources", &self.resources.read().len())
            .finish_non_exhaustive()
    }
}

impl KubeDiscovery {
    /// Runs API discovery and builds the lookup table.
    pub async fn new(client: Client) -> Result<Self, DiscoveryError> {
        let resources = run_discovery(client.clone()).await?;
        info!("Discovered {} API resources", resources.len());
        Ok(Self {
            client,
            resources: RwLock::new(resources),
        })
    }

    /// Re-runs API discovery, replacing the lookup table.
    pub async fn refresh(&self) -> Result<(), DiscoveryError> {
        let resources = run_discovery(self.client.clone()).await?;
        debug!("Refreshed discovery: {} API resources", resources.len());
        *self.resources.write() = resources;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Discovery for KubeDiscovery {
    async fn resolve(&self, name: &str) -> Result<ResolvedResource, DiscoveryError> {
        let resources = self.resources.read();
        find_resource(&resources, name)
    }
}

async fn run_discovery(client: Client) -> Result<Vec<ResolvedResource>, DiscoveryError> {
    let discovery = ApiDiscovery::new(client).run().await?;
    let mut resources = Vec::new();
    for group in discovery.groups() {
        for (ar, caps) in group.recommended_resources() {
            resources.push(ResolvedResource::new(
                GroupVersionResource::from(&ar),
                matches!(caps.scope, Scope::Namespaced),
            ));
        }
    }
    Ok(resources)
}

/// Finds the single resource matching `name`.
///
/// `name` may be a plural resource name (`deployments`), a kind matched
/// case-insensitively (`Deployment`), or `plural.group`
/// (`events.events.k8s.io`) to pick one group explicitly. Subresources never
/// match. Several matches are ambiguous unless exactly one of them matched by
/// plural.
pub fn find_resource(
    known: &[ResolvedResource],
    name: &str,
) -> Result<ResolvedResource, DiscoveryError> {
    let matches: Vec<&ResolvedResource> = match name.split_once('.') {
        Some((plural, group)) => known
            .iter()
            .filter(|r| r.resource.resource == plural && r.resource.group == group)
            .collect(),
        None => known
            .iter()
            .filter(|r| !r.resource.resource.contains('/'))
            .filter(|r| r.resource.resource == name || r.resource.kind.eq_ignore_ascii_case(name))
            .collect(),
    };

    match matches.as_slice() {
        [] => Err(DiscoveryError::NotFound(name.to_string())),
        [only] => Ok((*only).clone()),
        many => {
            // a plural match beats a kind match on another resource
            let mut plurals = many.iter().filter(|r| r.resource.resource == name);
            if let (Some(plural), None) = (plurals.next(), plurals.next()) {
                return Ok((*plural).clone());
            }
            Err(DiscoveryError::Ambiguous {
                name: name.to_string(),
                candidates: many.iter().map(|r| r.resource.to_string()).collect(),
            })
        }
    }
}
