//! Qualified resource descriptors.
//!
//! Discovery resolves a short name such as `pods` into a
//! [`GroupVersionResource`] plus the scope of the kind. The descriptor is
//! what informers are keyed on; the short name is what the cache is keyed on.

use kube::core::{ApiResource, GroupVersionKind};
use std::fmt;

/// Fully-qualified identity of a resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersionResource {
    /// API group, empty for the core group
    pub group: String,
    /// API version within the group
    pub version: String,
    /// Plural resource name as served by the API (e.g. `deployments`)
    pub resource: String,
    /// Kind of the objects served under this resource (e.g. `Deployment`)
    pub kind: String,
}

impl GroupVersionResource {
    /// Creates a descriptor from its parts.
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
            kind: kind.into(),
        }
    }

    /// `group/version`, or just `version` for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Converts into the dynamic type used by `kube` for untyped APIs.
    pub fn to_api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(&self.group, &self.version, &self.kind);
        ApiResource::from_gvk_with_plural(&gvk, &self.resource)
    }
}

impl From<&ApiResource> for GroupVersionResource {
    fn from(ar: &ApiResource) -> Self {
        Self::new(&ar.group, &ar.version, &ar.plural, &ar.kind)
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Resource={}", self.api_version(), self.resource)
    }
}

/// Result of resolving a resource name through discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedResource {
    /// Qualified descriptor
    pub resource: GroupVersionResource,
    /// Whether instances are partitioned by namespace
    pub namespaced: bool,
}

impl ResolvedResource {
    /// Creates a resolved resource.
    pub fn new(resource: GroupVersionResource, namespaced: bool) -> Self {
        Self { resource, namespaced }
    }
}
