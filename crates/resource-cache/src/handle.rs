//! Per-resource watch handle.

use crate::descriptor::{GroupVersionResource, ResolvedResource};
use crate::informer::Informer;
use kube::api::DynamicObject;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One active watch subscription, owned by the
/// [`ResourceCache`](crate::ResourceCache).
///
/// Callers get a shared, read-only view. The cancellation token that tears
/// the informer down is only fired by the cache.
#[derive(Debug)]
pub struct WatchHandle {
    resource: ResolvedResource,
    cancel: CancellationToken,
    informer: Arc<dyn Informer>,
}

impl WatchHandle {
    pub(crate) fn new(
        resource: ResolvedResource,
        cancel: CancellationToken,
        informer: Arc<dyn Informer>,
    ) -> Self {
        Self {
            resource,
            cancel,
            informer,
        }
    }

    /// Qualified descriptor of the watched kind.
    pub fn gvr(&self) -> &GroupVersionResource {
        &self.resource.resource
    }

    /// Whether the watched kind is namespace-scoped.
    pub fn is_namespaced(&self) -> bool {
        self.resource.namespaced
    }

    /// Whether the informer's store finished its initial sync.
    pub fn has_synced(&self) -> bool {
        self.informer.has_synced()
    }

    /// Whether the cache has stopped this handle.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// All cached objects.
    pub fn list(&self) -> Vec<Arc<DynamicObject>> {
        self.informer.list()
    }

    /// Cached objects in `namespace`. Empty for cluster-scoped kinds.
    pub fn list_namespaced(&self, namespace: &str) -> Vec<Arc<DynamicObject>> {
        if !self.is_namespaced() {
            return Vec::new();
        }
        self.informer
            .list()
            .into_iter()
            .filter(|obj| obj.metadata.namespace.as_deref() == Some(namespace))
            .collect()
    }

    /// One cached object by namespace and name.
    pub fn get(&self, namespace: Option<&str>, name: &str) -> Option<Arc<DynamicObject>> {
        self.informer.get(namespace, name)
    }

    /// Fires the cancellation token. A second call is a no-op.
    pub(crate) fn stop_informer(&self) {
        self.cancel.cancel();
    }
}
