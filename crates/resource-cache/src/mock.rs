//! In-memory collaborators for unit testing
//!
//! [`FakeDiscovery`] resolves names from a fixed table and counts lookups.
//! [`FakeInformerFactory`] hands out [`FakeInformer`]s whose sync outcome is
//! configured per resource, so the cache can be exercised without an API
//! server.

use crate::descriptor::{GroupVersionResource, ResolvedResource};
use crate::discovery::{Discovery, find_resource};
use crate::error::DiscoveryError;
use crate::informer::{Informer, InformerFactory};
use kube::api::DynamicObject;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Discovery over a fixed list of resources
#[derive(Debug, Default)]
pub struct FakeDiscovery {
    resources: Mutex<Vec<ResolvedResource>>,
    calls: AtomicUsize,
}

impl FakeDiscovery {
    /// Create an empty discovery table
    pub fn new() -> Self {
        Self::default()
    }

    /// Discovery with a handful of built-in kinds:
    /// `pods`, `secrets`, `configmaps` (namespaced), `namespaces`, `nodes`
    /// (cluster-scoped) and `deployments` in `apps`.
    pub fn builtin() -> Self {
        let discovery = Self::new();
        discovery.add_resource(GroupVersionResource::new("", "v1", "pods", "Pod"), true);
        discovery.add_resource(GroupVersionResource::new("", "v1", "secrets", "Secret"), true);
        discovery.add_resource(GroupVersionResource::new("", "v1", "configmaps", "ConfigMap"), true);
        discovery.add_resource(GroupVersionResource::new("", "v1", "namespaces", "Namespace"), false);
        discovery.add_resource(GroupVersionResource::new("", "v1", "nodes", "Node"), false);
        discovery.add_resource(
            GroupVersionResource::new("apps", "v1", "deployments", "Deployment"),
            true,
        );
        discovery
    }

    /// Add a resource to the table (for test setup)
    pub fn add_resource(&self, resource: GroupVersionResource, namespaced: bool) {
        self.resources
            .lock()
            .push(ResolvedResource::new(resource, namespaced));
    }

    /// Number of `resolve` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Discovery for FakeDiscovery {
    async fn resolve(&self, name: &str) -> Result<ResolvedResource, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // a real lookup suspends; give concurrent callers a chance to interleave
        tokio::task::yield_now().await;
        let resources = self.resources.lock();
        find_resource(&resources, name)
    }
}

/// How a [`FakeInformer`] answers `wait_for_sync`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncBehavior {
    /// Synced as soon as it is asked
    Immediate,
    /// Synced after the given delay, unless cancelled first
    Delayed(Duration),
    /// Never syncs; the wait only ends when cancelled
    Never,
    /// Gives up straight away
    Fail,
}

/// Informer that never touches the network
#[derive(Debug)]
pub struct FakeInformer {
    resource: ResolvedResource,
    behavior: SyncBehavior,
    objects: Vec<Arc<DynamicObject>>,
    starts: AtomicUsize,
    synced: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
}

impl FakeInformer {
    /// Create an informer with a fixed sync outcome and store contents
    pub fn new(
        resource: ResolvedResource,
        behavior: SyncBehavior,
        objects: Vec<DynamicObject>,
    ) -> Self {
        Self {
            resource,
            behavior,
            objects: objects.into_iter().map(Arc::new).collect(),
            starts: AtomicUsize::new(0),
            synced: AtomicBool::new(false),
            cancel: Mutex::new(None),
        }
    }

    /// Resource this informer was created for
    pub fn resource(&self) -> &ResolvedResource {
        &self.resource
    }

    /// Number of times `start` was called
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Whether `start` was called
    pub fn is_started(&self) -> bool {
        self.starts() > 0
    }

    /// Whether the token given to `start` has fired
    pub fn is_stopped(&self) -> bool {
        self.cancel
            .lock()
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

#[async_trait::async_trait]
impl Informer for FakeInformer {
    fn start(&self, cancel: CancellationToken) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.cancel.lock() = Some(cancel);
    }

    async fn wait_for_sync(&self, cancel: &CancellationToken) -> bool {
        let synced = match self.behavior {
            SyncBehavior::Immediate => !cancel.is_cancelled(),
            SyncBehavior::Delayed(delay) => {
                tokio::select! {
                    () = cancel.cancelled() => false,
                    () = tokio::time::sleep(delay) => true,
                }
            }
            SyncBehavior::Never => {
                cancel.cancelled().await;
                false
            }
            SyncBehavior::Fail => false,
        };
        if synced {
            self.synced.store(true, Ordering::SeqCst);
        }
        synced
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    fn list(&self) -> Vec<Arc<DynamicObject>> {
        self.objects.clone()
    }

    fn get(&self, namespace: Option<&str>, name: &str) -> Option<Arc<DynamicObject>> {
        let namespace = namespace.filter(|_| self.resource.namespaced);
        self.objects
            .iter()
            .find(|obj| {
                obj.metadata.name.as_deref() == Some(name)
                    && obj.metadata.namespace.as_deref() == namespace
            })
            .cloned()
    }
}

/// Factory producing [`FakeInformer`]s and remembering each one
#[derive(Debug, Default)]
pub struct FakeInformerFactory {
    behaviors: Mutex<HashMap<String, SyncBehavior>>,
    objects: Mutex<HashMap<String, Vec<DynamicObject>>>,
    created: Mutex<Vec<Arc<FakeInformer>>>,
}

impl FakeInformerFactory {
    /// Factory whose informers sync immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sync outcome for a plural resource name (for test setup)
    pub fn set_behavior(&self, resource: &str, behavior: SyncBehavior) {
        self.behaviors.lock().insert(resource.to_string(), behavior);
    }

    /// Seed the store contents for a plural resource name (for test setup)
    pub fn set_objects(&self, resource: &str, objects: Vec<DynamicObject>) {
        self.objects.lock().insert(resource.to_string(), objects);
    }

    /// Every informer created so far, oldest first
    pub fn created(&self) -> Vec<Arc<FakeInformer>> {
        self.created.lock().clone()
    }

    /// Informers created for a plural resource name, oldest first
    pub fn created_for(&self, resource: &str) -> Vec<Arc<FakeInformer>> {
        self.created
            .lock()
            .iter()
            .filter(|informer| informer.resource.resource.resource == resource)
            .cloned()
            .collect()
    }
}

impl InformerFactory for FakeInformerFactory {
    fn for_resource(&self, resource: &ResolvedResource) -> Arc<dyn Informer> {
        let plural = &resource.resource.resource;
        let behavior = self
            .behaviors
            .lock()
            .get(plural)
            .copied()
            .unwrap_or(SyncBehavior::Immediate);
        let objects = self.objects.lock().get(plural).cloned().unwrap_or_default();

        let informer = Arc::new(FakeInformer::new(resource.clone(), behavior, objects));
        self.created.lock().push(informer.clone());
        informer
    }
}
