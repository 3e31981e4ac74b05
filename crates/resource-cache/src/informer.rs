//! Watch engine seam.
//!
//! An [`Informer`] list-watches one resource kind and maintains a local store
//! of its objects. The cache only needs three things from it: start it with a
//! cancellation token, wait for its initial sync, and stop it by cancelling
//! that token. Everything else is exposed to callers for reads.
//!
//! [`KubeInformerFactory`] builds informers on `kube_runtime::watcher` and a
//! `reflector` store of [`DynamicObject`]s.

use crate::descriptor::ResolvedResource;
use futures::StreamExt;
use kube::api::{Api, DynamicObject};
use kube::Client;
use kube_runtime::reflector::{self, ObjectRef, Store, store::Writer};
use kube_runtime::{WatchStreamExt, watcher};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default bound on how long an informer waits for its initial list.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(60);

/// A running (or startable) watch over one resource kind.
#[async_trait::async_trait]
pub trait Informer: Send + Sync + fmt::Debug {
    /// Start list-watching until `cancel` fires.
    fn start(&self, cancel: CancellationToken);

    /// Wait until the local store holds the initial snapshot.
    ///
    /// Returns `false` when `cancel` fires first or the informer gives up.
    async fn wait_for_sync(&self, cancel: &CancellationToken) -> bool;

    /// Whether the initial snapshot has been received.
    fn has_synced(&self) -> bool;

    /// All objects currently in the local store.
    fn list(&self) -> Vec<Arc<DynamicObject>>;

    /// Look up one object. `namespace` is ignored for cluster-scoped kinds.
    fn get(&self, namespace: Option<&str>, name: &str) -> Option<Arc<DynamicObject>>;
}

/// Produces informers for resolved resources.
pub trait InformerFactory: Send + Sync {
    /// Create a new, not yet started informer.
    fn for_resource(&self, resource: &ResolvedResource) -> Arc<dyn Informer>;
}

/// Informer factory backed by a Kubernetes client.
#[derive(Clone)]
pub struct KubeInformerFactory {
    client: Client,
    namespace: Option<String>,
    sync_timeout: Duration,
    watcher_config: watcher::Config,
}

impl fmt::Debug for KubeInformerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeInformerFactory")
            .field("namespace", &self.namespace)
            .field("sync_timeout", &self.sync_timeout)
            .finish_non_exhaustive()
    }
}

impl KubeInformerFactory {
    /// Creates a factory watching all namespaces.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            namespace: None,
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            watcher_config: watcher::Config::default(),
        }
    }

    /// Restrict namespaced kinds to one namespace. Cluster-scoped kinds are unaffected.
    #[must_use]
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Bound the initial sync wait.
    #[must_use]
    pub fn with_sync_timeout(mut self, sync_timeout: Duration) -> Self {
        self.sync_timeout = sync_timeout;
        self
    }

    /// Override the watcher configuration (selectors, page size, ...).
    #[must_use]
    pub fn with_watcher_config(mut self, watcher_config: watcher::Config) -> Self {
        self.watcher_config = watcher_config;
        self
    }
}

impl InformerFactory for KubeInformerFactory {
    fn for_resource(&self, resource: &ResolvedResource) -> Arc<dyn Informer> {
        let ar = resource.resource.to_api_resource();
        let api: Api<DynamicObject> = match (&self.namespace, resource.namespaced) {
            (Some(ns), true) => Api::namespaced_with(self.client.clone(), ns, &ar),
            _ => Api::all_with(self.client.clone(), &ar),
        };
        let writer = Writer::new(ar.clone());
        let store = writer.as_reader();

        Arc::new(KubeInformer {
            resource: resource.clone(),
            api,
            store,
            writer: Mutex::new(Some(writer)),
            synced: Arc::new(AtomicBool::new(false)),
            sync_timeout: self.sync_timeout,
            watcher_config: self.watcher_config.clone(),
        })
    }
}

/// Informer over [`DynamicObject`]s of one resource kind.
pub struct KubeInformer {
    resource: ResolvedResource,
    api: Api<DynamicObject>,
    store: Store<DynamicObject>,
    // taken on start
    writer: Mutex<Option<Writer<DynamicObject>>>,
    synced: Arc<AtomicBool>,
    sync_timeout: Duration,
    watcher_config: watcher::Config,
}

impl fmt::Debug for KubeInformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeInformer")
            .field("resource", &self.resource)
            .field("synced", &self.has_synced())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Informer for KubeInformer {
    fn start(&self, cancel: CancellationToken) {
        let Some(writer) = self.writer.lock().take() else {
            warn!(gvr = %self.resource.resource, "Informer already started, ignoring start");
            return;
        };

        let gvr = self.resource.resource.clone();
        info!(gvr = %gvr, "Starting informer");

        let stream = reflector::reflector(
            writer,
            watcher(self.api.clone(), self.watcher_config.clone()).default_backoff(),
        );
        let watch_cancel = cancel.clone();
        tokio::spawn(async move {
            let drive = stream.for_each(|event| {
                if let Err(e) = event {
                    warn!(gvr = %gvr, "Watch stream error: {}", e);
                }
                futures::future::ready(())
            });
            tokio::select! {
                () = watch_cancel.cancelled() => {
                    info!(gvr = %gvr, "Informer stopped");
                }
                () = drive => {
                    warn!(gvr = %gvr, "Watch stream ended");
                }
            }
        });

        let store = self.store.clone();
        let synced = self.synced.clone();
        let gvr = self.resource.resource.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                ready = store.wait_until_ready() => {
                    if ready.is_ok() {
                        synced.store(true, Ordering::Release);
                        debug!(gvr = %gvr, "Informer store synced");
                    }
                }
            }
        });
    }

    async fn wait_for_sync(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            () = cancel.cancelled() => false,
            ready = tokio::time::timeout(self.sync_timeout, self.store.wait_until_ready()) => {
                let synced = matches!(ready, Ok(Ok(())));
                if synced {
                    self.synced.store(true, Ordering::Release);
                }
                synced
            }
        }
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    fn list(&self) -> Vec<Arc<DynamicObject>> {
        self.store.state()
    }

    fn get(&self, namespace: Option<&str>, name: &str) -> Option<Arc<DynamicObject>> {
        let mut obj_ref = ObjectRef::new_with(name, self.resource.resource.to_api_resource());
        if let (Some(ns), true) = (namespace, self.resource.namespaced) {
            obj_ref = obj_ref.within(ns);
        }
        self.store.get(&obj_ref)
    }
}
