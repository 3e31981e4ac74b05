//! Registry of running informers keyed by resource name.
//!
//! The cache lazily creates one informer per resource name, hands out shared
//! read-only handles, and is the only place an informer is stopped.
//!
//! Creating is not atomic across discovery and sync: two concurrent creates
//! for the same unseen name can both register a handle, and the later
//! registration wins. A displaced handle is stopped on the spot so no watch
//! outlives its registry entry.

use crate::descriptor::ResolvedResource;
use crate::discovery::Discovery;
use crate::error::CacheError;
use crate::handle::WatchHandle;
use crate::informer::InformerFactory;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Concurrency-safe mapping from resource name to [`WatchHandle`].
///
/// Construct once and share behind an `Arc`.
pub struct ResourceCache {
    discovery: Arc<dyn Discovery>,
    informers: Arc<dyn InformerFactory>,
    handles: RwLock<HashMap<String, Arc<WatchHandle>>>,
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("resources", &self.resources())
            .finish_non_exhaustive()
    }
}

impl ResourceCache {
    /// Creates an empty cache.
    pub fn new(discovery: Arc<dyn Discovery>, informers: Arc<dyn InformerFactory>) -> Self {
        Self {
            discovery,
            informers,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Creates informers for every name, continuing past failures.
    ///
    /// Returns one error per failed name; an empty vector means every
    /// informer is running and synced.
    pub async fn create_informers<I, S>(&self, resources: I) -> Vec<CacheError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut errors = Vec::new();
        for resource in resources {
            if let Err(e) = self.create_resource_informer(resource.as_ref()).await {
                warn!(resource = %resource.as_ref(), "Failed to create informer: {}", e);
                errors.push(e);
            }
        }
        errors
    }

    /// Ensures an informer for `resource` is running and synced.
    ///
    /// Returns the registered handle immediately if one exists. Otherwise
    /// resolves the name, registers a new handle, starts its informer and
    /// waits for the initial sync.
    pub async fn create_resource_informer(
        &self,
        resource: &str,
    ) -> Result<Arc<WatchHandle>, CacheError> {
        if let Some(handle) = self.get_gvr_cache(resource) {
            return Ok(handle);
        }

        let resolved: ResolvedResource = self
            .discovery
            .resolve(resource)
            .await
            .map_err(|source| CacheError::ResourceResolution {
                resource: resource.to_string(),
                source,
            })?;

        let cancel = CancellationToken::new();
        let informer = self.informers.for_resource(&resolved);
        let handle = Arc::new(WatchHandle::new(resolved, cancel.clone(), informer.clone()));

        // registered before sync so concurrent callers find the in-flight handle
        let displaced = self
            .handles
            .write()
            .insert(resource.to_string(), handle.clone());
        if let Some(old) = displaced {
            warn!(resource = %resource, gvr = %old.gvr(), "Replaced a concurrently created informer");
            old.stop_informer();
        }
        debug!(resource = %resource, gvr = %handle.gvr(), "Registered informer");

        // deregisters on sync failure and when this future is dropped mid-sync
        let pending = PendingRegistration {
            cache: self,
            resource,
            handle,
            armed: true,
        };

        informer.start(cancel.clone());
        if !informer.wait_for_sync(&cancel).await {
            return Err(CacheError::Synchronization {
                resource: resource.to_string(),
                gvr: pending.handle.gvr().clone(),
            });
        }

        let handle = pending.complete();
        info!(resource = %resource, gvr = %handle.gvr(), "Informer synced");
        Ok(handle)
    }

    /// Stops watching `resource` and forgets its handle. No-op if absent.
    pub fn stop_resource_informer(&self, resource: &str) {
        let removed = self.handles.write().remove(resource);
        if let Some(handle) = removed {
            debug!(resource = %resource, "Deleted resource from gvr cache");
            handle.stop_informer();
            debug!(resource = %resource, "Closed informer for resource");
        }
    }

    /// Looks up the handle registered for `resource`.
    pub fn get_gvr_cache(&self, resource: &str) -> Option<Arc<WatchHandle>> {
        self.handles.read().get(resource).cloned()
    }

    /// Names of all registered resources, sorted.
    pub fn resources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handles.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    /// Whether no resource is registered.
    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }

    /// Stops every registered informer.
    pub fn stop_all(&self) {
        let drained: Vec<(String, Arc<WatchHandle>)> = self.handles.write().drain().collect();
        for (resource, handle) in drained {
            handle.stop_informer();
            debug!(resource = %resource, "Closed informer for resource");
        }
    }

    /// Removes `handle` after a failed or abandoned sync, unless another
    /// create already replaced it, then stops it.
    fn deregister(&self, resource: &str, handle: &Arc<WatchHandle>) {
        {
            let mut handles = self.handles.write();
            if handles
                .get(resource)
                .is_some_and(|current| Arc::ptr_eq(current, handle))
            {
                handles.remove(resource);
            }
        }
        if !handle.is_stopped() {
            handle.stop_informer();
        }
        warn!(resource = %resource, gvr = %handle.gvr(), "Informer hasn't synced, deregistered");
    }
}

/// A handle registered ahead of its initial sync.
///
/// Dropping it before [`complete`](Self::complete) deregisters and stops the
/// handle.
struct PendingRegistration<'a> {
    cache: &'a ResourceCache,
    resource: &'a str,
    handle: Arc<WatchHandle>,
    armed: bool,
}

impl PendingRegistration<'_> {
    fn complete(mut self) -> Arc<WatchHandle> {
        self.armed = false;
        self.handle.clone()
    }
}

impl Drop for PendingRegistration<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.deregister(self.resource, &self.handle);
        }
    }
}
