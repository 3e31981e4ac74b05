//! Resource Cache
//!
//! Keeps one informer per Kubernetes resource kind, created on demand from a
//! resource name resolved at runtime through API discovery.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use resource_cache::{KubeDiscovery, KubeInformerFactory, ResourceCache};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let discovery = KubeDiscovery::new(client.clone()).await?;
//! let cache = ResourceCache::new(
//!     Arc::new(discovery),
//!     Arc::new(KubeInformerFactory::new(client)),
//! );
//!
//! // Failures are reported per resource; the rest keep running
//! for err in cache.create_informers(["pods", "secrets"]).await {
//!     eprintln!("{err}");
//! }
//!
//! if let Some(pods) = cache.get_gvr_cache("pods") {
//!     println!("{} pods cached", pods.list().len());
//! }
//!
//! cache.stop_resource_informer("pods");
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Idempotent create**: a registered resource is returned without discovery
//! - **Explicit eviction**: stopping removes the entry, then cancels the watch
//! - **Swappable collaborators**: [`Discovery`] and [`InformerFactory`] traits
//! - **Test fakes**: enable `test-util` for in-memory collaborators

pub mod cache;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod handle;
pub mod informer;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

#[cfg(test)]
mod cache_test;

pub use cache::ResourceCache;
pub use descriptor::{GroupVersionResource, ResolvedResource};
pub use discovery::{Discovery, KubeDiscovery};
pub use error::{CacheError, DiscoveryError};
pub use handle::WatchHandle;
pub use informer::{Informer, InformerFactory, KubeInformer, KubeInformerFactory};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{FakeDiscovery, FakeInformer, FakeInformerFactory, SyncBehavior};
