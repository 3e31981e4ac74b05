//! Main controller implementation.
//!
//! This module contains the `Controller` struct that owns the resource cache,
//! starts an informer for every configured resource and keeps retrying the
//! ones that failed until shutdown.

use crate::config::Config;
use crate::error::ControllerError;
use kube::Client;
use resource_cache::{KubeDiscovery, KubeInformerFactory, ResourceCache};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Main controller for resource watching.
#[derive(Debug)]
pub struct Controller {
    cache: Arc<ResourceCache>,
    resources: Vec<String>,
    status_interval: Duration,
}

impl Controller {
    /// Creates a new controller instance backed by the cluster API.
    pub async fn new(config: &Config) -> Result<Self, ControllerError> {
        info!("Initializing Resource Watch Controller");

        let kube_client = Client::try_default().await?;

        info!("Running API discovery...");
        let discovery = KubeDiscovery::new(kube_client.clone()).await?;

        let informers = KubeInformerFactory::new(kube_client)
            .with_namespace(config.namespace.clone())
            .with_sync_timeout(config.sync_timeout);

        let cache = Arc::new(ResourceCache::new(Arc::new(discovery), Arc::new(informers)));
        Ok(Self::with_cache(cache, config))
    }

    /// Creates a controller over an existing cache.
    pub fn with_cache(cache: Arc<ResourceCache>, config: &Config) -> Self {
        Self {
            cache,
            resources: config.resources.clone(),
            status_interval: config.status_interval,
        }
    }

    /// Creates informers for every configured resource that is not yet running.
    ///
    /// Returns the number of resources still missing afterwards.
    pub async fn ensure_informers(&self) -> usize {
        let missing: Vec<&String> = self
            .resources
            .iter()
            .filter(|name| self.cache.get_gvr_cache(name).is_none())
            .collect();
        if missing.is_empty() {
            return 0;
        }

        let errors = self.cache.create_informers(missing).await;
        for e in &errors {
            if e.is_retryable() {
                warn!(resource = %e.resource(), "Informer not ready, will retry: {}", e);
            } else {
                error!(resource = %e.resource(), "Informer cannot be created: {}", e);
            }
        }
        errors.len()
    }

    /// Runs the controller until Ctrl-C.
    pub async fn run(self) -> Result<(), ControllerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Runs the controller until `shutdown` completes, then stops every informer.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ControllerError>
    where
        F: Future<Output = ()>,
    {
        let failed = self.ensure_informers().await;
        if failed == self.resources.len() {
            self.cache.stop_all();
            return Err(ControllerError::Watch(
                "no informer could be started for the configured resources".to_string(),
            ));
        }
        info!(
            "Resource Watch Controller running: {} of {} informers synced",
            self.resources.len() - failed,
            self.resources.len()
        );

        let mut ticker = tokio::time::interval(self.status_interval);
        // the first tick completes immediately
        ticker.tick().await;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    self.ensure_informers().await;
                    self.log_status();
                }
            }
        }

        self.cache.stop_all();
        info!("All informers stopped");
        Ok(())
    }

    fn log_status(&self) {
        for name in self.cache.resources() {
            if let Some(handle) = self.cache.get_gvr_cache(&name) {
                info!(
                    resource = %name,
                    gvr = %handle.gvr(),
                    synced = handle.has_synced(),
                    "{} objects cached",
                    handle.list().len()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_cache::{FakeDiscovery, FakeInformerFactory, SyncBehavior};

    fn config(resources: &[&str]) -> Config {
        Config {
            resources: resources.iter().map(|r| r.to_string()).collect(),
            namespace: None,
            sync_timeout: Duration::from_secs(1),
            status_interval: Duration::from_millis(10),
        }
    }

    fn fake_cache() -> (Arc<ResourceCache>, Arc<FakeInformerFactory>) {
        let factory = Arc::new(FakeInformerFactory::new());
        let cache = Arc::new(ResourceCache::new(Arc::new(FakeDiscovery::builtin()), factory.clone()));
        (cache, factory)
    }

    #[tokio::test]
    async fn test_ensure_informers_counts_failures() {
        let (cache, _) = fake_cache();
        let controller = Controller::with_cache(cache.clone(), &config(&["pods", "bogus-kind"]));

        assert_eq!(controller.ensure_informers().await, 1);
        assert!(cache.get_gvr_cache("pods").is_some());

        // running informers are not recreated
        assert_eq!(controller.ensure_informers().await, 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_run_retries_and_stops_on_shutdown() {
        let (cache, factory) = fake_cache();
        factory.set_behavior("secrets", SyncBehavior::Fail);
        let controller = Controller::with_cache(cache.clone(), &config(&["pods", "secrets"]));

        let shutdown = {
            let factory = factory.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                factory.set_behavior("secrets", SyncBehavior::Immediate);
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        controller.run_until(shutdown).await.expect("controller runs");

        assert!(cache.is_empty());
        assert!(factory.created_for("secrets").len() >= 2);
        assert!(factory.created().iter().all(|informer| informer.is_stopped()));
    }

    #[tokio::test]
    async fn test_run_fails_when_nothing_starts() {
        let (cache, _) = fake_cache();
        let controller = Controller::with_cache(cache, &config(&["bogus-kind"]));

        let result = controller.run_until(async {}).await;
        assert!(matches!(result, Err(ControllerError::Watch(_))));
    }
}
