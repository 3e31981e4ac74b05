//! Unit tests for the resource cache

#[cfg(test)]
mod tests {
    use crate::cache::ResourceCache;
    use crate::descriptor::GroupVersionResource;
    use crate::error::{CacheError, DiscoveryError};
    use crate::mock::{FakeDiscovery, FakeInformerFactory, SyncBehavior};
    use kube::api::DynamicObject;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (Arc<ResourceCache>, Arc<FakeDiscovery>, Arc<FakeInformerFactory>) {
        let discovery = Arc::new(FakeDiscovery::builtin());
        let factory = Arc::new(FakeInformerFactory::new());
        let cache = Arc::new(ResourceCache::new(discovery.clone(), factory.clone()));
        (cache, discovery, factory)
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let (cache, discovery, factory) = setup();

        let first = cache.create_resource_informer("pods").await.expect("pods informer");
        let second = cache.create_resource_informer("pods").await.expect("pods informer");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(discovery.calls(), 1, "second create must not hit discovery");
        assert_eq!(factory.created().len(), 1);
        assert_eq!(factory.created_for("pods")[0].starts(), 1);
        assert_eq!(cache.len(), 1);
        assert!(first.has_synced());
        assert!(!first.is_stopped());
    }

    #[tokio::test]
    async fn test_stop_evicts_and_recreate_starts_fresh() {
        let (cache, discovery, factory) = setup();

        let old = cache.create_resource_informer("pods").await.expect("pods informer");
        cache.stop_resource_informer("pods");

        assert!(cache.get_gvr_cache("pods").is_none());
        assert!(old.is_stopped());
        assert!(factory.created_for("pods")[0].is_stopped());

        let new = cache.create_resource_informer("pods").await.expect("pods informer");
        assert!(!Arc::ptr_eq(&old, &new));
        assert!(!new.is_stopped());
        assert_eq!(discovery.calls(), 2);
        assert_eq!(factory.created_for("pods").len(), 2);
    }

    #[tokio::test]
    async fn test_stop_absent_is_noop() {
        let (cache, _, _) = setup();

        cache.stop_resource_informer("never-created");
        cache.stop_resource_informer("never-created");

        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_stop_twice_only_stops_once() {
        let (cache, _, _) = setup();

        let handle = cache.create_resource_informer("secrets").await.expect("secrets informer");
        cache.stop_resource_informer("secrets");
        cache.stop_resource_informer("secrets");

        assert!(handle.is_stopped());
        assert!(cache.get_gvr_cache("secrets").is_none());
    }

    #[tokio::test]
    async fn test_batch_create_reports_only_failures() {
        let (cache, _, _) = setup();

        let errors = cache.create_informers(["pods", "bogus-kind", "secrets"]).await;

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].resource(), "bogus-kind");
        assert!(matches!(errors[0], CacheError::ResourceResolution { .. }));
        assert!(cache.get_gvr_cache("pods").is_some());
        assert!(cache.get_gvr_cache("secrets").is_some());
        assert!(cache.get_gvr_cache("bogus-kind").is_none());
        assert_eq!(cache.resources(), vec!["pods".to_string(), "secrets".to_string()]);
    }

    #[tokio::test]
    async fn test_unresolvable_name_registers_nothing() {
        let (cache, _, factory) = setup();

        let err = cache
            .create_resource_informer("bogus-kind")
            .await
            .expect_err("bogus-kind must not resolve");

        assert!(!err.is_retryable());
        assert!(cache.is_empty());
        assert!(factory.created().is_empty());
    }

    #[tokio::test]
    async fn test_scope_flag_follows_discovery() {
        let (cache, _, _) = setup();

        let pods = cache.create_resource_informer("pods").await.expect("pods informer");
        let namespaces = cache
            .create_resource_informer("namespaces")
            .await
            .expect("namespaces informer");

        assert!(pods.is_namespaced());
        assert!(!namespaces.is_namespaced());
        assert_eq!(namespaces.gvr().kind, "Namespace");
    }

    #[tokio::test]
    async fn test_sync_failure_deregisters_and_stops() {
        let (cache, _, factory) = setup();
        factory.set_behavior("secrets", SyncBehavior::Fail);

        let err = cache
            .create_resource_informer("secrets")
            .await
            .expect_err("secrets must not sync");

        assert!(matches!(err, CacheError::Synchronization { ref resource, .. } if resource == "secrets"));
        assert!(err.is_retryable());
        assert!(cache.get_gvr_cache("secrets").is_none());
        let informers = factory.created_for("secrets");
        let informer = &informers[0];
        assert!(informer.is_started());
        assert!(informer.is_stopped());

        factory.set_behavior("secrets", SyncBehavior::Immediate);
        let handle = cache.create_resource_informer("secrets").await.expect("retry succeeds");
        assert!(handle.has_synced());
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_sync() {
        let (cache, _, factory) = setup();
        factory.set_behavior("configmaps", SyncBehavior::Never);

        let creator = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.create_resource_informer("configmaps").await })
        };

        while cache.get_gvr_cache("configmaps").is_none() {
            tokio::task::yield_now().await;
        }
        let pending = cache.get_gvr_cache("configmaps").expect("in-flight handle");
        assert!(!pending.has_synced());

        cache.stop_resource_informer("configmaps");

        let result = creator.await.expect("create task panicked");
        assert!(matches!(result, Err(CacheError::Synchronization { .. })));
        assert!(cache.is_empty());
        assert!(factory.created_for("configmaps")[0].is_stopped());
    }

    #[tokio::test]
    async fn test_abandoned_create_deregisters_and_stops() {
        let (cache, _, factory) = setup();
        factory.set_behavior("pods", SyncBehavior::Never);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), cache.create_resource_informer("pods")).await;
        assert!(abandoned.is_err(), "create must still be waiting for sync");

        assert!(cache.get_gvr_cache("pods").is_none());
        let informers = factory.created_for("pods");
        assert!(informers[0].is_started());
        assert!(informers[0].is_stopped());

        factory.set_behavior("pods", SyncBehavior::Immediate);
        let handle = cache.create_resource_informer("pods").await.expect("fresh create");
        assert!(handle.has_synced());
        assert!(!handle.is_stopped());
        assert_eq!(factory.created_for("pods").len(), 2);
    }

    #[tokio::test]
    async fn test_ambiguous_name_registers_nothing() {
        let discovery = Arc::new(FakeDiscovery::new());
        discovery.add_resource(GroupVersionResource::new("", "v1", "events", "Event"), true);
        discovery.add_resource(
            GroupVersionResource::new("events.k8s.io", "v1", "events", "Event"),
            true,
        );
        let factory = Arc::new(FakeInformerFactory::new());
        let cache = ResourceCache::new(discovery, factory.clone());

        let err = cache
            .create_resource_informer("events")
            .await
            .expect_err("events is served by two groups");

        match err {
            CacheError::ResourceResolution {
                ref resource,
                source: DiscoveryError::Ambiguous { ref candidates, .. },
            } => {
                assert_eq!(resource, "events");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.is_retryable());
        assert!(cache.is_empty());
        assert!(factory.created().is_empty());

        let handle = cache
            .create_resource_informer("events.events.k8s.io")
            .await
            .expect("group-qualified name resolves");
        assert_eq!(handle.gvr().group, "events.k8s.io");
    }

    #[tokio::test]
    async fn test_concurrent_creates_leave_one_live_handle() {
        let (cache, _, factory) = setup();
        factory.set_behavior("pods", SyncBehavior::Delayed(Duration::from_millis(50)));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.create_resource_informer("pods").await })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.expect("create task panicked"));
        }

        assert_eq!(cache.len(), 1);
        let registered = cache.get_gvr_cache("pods").expect("one handle registered");
        assert!(!registered.is_stopped());

        let mut live = 0;
        for result in results {
            match result {
                Ok(handle) => {
                    assert!(Arc::ptr_eq(&handle, &registered));
                    live += 1;
                }
                Err(e) => assert!(matches!(e, CacheError::Synchronization { .. })),
            }
        }
        assert!(live >= 1);

        let informers = factory.created_for("pods");
        assert!(informers.iter().all(|informer| informer.is_started()));
        assert_eq!(informers.iter().filter(|informer| !informer.is_stopped()).count(), 1);
    }

    #[tokio::test]
    async fn test_stop_all_empties_cache() {
        let (cache, _, factory) = setup();
        let errors = cache.create_informers(["pods", "nodes", "deployments"]).await;
        assert!(errors.is_empty());

        cache.stop_all();

        assert!(cache.is_empty());
        assert!(factory.created().iter().all(|informer| informer.is_stopped()));
    }

    #[tokio::test]
    async fn test_handle_lists_cached_objects() {
        let (cache, _, factory) = setup();
        let ar = GroupVersionResource::new("", "v1", "pods", "Pod").to_api_resource();
        factory.set_objects(
            "pods",
            vec![
                DynamicObject::new("web-0", &ar).within("default"),
                DynamicObject::new("web-1", &ar).within("default"),
                DynamicObject::new("coredns", &ar).within("kube-system"),
            ],
        );

        let pods = cache.create_resource_informer("pods").await.expect("pods informer");

        assert!(pods.has_synced());
        assert!(pods.is_namespaced());
        assert_eq!(pods.list().len(), 3);
        assert_eq!(pods.list_namespaced("default").len(), 2);
        assert!(pods.get(Some("kube-system"), "coredns").is_some());
        assert!(pods.get(Some("default"), "coredns").is_none());
    }
}
