use pkg_state::error::StoreError;
use pkg_state::registry::Registry;
use pkg_types::endpoint::Endpoints;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::builder::build_endpoints;
use crate::error::{ApplyError, SyncError};
use crate::resolver::NodeAddressResolver;
use crate::source::{ManagedService, ServiceSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
}

impl std::fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyOutcome::Created => write!(f, "created"),
            ApplyOutcome::Updated => write!(f, "updated"),
        }
    }
}

/// Result of syncing one Service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSync {
    pub outcome: ApplyOutcome,
    pub addresses: usize,
    /// Nodes that matched the selector but were left out for lack of an address.
    pub skipped_nodes: usize,
}

/// Tally of one full cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub synced: usize,
    pub failed: usize,
    /// Addresses published across every synced Service.
    pub addresses: usize,
    pub skipped_nodes: usize,
    /// Set when the managed Service list itself couldn't be produced.
    pub source_failed: bool,
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.source_failed {
            return write!(f, "managed services could not be listed, nothing synced");
        }
        write!(
            f,
            "{} synced, {} failed, {} addresses published, {} nodes without address",
            self.synced, self.failed, self.addresses, self.skipped_nodes
        )
    }
}

/// Publishes one Endpoints object per managed Service.
///
/// Each cycle recomputes everything from the registry; nothing is carried
/// over between cycles except what the store holds.
pub struct Reconciler {
    registry: Arc<dyn Registry>,
    source: ServiceSource,
    resolver: NodeAddressResolver,
}

impl Reconciler {
    pub fn new(registry: Arc<dyn Registry>, source: ServiceSource) -> Self {
        let resolver = NodeAddressResolver::new(registry.clone());
        Self {
            registry,
            source,
            resolver,
        }
    }

    /// Sync every managed Service once. A failure for one Service is logged
    /// and does not stop the others.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let services = match self.source.list().await {
            Ok(services) => services,
            Err(e) => {
                error!("{}", e);
                report.source_failed = true;
                return report;
            }
        };

        for service in &services {
            match self.sync_service(service).await {
                Ok(sync) => {
                    report.synced += 1;
                    report.addresses += sync.addresses;
                    report.skipped_nodes += sync.skipped_nodes;
                }
                Err(e) => {
                    error!("Failed to sync endpoints for {}: {}", service, e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Resolve, build and apply the Endpoints of one Service.
    pub async fn sync_service(&self, service: &ManagedService) -> Result<ServiceSync, SyncError> {
        debug!("Starting sync of {}", service);

        let (addresses, errors) = self.resolver.resolve(&service.node_selector).await?;
        for e in &errors {
            warn!("Error getting node address for {}: {}", service, e);
        }

        let endpoints = build_endpoints(service, addresses);
        let address_count = endpoints.address_count();
        let outcome = self.apply(endpoints).await?;

        info!(
            "Endpoints {} {} ({} addresses, {} ports)",
            service,
            outcome,
            address_count,
            service.ports.len()
        );
        Ok(ServiceSync {
            outcome,
            addresses: address_count,
            skipped_nodes: errors.len(),
        })
    }

    /// Create the Endpoints if absent, otherwise replace the stored object
    /// wholesale, carrying over its resource version.
    pub async fn apply(&self, mut endpoints: Endpoints) -> Result<ApplyOutcome, ApplyError> {
        let key = endpoints.metadata.key();
        let namespace = endpoints.metadata.namespace.clone();
        let name = endpoints.metadata.name.clone();

        match self.registry.get_endpoints(&namespace, &name).await {
            Err(StoreError::NotFound { .. }) => {
                endpoints.metadata.resource_version = None;
                self.registry
                    .create_endpoints(&endpoints)
                    .await
                    .map_err(|source| ApplyError::Create { key, source })?;
                Ok(ApplyOutcome::Created)
            }
            Err(source) => Err(ApplyError::Get { key, source }),
            Ok(existing) => {
                endpoints.metadata.resource_version = existing.metadata.resource_version;
                self.registry
                    .update_endpoints(&endpoints)
                    .await
                    .map_err(|source| ApplyError::Update { key, source })?;
                Ok(ApplyOutcome::Updated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticSource;
    use crate::testing::{FakeRegistry, Op, make_managed, make_node, make_service};
    use pkg_types::config::RoleConfig;
    use pkg_types::endpoint::EndpointAddress;
    use pkg_types::node::NodeAddressType;

    const SCHEDULER: &str = "kube-scheduler-prometheus-discovery";
    const CONTROLLER_MANAGER: &str = "kube-controller-manager-prometheus-discovery";
    const CONTROL_PLANE: &str = "node-role.kubernetes.io/controlplane=true";

    fn reconciler_for(registry: Arc<FakeRegistry>, roles: &[RoleConfig]) -> Reconciler {
        let source = StaticSource::new(registry.clone(), roles).unwrap();
        Reconciler::new(registry, ServiceSource::Static(source))
    }

    fn role(name: &str, service: &str, node_label: &str) -> RoleConfig {
        RoleConfig {
            name: name.to_string(),
            service: format!("kube-system/{}", service),
            node_label: node_label.to_string(),
        }
    }

    fn ips(eps: &Endpoints) -> Vec<String> {
        let mut ips: Vec<String> = eps.subsets[0]
            .addresses
            .iter()
            .map(|a: &EndpointAddress| a.ip.clone())
            .collect();
        ips.sort();
        ips
    }

    fn control_plane_registry() -> Arc<FakeRegistry> {
        let registry = Arc::new(FakeRegistry::default());
        registry.add_service(make_service(
            "kube-system",
            SCHEDULER,
            &[("http-metrics", 10251)],
            &[("k8s-app", "kube-scheduler")],
            &[],
        ));
        registry.add_node(make_node(
            "cp-1",
            &[("node-role.kubernetes.io/controlplane", "true")],
            &[(NodeAddressType::InternalIP, "10.0.0.1")],
        ));
        registry.add_node(make_node(
            "cp-2",
            &[("node-role.kubernetes.io/controlplane", "true")],
            &[(NodeAddressType::ExternalIP, "203.0.113.5")],
        ));
        registry.add_node(make_node(
            "worker-1",
            &[("node-role.kubernetes.io/worker", "true")],
            &[(NodeAddressType::InternalIP, "10.0.1.1")],
        ));
        registry
    }

    #[tokio::test]
    async fn test_scheduler_scenario() {
        let registry = control_plane_registry();
        let reconciler = reconciler_for(
            registry.clone(),
            &[role("scheduler", SCHEDULER, CONTROL_PLANE)],
        );

        let report = reconciler.run_cycle().await;
        assert_eq!(report.synced, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.addresses, 2);
        assert_eq!(
            report.to_string(),
            "1 synced, 0 failed, 2 addresses published, 0 nodes without address"
        );

        let eps = registry.endpoints("kube-system", SCHEDULER).unwrap();
        assert_eq!(eps.subsets.len(), 1);
        assert_eq!(eps.subsets[0].ports.len(), 1);
        assert_eq!(eps.subsets[0].ports[0].name, "http-metrics");
        assert_eq!(eps.subsets[0].ports[0].port, 10251);
        assert_eq!(ips(&eps), vec!["10.0.0.1", "203.0.113.5"]);
        assert_eq!(
            eps.metadata.labels.get("k8s-app").map(String::as_str),
            Some("kube-scheduler")
        );
    }

    #[tokio::test]
    async fn test_apply_twice_creates_then_updates() {
        let registry = control_plane_registry();
        let reconciler = reconciler_for(
            registry.clone(),
            &[role("scheduler", SCHEDULER, CONTROL_PLANE)],
        );

        reconciler.run_cycle().await;
        let first = registry.endpoints("kube-system", SCHEDULER).unwrap();
        reconciler.run_cycle().await;
        let second = registry.endpoints("kube-system", SCHEDULER).unwrap();

        let key = format!("kube-system/{}", SCHEDULER);
        assert_eq!(
            registry.writes(),
            vec![
                Op::Create(key.clone()),
                Op::Update(key, first.metadata.resource_version.clone()),
            ]
        );
        assert_eq!(first.subsets, second.subsets);
        assert_ne!(
            first.metadata.resource_version,
            second.metadata.resource_version
        );
    }

    #[tokio::test]
    async fn test_create_never_carries_a_version() {
        let registry = Arc::new(FakeRegistry::default());
        let reconciler = reconciler_for(registry.clone(), &[]);

        let mut eps = build_endpoints(
            &make_managed("kube-system", "kube-scheduler", &[("http-metrics", 10251)]),
            vec![],
        );
        eps.metadata.resource_version = Some("stale".to_string());

        let outcome = reconciler.apply(eps).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Created);
        assert_eq!(
            registry.writes(),
            vec![Op::Create("kube-system/kube-scheduler".to_string())]
        );
        assert_eq!(registry.created_versions(), vec![None]);
    }

    #[tokio::test]
    async fn test_update_carries_the_stored_version() {
        let registry = Arc::new(FakeRegistry::default());
        let reconciler = reconciler_for(registry.clone(), &[]);
        let service = make_managed("kube-system", "kube-scheduler", &[("http-metrics", 10251)]);

        reconciler
            .apply(build_endpoints(&service, vec![]))
            .await
            .unwrap();
        // Someone else wrote in between.
        registry.bump_version("kube-system", "kube-scheduler");
        let stored = registry.endpoints("kube-system", "kube-scheduler").unwrap();

        let outcome = reconciler
            .apply(build_endpoints(&service, vec![]))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Updated);
        assert_eq!(
            registry.writes().last(),
            Some(&Op::Update(
                "kube-system/kube-scheduler".to_string(),
                stored.metadata.resource_version
            ))
        );
    }

    #[tokio::test]
    async fn test_conflict_is_an_apply_error() {
        let registry = Arc::new(FakeRegistry::default());
        let reconciler = reconciler_for(registry.clone(), &[]);
        let service = make_managed("kube-system", "kube-scheduler", &[("http-metrics", 10251)]);
        reconciler
            .apply(build_endpoints(&service, vec![]))
            .await
            .unwrap();

        registry.race_next_update();
        let err = reconciler
            .apply(build_endpoints(&service, vec![]))
            .await
            .unwrap_err();
        match err {
            ApplyError::Update { key, source } => {
                assert_eq!(key, "kube-system/kube-scheduler");
                assert!(source.is_conflict());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_create_failure_is_an_apply_error() {
        let registry = Arc::new(FakeRegistry::default());
        registry.fail_endpoints_create();
        let reconciler = reconciler_for(registry.clone(), &[]);

        let eps = build_endpoints(
            &make_managed("kube-system", "kube-scheduler", &[("http-metrics", 10251)]),
            vec![],
        );
        match reconciler.apply(eps).await.unwrap_err() {
            ApplyError::Create { key, source } => {
                assert_eq!(key, "kube-system/kube-scheduler");
                assert!(matches!(source, StoreError::Backend(_)));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(registry.endpoints("kube-system", "kube-scheduler").is_none());
    }

    #[tokio::test]
    async fn test_get_failure_is_an_apply_error() {
        let registry = Arc::new(FakeRegistry::default());
        registry.fail_endpoints_get();
        let reconciler = reconciler_for(registry.clone(), &[]);

        let eps = build_endpoints(
            &make_managed("kube-system", "kube-scheduler", &[("http-metrics", 10251)]),
            vec![],
        );
        let err = reconciler.apply(eps).await.unwrap_err();
        assert!(matches!(err, ApplyError::Get { .. }));
        assert!(registry.writes().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_failure_does_not_stop_other_services() {
        let registry = control_plane_registry();
        registry.add_service(make_service(
            "kube-system",
            CONTROLLER_MANAGER,
            &[("http-metrics", 10252)],
            &[],
            &[],
        ));
        registry.fail_node_listing("role=broken");

        let reconciler = reconciler_for(
            registry.clone(),
            &[
                role("scheduler", SCHEDULER, "role=broken"),
                role("controller-manager", CONTROLLER_MANAGER, CONTROL_PLANE),
            ],
        );

        let report = reconciler.run_cycle().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.synced, 1);
        assert!(registry.endpoints("kube-system", SCHEDULER).is_none());

        let eps = registry.endpoints("kube-system", CONTROLLER_MANAGER).unwrap();
        assert_eq!(ips(&eps), vec!["10.0.0.1", "203.0.113.5"]);
    }

    #[tokio::test]
    async fn test_nodes_without_address_are_counted() {
        let registry = control_plane_registry();
        registry.add_node(make_node(
            "cp-3",
            &[("node-role.kubernetes.io/controlplane", "true")],
            &[(NodeAddressType::Hostname, "cp-3")],
        ));
        let reconciler = reconciler_for(
            registry.clone(),
            &[role("scheduler", SCHEDULER, CONTROL_PLANE)],
        );

        let report = reconciler.run_cycle().await;
        assert_eq!(report.synced, 1);
        assert_eq!(report.skipped_nodes, 1);
        let eps = registry.endpoints("kube-system", SCHEDULER).unwrap();
        assert_eq!(eps.address_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_pool_publishes_empty_subset() {
        let registry = control_plane_registry();
        let reconciler = reconciler_for(
            registry.clone(),
            &[role("scheduler", SCHEDULER, "role=nonexistent")],
        );

        let report = reconciler.run_cycle().await;
        assert_eq!(report.synced, 1);
        let eps = registry.endpoints("kube-system", SCHEDULER).unwrap();
        assert_eq!(eps.subsets.len(), 1);
        assert!(eps.subsets[0].addresses.is_empty());
    }

    #[tokio::test]
    async fn test_source_failure_is_reported() {
        let registry = control_plane_registry();
        registry.fail_service_listing();
        let reconciler = Reconciler::new(
            registry.clone(),
            ServiceSource::LabelQuery(crate::source::LabelQuerySource::new(registry.clone())),
        );

        let report = reconciler.run_cycle().await;
        assert!(report.source_failed);
        assert_eq!(report.synced, 0);
        assert_eq!(
            report.to_string(),
            "managed services could not be listed, nothing synced"
        );
        assert!(registry.writes().is_empty());
    }
}
