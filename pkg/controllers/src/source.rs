use pkg_constants::labels::{ENABLED_LABEL, ENABLED_LABEL_VALUE, NODE_SELECTOR_ANNOTATION};
use pkg_state::registry::Registry;
use pkg_types::config::RoleConfig;
use pkg_types::endpoint::EndpointPort;
use pkg_types::selector::LabelSelector;
use pkg_types::service::Service;
use pkg_types::validate::parse_namespaced_name;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{ConfigError, SourceError};

/// A Service whose Endpoints are kept in sync during one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedService {
    pub namespace: String,
    pub name: String,
    pub node_selector: LabelSelector,
    pub ports: Vec<EndpointPort>,
    /// Copied onto the published Endpoints.
    pub labels: HashMap<String, String>,
}

impl ManagedService {
    pub fn from_service(service: Service, node_selector: LabelSelector) -> Self {
        let ports = service
            .spec
            .ports
            .into_iter()
            .map(|p| EndpointPort {
                name: p.name,
                port: p.port,
                protocol: p.protocol,
            })
            .collect();
        Self {
            namespace: service.metadata.namespace,
            name: service.metadata.name,
            node_selector,
            ports,
            labels: service.metadata.labels,
        }
    }
}

impl std::fmt::Display for ManagedService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Produces the Services to reconcile. Which variant is active is decided
/// once at startup.
pub enum ServiceSource {
    LabelQuery(LabelQuerySource),
    Static(StaticSource),
}

impl ServiceSource {
    pub async fn list(&self) -> Result<Vec<ManagedService>, SourceError> {
        match self {
            ServiceSource::LabelQuery(source) => source.list().await,
            ServiceSource::Static(source) => Ok(source.list().await),
        }
    }
}

/// Finds managed Services by the enabled label and reads each one's node
/// selector from an annotation.
pub struct LabelQuerySource {
    registry: Arc<dyn Registry>,
    selector: LabelSelector,
}

impl LabelQuerySource {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            selector: LabelSelector::equals(ENABLED_LABEL, ENABLED_LABEL_VALUE),
        }
    }

    async fn list(&self) -> Result<Vec<ManagedService>, SourceError> {
        let services = self.registry.list_services(&self.selector).await?;
        debug!(
            "Found {} services labelled {}",
            services.len(),
            self.selector
        );

        let mut managed = Vec::with_capacity(services.len());
        for service in services {
            let key = service.metadata.key();
            let Some(raw) = service.metadata.annotations.get(NODE_SELECTOR_ANNOTATION) else {
                error!(
                    "Service {} is missing the {} annotation, skipping",
                    key, NODE_SELECTOR_ANNOTATION
                );
                continue;
            };
            match raw.parse::<LabelSelector>() {
                Ok(selector) => managed.push(ManagedService::from_service(service, selector)),
                Err(e) => error!(
                    "Service {} has an invalid {} annotation '{}': {}, skipping",
                    key, NODE_SELECTOR_ANNOTATION, raw, e
                ),
            }
        }
        Ok(managed)
    }
}

/// A validated static-mode role.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticTarget {
    pub role: String,
    pub namespace: String,
    pub name: String,
    pub node_selector: LabelSelector,
}

impl StaticTarget {
    /// Validate a role. `Ok(None)` means the role is unconfigured.
    pub fn from_role(role: &RoleConfig) -> Result<Option<Self>, ConfigError> {
        let target = role.service.trim();
        if target.is_empty() {
            return Ok(None);
        }

        let (namespace, name) =
            parse_namespaced_name(target).map_err(|e| ConfigError::MalformedTarget {
                role: role.name.clone(),
                target: target.to_string(),
                reason: e.to_string(),
            })?;
        let node_selector =
            role.node_label
                .parse()
                .map_err(|source| ConfigError::InvalidSelector {
                    role: role.name.clone(),
                    selector: role.node_label.clone(),
                    source,
                })?;

        Ok(Some(Self {
            role: role.name.clone(),
            namespace,
            name,
            node_selector,
        }))
    }
}

/// Fixed set of roles, each naming one Service and the nodes backing it.
/// Ports and labels are read from the Service every cycle.
pub struct StaticSource {
    registry: Arc<dyn Registry>,
    targets: Vec<StaticTarget>,
}

impl StaticSource {
    /// Fails on the first malformed role; unconfigured roles are dropped.
    pub fn new(registry: Arc<dyn Registry>, roles: &[RoleConfig]) -> Result<Self, ConfigError> {
        let mut targets = Vec::new();
        for role in roles {
            if let Some(target) = StaticTarget::from_role(role)? {
                targets.push(target);
            }
        }
        Ok(Self { registry, targets })
    }

    pub fn targets(&self) -> &[StaticTarget] {
        &self.targets
    }

    async fn list(&self) -> Vec<ManagedService> {
        let mut managed = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            match self
                .registry
                .get_service(&target.namespace, &target.name)
                .await
            {
                Ok(service) => managed.push(ManagedService::from_service(
                    service,
                    target.node_selector.clone(),
                )),
                Err(e) => error!(
                    "Failed to get service {}/{} for {}: {}",
                    target.namespace, target.name, target.role, e
                ),
            }
        }
        managed
    }
}
