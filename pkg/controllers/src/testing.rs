//! In-memory registry and object builders for controller tests.

use async_trait::async_trait;
use pkg_state::error::StoreError;
use pkg_state::registry::Registry;
use pkg_types::endpoint::{EndpointPort, Endpoints};
use pkg_types::meta::ObjectMeta;
use pkg_types::node::{Node, NodeAddress, NodeAddressType, NodeStatus};
use pkg_types::selector::LabelSelector;
use pkg_types::service::{Service, ServicePort, ServiceSpec};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::source::ManagedService;

/// Endpoints writes seen by the fake, keyed by `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Create(String),
    /// Carries the resource version the caller sent.
    Update(String, Option<String>),
}

#[derive(Default)]
struct State {
    services: Vec<Service>,
    nodes: Vec<Node>,
    endpoints: HashMap<String, Endpoints>,
    writes: Vec<Op>,
    created_versions: Vec<Option<String>>,
    failing_node_selectors: HashSet<String>,
    fail_service_listing: bool,
    fail_endpoints_get: bool,
    fail_endpoints_create: bool,
    next_node_listing_delay: Option<Duration>,
    race_next_update: bool,
    version_counter: u64,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version_counter += 1;
        self.version_counter.to_string()
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    state: Mutex<State>,
}

fn backend(msg: &str) -> StoreError {
    StoreError::Backend(anyhow::anyhow!("{}", msg))
}

impl FakeRegistry {
    pub fn add_service(&self, service: Service) {
        self.state.lock().unwrap().services.push(service);
    }

    pub fn add_node(&self, node: Node) {
        self.state.lock().unwrap().nodes.push(node);
    }

    pub fn fail_node_listing(&self, selector: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_node_selectors
            .insert(selector.to_string());
    }

    pub fn fail_service_listing(&self) {
        self.state.lock().unwrap().fail_service_listing = true;
    }

    pub fn fail_endpoints_get(&self) {
        self.state.lock().unwrap().fail_endpoints_get = true;
    }

    pub fn fail_endpoints_create(&self) {
        self.state.lock().unwrap().fail_endpoints_create = true;
    }

    /// Make the next node listing take `delay` (on the tokio clock).
    pub fn delay_next_node_listing(&self, delay: Duration) {
        self.state.lock().unwrap().next_node_listing_delay = Some(delay);
    }

    /// Make the next update lose a race against another writer.
    pub fn race_next_update(&self) {
        self.state.lock().unwrap().race_next_update = true;
    }

    /// Simulate a write by another client.
    pub fn bump_version(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        let version = state.next_version();
        if let Some(eps) = state.endpoints.get_mut(&format!("{}/{}", namespace, name)) {
            eps.metadata.resource_version = Some(version);
        }
    }

    pub fn endpoints(&self, namespace: &str, name: &str) -> Option<Endpoints> {
        self.state
            .lock()
            .unwrap()
            .endpoints
            .get(&format!("{}/{}", namespace, name))
            .cloned()
    }

    pub fn writes(&self) -> Vec<Op> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn created_versions(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().created_versions.clone()
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn list_services(&self, selector: &LabelSelector) -> Result<Vec<Service>, StoreError> {
        let state = self.state.lock().unwrap();
        if state.fail_service_listing {
            return Err(backend("service listing unavailable"));
        }
        Ok(state
            .services
            .iter()
            .filter(|s| selector.matches(&s.metadata.labels))
            .cloned()
            .collect())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .services
            .iter()
            .find(|s| s.metadata.namespace == namespace && s.metadata.name == name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "service",
                key: format!("{}/{}", namespace, name),
            })
    }

    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>, StoreError> {
        let delay = self.state.lock().unwrap().next_node_listing_delay.take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock().unwrap();
        if state.failing_node_selectors.contains(&selector.to_string()) {
            return Err(backend("node listing unavailable"));
        }
        Ok(state
            .nodes
            .iter()
            .filter(|n| selector.matches(&n.metadata.labels))
            .cloned()
            .collect())
    }

    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints, StoreError> {
        let state = self.state.lock().unwrap();
        if state.fail_endpoints_get {
            return Err(backend("endpoints get unavailable"));
        }
        let key = format!("{}/{}", namespace, name);
        state
            .endpoints
            .get(&key)
            .cloned()
            .ok_or(StoreError::NotFound {
                kind: "endpoints",
                key,
            })
    }

    async fn create_endpoints(&self, endpoints: &Endpoints) -> Result<Endpoints, StoreError> {
        let mut state = self.state.lock().unwrap();
        let key = endpoints.metadata.key();
        state.writes.push(Op::Create(key.clone()));
        state
            .created_versions
            .push(endpoints.metadata.resource_version.clone());
        if state.fail_endpoints_create {
            return Err(backend("endpoints create rejected"));
        }
        if state.endpoints.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: "endpoints",
                key,
            });
        }
        let mut stored = endpoints.clone();
        stored.metadata.resource_version = Some(state.next_version());
        state.endpoints.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update_endpoints(&self, endpoints: &Endpoints) -> Result<Endpoints, StoreError> {
        let mut state = self.state.lock().unwrap();
        let key = endpoints.metadata.key();
        let given = endpoints.metadata.resource_version.clone();
        state.writes.push(Op::Update(key.clone(), given.clone()));

        if std::mem::take(&mut state.race_next_update) {
            let version = state.next_version();
            if let Some(eps) = state.endpoints.get_mut(&key) {
                eps.metadata.resource_version = Some(version);
            }
        }

        let Some(current) = state.endpoints.get(&key) else {
            return Err(StoreError::NotFound {
                kind: "endpoints",
                key,
            });
        };
        let current = current.metadata.resource_version.clone();
        if given.is_none() || given != current {
            return Err(StoreError::Conflict { key, given, current });
        }

        let mut stored = endpoints.clone();
        stored.metadata.resource_version = Some(state.next_version());
        state.endpoints.insert(key, stored.clone());
        Ok(stored)
    }
}

pub fn make_service(
    namespace: &str,
    name: &str,
    ports: &[(&str, u16)],
    labels: &[(&str, &str)],
    annotations: &[(&str, &str)],
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: name.to_string(),
            namespace: namespace.to_string(),
            labels: to_map(labels),
            annotations: to_map(annotations),
            ..Default::default()
        },
        spec: ServiceSpec {
            ports: ports
                .iter()
                .map(|(name, port)| ServicePort {
                    name: name.to_string(),
                    port: *port,
                    protocol: "TCP".to_string(),
                })
                .collect(),
        },
    }
}

pub fn make_node(name: &str, labels: &[(&str, &str)], addresses: &[(NodeAddressType, &str)]) -> Node {
    Node {
        metadata: ObjectMeta {
            name: name.to_string(),
            labels: to_map(labels),
            uid: Some(format!("{}-uid", name)),
            ..Default::default()
        },
        status: NodeStatus {
            addresses: addresses
                .iter()
                .map(|(address_type, address)| NodeAddress {
                    address_type: *address_type,
                    address: address.to_string(),
                })
                .collect(),
        },
    }
}

pub fn make_managed(namespace: &str, name: &str, ports: &[(&str, u16)]) -> ManagedService {
    ManagedService {
        namespace: namespace.to_string(),
        name: name.to_string(),
        node_selector: LabelSelector::everything(),
        ports: ports
            .iter()
            .map(|(name, port)| EndpointPort {
                name: name.to_string(),
                port: *port,
                protocol: "TCP".to_string(),
            })
            .collect(),
        labels: HashMap::new(),
    }
}

fn to_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
