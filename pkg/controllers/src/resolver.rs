use pkg_constants::labels::NODE_KIND;
use pkg_state::registry::Registry;
use pkg_types::endpoint::{EndpointAddress, ObjectReference};
use pkg_types::node::{Node, NodeAddressType};
use pkg_types::selector::LabelSelector;
use std::sync::Arc;

use crate::error::{NodeAddressError, ResolveError};

/// Address of a node, by priority:
/// 1. InternalIP
/// 2. ExternalIP
pub fn node_address(node: &Node) -> Option<&str> {
    node.address_of(NodeAddressType::InternalIP)
        .or_else(|| node.address_of(NodeAddressType::ExternalIP))
}

/// Turn nodes into endpoint addresses. Nodes without a usable address are
/// reported in the second list instead of failing the whole batch.
pub fn node_addresses(nodes: &[Node]) -> (Vec<EndpointAddress>, Vec<NodeAddressError>) {
    let mut addresses = Vec::with_capacity(nodes.len());
    let mut errors = Vec::new();

    for node in nodes {
        let Some(ip) = node_address(node) else {
            errors.push(NodeAddressError {
                node: node.metadata.name.clone(),
                uid: node.metadata.uid.clone(),
            });
            continue;
        };
        addresses.push(EndpointAddress {
            ip: ip.to_string(),
            target_ref: Some(ObjectReference {
                kind: NODE_KIND.to_string(),
                name: node.metadata.name.clone(),
                uid: node.metadata.uid.clone(),
            }),
        });
    }

    (addresses, errors)
}

/// Resolves a node selector to the current set of node addresses.
pub struct NodeAddressResolver {
    registry: Arc<dyn Registry>,
}

impl NodeAddressResolver {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }

    /// A failed node listing is an error; nodes without an address are not.
    /// The order of the returned addresses is not stable across calls.
    pub async fn resolve(
        &self,
        selector: &LabelSelector,
    ) -> Result<(Vec<EndpointAddress>, Vec<NodeAddressError>), ResolveError> {
        let nodes = self
            .registry
            .list_nodes(selector)
            .await
            .map_err(|source| ResolveError {
                selector: selector.to_string(),
                source,
            })?;
        Ok(node_addresses(&nodes))
    }
}
