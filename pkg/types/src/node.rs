use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeAddressType {
    InternalIP,
    ExternalIP,
    Hostname,
    InternalDNS,
    ExternalDNS,
}

impl std::fmt::Display for NodeAddressType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeAddressType::InternalIP => write!(f, "InternalIP"),
            NodeAddressType::ExternalIP => write!(f, "ExternalIP"),
            NodeAddressType::Hostname => write!(f, "Hostname"),
            NodeAddressType::InternalDNS => write!(f, "InternalDNS"),
            NodeAddressType::ExternalDNS => write!(f, "ExternalDNS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    #[serde(rename = "type")]
    pub address_type: NodeAddressType,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(default)]
    pub addresses: Vec<NodeAddress>,
}

/// A machine of the pool. Cluster-scoped, so `metadata.namespace` is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: NodeStatus,
}

impl Node {
    /// First address of the given type, if any.
    pub fn address_of(&self, address_type: NodeAddressType) -> Option<&str> {
        self.status
            .addresses
            .iter()
            .find(|a| a.address_type == address_type)
            .map(|a| a.address.as_str())
    }
}
