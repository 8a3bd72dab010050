use async_trait::async_trait;
use chrono::Utc;
use pkg_constants::state::{
    ENDPOINTS_PREFIX, INITIAL_RESOURCE_VERSION, NODES_PREFIX, SERVICES_PREFIX,
};
use pkg_types::endpoint::Endpoints;
use pkg_types::node::Node;
use pkg_types::selector::LabelSelector;
use pkg_types::service::Service;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;
use uuid::Uuid;

use crate::client::StateStore;
use crate::error::StoreError;

pub fn service_key(namespace: &str, name: &str) -> String {
    format!("{}{}/{}", SERVICES_PREFIX, namespace, name)
}

pub fn node_key(name: &str) -> String {
    format!("{}{}", NODES_PREFIX, name)
}

pub fn endpoints_key(namespace: &str, name: &str) -> String {
    format!("{}{}/{}", ENDPOINTS_PREFIX, namespace, name)
}

/// Read/write access to the objects the endpoints sync works with.
///
/// Endpoints writes follow optimistic concurrency: `create_endpoints` fails
/// if the object exists, `update_endpoints` fails with
/// [`StoreError::Conflict`] unless the record carries the current
/// resource version. Both return the stored object with its new version.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Services in every namespace whose labels match `selector`.
    async fn list_services(&self, selector: &LabelSelector) -> Result<Vec<Service>, StoreError>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, StoreError>;

    /// Nodes whose labels match `selector`.
    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>, StoreError>;

    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints, StoreError>;

    async fn create_endpoints(&self, endpoints: &Endpoints) -> Result<Endpoints, StoreError>;

    async fn update_endpoints(&self, endpoints: &Endpoints) -> Result<Endpoints, StoreError>;
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::Codec {
        key: key.to_string(),
        source,
    })
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|source| StoreError::Codec {
        key: key.to_string(),
        source,
    })
}

fn next_version(current: Option<&str>) -> String {
    let current = current.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
    (current + 1).to_string()
}

impl StateStore {
    /// Decode every object under `prefix`. Entries that fail to decode are
    /// logged and skipped so one corrupt record can't hide the rest.
    async fn list_decoded<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, StoreError> {
        let entries = self.list_prefix(prefix).await?;
        let mut items = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match decode(&key, &value) {
                Ok(item) => items.push(item),
                Err(e) => warn!("Skipping undecodable entry: {}", e),
            }
        }
        Ok(items)
    }

    async fn get_decoded<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        key: String,
    ) -> Result<T, StoreError> {
        match self.get(&key).await? {
            Some(bytes) => decode(&key, &bytes),
            None => Err(StoreError::NotFound { kind, key }),
        }
    }
}

#[async_trait]
impl Registry for StateStore {
    async fn list_services(&self, selector: &LabelSelector) -> Result<Vec<Service>, StoreError> {
        let services: Vec<Service> = self.list_decoded(SERVICES_PREFIX).await?;
        Ok(services
            .into_iter()
            .filter(|s| selector.matches(&s.metadata.labels))
            .collect())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, StoreError> {
        self.get_decoded("service", service_key(namespace, name))
            .await
    }

    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>, StoreError> {
        let nodes: Vec<Node> = self.list_decoded(NODES_PREFIX).await?;
        Ok(nodes
            .into_iter()
            .filter(|n| selector.matches(&n.metadata.labels))
            .collect())
    }

    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints, StoreError> {
        self.get_decoded("endpoints", endpoints_key(namespace, name))
            .await
    }

    async fn create_endpoints(&self, endpoints: &Endpoints) -> Result<Endpoints, StoreError> {
        let meta = &endpoints.metadata;
        let key = endpoints_key(&meta.namespace, &meta.name);

        let _guard = self.lock_writes().await;
        if self.get(&key).await?.is_some() {
            return Err(StoreError::AlreadyExists {
                kind: "endpoints",
                key,
            });
        }

        let mut stored = endpoints.clone();
        stored.metadata.uid = Some(Uuid::new_v4().to_string());
        stored.metadata.resource_version = Some(INITIAL_RESOURCE_VERSION.to_string());
        stored.metadata.creation_timestamp = Some(Utc::now());

        self.put(&key, &encode(&key, &stored)?).await?;
        Ok(stored)
    }

    async fn update_endpoints(&self, endpoints: &Endpoints) -> Result<Endpoints, StoreError> {
        let meta = &endpoints.metadata;
        let key = endpoints_key(&meta.namespace, &meta.name);

        let _guard = self.lock_writes().await;
        let current: Endpoints = self.get_decoded("endpoints", key.clone()).await?;
        let current_version = current.metadata.resource_version;
        if meta.resource_version.is_none() || meta.resource_version != current_version {
            return Err(StoreError::Conflict {
                key,
                given: meta.resource_version.clone(),
                current: current_version,
            });
        }

        // Whole-object replace; only store-owned metadata survives.
        let mut stored = endpoints.clone();
        stored.metadata.uid = current.metadata.uid;
        stored.metadata.creation_timestamp = current.metadata.creation_timestamp;
        stored.metadata.resource_version = Some(next_version(current_version.as_deref()));

        self.put(&key, &encode(&key, &stored)?).await?;
        Ok(stored)
    }
}
