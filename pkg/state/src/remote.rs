//! Registry served by a Kubernetes-style HTTP API server.
//!
//! Services and Nodes are read from the server's core API and Endpoints are
//! written back through it, so the machine pool is whatever the cluster
//! currently reports. The server arbitrates resource versions: a stale
//! update comes back as `409 Conflict`.

use async_trait::async_trait;
use pkg_constants::state::{API_V1_PATH, LABEL_SELECTOR_PARAM};
use pkg_types::endpoint::Endpoints;
use pkg_types::node::Node;
use pkg_types::selector::LabelSelector;
use pkg_types::service::Service;
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::StoreError;
use crate::registry::{Registry, decode};

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ObjectList<T> {
    #[serde(default)]
    items: Vec<T>,
}

struct Reply {
    method: Method,
    url: Url,
    status: StatusCode,
    body: Vec<u8>,
}

impl Reply {
    fn unexpected(&self) -> StoreError {
        StoreError::Backend(anyhow::anyhow!(
            "{} {} returned {}: {}",
            self.method,
            self.url,
            self.status,
            String::from_utf8_lossy(&self.body).trim()
        ))
    }
}

/// HTTP client for the registry API, authenticating with an optional
/// bearer token.
pub struct RemoteRegistry {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl RemoteRegistry {
    pub fn new(server: &str, token: Option<String>) -> anyhow::Result<Self> {
        // Relative joins keep any path prefix of the server URL.
        let server = if server.ends_with('/') {
            server.to_string()
        } else {
            format!("{}/", server)
        };
        let base = Url::parse(&server)
            .map_err(|e| anyhow::anyhow!("Invalid API server URL '{}': {}", server, e))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            client,
            base,
            token,
        })
    }

    fn url(&self, path: &str, selector: Option<&LabelSelector>) -> Result<Url, StoreError> {
        let mut url = self
            .base
            .join(&format!("{}/{}", API_V1_PATH, path))
            .map_err(|e| anyhow::anyhow!("Invalid request path '{}': {}", path, e))?;
        if let Some(selector) = selector.filter(|s| !s.is_empty()) {
            url.query_pairs_mut()
                .append_pair(LABEL_SELECTOR_PARAM, &selector.to_string());
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Endpoints>,
    ) -> Result<Reply, StoreError> {
        debug!("{} {}", method, url);
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{} {} failed: {}", method, url, e))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| anyhow::anyhow!("Reading response of {} {} failed: {}", method, url, e))?
            .to_vec();
        Ok(Reply {
            method,
            url,
            status,
            body,
        })
    }

    async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<T>, StoreError> {
        let url = self.url(path, Some(selector))?;
        let reply = self.send(Method::GET, url, None).await?;
        if !reply.status.is_success() {
            return Err(reply.unexpected());
        }
        let list: ObjectList<T> = decode(path, &reply.body)?;
        Ok(list.items)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        path: String,
        key: String,
    ) -> Result<T, StoreError> {
        let url = self.url(&path, None)?;
        let reply = self.send(Method::GET, url, None).await?;
        match reply.status {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound { kind, key }),
            status if status.is_success() => decode(&key, &reply.body),
            _ => Err(reply.unexpected()),
        }
    }
}

fn endpoints_path(namespace: &str) -> String {
    format!("namespaces/{}/endpoints", namespace)
}

#[async_trait]
impl Registry for RemoteRegistry {
    async fn list_services(&self, selector: &LabelSelector) -> Result<Vec<Service>, StoreError> {
        let services: Vec<Service> = self.list("services", selector).await?;
        Ok(services
            .into_iter()
            .filter(|s| selector.matches(&s.metadata.labels))
            .collect())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, StoreError> {
        self.get(
            "service",
            format!("namespaces/{}/services/{}", namespace, name),
            format!("{}/{}", namespace, name),
        )
        .await
    }

    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>, StoreError> {
        let nodes: Vec<Node> = self.list("nodes", selector).await?;
        Ok(nodes
            .into_iter()
            .filter(|n| selector.matches(&n.metadata.labels))
            .collect())
    }

    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints, StoreError> {
        self.get(
            "endpoints",
            format!("{}/{}", endpoints_path(namespace), name),
            format!("{}/{}", namespace, name),
        )
        .await
    }

    async fn create_endpoints(&self, endpoints: &Endpoints) -> Result<Endpoints, StoreError> {
        let key = endpoints.metadata.key();
        let url = self.url(&endpoints_path(&endpoints.metadata.namespace), None)?;
        let reply = self.send(Method::POST, url, Some(endpoints)).await?;
        match reply.status {
            StatusCode::CONFLICT => Err(StoreError::AlreadyExists {
                kind: "endpoints",
                key,
            }),
            status if status.is_success() => decode(&key, &reply.body),
            _ => Err(reply.unexpected()),
        }
    }

    async fn update_endpoints(&self, endpoints: &Endpoints) -> Result<Endpoints, StoreError> {
        let meta = &endpoints.metadata;
        let key = meta.key();
        if meta.resource_version.is_none() {
            return Err(StoreError::Conflict {
                key,
                given: None,
                current: None,
            });
        }

        let url = self.url(
            &format!("{}/{}", endpoints_path(&meta.namespace), meta.name),
            None,
        )?;
        let reply = self.send(Method::PUT, url, Some(endpoints)).await?;
        match reply.status {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                kind: "endpoints",
                key,
            }),
            // The server doesn't tell us the current version.
            StatusCode::CONFLICT => Err(StoreError::Conflict {
                key,
                given: meta.resource_version.clone(),
                current: None,
            }),
            status if status.is_success() => decode(&key, &reply.body),
            _ => Err(reply.unexpected()),
        }
    }
}
