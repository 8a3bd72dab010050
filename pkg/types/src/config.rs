use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where the list of managed Services comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceMode {
    /// Fixed roles, each naming a `namespace/name` Service and a node selector.
    #[default]
    Static,
    /// Every Service labelled as enabled, with its node selector in an annotation.
    LabelQuery,
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMode::Static => write!(f, "static"),
            SourceMode::LabelQuery => write!(f, "label-query"),
        }
    }
}

impl FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(SourceMode::Static),
            "label-query" => Ok(SourceMode::LabelQuery),
            other => Err(format!(
                "unknown mode '{}', expected 'static' or 'label-query'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    Text,
    #[default]
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!(
                "unknown log format '{}', expected 'text' or 'json'",
                other
            )),
        }
    }
}

/// One static-mode role. An empty `service` leaves the role unconfigured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub name: String,
    /// Target Service as `namespace/name`.
    #[serde(default)]
    pub service: String,
    #[serde(default, alias = "node-label")]
    pub node_label: String,
}

impl RoleConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Sync configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// listen-address: 0.0.0.0:8080
/// api-server: https://10.0.0.1:6443
/// token-file: /var/run/secrets/node-endpoints/token
/// mode: static
/// interval-secs: 120
/// roles:
///   - name: scheduler
///     service: kube-system/kube-scheduler-prometheus-discovery
///     node-label: node-role.kubernetes.io/controlplane=true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfigFile {
    #[serde(default, alias = "listen-address")]
    pub listen_address: Option<String>,
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    /// Base URL of the registry API. Without it a local store under
    /// `data_dir` is used.
    #[serde(default, alias = "api-server")]
    pub api_server: Option<String>,
    #[serde(default, alias = "token-file")]
    pub token_file: Option<String>,
    #[serde(default)]
    pub mode: Option<SourceMode>,
    #[serde(default, alias = "interval-secs")]
    pub interval_secs: Option<u64>,
    #[serde(default, alias = "shutdown-grace-secs")]
    pub shutdown_grace_secs: Option<u64>,
    #[serde(default, alias = "log-level")]
    pub log_level: Option<String>,
    #[serde(default, alias = "log-format")]
    pub log_format: Option<LogFormat>,
    #[serde(default)]
    pub roles: Vec<RoleConfig>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
