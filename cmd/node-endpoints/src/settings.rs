use anyhow::{Context, bail};
use pkg_constants::network::DEFAULT_METRICS_ADDR;
use pkg_constants::paths::DEFAULT_DATA_DIR;
use pkg_constants::sync::{
    DEFAULT_LOG_LEVEL, DEFAULT_ROLES, DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_SYNC_INTERVAL_SECS,
};
use pkg_types::config::{LogFormat, RoleConfig, SourceMode, SyncConfigFile};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

use crate::Cli;

/// Effective configuration after merging CLI args, the config file and defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub listen_address: SocketAddr,
    pub data_dir: String,
    pub api_server: Option<String>,
    pub token_file: Option<String>,
    pub mode: SourceMode,
    pub interval: Duration,
    pub shutdown_grace: Duration,
    pub log_level: String,
    pub log_format: LogFormat,
    pub roles: Vec<RoleConfig>,
}

impl Settings {
    /// Merge: CLI args > config file > defaults
    pub fn resolve(cli: Cli, file: SyncConfigFile) -> anyhow::Result<Self> {
        let listen_address = cli
            .listen_address
            .or(file.listen_address)
            .unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
        let listen_address: SocketAddr = listen_address
            .parse()
            .with_context(|| format!("invalid listen address '{}'", listen_address))?;

        let interval_secs = cli
            .interval_secs
            .or(file.interval_secs)
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);
        if interval_secs == 0 {
            bail!("sync interval must be at least one second");
        }

        let roles = merge_roles(
            file.roles,
            [
                (
                    "scheduler",
                    cli.scheduler_service,
                    cli.scheduler_node_label,
                ),
                (
                    "controller-manager",
                    cli.controller_manager_service,
                    cli.controller_manager_node_label,
                ),
            ],
        );

        Ok(Self {
            listen_address,
            data_dir: cli
                .data_dir
                .or(file.data_dir)
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            api_server: cli.api_server.or(file.api_server),
            token_file: cli.token_file.or(file.token_file),
            mode: cli.mode.or(file.mode).unwrap_or_default(),
            interval: Duration::from_secs(interval_secs),
            shutdown_grace: Duration::from_secs(
                cli.shutdown_grace_secs
                    .or(file.shutdown_grace_secs)
                    .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
            ),
            log_level: cli
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_format: cli.log_format.or(file.log_format).unwrap_or_default(),
            roles,
        })
    }

    pub fn log(&self) {
        info!("Starting node-endpoints");
        info!("  Listen:    {}", self.listen_address);
        match &self.api_server {
            Some(server) => info!("  Registry:  {}", server),
            None => info!("  Registry:  local store at {}", self.data_dir),
        }
        info!("  Mode:      {}", self.mode);
        info!("  Interval:  {}s", self.interval.as_secs());
        if self.mode == SourceMode::Static {
            for role in &self.roles {
                if role.service.is_empty() {
                    info!("  Role {}: unconfigured", role.name);
                } else {
                    info!(
                        "  Role {}: {} (nodes: '{}')",
                        role.name, role.service, role.node_label
                    );
                }
            }
        }
    }
}

/// Default roles, then roles from the config file (replacing defaults of the
/// same name), then per-role CLI flags.
fn merge_roles(
    file_roles: Vec<RoleConfig>,
    overrides: [(&str, Option<String>, Option<String>); 2],
) -> Vec<RoleConfig> {
    let mut roles: Vec<RoleConfig> = DEFAULT_ROLES.iter().map(|r| RoleConfig::new(r)).collect();

    for role in file_roles {
        match roles.iter_mut().find(|r| r.name == role.name) {
            Some(existing) => *existing = role,
            None => roles.push(role),
        }
    }

    for (name, service, node_label) in overrides {
        let Some(role) = roles.iter_mut().find(|r| r.name == name) else {
            continue;
        };
        if let Some(service) = service {
            role.service = service;
        }
        if let Some(node_label) = node_label {
            role.node_label = node_label;
        }
    }

    roles
}
