//! Filesystem path constants.

/// Default config file path.
pub const DEFAULT_CONFIG: &str = "/etc/node-endpoints/config.yaml";

/// Default data directory of the local SlateDB registry. Private to this
/// binary; never point it at a store another process has open.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/node-endpoints";
