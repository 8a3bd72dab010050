use pkg_state::error::StoreError;
use pkg_types::selector::SelectorError;
use thiserror::Error;

/// Bad static configuration. Raised before the sync loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed service target '{target}' for role {role}: {reason}")]
    MalformedTarget {
        role: String,
        target: String,
        reason: String,
    },

    #[error("invalid node selector '{selector}' for role {role}: {source}")]
    InvalidSelector {
        role: String,
        selector: String,
        #[source]
        source: SelectorError,
    },
}

/// The list of managed Services could not be produced at all.
#[derive(Debug, Error)]
#[error("listing managed services failed: {0}")]
pub struct SourceError(#[from] pub StoreError);

/// Listing the nodes for a selector failed.
#[derive(Debug, Error)]
#[error("listing nodes for selector '{selector}' failed: {source}")]
pub struct ResolveError {
    pub selector: String,
    #[source]
    pub source: StoreError,
}

/// A node matched the selector but has no usable address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "failed to determine address for node ({node}, uid {}): host address unknown",
    .uid.as_deref().unwrap_or("unknown")
)]
pub struct NodeAddressError {
    pub node: String,
    pub uid: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("retrieving existing endpoints {key} failed: {source}")]
    Get {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("creating endpoints {key} failed: {source}")]
    Create {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("updating endpoints {key} failed: {source}")]
    Update {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Why a single Service could not be synced this cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}
