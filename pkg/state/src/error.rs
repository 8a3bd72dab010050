use thiserror::Error;

/// Failures surfaced by a [`Registry`](crate::registry::Registry).
///
/// `NotFound` and `Conflict` are ordinary outcomes callers are expected to
/// match on; everything else is a backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: String },

    #[error(
        "conflict writing {key}: resource version {given:?} does not match current {current:?}"
    )]
    Conflict {
        key: String,
        given: Option<String>,
        current: Option<String>,
    },

    #[error("failed to decode {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
