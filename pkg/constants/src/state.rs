//! State store key layout.

/// Prefix of Service objects: `/registry/services/<namespace>/<name>`.
pub const SERVICES_PREFIX: &str = "/registry/services/";

/// Prefix of Node objects: `/registry/nodes/<name>`.
pub const NODES_PREFIX: &str = "/registry/nodes/";

/// Prefix of Endpoints objects: `/registry/endpoints/<namespace>/<name>`.
pub const ENDPOINTS_PREFIX: &str = "/registry/endpoints/";

/// Resource version assigned to a freshly created object.
pub const INITIAL_RESOURCE_VERSION: u64 = 1;

/// Core API path of a remote registry, relative to its base URL.
pub const API_V1_PATH: &str = "api/v1";

/// Query parameter carrying a label selector on remote list requests.
pub const LABEL_SELECTOR_PARAM: &str = "labelSelector";
