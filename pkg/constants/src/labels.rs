//! Well-known labels and annotations read from Service objects.

/// Services carrying this label (with value [`ENABLED_LABEL_VALUE`]) are
/// managed in label-query mode.
pub const ENABLED_LABEL: &str = "endpoints.k3rs.io/enabled";

pub const ENABLED_LABEL_VALUE: &str = "true";

/// Annotation holding the node selector for a label-query managed Service.
pub const NODE_SELECTOR_ANNOTATION: &str = "endpoints.k3rs.io/node-selector";

/// `kind` written into the target reference of every endpoint address.
pub const NODE_KIND: &str = "Node";

/// Protocol assumed for ports that don't declare one.
pub const DEFAULT_PROTOCOL: &str = "TCP";
