use pkg_types::endpoint::{EndpointAddress, EndpointSubset, Endpoints};
use pkg_types::meta::ObjectMeta;

use crate::source::ManagedService;

/// Build the Endpoints for `service`: a single subset that exposes every
/// declared port on every address. An empty address list still yields
/// the subset, just with no addresses in it.
pub fn build_endpoints(service: &ManagedService, addresses: Vec<EndpointAddress>) -> Endpoints {
    Endpoints {
        metadata: ObjectMeta {
            name: service.name.clone(),
            namespace: service.namespace.clone(),
            labels: service.labels.clone(),
            ..Default::default()
        },
        subsets: vec![EndpointSubset {
            addresses,
            ports: service.ports.clone(),
        }],
    }
}
