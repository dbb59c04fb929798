pub mod algorithms;
pub mod config;
pub mod control_server;
pub mod error;
pub mod messages;
pub mod network;
pub mod routing;

pub use error::{MetricError, RoutingError};
pub use messages::{AnnotatedLink, NetworkEntity, RouteRecord, RouteRequest, SwitchEndpoint};
pub use routing::compute_routes;

/// OpenFlow datapath identifier of a switch.
pub type SwitchId = u64;
pub type SubnetId = ipnet::IpNet;
