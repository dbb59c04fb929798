pub mod metrics;
pub mod topology;

pub use metrics::{LinkMetrics, link_cost};
pub use topology::{
    DiscoveredLink, DiscoveredTopology, FileTopology, MetricsTable, StaticTopology,
    TopologySource, WeightedGraph,
};
