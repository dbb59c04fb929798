use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::SwitchId;
use crate::error::{Result, RoutingError};
use crate::messages::{AnnotatedLink, RouteRequest};
use crate::network::metrics::{UNIT_COST, link_cost};

/// A directed link as reported by topology discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveredLink {
    pub src: SwitchId,
    pub dst: SwitchId,
}

/// Switches and links known to the controller at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredTopology {
    pub switches: Vec<SwitchId>,
    #[serde(default)]
    pub links: Vec<DiscoveredLink>,
}

impl DiscoveredTopology {
    /// Derives a topology from the request itself, for deployments where no
    /// discovery source is attached.
    pub fn from_request(request: &RouteRequest) -> Self {
        let mut switches = BTreeSet::new();
        switches.extend(request.networks.iter().map(|n| n.switch_id));

        let mut links = Vec::with_capacity(request.links.len());
        for link in &request.links {
            switches.insert(link.src_switch.id);
            switches.insert(link.dst_switch.id);
            links.push(DiscoveredLink {
                src: link.src_switch.id,
                dst: link.dst_switch.id,
            });
        }

        Self {
            switches: switches.into_iter().collect(),
            links,
        }
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let topology: DiscoveredTopology = serde_json::from_str(&content)?;
        Ok(topology)
    }
}

/// Read-only view of the live topology.
///
/// Implementations hand out an owned snapshot so that every computation
/// works on its own copy.
pub trait TopologySource: Send + Sync {
    fn snapshot(&self) -> Result<DiscoveredTopology>;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct StaticTopology {
    topology: DiscoveredTopology,
}

impl StaticTopology {
    pub fn new(topology: DiscoveredTopology) -> Self {
        Self { topology }
    }
}

impl TopologySource for StaticTopology {
    fn snapshot(&self) -> Result<DiscoveredTopology> {
        Ok(self.topology.clone())
    }

    fn describe(&self) -> String {
        format!(
            "static ({} switches, {} links)",
            self.topology.switches.len(),
            self.topology.links.len()
        )
    }
}

/// Topology stored in a JSON file, re-read on every snapshot so that edits
/// are picked up by the next request.
#[derive(Debug, Clone)]
pub struct FileTopology {
    path: PathBuf,
}

impl FileTopology {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TopologySource for FileTopology {
    fn snapshot(&self) -> Result<DiscoveredTopology> {
        DiscoveredTopology::load_from_file(&self.path).map_err(|e| {
            RoutingError::TopologyUnavailable(format!("{}: {}", self.path.display(), e))
        })
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Per-direction link costs declared by a request.
///
/// A direction without its own entry borrows the cost of the opposite
/// direction; with neither, the link is priced at [`UNIT_COST`].
#[derive(Debug, Clone, Default)]
pub struct MetricsTable {
    costs: HashMap<(SwitchId, SwitchId), f64>,
}

impl MetricsTable {
    pub fn from_links(links: &[AnnotatedLink]) -> Result<Self> {
        let mut costs = HashMap::with_capacity(links.len());

        for link in links {
            let (src, dst) = (link.src_switch.id, link.dst_switch.id);
            let cost = link
                .metrics()
                .and_then(|metrics| link_cost(metrics.as_ref()))
                .map_err(|reason| RoutingError::MalformedMetric { src, dst, reason })?;

            if costs.insert((src, dst), cost).is_some() {
                warn!("Duplicate metrics for link {} -> {}, keeping the last entry", src, dst);
            }
        }

        Ok(Self { costs })
    }

    pub fn cost(&self, src: SwitchId, dst: SwitchId) -> f64 {
        self.costs
            .get(&(src, dst))
            .or_else(|| self.costs.get(&(dst, src)))
            .copied()
            .unwrap_or(UNIT_COST)
    }
}

/// Directed, weighted switch graph used by the solver.
#[derive(Debug, Clone, Default)]
pub struct WeightedGraph {
    switches: BTreeSet<SwitchId>,
    edges: BTreeMap<(SwitchId, SwitchId), f64>,
}

impl WeightedGraph {
    pub fn with_switches(switches: impl IntoIterator<Item = SwitchId>) -> Self {
        Self {
            switches: switches.into_iter().collect(),
            edges: BTreeMap::new(),
        }
    }

    /// Builds the graph for one computation. Each discovered link is added
    /// in both directions, each direction priced on its own.
    pub fn build(topology: &DiscoveredTopology, metrics: &MetricsTable) -> Self {
        let mut graph = Self::with_switches(topology.switches.iter().copied());

        for link in &topology.links {
            if link.src == link.dst {
                debug!("Ignoring self-loop on switch {}", link.src);
                continue;
            }
            graph.insert_edge(link.src, link.dst, metrics.cost(link.src, link.dst));
            graph.insert_edge(link.dst, link.src, metrics.cost(link.dst, link.src));
        }

        debug!(
            "Graph built: {} switches, {} directed edges",
            graph.switch_count(),
            graph.edge_count()
        );
        graph
    }

    /// Adds or replaces the edge `src -> dst`; endpoints join the switch set.
    pub fn insert_edge(&mut self, src: SwitchId, dst: SwitchId, cost: f64) {
        self.switches.insert(src);
        self.switches.insert(dst);
        self.edges.insert((src, dst), cost);
    }

    /// Cost of the direct edge, `None` when the switches are not adjacent.
    pub fn cost(&self, src: SwitchId, dst: SwitchId) -> Option<f64> {
        self.edges.get(&(src, dst)).copied()
    }

    pub fn neighbors(&self, src: SwitchId) -> impl Iterator<Item = (SwitchId, f64)> + '_ {
        self.edges
            .range((src, SwitchId::MIN)..=(src, SwitchId::MAX))
            .map(|(&(_, dst), &cost)| (dst, cost))
    }

    pub fn switches(&self) -> impl Iterator<Item = SwitchId> + '_ {
        self.switches.iter().copied()
    }

    pub fn contains(&self, switch: SwitchId) -> bool {
        self.switches.contains(&switch)
    }

    pub fn switch_count(&self) -> usize {
        self.switches.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::SwitchEndpoint;

    fn link(src: SwitchId, dst: SwitchId, bw: Option<f64>, delay: Option<&str>) -> AnnotatedLink {
        AnnotatedLink {
            src_switch: SwitchEndpoint { id: src, ip_addr: None },
            dst_switch: SwitchEndpoint { id: dst, ip_addr: None },
            bw,
            delay: delay.map(str::to_string),
        }
    }

    fn topology(switches: &[SwitchId], links: &[(SwitchId, SwitchId)]) -> DiscoveredTopology {
        DiscoveredTopology {
            switches: switches.to_vec(),
            links: links
                .iter()
                .map(|&(src, dst)| DiscoveredLink { src, dst })
                .collect(),
        }
    }

    #[test]
    fn both_directions_are_inserted() {
        let topology = topology(&[1, 2, 3], &[(1, 2)]);
        let graph = WeightedGraph::build(&topology, &MetricsTable::default());

        assert_eq!(graph.cost(1, 2), Some(1.0));
        assert_eq!(graph.cost(2, 1), Some(1.0));
        assert_eq!(graph.cost(1, 3), None);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.switch_count(), 3);
    }

    #[test]
    fn reverse_direction_borrows_forward_metrics() {
        let metrics = MetricsTable::from_links(&[link(1, 2, Some(20.0), Some("2ms"))]).unwrap();
        let graph = WeightedGraph::build(&topology(&[1, 2], &[(1, 2)]), &metrics);

        assert_eq!(graph.cost(1, 2), graph.cost(2, 1));
        assert_eq!(graph.cost(1, 2), Some(2e-3 / 20e6));
    }

    #[test]
    fn explicit_reverse_entry_is_priced_separately() {
        let metrics = MetricsTable::from_links(&[
            link(1, 2, Some(20.0), Some("2ms")),
            link(2, 1, Some(1.0), Some("2ms")),
        ])
        .unwrap();
        let graph = WeightedGraph::build(&topology(&[1, 2], &[(1, 2), (2, 1)]), &metrics);

        assert_eq!(graph.cost(1, 2), Some(2e-3 / 20e6));
        assert_eq!(graph.cost(2, 1), Some(2e-3 / 1e6));
    }

    #[test]
    fn links_without_metrics_cost_one() {
        let metrics = MetricsTable::from_links(&[link(1, 2, Some(20.0), Some("2ms"))]).unwrap();
        let graph = WeightedGraph::build(&topology(&[1, 2, 3], &[(1, 2), (2, 3)]), &metrics);

        assert_eq!(graph.cost(2, 3), Some(1.0));
        assert_eq!(graph.cost(3, 2), Some(1.0));
    }

    #[test]
    fn duplicate_entries_keep_the_last_one() {
        let metrics = MetricsTable::from_links(&[
            link(1, 2, Some(20.0), Some("2ms")),
            link(1, 2, Some(10.0), Some("2ms")),
        ])
        .unwrap();
        assert_eq!(metrics.cost(1, 2), 2e-3 / 10e6);
        assert_eq!(metrics.cost(2, 1), 2e-3 / 10e6);
    }

    #[test]
    fn malformed_metric_names_the_link() {
        let err = MetricsTable::from_links(&[link(4, 7, Some(20.0), Some("2"))]).unwrap_err();
        match err {
            RoutingError::MalformedMetric { src, dst, .. } => assert_eq!((src, dst), (4, 7)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn link_endpoints_join_the_switch_set() {
        let graph = WeightedGraph::build(&topology(&[1], &[(1, 9)]), &MetricsTable::default());
        assert!(graph.contains(9));
        assert_eq!(graph.neighbors(9).collect::<Vec<_>>(), vec![(1, 1.0)]);
    }

    #[test]
    fn self_loops_are_ignored() {
        let graph = WeightedGraph::build(&topology(&[1], &[(1, 1)]), &MetricsTable::default());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn neighbors_only_cover_outgoing_edges() {
        let mut graph = WeightedGraph::with_switches([1, 2, 3]);
        graph.insert_edge(1, 2, 0.5);
        graph.insert_edge(3, 1, 0.7);

        assert_eq!(graph.neighbors(1).collect::<Vec<_>>(), vec![(2, 0.5)]);
        assert_eq!(graph.neighbors(2).count(), 0);
    }

    #[test]
    fn topology_derived_from_request() {
        let request = RouteRequest {
            networks: vec![crate::messages::NetworkEntity {
                switch_id: 8,
                subnets: vec![],
            }],
            links: vec![link(2, 1, None, None)],
        };
        let derived = DiscoveredTopology::from_request(&request);

        assert_eq!(derived.switches, vec![1, 2, 8]);
        assert_eq!(derived.links, vec![DiscoveredLink { src: 2, dst: 1 }]);
    }

    #[test]
    fn file_topology_reports_missing_file() {
        let source = FileTopology::new("/nonexistent/topology.json");
        assert!(matches!(
            source.snapshot(),
            Err(RoutingError::TopologyUnavailable(_))
        ));
    }
}
