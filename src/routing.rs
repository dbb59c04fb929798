use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use crate::algorithms::dijkstra::{PathError, first_hop, path_to, shortest_paths};
use crate::error::{Result, RoutingError};
use crate::messages::{AnnotatedLink, NetworkEntity, RouteRecord, RouteRequest};
use crate::network::{DiscoveredTopology, MetricsTable, WeightedGraph};
use crate::{SubnetId, SwitchId};

/// Address of each switch as seen from its neighbor on a specific link.
///
/// Keyed by `(from, to)`: the value is the address of `to` on the link that
/// leaves `from`. A switch may expose a different address on every link.
#[derive(Debug, Clone, Default)]
pub struct GatewayTable {
    addresses: HashMap<(SwitchId, SwitchId), IpAddr>,
}

impl GatewayTable {
    pub fn from_links(links: &[AnnotatedLink]) -> Self {
        let mut addresses = HashMap::new();
        let usable: Vec<_> = links
            .iter()
            .filter_map(|link| match (link.src_switch.ip_addr, link.dst_switch.ip_addr) {
                (Some(src_addr), Some(dst_addr)) => {
                    Some((link.src_switch.id, src_addr, link.dst_switch.id, dst_addr))
                }
                _ => {
                    debug!(
                        "Link {} -> {} has no address on one side, not usable as gateway",
                        link.src_switch.id, link.dst_switch.id
                    );
                    None
                }
            })
            .collect();

        for &(src, _, dst, dst_addr) in &usable {
            addresses.insert((src, dst), dst_addr);
        }
        // A link declared in one direction only also serves the way back.
        for &(src, src_addr, dst, _) in &usable {
            addresses.entry((dst, src)).or_insert(src_addr);
        }

        Self { addresses }
    }

    pub fn lookup(&self, from: SwitchId, to: SwitchId) -> Option<IpAddr> {
        self.addresses.get(&(from, to)).copied()
    }
}

/// Subnets of the request in declaration order, with their owning switch.
struct SubnetDirectory {
    order: Vec<SubnetId>,
    owners: HashMap<SubnetId, SwitchId>,
    local: HashMap<SwitchId, HashSet<SubnetId>>,
}

impl SubnetDirectory {
    fn new(networks: &[NetworkEntity]) -> Self {
        let mut order = Vec::new();
        let mut owners = HashMap::new();
        let mut local: HashMap<SwitchId, HashSet<SubnetId>> = HashMap::new();

        for network in networks {
            let attached = local.entry(network.switch_id).or_default();
            for &subnet in &network.subnets {
                attached.insert(subnet);
                match owners.insert(subnet, network.switch_id) {
                    None => order.push(subnet),
                    Some(previous) if previous != network.switch_id => warn!(
                        "Subnet {} declared by switches {} and {}, using {}",
                        subnet, previous, network.switch_id, network.switch_id
                    ),
                    Some(_) => {}
                }
            }
        }

        Self { order, owners, local }
    }

    fn is_local(&self, switch: SwitchId, subnet: &SubnetId) -> bool {
        self.local.get(&switch).is_some_and(|subnets| subnets.contains(subnet))
    }
}

/// Distinct anchors in the order they were declared.
fn declared_anchors(networks: &[NetworkEntity]) -> Vec<SwitchId> {
    let mut seen = HashSet::new();
    networks
        .iter()
        .map(|network| network.switch_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Computes the routing table of every switch declared in `request.networks`.
///
/// One Dijkstra run per anchor; one record per (anchor, non-local subnet)
/// whose owner is reachable and whose first hop has a known address.
/// Malformed metrics or an anchor missing from the topology abort the whole
/// computation.
pub fn compute_routes(
    topology: &DiscoveredTopology,
    request: &RouteRequest,
) -> Result<Vec<RouteRecord>> {
    let metrics = MetricsTable::from_links(&request.links)?;
    let graph = WeightedGraph::build(topology, &metrics);
    let gateways = GatewayTable::from_links(&request.links);
    let directory = SubnetDirectory::new(&request.networks);
    let anchors = declared_anchors(&request.networks);

    if let Some(&unknown) = anchors.iter().find(|&&id| !graph.contains(id)) {
        return Err(RoutingError::UnknownAnchor(unknown));
    }

    let mut routes = Vec::new();
    for &anchor in &anchors {
        let table = shortest_paths(&graph, anchor)?;

        for subnet in &directory.order {
            if directory.is_local(anchor, subnet) {
                continue;
            }
            let Some(&owner) = directory.owners.get(subnet) else {
                continue;
            };

            let hop = match first_hop(&table, owner) {
                Ok(hop) => hop,
                Err(PathError::PredecessorCycle(_)) => {
                    error!(
                        "Corrupt predecessor chain from {} to {}, skipping {}",
                        anchor, owner, subnet
                    );
                    continue;
                }
                Err(e) => {
                    debug!("No route from {} to {}: {}", anchor, subnet, e);
                    continue;
                }
            };

            match gateways.lookup(anchor, hop) {
                Some(gateway) => routes.push(RouteRecord {
                    switch_id: anchor,
                    destination: *subnet,
                    gateway,
                }),
                None => warn!(
                    "No address known for switch {} on its link with {}, skipping route to {}",
                    hop, anchor, subnet
                ),
            }
        }
    }

    info!(
        "Computed {} routes for {} anchors over {} switches",
        routes.len(),
        anchors.len(),
        graph.switch_count()
    );
    Ok(routes)
}

/// Solver state of one switch, as reported by the `distances` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceReport {
    pub switch_id: SwitchId,
    /// `None` when the switch cannot be reached.
    pub cost: Option<f64>,
    pub previous: Option<SwitchId>,
    pub path: Vec<SwitchId>,
}

/// Dumps the shortest-path tree rooted at `anchor`.
pub fn distance_report(
    topology: &DiscoveredTopology,
    request: &RouteRequest,
    anchor: SwitchId,
) -> Result<Vec<DistanceReport>> {
    let metrics = MetricsTable::from_links(&request.links)?;
    let graph = WeightedGraph::build(topology, &metrics);
    let table = shortest_paths(&graph, anchor)?;

    Ok(table
        .iter()
        .map(|(switch_id, entry)| DistanceReport {
            switch_id,
            cost: entry.is_reachable().then_some(entry.cost),
            previous: entry.previous,
            path: path_to(&table, switch_id).unwrap_or_default(),
        })
        .collect())
}
