use log::trace;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::SwitchId;
use crate::error::{Result, RoutingError};
use crate::network::WeightedGraph;

/// Best known cost and predecessor of a switch relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistanceEntry {
    pub cost: f64,
    pub previous: Option<SwitchId>,
}

impl DistanceEntry {
    fn anchor() -> Self {
        Self {
            cost: 0.0,
            previous: None,
        }
    }

    fn unreached() -> Self {
        Self {
            cost: f64::INFINITY,
            previous: None,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.cost.is_finite()
    }
}

/// Result of one solver run, one entry per switch of the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceTable {
    anchor: SwitchId,
    entries: BTreeMap<SwitchId, DistanceEntry>,
}

impl DistanceTable {
    pub fn from_entries(anchor: SwitchId, entries: BTreeMap<SwitchId, DistanceEntry>) -> Self {
        Self { anchor, entries }
    }

    pub fn anchor(&self) -> SwitchId {
        self.anchor
    }

    pub fn get(&self, switch: SwitchId) -> Option<&DistanceEntry> {
        self.entries.get(&switch)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SwitchId, &DistanceEntry)> {
        self.entries.iter().map(|(&id, entry)| (id, entry))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("switch {0} is the anchor itself")]
    DestinationIsAnchor(SwitchId),

    #[error("switch {0} is unreachable from the anchor")]
    Unreachable(SwitchId),

    #[error("predecessor chain of switch {0} does not lead back to the anchor")]
    PredecessorCycle(SwitchId),
}

/// Single-source Dijkstra from `anchor`.
///
/// Uses a linear scan for the minimum, which is O(V²) and fine for the
/// tens of switches a controller manages. Ties go to the lowest switch id.
pub fn shortest_paths(graph: &WeightedGraph, anchor: SwitchId) -> Result<DistanceTable> {
    if !graph.contains(anchor) {
        return Err(RoutingError::UnknownAnchor(anchor));
    }

    let mut distances: BTreeMap<SwitchId, DistanceEntry> = graph
        .switches()
        .map(|id| {
            let entry = if id == anchor {
                DistanceEntry::anchor()
            } else {
                DistanceEntry::unreached()
            };
            (id, entry)
        })
        .collect();
    let mut pending: BTreeSet<SwitchId> = graph.switches().collect();

    while let Some(current) = closest_pending(&pending, &distances) {
        let current_cost = distances[&current].cost;
        if !current_cost.is_finite() {
            // Everything left is disconnected from the anchor.
            break;
        }
        pending.remove(&current);

        for (neighbor, weight) in graph.neighbors(current) {
            if !pending.contains(&neighbor) {
                continue;
            }
            let candidate = current_cost + weight;
            let Some(entry) = distances.get_mut(&neighbor) else {
                continue;
            };
            if candidate < entry.cost {
                trace!("Relaxed {} via {}: {} -> {}", neighbor, current, entry.cost, candidate);
                entry.cost = candidate;
                entry.previous = Some(current);
            }
        }
    }

    Ok(DistanceTable::from_entries(anchor, distances))
}

// `min_by` keeps the first of equal elements, so ties go to the lowest id.
fn closest_pending(
    pending: &BTreeSet<SwitchId>,
    distances: &BTreeMap<SwitchId, DistanceEntry>,
) -> Option<SwitchId> {
    let cost = |id: &SwitchId| distances.get(id).map_or(f64::INFINITY, |entry| entry.cost);
    pending
        .iter()
        .copied()
        .min_by(|a, b| cost(a).total_cmp(&cost(b)))
}

/// First switch after the anchor on the shortest path to `destination`.
pub fn first_hop(
    table: &DistanceTable,
    destination: SwitchId,
) -> std::result::Result<SwitchId, PathError> {
    let anchor = table.anchor();
    if destination == anchor {
        return Err(PathError::DestinationIsAnchor(destination));
    }
    match table.get(destination) {
        Some(entry) if entry.is_reachable() => {}
        _ => return Err(PathError::Unreachable(destination)),
    }

    let mut current = destination;
    // A sound chain has at most V - 1 links.
    for _ in 0..table.len() {
        match table.get(current).and_then(|entry| entry.previous) {
            Some(previous) if previous == anchor => return Ok(current),
            Some(previous) => current = previous,
            None => return Err(PathError::Unreachable(destination)),
        }
    }

    Err(PathError::PredecessorCycle(destination))
}

/// Full switch path from the anchor to `destination`, both included.
pub fn path_to(
    table: &DistanceTable,
    destination: SwitchId,
) -> std::result::Result<Vec<SwitchId>, PathError> {
    let anchor = table.anchor();
    if destination == anchor {
        return Ok(vec![anchor]);
    }
    match table.get(destination) {
        Some(entry) if entry.is_reachable() => {}
        _ => return Err(PathError::Unreachable(destination)),
    }

    let mut path = vec![destination];
    let mut current = destination;
    while current != anchor {
        if path.len() > table.len() {
            return Err(PathError::PredecessorCycle(destination));
        }
        current = table
            .get(current)
            .and_then(|entry| entry.previous)
            .ok_or(PathError::Unreachable(destination))?;
        path.push(current);
    }

    path.reverse();
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn directed(edges: &[(SwitchId, SwitchId, f64)]) -> WeightedGraph {
        let mut graph = WeightedGraph::default();
        for &(src, dst, cost) in edges {
            graph.insert_edge(src, dst, cost);
        }
        graph
    }

    fn symmetric(edges: &[(SwitchId, SwitchId, f64)]) -> WeightedGraph {
        let mut graph = WeightedGraph::default();
        for &(src, dst, cost) in edges {
            graph.insert_edge(src, dst, cost);
            graph.insert_edge(dst, src, cost);
        }
        graph
    }

    fn hop_counts(graph: &WeightedGraph, anchor: SwitchId) -> BTreeMap<SwitchId, usize> {
        let mut hops = BTreeMap::from([(anchor, 0)]);
        let mut queue = VecDeque::from([anchor]);
        while let Some(current) = queue.pop_front() {
            let next = hops[&current] + 1;
            for (neighbor, _) in graph.neighbors(current) {
                if !hops.contains_key(&neighbor) {
                    hops.insert(neighbor, next);
                    queue.push_back(neighbor);
                }
            }
        }
        hops
    }

    #[test]
    fn anchor_has_zero_cost_and_no_predecessor() {
        let graph = symmetric(&[(1, 2, 0.3), (2, 3, 0.1), (3, 1, 5.0)]);
        for anchor in [1, 2, 3] {
            let table = shortest_paths(&graph, anchor).unwrap();
            assert_eq!(table.get(anchor), Some(&DistanceEntry::anchor()));
        }
    }

    #[test]
    fn picks_cheaper_detour() {
        let graph = symmetric(&[(1, 2, 0.3), (2, 3, 0.1), (3, 1, 5.0)]);
        let table = shortest_paths(&graph, 1).unwrap();

        let to_three = table.get(3).unwrap();
        assert!((to_three.cost - 0.4).abs() < 1e-12);
        assert_eq!(to_three.previous, Some(2));
        assert_eq!(first_hop(&table, 3), Ok(2));
        assert_eq!(path_to(&table, 3), Ok(vec![1, 2, 3]));
    }

    #[test]
    fn graph_without_edges_leaves_everything_unreachable() {
        let graph = WeightedGraph::with_switches([1, 2, 3]);
        let table = shortest_paths(&graph, 2).unwrap();

        assert_eq!(table.len(), 3);
        for id in [1, 3] {
            let entry = table.get(id).unwrap();
            assert!(!entry.is_reachable());
            assert_eq!(entry.previous, None);
            assert_eq!(first_hop(&table, id), Err(PathError::Unreachable(id)));
        }
    }

    #[test]
    fn unknown_anchor_is_rejected() {
        let graph = WeightedGraph::with_switches([1, 2]);
        assert!(matches!(
            shortest_paths(&graph, 42),
            Err(RoutingError::UnknownAnchor(42))
        ));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let graph = symmetric(&[(1, 2, 1.0), (1, 3, 1.0), (2, 4, 1.0), (3, 4, 1.0)]);
        let first = shortest_paths(&graph, 1).unwrap();
        let second = shortest_paths(&graph, 1).unwrap();
        assert_eq!(first, second);
        // equal-cost tie resolved towards the lower switch id
        assert_eq!(first.get(4).unwrap().previous, Some(2));
    }

    #[test]
    fn asymmetric_costs_give_different_paths() {
        let graph = directed(&[
            (1, 2, 10.0),
            (2, 1, 1.0),
            (1, 3, 1.0),
            (3, 1, 10.0),
            (3, 2, 1.0),
            (2, 3, 10.0),
        ]);

        let from_one = shortest_paths(&graph, 1).unwrap();
        assert_eq!(path_to(&from_one, 2), Ok(vec![1, 3, 2]));

        let from_two = shortest_paths(&graph, 2).unwrap();
        assert_eq!(path_to(&from_two, 1), Ok(vec![2, 1]));
    }

    #[test]
    fn predecessor_chains_are_bounded() {
        let graph = symmetric(&[(1, 2, 1.0), (2, 3, 2.0), (3, 4, 0.5), (4, 5, 1.0), (1, 5, 9.0)]);
        let table = shortest_paths(&graph, 1).unwrap();

        for (id, _) in table.iter() {
            let path = path_to(&table, id).unwrap();
            assert!(path.len() <= table.len());
            assert_eq!(path[0], 1);
        }
    }

    #[test]
    fn unit_costs_match_breadth_first_search() {
        let graph = symmetric(&[
            (1, 2, 1.0),
            (1, 3, 1.0),
            (2, 5, 1.0),
            (3, 4, 1.0),
            (4, 5, 1.0),
            (5, 6, 1.0),
        ]);
        for anchor in 1..=6 {
            let table = shortest_paths(&graph, anchor).unwrap();
            for (id, hops) in hop_counts(&graph, anchor) {
                assert_eq!(table.get(id).unwrap().cost, hops as f64);
            }
        }
    }

    #[test]
    fn first_hop_to_anchor_is_an_error() {
        let graph = symmetric(&[(1, 2, 1.0)]);
        let table = shortest_paths(&graph, 1).unwrap();
        assert_eq!(first_hop(&table, 1), Err(PathError::DestinationIsAnchor(1)));
    }

    #[test]
    fn cyclic_predecessors_terminate() {
        let entries = BTreeMap::from([
            (1, DistanceEntry::anchor()),
            (2, DistanceEntry { cost: 1.0, previous: Some(3) }),
            (3, DistanceEntry { cost: 1.0, previous: Some(2) }),
        ]);
        let table = DistanceTable::from_entries(1, entries);

        assert_eq!(first_hop(&table, 2), Err(PathError::PredecessorCycle(2)));
        assert_eq!(path_to(&table, 3), Err(PathError::PredecessorCycle(3)));
    }
}
