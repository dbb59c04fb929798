pub mod dijkstra;

pub use dijkstra::{DistanceEntry, DistanceTable, PathError, first_hop, path_to, shortest_paths};
