pub mod dijkstra;
pub mod distance_vector;
pub mod flooding;

pub use dijkstra::{shortest_paths, ShortestPath};
pub use distance_vector::{bellman_ford, DistanceVectorEngine, DEFAULT_MAX_METRIC};
pub use flooding::FloodDecision;
