pub mod graph;
pub mod transport;

pub use graph::*;
pub use transport::*;
