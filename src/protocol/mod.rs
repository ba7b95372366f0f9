pub mod agent;
pub mod envelope;
pub mod table;

pub use agent::*;
pub use envelope::*;
pub use table::*;
