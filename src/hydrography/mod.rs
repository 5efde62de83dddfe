//! River network model: trees of directed reaches, their construction from
//! raw line work, and the cleanup operators that run before conflation.

pub mod cleanup;
pub mod filter;
pub mod forest;
pub mod tree;

pub use cleanup::CleanupOptions;
pub use forest::RiverForest;
pub use tree::{NodeId, RiverTree};
