//! Domain layer for the chain graph.
//!
//! - batch: arena nodes and per-slot branch counters
//! - reward: reward curves
//! - graph: fork choice, pruning, light-branch reports, reward claims

mod batch;
mod error;
mod graph;
mod reward;

pub use batch::*;
pub use error::*;
pub use graph::*;
pub use reward::*;
