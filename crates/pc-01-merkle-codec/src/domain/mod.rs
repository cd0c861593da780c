//! Domain layer for the Merkle codec.
//!
//! - tree: fixed-depth tree, compact proofs, verification
//! - sparse: key-addressed sparse tree for validator metadata
//! - batch: batch commitment, inclusion proofs, batch builder

mod batch;
mod error;
mod sparse;
mod tree;

pub use batch::*;
pub use error::*;
pub use sparse::*;
pub use tree::*;
