//! Domain layer for fraud proofs.

mod engine;
mod error;

pub use engine::*;
pub use error::*;
