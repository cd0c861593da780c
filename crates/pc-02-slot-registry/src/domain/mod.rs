//! Domain layer for the slot registry.
//!
//! - slot: slot records and epoch arithmetic
//! - registry: auction, activation, submission authorization, slashing
//! - heartbeat: liveness challenges against active slots

mod error;
mod heartbeat;
mod registry;
mod slot;

pub use error::*;
pub use heartbeat::*;
pub use registry::*;
pub use slot::*;
