//! Domain layer for the exit game.

mod colors;
mod error;
mod exit;
mod queue;

pub use colors::*;
pub use error::*;
pub use exit::*;
pub use queue::*;
