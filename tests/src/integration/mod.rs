//! Cross-subsystem scenarios.

pub mod exit_game;
pub mod fork_choice;
pub mod slashing;
