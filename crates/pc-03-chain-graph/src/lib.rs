//! # Chain Graph (pc-03)
//!
//! Every submitted batch lives in an arena keyed by its hash. Nodes carry
//! their parent hash, cumulative branch weight and a status; there are no
//! back-pointers, and removed orphans stay behind as `Pruned` tombstones.
//!
//! ## Fork Choice
//!
//! | Rule | Effect |
//! |------|--------|
//! | `weight = parent.weight + reward` | Heavier branches are preferred |
//! | new weight `>` tip weight | Tip moves to the new batch |
//! | new weight `==` tip weight | First-seen tip is kept |
//! | `invalidate` hits the tip | Tip rolls back to the invalid batch's parent |
//! | light-branch report | Tip moves to a strictly heavier verified branch |
//!
//! Submissions are authorized by the slot registry (pc-02) after the
//! signer is recovered from the signature over
//! `keccak(parent || height || merkle_root)`.

pub mod config;
pub mod domain;

pub use config::{ChainGraphConfig, RewardPolicyKind};
pub use domain::{
    total_reward, BatchNode, BatchStatus, ChainError, ChainGraph, ChainResult, ConstantReward,
    LightBranchReport, RewardContext, RewardPolicy, SlotCounter, StakeWeightedReward,
    SubmitOutcome, GENESIS_HASH,
};
