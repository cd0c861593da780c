//! Timelocked parameter changes.
//!
//! Economic parameters only change through a gate that holds each proposal
//! for a minimum delay. Color registration bypasses the gate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A governance-controlled parameter and its new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterChange {
    ExitDuration(u64),
    ExitBond(u128),
    MinStake(u128),
    /// Only applies while every slot is vacant.
    EpochLength(u32),
    ConsensusHorizon(u64),
}

/// A queued change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub change: ParameterChange,
    pub proposed_at: u64,
    /// Root block from which the change may be applied.
    pub eta: u64,
}

/// Gate between proposing a parameter change and applying it.
pub trait GovernanceGate: std::fmt::Debug {
    /// Queue a change; returns its proposal id.
    fn propose(&mut self, change: ParameterChange, now: u64) -> u64;

    /// Remove and return every proposal whose delay has elapsed, oldest first.
    fn finalize(&mut self, now: u64) -> Vec<Proposal>;

    fn min_delay(&self) -> u64;

    fn pending(&self) -> Vec<Proposal>;
}

/// In-memory timelock.
#[derive(Debug, Clone, Default)]
pub struct TimelockGate {
    min_delay: u64,
    next_id: u64,
    queued: BTreeMap<u64, Proposal>,
}

impl TimelockGate {
    pub fn new(min_delay: u64) -> Self {
        Self {
            min_delay,
            next_id: 1,
            queued: BTreeMap::new(),
        }
    }
}

impl GovernanceGate for TimelockGate {
    fn propose(&mut self, change: ParameterChange, now: u64) -> u64 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        let eta = now.saturating_add(self.min_delay);
        self.queued.insert(
            id,
            Proposal {
                id,
                change,
                proposed_at: now,
                eta,
            },
        );
        info!("[runtime] proposal #{} queued: {:?} (eta block {})", id, change, eta);
        id
    }

    fn finalize(&mut self, now: u64) -> Vec<Proposal> {
        let ready: Vec<u64> = self
            .queued
            .values()
            .filter(|proposal| proposal.eta <= now)
            .map(|proposal| proposal.id)
            .collect();
        debug!("[runtime] {} proposals matured at block {}", ready.len(), now);
        ready
            .into_iter()
            .filter_map(|id| self.queued.remove(&id))
            .collect()
    }

    fn min_delay(&self) -> u64 {
        self.min_delay
    }

    fn pending(&self) -> Vec<Proposal> {
        self.queued.values().copied().collect()
    }
}
