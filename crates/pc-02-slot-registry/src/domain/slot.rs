//! Slot records and epoch arithmetic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared_types::{Address, SlotId, ZERO_ADDRESS};

/// Epoch a batch at `height` belongs to: `(height - 1) / epoch_length`.
///
/// Height 0 is genesis and is treated as part of epoch 0.
pub fn epoch_of(height: u64, epoch_length: u32) -> u64 {
    height.saturating_sub(1) / u64::from(epoch_length.max(1))
}

/// Epochs fully covered by a chain whose tip is at `tip_height`.
pub fn completed_epochs(tip_height: u64, epoch_length: u32) -> u64 {
    tip_height / u64::from(epoch_length.max(1))
}

/// A queued takeover bid, or a same-owner signer rotation (`stake == 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBid {
    pub owner: Address,
    pub signer: Address,
    /// Escrowed stake; zero for a signer rotation.
    pub stake: u128,
}

/// Stake of a replaced owner, still answerable for its signer's batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetiringStake {
    pub owner: Address,
    pub signer: Address,
    pub stake: u128,
    /// Completed-epoch count at which the stake is returned.
    pub release_epoch: u64,
}

/// One operator slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub slot_id: SlotId,
    pub owner: Address,
    pub signer: Address,
    pub stake: u128,
    pub pending: Option<PendingBid>,
    /// Completed-epoch count at which `pending` or a logout may activate.
    pub activation_epoch: u64,
    pub logout_requested: bool,
    /// First epoch in which `signer` is binding.
    pub signer_from_epoch: u64,
    /// Signer binding before `signer_from_epoch`.
    pub previous_signer: Option<Address>,
    /// Previous owner's stake, held until its signer stops binding.
    pub retiring: Option<RetiringStake>,
    /// Submissions per epoch.
    submissions: BTreeMap<u64, u32>,
}

impl Slot {
    pub fn vacant(slot_id: SlotId) -> Self {
        Self {
            slot_id,
            owner: ZERO_ADDRESS,
            signer: ZERO_ADDRESS,
            stake: 0,
            pending: None,
            activation_epoch: 0,
            logout_requested: false,
            signer_from_epoch: 0,
            previous_signer: None,
            retiring: None,
            submissions: BTreeMap::new(),
        }
    }

    pub fn is_vacant(&self) -> bool {
        self.owner == ZERO_ADDRESS
    }

    /// Zero-stake slots may not submit.
    pub fn is_inert(&self) -> bool {
        self.stake == 0
    }

    /// Signer authorized for batches in `epoch`.
    pub fn signer_for_epoch(&self, epoch: u64) -> Option<Address> {
        if epoch >= self.signer_from_epoch {
            (!self.is_vacant()).then_some(self.signer)
        } else {
            self.previous_signer
        }
    }

    /// Stake a takeover bid has to beat.
    pub fn effective_stake(&self) -> u128 {
        match &self.pending {
            Some(pending) if pending.owner != self.owner => self.stake.max(pending.stake),
            _ => self.stake,
        }
    }

    /// Stake answerable for batches signed by `signer`.
    ///
    /// A replaced owner's signer is backed by the retiring stake, not by the
    /// new owner's.
    pub fn liable_stake(&self, signer: Address) -> u128 {
        match &self.retiring {
            Some(retiring) if retiring.signer == signer && self.signer != signer => retiring.stake,
            _ => self.stake,
        }
    }

    /// Takeover bid by someone other than the current owner.
    pub fn foreign_pending(&self) -> Option<&PendingBid> {
        self.pending
            .as_ref()
            .filter(|pending| pending.owner != self.owner)
    }

    pub fn submissions_in(&self, epoch: u64) -> u32 {
        self.submissions.get(&epoch).copied().unwrap_or(0)
    }

    /// Epochs with a live submission counter.
    pub fn tracked_epochs(&self) -> usize {
        self.submissions.len()
    }

    /// Count a submission in `epoch` and forget counters below `floor`.
    pub(crate) fn record_submission(&mut self, epoch: u64, floor: u64) {
        *self.submissions.entry(epoch).or_insert(0) += 1;
        self.submissions = self.submissions.split_off(&floor);
    }

    /// Move the binding signer, keeping the old one for the epoch in progress.
    pub(crate) fn rotate_signer(&mut self, signer: Address, from_epoch: u64) {
        self.previous_signer = (!self.is_vacant()).then_some(self.signer);
        self.signer = signer;
        self.signer_from_epoch = from_epoch;
    }
}
