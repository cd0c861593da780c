//! Heartbeat challenges.
//!
//! Anyone may bond a challenge against an active slot whose heartbeat is
//! missing from the validator tree of the canonical tip. The operator
//! answers by proving a signed heartbeat in a later batch; otherwise, once
//! the window closes, the slot is slashed and the challenger paid.

use pc_01_merkle_codec::ValidatorLeafProof;
use serde::{Deserialize, Serialize};
use shared_crypto::recover_signer;
use shared_types::{short_hex, Address, Asset, Hash, RootLedger, SlotId, Transaction, ZERO_HASH};
use tracing::{info, warn};

use super::error::{SlotError, SlotResult};
use super::registry::SlotRegistry;
use super::slot::epoch_of;

/// Committed batch a heartbeat proof is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCommitment {
    pub hash: Hash,
    pub merkle_root: Hash,
    pub height: u64,
}

/// An open heartbeat challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatChallenge {
    pub slot_id: SlotId,
    pub challenger: Address,
    pub bond: u128,
    /// Height of the tip the absence was proven against.
    pub tip_height: u64,
    /// Root block after which the challenge can be timed out.
    pub deadline: u64,
}

impl SlotRegistry {
    pub fn challenge(&self, slot_id: SlotId) -> Option<&HeartbeatChallenge> {
        self.challenges.get(&slot_id)
    }

    /// Open a challenge with an absence proof against the canonical tip.
    pub fn challenge_heartbeat(
        &mut self,
        slot_id: SlotId,
        challenger: Address,
        tip: &BatchCommitment,
        absence: &ValidatorLeafProof,
        ledger: &mut dyn RootLedger,
    ) -> SlotResult<u64> {
        if self.stake_of(slot_id) == 0 {
            return Err(SlotError::InertSlot(slot_id));
        }
        if self.challenges.contains_key(&slot_id) {
            return Err(SlotError::AlreadyChallenged(slot_id));
        }
        if absence.batch_hash != tip.hash || absence.slot_id != slot_id {
            return Err(SlotError::InvalidProof(
                "absence proof is not for this slot at the tip".to_string(),
            ));
        }
        if absence.leaf != ZERO_HASH {
            return Err(SlotError::InvalidProof(
                "slot has a heartbeat at the tip".to_string(),
            ));
        }
        absence.verify(&tip.merkle_root, self.merkle_depth)?;

        let bond = self.config.heartbeat_bond;
        ledger.debit(challenger, self.config.stake_color, Asset::Fungible(bond))?;

        let deadline = ledger.block_number() + self.config.heartbeat_window;
        self.challenges.insert(
            slot_id,
            HeartbeatChallenge {
                slot_id,
                challenger,
                bond,
                tip_height: tip.height,
                deadline,
            },
        );
        info!(
            "[pc-02] heartbeat challenge on slot {} by 0x{} (deadline block {})",
            slot_id,
            short_hex(&challenger),
            deadline
        );
        Ok(deadline)
    }

    /// Answer a challenge with a signed heartbeat included in a later batch.
    ///
    /// The heartbeat's nonce must equal the height of the challenged tip.
    ///
    /// The challenger's bond goes to the slot owner.
    pub fn respond_heartbeat(
        &mut self,
        slot_id: SlotId,
        batch: &BatchCommitment,
        proof: &ValidatorLeafProof,
        heartbeat: &Transaction,
        ledger: &mut dyn RootLedger,
    ) -> SlotResult<()> {
        let challenge = self
            .challenges
            .get(&slot_id)
            .ok_or(SlotError::UnknownChallenge(slot_id))?;
        if batch.height <= challenge.tip_height {
            return Err(SlotError::InvalidProof(
                "heartbeat batch does not follow the challenged tip".to_string(),
            ));
        }
        if proof.batch_hash != batch.hash || proof.slot_id != slot_id {
            return Err(SlotError::InvalidProof(
                "heartbeat proof is for another batch or slot".to_string(),
            ));
        }
        let Transaction::Heartbeat {
            slot_id: beat_slot,
            nonce,
            signature,
        } = heartbeat
        else {
            return Err(SlotError::InvalidProof("not a heartbeat".to_string()));
        };
        if *beat_slot != slot_id || proof.leaf != heartbeat.hash() {
            return Err(SlotError::InvalidProof(
                "heartbeat does not match the proven leaf".to_string(),
            ));
        }
        // The nonce names the challenged tip height, so one signed heartbeat
        // answers one challenge.
        if *nonce != challenge.tip_height {
            return Err(SlotError::InvalidProof(format!(
                "heartbeat nonce {} does not answer the challenge at height {}",
                nonce, challenge.tip_height
            )));
        }
        proof.verify(&batch.merkle_root, self.merkle_depth)?;

        let signer = recover_signer(&heartbeat.sighash(), signature)
            .map_err(|err| SlotError::InvalidProof(err.to_string()))?;
        let slot = self.slots.get(&slot_id).ok_or(SlotError::InertSlot(slot_id))?;
        let epoch = epoch_of(batch.height, self.config.epoch_length);
        if slot.signer_for_epoch(epoch) != Some(signer) {
            return Err(SlotError::UnauthorizedSigner {
                slot_id,
                signer,
                epoch,
            });
        }

        ledger.credit(
            slot.owner,
            self.config.stake_color,
            Asset::Fungible(challenge.bond),
        )?;
        self.challenges.remove(&slot_id);
        info!("[pc-02] heartbeat challenge on slot {} answered", slot_id);
        Ok(())
    }

    /// Close an unanswered challenge after its deadline.
    ///
    /// Slashes `heartbeat_penalty`, pays the challenger bond plus the slashed
    /// stake, and returns the slashed amount.
    pub fn timeout_heartbeat(&mut self, slot_id: SlotId, ledger: &mut dyn RootLedger) -> SlotResult<u128> {
        let challenge = self
            .challenges
            .get(&slot_id)
            .ok_or(SlotError::UnknownChallenge(slot_id))?;
        let now = ledger.block_number();
        if now < challenge.deadline {
            return Err(SlotError::NotYetEligible {
                now,
                ready_at: challenge.deadline,
            });
        }

        let signer = self
            .slots
            .get(&slot_id)
            .map(|slot| slot.signer)
            .unwrap_or(shared_types::ZERO_ADDRESS);
        let slashed = self.slashable(slot_id, signer, self.config.heartbeat_penalty);
        ledger.credit(
            challenge.challenger,
            self.config.stake_color,
            Asset::Fungible(challenge.bond + slashed),
        )?;

        self.slash(slot_id, signer, slashed);
        self.challenges.remove(&slot_id);
        warn!(
            "[pc-02] slot {} missed heartbeat challenge, slashed {}",
            slot_id, slashed
        );
        Ok(slashed)
    }
}
