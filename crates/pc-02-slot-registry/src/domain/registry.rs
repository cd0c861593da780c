//! Slot auction, activation, submission authorization and slashing.

use std::collections::{BTreeMap, HashMap};

use shared_types::{short_hex, Address, Asset, LedgerOp, RootLedger, SlotId};
use tracing::{debug, info, warn};

use super::error::{SlotError, SlotResult};
use super::heartbeat::HeartbeatChallenge;
use super::slot::{completed_epochs, epoch_of, PendingBid, RetiringStake, Slot};
use crate::config::SlotRegistryConfig;

/// What a successful bid did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidOutcome {
    /// The slot was empty before any epoch started and is now occupied.
    Occupied,
    /// The owner's stake changed immediately.
    StakeAdjusted,
    /// A takeover or signer rotation waits for `activate`.
    Queued { activation_epoch: u64 },
}

/// Operator slots and the auction over them.
#[derive(Debug, Clone)]
pub struct SlotRegistry {
    pub(super) config: SlotRegistryConfig,
    pub(super) merkle_depth: u32,
    pub(super) slots: BTreeMap<SlotId, Slot>,
    pub(super) challenges: HashMap<SlotId, HeartbeatChallenge>,
    completed_epochs: u64,
    chain_started: bool,
}

impl SlotRegistry {
    /// `merkle_depth` is the depth of the validator tree heartbeats live in.
    pub fn new(config: SlotRegistryConfig, merkle_depth: u32) -> Self {
        Self {
            config,
            merkle_depth,
            slots: BTreeMap::new(),
            challenges: HashMap::new(),
            completed_epochs: 0,
            chain_started: false,
        }
    }

    pub fn config(&self) -> &SlotRegistryConfig {
        &self.config
    }

    pub fn slot(&self, slot_id: SlotId) -> Option<&Slot> {
        self.slots.get(&slot_id)
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    pub fn stake_of(&self, slot_id: SlotId) -> u128 {
        self.slots.get(&slot_id).map(|slot| slot.stake).unwrap_or(0)
    }

    pub fn completed_epochs(&self) -> u64 {
        self.completed_epochs
    }

    /// Advance epoch accounting to a new canonical tip.
    ///
    /// Never moves backwards, even when the tip rolls back.
    pub fn observe_tip(&mut self, tip_height: u64) {
        if tip_height > 0 {
            self.chain_started = true;
        }
        let completed = completed_epochs(tip_height, self.config.epoch_length);
        if completed > self.completed_epochs {
            debug!("[pc-02] completed epochs {} -> {}", self.completed_epochs, completed);
            self.completed_epochs = completed;
        }
    }

    /// Bid `price` for `slot_id` on behalf of `owner`, to be operated by `signer`.
    pub fn bid(
        &mut self,
        slot_id: SlotId,
        price: u128,
        owner: Address,
        signer: Address,
        ledger: &mut dyn RootLedger,
    ) -> SlotResult<BidOutcome> {
        self.check_slot_id(slot_id)?;
        if price < self.config.min_stake {
            return Err(SlotError::StakeTooLow {
                offered: price,
                required: self.config.min_stake,
            });
        }

        let slot = self
            .slots
            .get(&slot_id)
            .cloned()
            .unwrap_or_else(|| Slot::vacant(slot_id));

        if !slot.is_vacant() && slot.owner == owner {
            return self.bid_as_owner(slot, price, signer, ledger);
        }

        if slot.is_vacant() && slot.pending.is_none() && !self.chain_started {
            ledger.debit(owner, self.config.stake_color, Asset::Fungible(price))?;
            let mut slot = slot;
            slot.owner = owner;
            slot.signer = signer;
            slot.stake = price;
            slot.signer_from_epoch = 0;
            slot.previous_signer = None;
            self.slots.insert(slot_id, slot);
            info!(
                "[pc-02] slot {} occupied by 0x{} with stake {}",
                slot_id,
                short_hex(&owner),
                price
            );
            return Ok(BidOutcome::Occupied);
        }

        // Takeover: outbid the current stake and any queued bid.
        let effective = slot.effective_stake();
        if price <= effective {
            return Err(SlotError::StakeTooLow {
                offered: price,
                required: effective + 1,
            });
        }

        let color = self.config.stake_color;
        let mut ops = vec![LedgerOp::Debit {
            from: owner,
            color,
            asset: Asset::Fungible(price),
        }];
        if let Some(previous) = slot.foreign_pending() {
            ops.push(LedgerOp::Credit {
                to: previous.owner,
                color,
                asset: Asset::Fungible(previous.stake),
            });
        }
        ledger.apply(&ops)?;

        let activation_epoch = self.completed_epochs + self.config.activation_delay;
        let mut slot = slot;
        slot.pending = Some(PendingBid {
            owner,
            signer,
            stake: price,
        });
        slot.activation_epoch = activation_epoch;
        self.slots.insert(slot_id, slot);

        info!(
            "[pc-02] bid of {} by 0x{} queued for slot {} (activation epoch {})",
            price,
            short_hex(&owner),
            slot_id,
            activation_epoch
        );
        Ok(BidOutcome::Queued { activation_epoch })
    }

    fn bid_as_owner(
        &mut self,
        mut slot: Slot,
        price: u128,
        signer: Address,
        ledger: &mut dyn RootLedger,
    ) -> SlotResult<BidOutcome> {
        let slot_id = slot.slot_id;
        if slot.logout_requested {
            return Err(SlotError::LoggingOut(slot_id));
        }

        let color = self.config.stake_color;
        let mut ops = Vec::new();
        if price > slot.stake {
            ops.push(LedgerOp::Debit {
                from: slot.owner,
                color,
                asset: Asset::Fungible(price - slot.stake),
            });
        } else if price < slot.stake {
            ops.push(LedgerOp::Credit {
                to: slot.owner,
                color,
                asset: Asset::Fungible(slot.stake - price),
            });
        }

        // Outbidding a queued takeover displaces it.
        let displaced = slot
            .foreign_pending()
            .filter(|pending| price > pending.stake)
            .copied();
        if let Some(pending) = &displaced {
            ops.push(LedgerOp::Credit {
                to: pending.owner,
                color,
                asset: Asset::Fungible(pending.stake),
            });
        }
        let takeover_remains = slot.foreign_pending().is_some() && displaced.is_none();

        let rotation = signer != slot.signer;
        if rotation && takeover_remains {
            return Err(SlotError::TakeoverPending(slot_id));
        }

        ledger.apply(&ops)?;

        slot.stake = price;
        if displaced.is_some() {
            slot.pending = None;
        }
        let outcome = if rotation {
            slot.pending = Some(PendingBid {
                owner: slot.owner,
                signer,
                stake: 0,
            });
            slot.activation_epoch = self.completed_epochs + self.config.activation_delay;
            BidOutcome::Queued {
                activation_epoch: slot.activation_epoch,
            }
        } else {
            BidOutcome::StakeAdjusted
        };

        info!("[pc-02] slot {} stake set to {} by owner", slot_id, price);
        self.slots.insert(slot_id, slot);
        Ok(outcome)
    }

    /// Owner asks to vacate the slot after the activation delay.
    pub fn request_logout(&mut self, slot_id: SlotId, caller: Address) -> SlotResult<u64> {
        self.check_slot_id(slot_id)?;
        let activation_epoch = self.completed_epochs + self.config.activation_delay;
        let slot = self
            .slots
            .get_mut(&slot_id)
            .filter(|slot| !slot.is_vacant() && slot.owner == caller)
            .ok_or(SlotError::NotOwner(slot_id))?;
        if slot.logout_requested {
            return Err(SlotError::LoggingOut(slot_id));
        }

        slot.logout_requested = true;
        slot.activation_epoch = activation_epoch;
        info!(
            "[pc-02] logout requested for slot {} (activation epoch {})",
            slot_id, activation_epoch
        );
        Ok(activation_epoch)
    }

    /// Finalize a queued bid, signer rotation or logout once its epoch is reached.
    ///
    /// A replaced owner's stake is held as [`RetiringStake`] until its signer
    /// stops binding; a later `activate` returns it.
    pub fn activate(&mut self, slot_id: SlotId, ledger: &mut dyn RootLedger) -> SlotResult<()> {
        self.check_slot_id(slot_id)?;
        let completed = self.completed_epochs;
        let mut slot = self
            .slots
            .get(&slot_id)
            .cloned()
            .ok_or(SlotError::NothingPending(slot_id))?;

        let color = self.config.stake_color;
        let mut ops = Vec::new();
        if let Some(retiring) = slot.retiring.filter(|retiring| completed >= retiring.release_epoch) {
            ops.push(LedgerOp::Credit {
                to: retiring.owner,
                color,
                asset: Asset::Fungible(retiring.stake),
            });
            slot.retiring = None;
        }

        let queued = slot.pending.is_some() || slot.logout_requested;
        if !queued {
            if ops.is_empty() {
                return Err(match slot.retiring {
                    Some(retiring) => SlotError::NotYetEligible {
                        now: completed,
                        ready_at: retiring.release_epoch,
                    },
                    None => SlotError::NothingPending(slot_id),
                });
            }
        } else {
            if completed < slot.activation_epoch {
                return Err(SlotError::NotYetEligible {
                    now: completed,
                    ready_at: slot.activation_epoch,
                });
            }
            if let Some(retiring) = slot.retiring {
                return Err(SlotError::NotYetEligible {
                    now: completed,
                    ready_at: retiring.release_epoch,
                });
            }
            self.apply_queued(&mut slot, completed + 1, &mut ops);
        }

        if !ops.is_empty() {
            ledger.apply(&ops)?;
        }
        if let Some(retiring) = &slot.retiring {
            debug!(
                "[pc-02] slot {} holds {} of retiring stake until epoch {}",
                slot_id, retiring.stake, retiring.release_epoch
            );
        }
        self.slots.insert(slot_id, slot);
        Ok(())
    }

    /// Apply the queued change of `slot`; new signers bind from `from_epoch`.
    fn apply_queued(&self, slot: &mut Slot, from_epoch: u64, ops: &mut Vec<LedgerOp>) {
        let slot_id = slot.slot_id;
        match slot.pending.take() {
            Some(pending) if pending.owner == slot.owner => {
                slot.rotate_signer(pending.signer, from_epoch);
                info!("[pc-02] slot {} signer rotated from epoch {}", slot_id, from_epoch);
            }
            Some(pending) => {
                if slot.stake > 0 {
                    slot.retiring = Some(RetiringStake {
                        owner: slot.owner,
                        signer: slot.signer,
                        stake: slot.stake,
                        release_epoch: from_epoch,
                    });
                }
                slot.rotate_signer(pending.signer, from_epoch);
                slot.owner = pending.owner;
                slot.stake = pending.stake;
                slot.logout_requested = false;
                info!(
                    "[pc-02] slot {} taken over by 0x{} with stake {}",
                    slot_id,
                    short_hex(&pending.owner),
                    pending.stake
                );
            }
            None => {
                // A zero-stake slot is inert, so the old signer cannot submit.
                if slot.stake > 0 {
                    ops.push(LedgerOp::Credit {
                        to: slot.owner,
                        color: self.config.stake_color,
                        asset: Asset::Fungible(slot.stake),
                    });
                }
                slot.rotate_signer(shared_types::ZERO_ADDRESS, from_epoch);
                slot.owner = shared_types::ZERO_ADDRESS;
                slot.stake = 0;
                slot.logout_requested = false;
                info!("[pc-02] slot {} vacated", slot_id);
            }
        }
    }

    /// Check that `signer` may submit a batch at `height` for `slot_id`.
    pub fn authorize_submission(&self, slot_id: SlotId, signer: Address, height: u64) -> SlotResult<()> {
        self.check_slot_id(slot_id)?;
        let slot = self
            .slots
            .get(&slot_id)
            .filter(|slot| !slot.is_inert())
            .ok_or(SlotError::InertSlot(slot_id))?;

        let epoch = epoch_of(height, self.config.epoch_length);
        if epoch < self.submission_floor() {
            return Err(SlotError::EpochClosed { slot_id, epoch });
        }
        if slot.signer_for_epoch(epoch) != Some(signer) {
            return Err(SlotError::UnauthorizedSigner {
                slot_id,
                signer,
                epoch,
            });
        }
        if slot.submissions_in(epoch) >= self.config.max_submissions_per_epoch {
            return Err(SlotError::EpochExhausted { slot_id, epoch });
        }
        Ok(())
    }

    /// Count an accepted submission against the slot's epoch quota.
    pub fn record_submission(&mut self, slot_id: SlotId, height: u64) {
        let epoch = epoch_of(height, self.config.epoch_length);
        let floor = self.submission_floor();
        if let Some(slot) = self.slots.get_mut(&slot_id) {
            slot.record_submission(epoch, floor);
        }
    }

    /// Oldest epoch still open to submissions.
    pub fn submission_floor(&self) -> u64 {
        self.completed_epochs
            .saturating_sub(self.config.submission_window)
    }

    /// Remove up to `amount` from the stake backing `signer`; returns what
    /// was actually slashed.
    ///
    /// Slashed stake stays in bridge custody; the caller decides who is paid.
    pub fn slash(&mut self, slot_id: SlotId, signer: Address, amount: u128) -> u128 {
        let Some(slot) = self.slots.get_mut(&slot_id) else {
            return 0;
        };
        let slashed = amount.min(slot.liable_stake(signer));
        match slot.retiring.as_mut() {
            Some(retiring) if retiring.signer == signer && slot.signer != signer => {
                retiring.stake -= slashed;
                warn!(
                    "[pc-02] retiring stake of slot {} slashed by {} (remaining {})",
                    slot_id, slashed, retiring.stake
                );
            }
            _ => {
                slot.stake -= slashed;
                warn!(
                    "[pc-02] slot {} slashed by {} (remaining stake {})",
                    slot_id, slashed, slot.stake
                );
            }
        }
        slashed
    }

    /// Stake that `slash(slot_id, signer, amount)` would remove.
    pub fn slashable(&self, slot_id: SlotId, signer: Address, amount: u128) -> u128 {
        amount.min(self.liable_stake(slot_id, signer))
    }

    /// Stake answerable for batches `signer` produced for `slot_id`.
    pub fn liable_stake(&self, slot_id: SlotId, signer: Address) -> u128 {
        self.slots
            .get(&slot_id)
            .map(|slot| slot.liable_stake(signer))
            .unwrap_or(0)
    }

    pub fn set_min_stake(&mut self, min_stake: u128) {
        self.config.min_stake = min_stake;
    }

    /// Change the epoch length; only allowed while every slot is vacant.
    pub fn set_epoch_length(&mut self, epoch_length: u32) -> SlotResult<()> {
        if self
            .slots
            .values()
            .any(|slot| !slot.is_vacant() || slot.pending.is_some() || slot.retiring.is_some())
        {
            return Err(SlotError::SlotsOccupied);
        }
        self.config.epoch_length = epoch_length;
        Ok(())
    }

    fn check_slot_id(&self, slot_id: SlotId) -> SlotResult<()> {
        if slot_id >= self.config.epoch_length {
            return Err(SlotError::UnknownSlot(slot_id));
        }
        Ok(())
    }
}
