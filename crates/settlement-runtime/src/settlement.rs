//! The settlement facade.
//!
//! `Settlement` owns every subsystem plus the root ledger and routes each
//! public operation to the subsystem that checks it. Fraud penalties that
//! are not paid to a reporter accrue to the treasury.

use pc_01_merkle_codec::{InclusionProof, ValidatorLeafProof};
use pc_02_slot_registry::{BatchCommitment, BidOutcome, Slot, SlotRegistry};
use pc_03_chain_graph::{BatchNode, ChainGraph, LightBranchReport, SubmitOutcome};
use pc_04_fraud_proofs::{FraudContext, FraudOutcome, FraudProofEngine, SignedHeader};
use pc_05_exit_queue::{ColorRegistry, Exit, ExitQueue, ExitSale, FinalizedExit};
use serde::Serialize;
use shared_types::{
    short_hex, Address, Asset, Color, ColorKind, Hash, RootLedger, Signature, SlotId, Transaction,
};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SettlementConfig};
use crate::error::{SettlementError, SettlementResult};
use crate::governance::{GovernanceGate, ParameterChange, Proposal, TimelockGate};

/// What an accepted batch submission did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReceipt {
    pub outcome: SubmitOutcome,
    /// Exits the submission finalized on the way.
    pub finalized: Vec<FinalizedExit>,
}

/// Serializable snapshot for status dumps.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementStatus {
    pub block_number: u64,
    pub tip: String,
    pub tip_height: u64,
    pub batches: usize,
    pub treasury: u128,
    pub pending_exits: usize,
    pub slots: Vec<SlotStatus>,
    pub colors: Vec<ColorStatus>,
    pub proposals: Vec<Proposal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub slot_id: SlotId,
    pub owner: String,
    pub signer: String,
    pub stake: u128,
    pub logout_requested: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColorStatus {
    pub color: u16,
    pub kind: ColorKind,
    pub token: String,
}

/// Plasma settlement core over a root ledger `L`.
#[derive(Debug)]
pub struct Settlement<L: RootLedger> {
    config: SettlementConfig,
    admin: Address,
    ledger: L,
    registry: SlotRegistry,
    graph: ChainGraph,
    fraud: FraudProofEngine,
    exits: ExitQueue,
    gate: Box<dyn GovernanceGate>,
    treasury: u128,
}

impl<L: RootLedger> Settlement<L> {
    /// Build every subsystem from `config`, with a [`TimelockGate`].
    pub fn new(config: SettlementConfig, admin: Address, ledger: L) -> SettlementResult<Self> {
        config.validate()?;
        let depth = config.merkle.tree_depth;
        let gate = TimelockGate::new(config.governance.min_delay);
        let settlement = Self {
            registry: SlotRegistry::new(config.slots.clone(), depth),
            graph: ChainGraph::new(config.chain.clone()),
            fraud: FraudProofEngine::new(config.fraud.clone(), depth),
            exits: ExitQueue::new(config.exits.clone(), depth),
            gate: Box::new(gate),
            treasury: 0,
            config,
            admin,
            ledger,
        };
        info!(
            "[runtime] settlement ready: {} slots, tree depth {}, admin {}",
            settlement.config.slots.epoch_length,
            depth,
            short_hex(&admin)
        );
        Ok(settlement)
    }

    /// Replace the governance gate.
    pub fn with_gate(mut self, gate: Box<dyn GovernanceGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn registry(&self) -> &SlotRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &ChainGraph {
        &self.graph
    }

    pub fn exits(&self) -> &ExitQueue {
        &self.exits
    }

    pub fn tip(&self) -> Hash {
        self.graph.tip()
    }

    pub fn tip_height(&self) -> u64 {
        self.graph.tip_height()
    }

    pub fn batch(&self, hash: &Hash) -> Option<&BatchNode> {
        self.graph.batch(hash)
    }

    pub fn slot(&self, slot_id: SlotId) -> Option<&Slot> {
        self.registry.slot(slot_id)
    }

    pub fn exit(&self, utxo_id: &Hash) -> Option<&Exit> {
        self.exits.exit(utxo_id)
    }

    pub fn colors(&self) -> &ColorRegistry {
        self.exits.colors()
    }

    /// Slashed stake held in custody and not yet paid out.
    pub fn treasury(&self) -> u128 {
        self.treasury
    }

    pub fn pending_proposals(&self) -> Vec<Proposal> {
        self.gate.pending()
    }

    pub fn status(&self) -> SettlementStatus {
        SettlementStatus {
            block_number: self.ledger.block_number(),
            tip: hex::encode(self.graph.tip()),
            tip_height: self.graph.tip_height(),
            batches: self.graph.len(),
            treasury: self.treasury,
            pending_exits: self.exits.pending_len(),
            slots: self
                .registry
                .slots()
                .filter(|slot| !slot.is_vacant())
                .map(|slot| SlotStatus {
                    slot_id: slot.slot_id,
                    owner: hex::encode(slot.owner),
                    signer: hex::encode(slot.signer),
                    stake: slot.stake,
                    logout_requested: slot.logout_requested,
                })
                .collect(),
            colors: self
                .exits
                .colors()
                .iter()
                .map(|(color, token)| ColorStatus {
                    color: color.0,
                    kind: color.kind(),
                    token: hex::encode(token),
                })
                .collect(),
            proposals: self.gate.pending(),
        }
    }

    // ------------------------------------------------------------------
    // Deposits and colors
    // ------------------------------------------------------------------

    /// Move `asset` into custody; returns the deposit id operators include.
    pub fn deposit(&mut self, owner: Address, color: Color, asset: Asset) -> SettlementResult<u64> {
        self.exits.colors().check(color, &asset)?;
        let deposit_id = self.ledger.record_deposit(owner, color, asset)?;
        info!(
            "[runtime] deposit #{} from {} on {}",
            deposit_id,
            short_hex(&owner),
            color
        );
        Ok(deposit_id)
    }

    /// Admin-only: map a root-chain token to the next color of `kind`.
    pub fn register_color(&mut self, caller: Address, token: Address, kind: ColorKind) -> SettlementResult<Color> {
        self.require_admin(caller)?;
        Ok(self.exits.colors_mut().register(token, kind)?)
    }

    // ------------------------------------------------------------------
    // Batches and slots
    // ------------------------------------------------------------------

    /// Accept a batch, then finalize whatever exits have matured.
    pub fn submit_batch(
        &mut self,
        parent_hash: Hash,
        merkle_root: Hash,
        slot_id: SlotId,
        signature: &Signature,
    ) -> SettlementResult<BatchReceipt> {
        let now = self.ledger.block_number();
        let outcome = self
            .graph
            .submit(parent_hash, merkle_root, slot_id, signature, now, &mut self.registry)?;
        let finalized = self.exits.finalize_eligible(&self.graph, &mut self.ledger);
        if !finalized.is_empty() {
            debug!(
                "[runtime] batch {} finalized {} exits",
                short_hex(&outcome.hash),
                finalized.len()
            );
        }
        Ok(BatchReceipt { outcome, finalized })
    }

    pub fn bid(&mut self, slot_id: SlotId, price: u128, owner: Address, signer: Address) -> SettlementResult<BidOutcome> {
        Ok(self.registry.bid(slot_id, price, owner, signer, &mut self.ledger)?)
    }

    pub fn request_logout(&mut self, slot_id: SlotId, caller: Address) -> SettlementResult<u64> {
        Ok(self.registry.request_logout(slot_id, caller)?)
    }

    pub fn activate(&mut self, slot_id: SlotId) -> SettlementResult<()> {
        Ok(self.registry.activate(slot_id, &mut self.ledger)?)
    }

    // ------------------------------------------------------------------
    // Exits
    // ------------------------------------------------------------------

    pub fn start_exit(&mut self, proof: &InclusionProof, output_index: u8, caller: Address) -> SettlementResult<Hash> {
        Ok(self
            .exits
            .start_exit(&self.graph, &mut self.ledger, proof, output_index, caller)?)
    }

    pub fn start_bought_exit(
        &mut self,
        proof: &InclusionProof,
        output_index: u8,
        sale: &ExitSale,
        buyer: Address,
    ) -> SettlementResult<Hash> {
        Ok(self
            .exits
            .start_bought_exit(&self.graph, &mut self.ledger, proof, output_index, sale, buyer)?)
    }

    pub fn challenge_exit(
        &mut self,
        spend: &InclusionProof,
        original: &InclusionProof,
        spend_input_index: u8,
        exit_output_index: u8,
        challenger: Address,
    ) -> SettlementResult<Hash> {
        Ok(self.exits.challenge_exit(
            &self.graph,
            &mut self.ledger,
            spend,
            original,
            spend_input_index,
            exit_output_index,
            challenger,
        )?)
    }

    pub fn finalize_top_exit(&mut self, color: Color) -> SettlementResult<Option<FinalizedExit>> {
        Ok(self.exits.finalize_top_exit(&self.graph, &mut self.ledger, color)?)
    }

    pub fn tokenize_exit(&mut self, utxo_id: &Hash, caller: Address) -> SettlementResult<()> {
        Ok(self.exits.tokenize_exit(utxo_id, caller)?)
    }

    pub fn transfer_receipt(&mut self, utxo_id: &Hash, from: Address, to: Address) -> SettlementResult<()> {
        Ok(self.exits.transfer_receipt(utxo_id, from, to)?)
    }

    pub fn redeem_receipt(&mut self, utxo_id: &Hash, caller: Address) -> SettlementResult<FinalizedExit> {
        Ok(self.exits.redeem_receipt(&mut self.ledger, utxo_id, caller)?)
    }

    // ------------------------------------------------------------------
    // Fraud
    // ------------------------------------------------------------------

    pub fn report_double_spend(
        &mut self,
        a: &InclusionProof,
        b: &InclusionProof,
        input_a: u8,
        input_b: u8,
        reporter: Address,
    ) -> SettlementResult<FraudOutcome> {
        let ctx = FraudContext {
            graph: &mut self.graph,
            registry: &mut self.registry,
            ledger: &mut self.ledger,
        };
        let outcome = self.fraud.report_double_spend(ctx, a, b, input_a, input_b, reporter)?;
        Ok(self.accrue(outcome))
    }

    pub fn report_invalid_deposit(
        &mut self,
        proof: &InclusionProof,
        prior: Option<&InclusionProof>,
        reporter: Address,
    ) -> SettlementResult<FraudOutcome> {
        let ctx = FraudContext {
            graph: &mut self.graph,
            registry: &mut self.registry,
            ledger: &mut self.ledger,
        };
        let outcome = self.fraud.report_invalid_deposit(ctx, proof, prior, reporter)?;
        Ok(self.accrue(outcome))
    }

    pub fn report_height_conflict(
        &mut self,
        a: &SignedHeader,
        b: &SignedHeader,
        reporter: Address,
    ) -> SettlementResult<FraudOutcome> {
        let ctx = FraudContext {
            graph: &mut self.graph,
            registry: &mut self.registry,
            ledger: &mut self.ledger,
        };
        let outcome = self.fraud.report_height_conflict(ctx, a, b, reporter)?;
        Ok(self.accrue(outcome))
    }

    /// Move the tip to a heavier branch and pay the reporter from the treasury.
    ///
    /// The report is verified and the reward credited before the tip moves,
    /// so a refused credit leaves the tip where it was. Returns the new tip
    /// and the reward paid.
    pub fn report_light_branch(
        &mut self,
        report: &LightBranchReport,
        reporter: Address,
    ) -> SettlementResult<(Hash, u128)> {
        let reward = self.config.chain.light_branch_reward.min(self.treasury);
        let color = self.config.treasury_color();
        self.graph.verify_light_branch(report)?;
        if reward > 0 {
            self.ledger.credit(reporter, color, Asset::Fungible(reward))?;
            self.treasury -= reward;
        }
        let tip = self.graph.report_light_branch(report, &mut self.registry)?;
        info!(
            "[runtime] light-branch reporter {} paid {} from treasury",
            short_hex(&reporter),
            reward
        );
        Ok((tip, reward))
    }

    fn accrue(&mut self, outcome: FraudOutcome) -> FraudOutcome {
        let retained = outcome.retained();
        self.treasury = self.treasury.saturating_add(retained);
        debug!(
            "[runtime] treasury +{} -> {} after {:?}",
            retained, self.treasury, outcome.kind
        );
        outcome
    }

    // ------------------------------------------------------------------
    // Chain maintenance
    // ------------------------------------------------------------------

    /// Tombstone orphan branches below a deep canonical ancestor.
    pub fn prune(&mut self, divergent_ancestor: &Hash, orphans: &[Hash]) -> SettlementResult<usize> {
        let exits = &self.exits;
        Ok(self
            .graph
            .prune(divergent_ancestor, orphans, |hash| exits.is_referenced(hash))?)
    }

    pub fn claim_reward(&mut self, batch_hash: &Hash, ancestry: &[Hash], claimant: Address) -> SettlementResult<u128> {
        Ok(self
            .graph
            .claim_reward(batch_hash, ancestry, claimant, &mut self.ledger)?)
    }

    // ------------------------------------------------------------------
    // Heartbeats
    // ------------------------------------------------------------------

    /// Challenge a slot whose leaf is empty at the current tip.
    pub fn challenge_heartbeat(
        &mut self,
        slot_id: SlotId,
        challenger: Address,
        absence: &ValidatorLeafProof,
    ) -> SettlementResult<u64> {
        let tip = commitment(self.graph.tip_node());
        Ok(self
            .registry
            .challenge_heartbeat(slot_id, challenger, &tip, absence, &mut self.ledger)?)
    }

    /// Answer a challenge with a heartbeat included in a canonical batch.
    pub fn respond_heartbeat(
        &mut self,
        slot_id: SlotId,
        batch_hash: &Hash,
        proof: &ValidatorLeafProof,
        heartbeat: &Transaction,
    ) -> SettlementResult<()> {
        let batch = self
            .graph
            .batch(batch_hash)
            .filter(|node| self.graph.is_canonical(&node.hash))
            .map(commitment)
            .ok_or(SettlementError::UnknownBatch(*batch_hash))?;
        Ok(self
            .registry
            .respond_heartbeat(slot_id, &batch, proof, heartbeat, &mut self.ledger)?)
    }

    pub fn timeout_heartbeat(&mut self, slot_id: SlotId) -> SettlementResult<u128> {
        Ok(self.registry.timeout_heartbeat(slot_id, &mut self.ledger)?)
    }

    // ------------------------------------------------------------------
    // Governance
    // ------------------------------------------------------------------

    /// Admin-only: queue a parameter change behind the timelock.
    pub fn propose_parameter_change(&mut self, caller: Address, change: ParameterChange) -> SettlementResult<u64> {
        self.require_admin(caller)?;
        check_change(&change, &self.config)?;
        Ok(self.gate.propose(change, self.ledger.block_number()))
    }

    /// Apply every matured change; returns the ones that took effect.
    pub fn finalize_parameter_changes(&mut self) -> Vec<ParameterChange> {
        let now = self.ledger.block_number();
        let mut applied = Vec::new();
        for proposal in self.gate.finalize(now) {
            match self.apply_change(proposal.change) {
                Ok(()) => {
                    info!("[runtime] proposal #{} applied: {:?}", proposal.id, proposal.change);
                    applied.push(proposal.change);
                }
                Err(err) => warn!("[runtime] proposal #{} dropped: {}", proposal.id, err),
            }
        }
        applied
    }

    fn apply_change(&mut self, change: ParameterChange) -> SettlementResult<()> {
        match change {
            ParameterChange::ExitDuration(blocks) => {
                self.exits.set_exit_duration(blocks);
                self.config.exits.exit_duration = blocks;
            }
            ParameterChange::ExitBond(bond) => {
                self.exits.set_exit_bond(bond);
                self.config.exits.exit_bond = bond;
            }
            ParameterChange::MinStake(stake) => {
                self.registry.set_min_stake(stake);
                self.config.slots.min_stake = stake;
            }
            ParameterChange::EpochLength(length) => {
                self.registry.set_epoch_length(length)?;
                self.config.slots.epoch_length = length;
            }
            ParameterChange::ConsensusHorizon(horizon) => {
                self.graph.set_consensus_horizon(horizon);
                self.config.chain.consensus_horizon = horizon;
            }
        }
        Ok(())
    }

    fn require_admin(&self, caller: Address) -> SettlementResult<()> {
        if caller != self.admin {
            return Err(SettlementError::NotAdmin(caller));
        }
        Ok(())
    }
}

fn commitment(node: &BatchNode) -> BatchCommitment {
    BatchCommitment {
        hash: node.hash,
        merkle_root: node.merkle_root,
        height: node.height,
    }
}

/// Reject a change that would leave the configuration invalid.
fn check_change(change: &ParameterChange, current: &SettlementConfig) -> Result<(), ConfigError> {
    let mut next = current.clone();
    match *change {
        ParameterChange::ExitDuration(blocks) => next.exits.exit_duration = blocks,
        ParameterChange::ExitBond(bond) => next.exits.exit_bond = bond,
        ParameterChange::MinStake(stake) => next.slots.min_stake = stake,
        ParameterChange::EpochLength(length) => next.slots.epoch_length = length,
        ParameterChange::ConsensusHorizon(horizon) => next.chain.consensus_horizon = horizon,
    }
    next.validate()
}
