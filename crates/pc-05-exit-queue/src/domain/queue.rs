//! The exit game.
//!
//! Exits wait in one priority queue per color. Only the head of a queue
//! can finalize, so within a color payouts strictly follow priority.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use pc_01_merkle_codec::InclusionProof;
use pc_03_chain_graph::{BatchNode, ChainGraph};
use shared_crypto::recover_signer;
use shared_types::{short_hex, Address, Asset, Color, Hash, LedgerOp, Outpoint, Output, RootLedger};
use tracing::{debug, info, warn};

use super::colors::ColorRegistry;
use super::error::{ExitError, ExitResult};
use super::exit::{Exit, ExitPriority, ExitReceipt, ExitSale, ExitState, FinalizedExit};
use crate::config::{BondPolicy, ExitQueueConfig};

/// Pending exits and their per-color queues.
#[derive(Debug, Clone)]
pub struct ExitQueue {
    config: ExitQueueConfig,
    merkle_depth: u32,
    colors: ColorRegistry,
    exits: HashMap<Hash, Exit>,
    queues: BTreeMap<Color, BTreeSet<(ExitPriority, Hash)>>,
}

/// An output proven to be in a canonical batch.
struct ProvenOutput {
    utxo_id: Hash,
    output: Output,
    priority: ExitPriority,
    batch_hash: Hash,
}

impl ExitQueue {
    pub fn new(config: ExitQueueConfig, merkle_depth: u32) -> Self {
        Self {
            config,
            merkle_depth,
            colors: ColorRegistry::new(),
            exits: HashMap::new(),
            queues: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &ExitQueueConfig {
        &self.config
    }

    pub fn colors(&self) -> &ColorRegistry {
        &self.colors
    }

    pub fn colors_mut(&mut self) -> &mut ColorRegistry {
        &mut self.colors
    }

    pub fn exit(&self, utxo_id: &Hash) -> Option<&Exit> {
        self.exits.get(utxo_id)
    }

    /// Pending exits of `color` in finalization order.
    pub fn pending(&self, color: Color) -> impl Iterator<Item = &Exit> + '_ {
        self.queues
            .get(&color)
            .into_iter()
            .flatten()
            .filter_map(|(_, utxo_id)| self.exits.get(utxo_id))
    }

    pub fn pending_len(&self) -> usize {
        self.queues.values().map(BTreeSet::len).sum()
    }

    /// Whether a pending exit points at `batch_hash`.
    pub fn is_referenced(&self, batch_hash: &Hash) -> bool {
        self.exits
            .values()
            .any(|exit| exit.state == ExitState::Pending && exit.batch_hash == *batch_hash)
    }

    pub fn set_exit_duration(&mut self, exit_duration: u64) {
        self.config.exit_duration = exit_duration;
    }

    pub fn set_exit_bond(&mut self, exit_bond: u128) {
        self.config.exit_bond = exit_bond;
    }

    /// Start an exit of an output the caller owns.
    pub fn start_exit(
        &mut self,
        graph: &ChainGraph,
        ledger: &mut dyn RootLedger,
        proof: &InclusionProof,
        output_index: u8,
        caller: Address,
    ) -> ExitResult<Hash> {
        let proven = self.prove_output(graph, proof, output_index)?;
        if proven.output.owner != caller {
            return Err(ExitError::NotOwner);
        }

        let mut ops = vec![LedgerOp::Debit {
            from: caller,
            color: self.config.bond_color,
            asset: Asset::Fungible(self.config.exit_bond),
        }];
        ops.extend(custody_op(ledger, &proven.output));
        ledger.apply(&ops)?;

        Ok(self.insert(proven, caller, caller, ledger.block_number()))
    }

    /// Start an exit on behalf of a buyer the owner sold it to.
    ///
    /// The buyer pays `sale.price` to the owner and the exit bond in one
    /// ledger batch, and becomes the exit's beneficiary.
    pub fn start_bought_exit(
        &mut self,
        graph: &ChainGraph,
        ledger: &mut dyn RootLedger,
        proof: &InclusionProof,
        output_index: u8,
        sale: &ExitSale,
        buyer: Address,
    ) -> ExitResult<Hash> {
        let proven = self.prove_output(graph, proof, output_index)?;
        if sale.utxo_id != proven.utxo_id {
            return Err(ExitError::InvalidProof("sale is for another output".to_string()));
        }
        if sale.buyer != buyer || sale.seller() != Some(proven.output.owner) {
            return Err(ExitError::NotOwner);
        }

        let owner = proven.output.owner;
        let mut ops = vec![
            LedgerOp::Transfer {
                from: buyer,
                to: owner,
                color: self.config.bond_color,
                asset: Asset::Fungible(sale.price),
            },
            LedgerOp::Debit {
                from: buyer,
                color: self.config.bond_color,
                asset: Asset::Fungible(self.config.exit_bond),
            },
        ];
        ops.extend(custody_op(ledger, &proven.output));
        ledger.apply(&ops)?;

        Ok(self.insert(proven, buyer, buyer, ledger.block_number()))
    }

    /// Evict a pending exit with proof that its output was spent.
    ///
    /// `original` is the inclusion proof of the exited transaction and
    /// `spend` that of a transaction consuming its `exit_output_index`
    /// output via input `spend_input_index`.
    pub fn challenge_exit(
        &mut self,
        graph: &ChainGraph,
        ledger: &mut dyn RootLedger,
        spend: &InclusionProof,
        original: &InclusionProof,
        spend_input_index: u8,
        exit_output_index: u8,
        challenger: Address,
    ) -> ExitResult<Hash> {
        let outpoint = Outpoint::new(original.tx_hash(), exit_output_index);
        let utxo_id = outpoint.utxo_id();
        let exit = self.exits.get(&utxo_id).ok_or(ExitError::UnknownExit(utxo_id))?;
        match exit.state {
            ExitState::Pending => {}
            ExitState::Finalized => return Err(ExitError::AlreadyFinalized(utxo_id)),
            ExitState::Challenged => return Err(ExitError::NotPending(utxo_id)),
        }
        if original.batch_hash != exit.batch_hash || original.tx_index != exit.priority.tx_index {
            return Err(ExitError::InvalidProof(
                "original proof does not describe the exit".to_string(),
            ));
        }

        let spend_batch = live_batch(graph, &spend.batch_hash)?;
        spend.verify(&spend_batch.merkle_root, self.merkle_depth)?;
        let input = spend.tx.input(spend_input_index).ok_or_else(|| {
            ExitError::InvalidProof(format!("no input {spend_input_index} in spend"))
        })?;
        if input.outpoint != outpoint {
            return Err(ExitError::InvalidProof(
                "spend does not consume the exited output".to_string(),
            ));
        }
        let signer = recover_signer(&spend.tx.sighash(), &input.signature)
            .map_err(|err| ExitError::InvalidProof(err.to_string()))?;
        if signer != exit.owner {
            return Err(ExitError::InvalidProof(
                "spend is not signed by the exit owner".to_string(),
            ));
        }
        if !graph.is_ancestor(&exit.batch_hash, &spend.batch_hash) {
            return Err(ExitError::InvalidProof(
                "spend is not on the exit's chain".to_string(),
            ));
        }
        if spend.batch_hash == exit.batch_hash && spend.tx_index <= exit.priority.tx_index {
            return Err(ExitError::InvalidProof(
                "spend precedes the exited transaction".to_string(),
            ));
        }

        if self.config.bond_policy == BondPolicy::ToChallenger && exit.bond > 0 {
            ledger.credit(challenger, self.config.bond_color, Asset::Fungible(exit.bond))?;
        }

        let (color, priority) = (exit.color, exit.priority);
        self.dequeue(color, priority, &utxo_id);
        if let Some(exit) = self.exits.get_mut(&utxo_id) {
            exit.state = ExitState::Challenged;
        }
        warn!(
            "[pc-05] exit {} challenged by 0x{} (bond {:?})",
            short_hex(&utxo_id),
            short_hex(&challenger),
            self.config.bond_policy
        );
        Ok(utxo_id)
    }

    /// Finalize the head of `color`'s queue if its window has passed.
    ///
    /// Exits whose batch has since been invalidated are dropped on the way;
    /// their bond stays in custody.
    pub fn finalize_top_exit(
        &mut self,
        graph: &ChainGraph,
        ledger: &mut dyn RootLedger,
        color: Color,
    ) -> ExitResult<Option<FinalizedExit>> {
        let now = ledger.block_number();
        loop {
            let Some((priority, utxo_id)) = self.queues.get(&color).and_then(|q| q.first()).copied() else {
                return Ok(None);
            };
            let Some(exit) = self.exits.get(&utxo_id) else {
                self.dequeue(color, priority, &utxo_id);
                continue;
            };
            if now < exit.eligible_at(self.config.exit_duration) {
                debug!(
                    "[pc-05] head of {} queue eligible at block {}",
                    color,
                    exit.eligible_at(self.config.exit_duration)
                );
                return Ok(None);
            }

            if !graph.batch(&exit.batch_hash).is_some_and(BatchNode::is_live) {
                self.dequeue(color, priority, &utxo_id);
                if let Some(exit) = self.exits.get_mut(&utxo_id) {
                    exit.state = ExitState::Challenged;
                }
                warn!(
                    "[pc-05] exit {} dropped: batch no longer live",
                    short_hex(&utxo_id)
                );
                continue;
            }

            let parked = exit.receipt.is_some();
            let mut ops = Vec::with_capacity(2);
            if !parked {
                ops.push(LedgerOp::Credit {
                    to: exit.beneficiary,
                    color: exit.color,
                    asset: exit.asset,
                });
            }
            if exit.bond > 0 {
                ops.push(LedgerOp::Credit {
                    to: exit.bond_payer,
                    color: self.config.bond_color,
                    asset: Asset::Fungible(exit.bond),
                });
            }
            ledger.apply(&ops)?;

            let finalized = FinalizedExit {
                utxo_id,
                color: exit.color,
                asset: exit.asset,
                paid_to: (!parked).then_some(exit.beneficiary),
            };
            self.dequeue(color, priority, &utxo_id);
            if let Some(exit) = self.exits.get_mut(&utxo_id) {
                exit.state = ExitState::Finalized;
            }
            info!(
                "[pc-05] exit {} finalized on {}{}",
                short_hex(&utxo_id),
                color,
                if parked { ", payout parked for receipt" } else { "" }
            );
            return Ok(Some(finalized));
        }
    }

    /// Finalize up to `max_exits_per_submission` eligible exits per color.
    ///
    /// A color whose head exit the ledger rejects is left for a later call.
    pub fn finalize_eligible(&mut self, graph: &ChainGraph, ledger: &mut dyn RootLedger) -> Vec<FinalizedExit> {
        let colors: Vec<Color> = self.queues.keys().copied().collect();
        let mut finalized = Vec::new();
        for color in colors {
            for _ in 0..self.config.max_exits_per_submission {
                match self.finalize_top_exit(graph, ledger, color) {
                    Ok(Some(exit)) => finalized.push(exit),
                    Ok(None) => break,
                    Err(err) => {
                        warn!("[pc-05] finalization on {} deferred: {}", color, err);
                        break;
                    }
                }
            }
        }
        finalized
    }

    /// Turn a pending exit's payout into a transferable receipt.
    pub fn tokenize_exit(&mut self, utxo_id: &Hash, caller: Address) -> ExitResult<()> {
        let exit = self
            .exits
            .get_mut(utxo_id)
            .ok_or(ExitError::UnknownExit(*utxo_id))?;
        match exit.state {
            ExitState::Pending => {}
            ExitState::Finalized => return Err(ExitError::AlreadyFinalized(*utxo_id)),
            ExitState::Challenged => return Err(ExitError::NotPending(*utxo_id)),
        }
        if exit.beneficiary != caller {
            return Err(ExitError::NotOwner);
        }
        if exit.receipt.is_some() {
            return Err(ExitError::AlreadyTokenized(*utxo_id));
        }
        exit.receipt = Some(ExitReceipt {
            holder: caller,
            redeemed: false,
        });
        info!("[pc-05] exit {} tokenized", short_hex(utxo_id));
        Ok(())
    }

    pub fn transfer_receipt(&mut self, utxo_id: &Hash, from: Address, to: Address) -> ExitResult<()> {
        let exit = self
            .exits
            .get_mut(utxo_id)
            .ok_or(ExitError::UnknownExit(*utxo_id))?;
        let receipt = exit.receipt.as_mut().ok_or(ExitError::NoReceipt(*utxo_id))?;
        if receipt.redeemed {
            return Err(ExitError::AlreadyRedeemed(*utxo_id));
        }
        if receipt.holder != from {
            return Err(ExitError::NotOwner);
        }
        receipt.holder = to;
        debug!(
            "[pc-05] receipt {} moved 0x{} -> 0x{}",
            short_hex(utxo_id),
            short_hex(&from),
            short_hex(&to)
        );
        Ok(())
    }

    /// Pay a finalized exit's parked payout to the receipt holder, once.
    pub fn redeem_receipt(
        &mut self,
        ledger: &mut dyn RootLedger,
        utxo_id: &Hash,
        caller: Address,
    ) -> ExitResult<FinalizedExit> {
        let exit = self
            .exits
            .get(utxo_id)
            .ok_or(ExitError::UnknownExit(*utxo_id))?;
        let receipt = exit.receipt.ok_or(ExitError::NoReceipt(*utxo_id))?;
        if receipt.holder != caller {
            return Err(ExitError::NotOwner);
        }
        if receipt.redeemed {
            return Err(ExitError::AlreadyRedeemed(*utxo_id));
        }
        if exit.state != ExitState::Finalized {
            return Err(ExitError::NotFinalized(*utxo_id));
        }

        ledger.credit(caller, exit.color, exit.asset)?;
        let redeemed = FinalizedExit {
            utxo_id: *utxo_id,
            color: exit.color,
            asset: exit.asset,
            paid_to: Some(caller),
        };
        if let Some(receipt) = self.exits.get_mut(utxo_id).and_then(|e| e.receipt.as_mut()) {
            receipt.redeemed = true;
        }
        info!(
            "[pc-05] receipt {} redeemed by 0x{}",
            short_hex(utxo_id),
            short_hex(&caller)
        );
        Ok(redeemed)
    }

    /// Check `proof` against a canonical batch and extract the output.
    fn prove_output(
        &self,
        graph: &ChainGraph,
        proof: &InclusionProof,
        output_index: u8,
    ) -> ExitResult<ProvenOutput> {
        if !graph.is_canonical(&proof.batch_hash) {
            return Err(ExitError::NotCanonical(proof.batch_hash));
        }
        let batch = live_batch(graph, &proof.batch_hash)?;
        proof.verify(&batch.merkle_root, self.merkle_depth)?;

        let output = *proof
            .tx
            .output(output_index)
            .ok_or_else(|| ExitError::InvalidProof(format!("no output {output_index}")))?;
        self.colors.check(output.color, &output.asset)?;

        let utxo_id = Outpoint::new(proof.tx_hash(), output_index).utxo_id();
        if self.exits.get(&utxo_id).is_some_and(Exit::is_live) {
            return Err(ExitError::ExitExists(utxo_id));
        }
        Ok(ProvenOutput {
            utxo_id,
            output,
            priority: ExitPriority {
                height: batch.height,
                tx_index: proof.tx_index,
                output_index,
            },
            batch_hash: proof.batch_hash,
        })
    }

    fn insert(&mut self, proven: ProvenOutput, beneficiary: Address, bond_payer: Address, now: u64) -> Hash {
        let ProvenOutput {
            utxo_id,
            output,
            priority,
            batch_hash,
        } = proven;
        self.exits.insert(
            utxo_id,
            Exit {
                utxo_id,
                owner: output.owner,
                beneficiary,
                color: output.color,
                asset: output.asset,
                priority,
                batch_hash,
                started_at: now,
                bond: self.config.exit_bond,
                bond_payer,
                state: ExitState::Pending,
                receipt: None,
            },
        );
        self.queues
            .entry(output.color)
            .or_default()
            .insert((priority, utxo_id));
        info!(
            "[pc-05] exit {} started on {} at height {} for 0x{}",
            short_hex(&utxo_id),
            output.color,
            priority.height,
            short_hex(&beneficiary)
        );
        utxo_id
    }

    fn dequeue(&mut self, color: Color, priority: ExitPriority, utxo_id: &Hash) {
        if let Some(queue) = self.queues.get_mut(&color) {
            queue.remove(&(priority, *utxo_id));
            if queue.is_empty() {
                self.queues.remove(&color);
            }
        }
    }
}

fn live_batch<'g>(graph: &'g ChainGraph, hash: &Hash) -> ExitResult<&'g BatchNode> {
    graph
        .batch(hash)
        .filter(|node| node.is_live() && node.height > 0)
        .ok_or_else(|| ExitError::InvalidProof(format!("batch {} is not live", short_hex(hash))))
}

/// Custody for a non-fungible output the bridge does not hold yet.
fn custody_op(ledger: &dyn RootLedger, output: &Output) -> Option<LedgerOp> {
    let id = output.asset.token_id()?;
    (!ledger.is_custodied(output.color, id)).then_some(LedgerOp::Debit {
        from: output.owner,
        color: output.color,
        asset: output.asset,
    })
}
