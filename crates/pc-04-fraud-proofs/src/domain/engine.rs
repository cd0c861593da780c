//! Fraud proof verification and punishment.
//!
//! Every report re-verifies its inclusion proofs against the committed
//! batch roots before anything moves. Accepted reports slash the guilty
//! slot, pay the reporter a share of the slashed stake out of bridge
//! custody, and (for invalid transactions) invalidate the batch suffix.

use std::collections::HashSet;

use pc_01_merkle_codec::{batch_hash, batch_signing_hash, InclusionProof};
use pc_02_slot_registry::{epoch_of, SlotRegistry};
use pc_03_chain_graph::{BatchNode, ChainGraph};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_crypto::recover_signer;
use shared_types::{short_hex, Address, Asset, Hash, RootLedger, Signature, SlotId, Transaction};
use tracing::{debug, warn};

use super::error::{FraudError, FraudResult};
use crate::config::FraudConfig;

/// Kind of fraud an accepted report proved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FraudKind {
    DoubleSpend,
    InvalidDeposit,
    HeightConflict,
}

/// What an accepted report did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FraudOutcome {
    pub kind: FraudKind,
    pub slot_id: SlotId,
    /// Stake actually removed from the slot.
    pub slashed: u128,
    /// Paid to the reporter out of `slashed`.
    pub reporter_reward: u128,
    /// Batches marked Invalid, the fraudulent batch first.
    pub invalidated: Vec<Hash>,
}

impl FraudOutcome {
    /// Slashed stake left in custody after the reporter is paid.
    pub fn retained(&self) -> u128 {
        self.slashed - self.reporter_reward
    }
}

/// A batch header as signed by an operator, submitted or not.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedHeader {
    pub parent_hash: Hash,
    pub merkle_root: Hash,
    pub slot_id: SlotId,
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
}

impl SignedHeader {
    pub fn hash(&self, height: u64) -> Hash {
        batch_hash(&self.parent_hash, height, &self.merkle_root, &self.signature)
    }
}

/// Mutable state a report acts on.
pub struct FraudContext<'a> {
    pub graph: &'a mut ChainGraph,
    pub registry: &'a mut SlotRegistry,
    pub ledger: &'a mut dyn RootLedger,
}

/// Verifies fraud reports and applies penalties.
#[derive(Debug, Clone)]
pub struct FraudProofEngine {
    config: FraudConfig,
    merkle_depth: u32,
    reported_conflicts: HashSet<(Hash, Hash)>,
}

impl FraudProofEngine {
    pub fn new(config: FraudConfig, merkle_depth: u32) -> Self {
        Self {
            config,
            merkle_depth,
            reported_conflicts: HashSet::new(),
        }
    }

    pub fn config(&self) -> &FraudConfig {
        &self.config
    }

    /// Two transactions in live batches on one chain spend the same outpoint.
    ///
    /// The later one (by height, then tx index) is fraudulent.
    pub fn report_double_spend(
        &mut self,
        ctx: FraudContext<'_>,
        a: &InclusionProof,
        b: &InclusionProof,
        input_a: u8,
        input_b: u8,
        reporter: Address,
    ) -> FraudResult<FraudOutcome> {
        if a.tx_hash() == b.tx_hash() {
            return Err(FraudError::invalid("both proofs show the same transaction"));
        }
        let node_a = self.verified_batch(ctx.graph, a)?;
        let node_b = self.verified_batch(ctx.graph, b)?;

        let spent_a = a
            .tx
            .input(input_a)
            .ok_or_else(|| FraudError::invalid(format!("no input {input_a} in first transaction")))?;
        let spent_b = b
            .tx
            .input(input_b)
            .ok_or_else(|| FraudError::invalid(format!("no input {input_b} in second transaction")))?;
        if spent_a.outpoint != spent_b.outpoint {
            return Err(FraudError::invalid("inputs spend different outpoints"));
        }

        if !ctx.graph.is_ancestor(&node_a.hash, &node_b.hash)
            && !ctx.graph.is_ancestor(&node_b.hash, &node_a.hash)
        {
            return Err(FraudError::invalid("batches are not on one chain"));
        }
        let guilty = if (node_a.height, a.tx_index) > (node_b.height, b.tx_index) {
            node_a
        } else {
            node_b
        };

        let penalty = self.config.double_spend_penalty;
        self.punish(ctx, FraudKind::DoubleSpend, &guilty, penalty, reporter)
    }

    /// A deposit transaction that the ledger never recorded, or that replays
    /// a deposit already included earlier on the same chain.
    pub fn report_invalid_deposit(
        &mut self,
        ctx: FraudContext<'_>,
        proof: &InclusionProof,
        prior: Option<&InclusionProof>,
        reporter: Address,
    ) -> FraudResult<FraudOutcome> {
        let node = self.verified_batch(ctx.graph, proof)?;
        let Transaction::Deposit { deposit_id, output } = &proof.tx else {
            return Err(FraudError::invalid("transaction is not a deposit"));
        };

        match prior {
            Some(earlier) => {
                let earlier_node = self.verified_batch(ctx.graph, earlier)?;
                let replays = matches!(
                    &earlier.tx,
                    Transaction::Deposit { deposit_id: id, .. } if id == deposit_id
                );
                if !replays {
                    return Err(FraudError::invalid("prior inclusion is another deposit"));
                }
                if !ctx.graph.is_ancestor(&earlier_node.hash, &node.hash)
                    || (earlier_node.height, earlier.tx_index) >= (node.height, proof.tx_index)
                {
                    return Err(FraudError::invalid("prior inclusion is not earlier on the same chain"));
                }
            }
            None => {
                let honest = ctx.ledger.deposit_record(*deposit_id).is_some_and(|record| {
                    record.owner == output.owner
                        && record.color == output.color
                        && record.asset == output.asset
                });
                if honest {
                    return Err(FraudError::invalid(format!(
                        "deposit {deposit_id} matches the ledger record"
                    )));
                }
            }
        }

        let penalty = self.config.invalid_deposit_penalty;
        self.punish(ctx, FraudKind::InvalidDeposit, &node, penalty, reporter)
    }

    /// One signer produced two distinct batches on the same parent.
    ///
    /// Slashes a share of the stake; neither batch is invalidated.
    pub fn report_height_conflict(
        &mut self,
        ctx: FraudContext<'_>,
        a: &SignedHeader,
        b: &SignedHeader,
        reporter: Address,
    ) -> FraudResult<FraudOutcome> {
        if a.parent_hash != b.parent_hash || a.slot_id != b.slot_id {
            return Err(FraudError::invalid("headers differ in parent or slot"));
        }
        let parent = ctx
            .graph
            .batch(&a.parent_hash)
            .ok_or_else(|| FraudError::invalid(format!("unknown parent {}", short_hex(&a.parent_hash))))?;
        let height = parent.height + 1;

        let hash_a = a.hash(height);
        let hash_b = b.hash(height);
        if hash_a == hash_b {
            return Err(FraudError::invalid("headers are identical"));
        }
        let key = if hash_a < hash_b {
            (hash_a, hash_b)
        } else {
            (hash_b, hash_a)
        };
        if self.reported_conflicts.contains(&key) {
            return Err(FraudError::AlreadyReported);
        }

        let signer_a = recover_header(a, height)?;
        let signer_b = recover_header(b, height)?;
        if signer_a != signer_b {
            return Err(FraudError::invalid("headers recover to different signers"));
        }
        let epoch = epoch_of(height, ctx.registry.config().epoch_length);
        let authorized = ctx
            .registry
            .slot(a.slot_id)
            .and_then(|slot| slot.signer_for_epoch(epoch));
        if authorized != Some(signer_a) {
            return Err(FraudError::invalid(format!(
                "0x{} does not sign for slot {} in epoch {}",
                short_hex(&signer_a),
                a.slot_id,
                epoch
            )));
        }

        let stake = ctx.registry.liable_stake(a.slot_id, signer_a);
        let penalty = FraudConfig::percent_of(stake, self.config.height_conflict_penalty_percent);
        let slashed = ctx.registry.slashable(a.slot_id, signer_a, penalty);
        let reporter_reward = FraudConfig::percent_of(slashed, self.config.reporter_reward_percent);
        if reporter_reward > 0 {
            ctx.ledger.credit(
                reporter,
                ctx.registry.config().stake_color,
                Asset::Fungible(reporter_reward),
            )?;
        }

        ctx.registry.slash(a.slot_id, signer_a, slashed);
        self.reported_conflicts.insert(key);
        warn!(
            "[pc-04] height conflict at height {} by slot {}: {} vs {}",
            height,
            a.slot_id,
            short_hex(&hash_a),
            short_hex(&hash_b)
        );
        Ok(FraudOutcome {
            kind: FraudKind::HeightConflict,
            slot_id: a.slot_id,
            slashed,
            reporter_reward,
            invalidated: Vec::new(),
        })
    }

    /// Live batch the proof points at, after checking the proof against it.
    fn verified_batch(&self, graph: &ChainGraph, proof: &InclusionProof) -> FraudResult<BatchNode> {
        let node = graph
            .batch(&proof.batch_hash)
            .filter(|node| node.is_live() && node.height > 0)
            .ok_or_else(|| {
                FraudError::invalid(format!(
                    "batch {} is not a live batch",
                    short_hex(&proof.batch_hash)
                ))
            })?;
        proof.verify(&node.merkle_root, self.merkle_depth)?;
        debug!(
            "[pc-04] inclusion of {} in batch {} verified",
            short_hex(&proof.tx_hash()),
            short_hex(&proof.batch_hash)
        );
        Ok(node.clone())
    }

    /// Pay the reporter, then invalidate the batch suffix and slash.
    fn punish(
        &mut self,
        ctx: FraudContext<'_>,
        kind: FraudKind,
        guilty: &BatchNode,
        penalty: u128,
        reporter: Address,
    ) -> FraudResult<FraudOutcome> {
        let slashed = ctx.registry.slashable(guilty.slot_id, guilty.signer, penalty);
        let reporter_reward = FraudConfig::percent_of(slashed, self.config.reporter_reward_percent);
        if reporter_reward > 0 {
            ctx.ledger.credit(
                reporter,
                ctx.registry.config().stake_color,
                Asset::Fungible(reporter_reward),
            )?;
        }

        let invalidated = ctx.graph.invalidate(&guilty.hash)?;
        ctx.registry.slash(guilty.slot_id, guilty.signer, slashed);
        warn!(
            "[pc-04] {:?} proven in batch {} (slot {}): slashed {}, reporter 0x{} paid {}",
            kind,
            short_hex(&guilty.hash),
            guilty.slot_id,
            slashed,
            short_hex(&reporter),
            reporter_reward
        );

        let mut ordered = Vec::with_capacity(invalidated.len());
        ordered.push(guilty.hash);
        ordered.extend(invalidated.into_iter().filter(|hash| *hash != guilty.hash));
        Ok(FraudOutcome {
            kind,
            slot_id: guilty.slot_id,
            slashed,
            reporter_reward,
            invalidated: ordered,
        })
    }
}

fn recover_header(header: &SignedHeader, height: u64) -> FraudResult<Address> {
    let hash = batch_signing_hash(&header.parent_hash, height, &header.merkle_root);
    recover_signer(&hash, &header.signature).map_err(|err| FraudError::invalid(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pc_01_merkle_codec::{BatchBuilder, BuiltBatch, MerkleConfig};
    use pc_02_slot_registry::SlotRegistryConfig;
    use pc_03_chain_graph::{ChainGraphConfig, GENESIS_HASH};
    use shared_crypto::Secp256k1KeyPair;
    use shared_types::{Color, InMemoryLedger, Input, Outpoint, Output};

    const DEPTH: u32 = 8;
    const STAKE: Color = Color(0);
    const REPORTER: Address = [0xEE; 20];

    // Builds the context from disjoint field borrows so it can be passed
    // alongside `&mut w.engine`.
    macro_rules! ctx {
        ($w:expr) => {
            FraudContext {
                graph: &mut $w.graph,
                registry: &mut $w.registry,
                ledger: &mut $w.ledger,
            }
        };
    }

    struct World {
        graph: ChainGraph,
        registry: SlotRegistry,
        ledger: InMemoryLedger,
        engine: FraudProofEngine,
        keys: Vec<Secp256k1KeyPair>,
    }

    fn world(slots: usize) -> World {
        let mut ledger = InMemoryLedger::new();
        let mut registry = SlotRegistry::new(SlotRegistryConfig::default(), DEPTH);
        let mut keys = Vec::new();
        for slot in 0..slots {
            let key = Secp256k1KeyPair::generate();
            ledger.fund(key.address(), STAKE, 1_000);
            registry
                .bid(slot as SlotId, 100, key.address(), key.address(), &mut ledger)
                .unwrap();
            keys.push(key);
        }
        World {
            graph: ChainGraph::new(ChainGraphConfig::default()),
            registry,
            ledger,
            engine: FraudProofEngine::new(FraudConfig::default(), DEPTH),
            keys,
        }
    }

    impl World {
        fn submit(&mut self, parent: Hash, slot: usize, txs: Vec<Transaction>) -> (Hash, BuiltBatch) {
            let mut builder = BatchBuilder::new(&MerkleConfig { tree_depth: DEPTH }).unwrap();
            for tx in txs {
                builder.push(tx).unwrap();
            }
            let built = builder.build().unwrap();
            let height = self.graph.batch(&parent).unwrap().height + 1;
            let root = built.merkle_root();
            let sig = self.keys[slot]
                .sign_hash(&batch_signing_hash(&parent, height, &root))
                .unwrap();
            let out = self
                .graph
                .submit(parent, root, slot as SlotId, &sig, 0, &mut self.registry)
                .unwrap();
            (out.hash, built)
        }

        fn header(&self, parent: Hash, slot: usize, root: Hash) -> SignedHeader {
            let height = self.graph.batch(&parent).unwrap().height + 1;
            SignedHeader {
                parent_hash: parent,
                merkle_root: root,
                slot_id: slot as SlotId,
                signature: self.keys[slot]
                    .sign_hash(&batch_signing_hash(&parent, height, &root))
                    .unwrap(),
            }
        }
    }

    fn spend(outpoint: Outpoint, to: Address) -> Transaction {
        Transaction::Transfer {
            inputs: vec![Input::unsigned(outpoint)],
            outputs: vec![Output::fungible(to, Color(1), 10)],
        }
    }

    #[test]
    fn test_double_spend_slashes_later_batch() {
        let mut w = world(2);
        let coin = Outpoint::new([1; 32], 0);
        let (first, built_1) = w.submit(GENESIS_HASH, 0, vec![spend(coin, [2; 20])]);
        let (second, built_2) = w.submit(first, 1, vec![spend(coin, [3; 20])]);
        let (third, _) = w.submit(second, 1, vec![]);

        let a = built_1.inclusion_proof(first, 0).unwrap();
        let b = built_2.inclusion_proof(second, 0).unwrap();
        let outcome = w
            .engine
            .report_double_spend(ctx!(w), &b, &a, 0, 0, REPORTER)
            .unwrap();

        assert_eq!(outcome.slot_id, 1);
        assert_eq!(outcome.slashed, 50);
        assert_eq!(outcome.reporter_reward, 25);
        assert_eq!(outcome.retained(), 25);
        assert_eq!(outcome.invalidated[0], second);
        assert!(outcome.invalidated.contains(&third));
        assert_eq!(w.registry.stake_of(1), 50);
        assert_eq!(w.registry.stake_of(0), 100);
        assert_eq!(w.ledger.balance(&REPORTER, STAKE), 25);
        assert_eq!(w.graph.tip(), first);
    }

    #[test]
    fn test_double_spend_within_one_batch_blames_later_index() {
        let mut w = world(1);
        let coin = Outpoint::new([1; 32], 0);
        let (hash, built) = w.submit(
            GENESIS_HASH,
            0,
            vec![spend(coin, [2; 20]), spend(coin, [3; 20])],
        );
        let a = built.inclusion_proof(hash, 0).unwrap();
        let b = built.inclusion_proof(hash, 1).unwrap();

        let outcome = w
            .engine
            .report_double_spend(ctx!(w), &a, &b, 0, 0, REPORTER)
            .unwrap();
        assert_eq!(outcome.invalidated, vec![hash]);
        assert_eq!(w.graph.tip(), GENESIS_HASH);
    }

    #[test]
    fn test_double_spend_on_sibling_branches_rejected() {
        let mut w = world(2);
        let coin = Outpoint::new([1; 32], 0);
        let (left, built_l) = w.submit(GENESIS_HASH, 0, vec![spend(coin, [2; 20])]);
        let (right, built_r) = w.submit(GENESIS_HASH, 1, vec![spend(coin, [3; 20])]);

        let a = built_l.inclusion_proof(left, 0).unwrap();
        let b = built_r.inclusion_proof(right, 0).unwrap();
        assert!(matches!(
            w.engine.report_double_spend(ctx!(w), &a, &b, 0, 0, REPORTER),
            Err(FraudError::InvalidProof(_))
        ));
        assert_eq!(w.registry.stake_of(0), 100);
        assert_eq!(w.registry.stake_of(1), 100);
    }

    #[test]
    fn test_tampered_proof_changes_nothing() {
        let mut w = world(1);
        let coin = Outpoint::new([1; 32], 0);
        let (first, built_1) = w.submit(GENESIS_HASH, 0, vec![spend(coin, [2; 20])]);
        let (second, built_2) = w.submit(first, 0, vec![spend(coin, [3; 20])]);

        let a = built_1.inclusion_proof(first, 0).unwrap();
        let mut b = built_2.inclusion_proof(second, 0).unwrap();
        b.tx = spend(coin, [4; 20]);

        assert!(matches!(
            w.engine.report_double_spend(ctx!(w), &a, &b, 0, 0, REPORTER),
            Err(FraudError::InvalidProof(_))
        ));
        assert!(w.graph.batch(&second).unwrap().is_live());
        assert_eq!(w.ledger.balance(&REPORTER, STAKE), 0);
    }

    #[test]
    fn test_unrecorded_deposit_is_fraud() {
        let mut w = world(1);
        let forged = Transaction::Deposit {
            deposit_id: 42,
            output: Output::fungible([9; 20], Color(1), 1_000),
        };
        let (hash, built) = w.submit(GENESIS_HASH, 0, vec![forged]);
        let proof = built.inclusion_proof(hash, 0).unwrap();

        let outcome = w
            .engine
            .report_invalid_deposit(ctx!(w), &proof, None, REPORTER)
            .unwrap();
        assert_eq!(outcome.kind, FraudKind::InvalidDeposit);
        assert_eq!(outcome.slashed, 50);
        assert!(!w.graph.batch(&hash).unwrap().is_live());
    }

    #[test]
    fn test_recorded_deposit_is_not_fraud() {
        let mut w = world(1);
        let owner = [9; 20];
        w.ledger.fund(owner, Color(1), 100);
        let id = w
            .ledger
            .record_deposit(owner, Color(1), Asset::Fungible(100))
            .unwrap();
        let honest = Transaction::Deposit {
            deposit_id: id,
            output: Output::fungible(owner, Color(1), 100),
        };
        let (hash, built) = w.submit(GENESIS_HASH, 0, vec![honest]);
        let proof = built.inclusion_proof(hash, 0).unwrap();

        assert!(matches!(
            w.engine.report_invalid_deposit(ctx!(w), &proof, None, REPORTER),
            Err(FraudError::InvalidProof(_))
        ));
        assert_eq!(w.registry.stake_of(0), 100);
    }

    #[test]
    fn test_replayed_deposit_is_fraud() {
        let mut w = world(1);
        let owner = [9; 20];
        w.ledger.fund(owner, Color(1), 100);
        let id = w
            .ledger
            .record_deposit(owner, Color(1), Asset::Fungible(100))
            .unwrap();
        let deposit = Transaction::Deposit {
            deposit_id: id,
            output: Output::fungible(owner, Color(1), 100),
        };
        let (first, built_1) = w.submit(GENESIS_HASH, 0, vec![deposit.clone()]);
        let (second, built_2) = w.submit(first, 0, vec![deposit]);

        let earlier = built_1.inclusion_proof(first, 0).unwrap();
        let replay = built_2.inclusion_proof(second, 0).unwrap();

        // The earlier copy cannot be blamed on the later one.
        assert!(matches!(
            w.engine
                .report_invalid_deposit(ctx!(w), &earlier, Some(&replay), REPORTER),
            Err(FraudError::InvalidProof(_))
        ));
        let outcome = w
            .engine
            .report_invalid_deposit(ctx!(w), &replay, Some(&earlier), REPORTER)
            .unwrap();
        assert_eq!(outcome.invalidated, vec![second]);
        assert!(w.graph.batch(&first).unwrap().is_live());
    }

    #[test]
    fn test_height_conflict_slashes_once() {
        let mut w = world(1);
        let a = w.header(GENESIS_HASH, 0, [1; 32]);
        let b = w.header(GENESIS_HASH, 0, [2; 32]);

        let outcome = w
            .engine
            .report_height_conflict(ctx!(w), &a, &b, REPORTER)
            .unwrap();
        assert_eq!(outcome.slashed, 50);
        assert!(outcome.invalidated.is_empty());
        assert_eq!(w.registry.stake_of(0), 50);

        assert_eq!(
            w.engine.report_height_conflict(ctx!(w), &b, &a, REPORTER),
            Err(FraudError::AlreadyReported)
        );
        assert_eq!(w.registry.stake_of(0), 50);
    }

    #[test]
    fn test_height_conflict_needs_one_signer() {
        let mut w = world(2);
        let a = w.header(GENESIS_HASH, 0, [1; 32]);
        let mut b = w.header(GENESIS_HASH, 1, [2; 32]);
        b.slot_id = 0;

        assert!(matches!(
            w.engine.report_height_conflict(ctx!(w), &a, &b, REPORTER),
            Err(FraudError::InvalidProof(_))
        ));
        assert_eq!(w.registry.stake_of(0), 100);
    }
}
