//! Fork choice over the batch arena.
//!
//! The canonical tip is the head of the heaviest branch, where weight is the
//! cumulative reward since genesis. A new batch only takes over the tip when
//! its weight is strictly greater, so the first-seen branch wins ties.

use std::collections::{BTreeMap, HashMap, HashSet};

use pc_01_merkle_codec::{batch_hash, batch_signing_hash};
use pc_02_slot_registry::SlotRegistry;
use shared_crypto::recover_signer;
use shared_types::{short_hex, Address, Hash, RootLedger, Signature, SlotId};
use tracing::{debug, info, warn};

use super::batch::{total_reward, BatchNode, BatchStatus, SlotCounter, GENESIS_HASH};
use super::error::{ChainError, ChainResult};
use super::reward::{RewardContext, RewardPolicy};
use crate::config::ChainGraphConfig;

/// Result of an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub hash: Hash,
    pub height: u64,
    pub reward: u128,
    pub tip_changed: bool,
}

/// Claim that the current tip heads a lighter branch than `heavy_head`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightBranchReport {
    /// Common ancestor of both heads.
    pub ancestor: Hash,
    pub heavy_head: Hash,
    pub light_head: Hash,
    /// Per-slot aggregates from `ancestor` (exclusive) to `heavy_head`.
    pub heavy_counters: Vec<SlotCounter>,
    /// Per-slot aggregates from `ancestor` (exclusive) to `light_head`.
    pub light_counters: Vec<SlotCounter>,
}

/// Arena of submitted batches with one canonical tip.
#[derive(Debug)]
pub struct ChainGraph {
    config: ChainGraphConfig,
    policy: Box<dyn RewardPolicy>,
    nodes: HashMap<Hash, BatchNode>,
    tip: Hash,
    next_sequence: u64,
    claimed: HashSet<Hash>,
}

impl ChainGraph {
    pub fn new(config: ChainGraphConfig) -> Self {
        let policy = config.build_policy();
        Self::with_policy(config, policy)
    }

    /// Use a custom reward curve instead of the configured one.
    pub fn with_policy(config: ChainGraphConfig, policy: Box<dyn RewardPolicy>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(GENESIS_HASH, BatchNode::genesis());
        Self {
            config,
            policy,
            nodes,
            tip: GENESIS_HASH,
            next_sequence: 1,
            claimed: HashSet::new(),
        }
    }

    pub fn config(&self) -> &ChainGraphConfig {
        &self.config
    }

    pub fn set_consensus_horizon(&mut self, horizon: u64) {
        self.config.consensus_horizon = horizon;
    }

    pub fn tip(&self) -> Hash {
        self.tip
    }

    pub fn tip_node(&self) -> &BatchNode {
        // The tip is always present in the arena.
        &self.nodes[&self.tip]
    }

    pub fn tip_height(&self) -> u64 {
        self.tip_node().height
    }

    pub fn batch(&self, hash: &Hash) -> Option<&BatchNode> {
        self.nodes.get(hash)
    }

    /// Number of batches in the arena, genesis and tombstones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Whether `ancestor` is `descendant` or one of its ancestors.
    pub fn is_ancestor(&self, ancestor: &Hash, descendant: &Hash) -> bool {
        let Some(target) = self.nodes.get(ancestor) else {
            return false;
        };
        let Some(mut current) = self.nodes.get(descendant) else {
            return false;
        };
        while current.height > target.height {
            match self.nodes.get(&current.parent_hash) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        current.hash == target.hash
    }

    /// Live and on the path from genesis to the tip.
    pub fn is_canonical(&self, hash: &Hash) -> bool {
        self.nodes.get(hash).is_some_and(BatchNode::is_live) && self.is_ancestor(hash, &self.tip)
    }

    /// Submit a batch on `parent_hash`, signed by the slot's signer.
    pub fn submit(
        &mut self,
        parent_hash: Hash,
        merkle_root: Hash,
        slot_id: SlotId,
        signature: &Signature,
        now: u64,
        registry: &mut SlotRegistry,
    ) -> ChainResult<SubmitOutcome> {
        let parent = self
            .nodes
            .get(&parent_hash)
            .filter(|node| node.is_live())
            .ok_or(ChainError::UnknownParent(parent_hash))?;
        let height = parent.height + 1;
        let parent_weight = parent.weight;

        let signer = recover_signer(&batch_signing_hash(&parent_hash, height, &merkle_root), signature)
            .map_err(|_| ChainError::InvalidSignature)?;
        let hash = batch_hash(&parent_hash, height, &merkle_root, signature);
        if self.nodes.contains_key(&hash) {
            return Err(ChainError::DuplicateBatch(hash));
        }

        registry.authorize_submission(slot_id, signer, height)?;

        let slot_stake = registry.stake_of(slot_id);
        let total_stake = registry
            .slots()
            .fold(0u128, |acc, slot| acc.saturating_add(slot.stake));
        let reward = self
            .policy
            .reward(&RewardContext {
                height,
                slot_stake,
                total_stake,
            })
            .min(self.config.reward_cap);
        let beneficiary = registry
            .slot(slot_id)
            .map(|slot| slot.owner)
            .unwrap_or(signer);

        let node = BatchNode {
            hash,
            parent_hash,
            height,
            merkle_root,
            slot_id,
            signer,
            beneficiary,
            submitted_at: now,
            reward,
            weight: parent_weight.saturating_add(reward),
            status: BatchStatus::Live,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        let tip_changed = node.weight > self.tip_node().weight;
        self.nodes.insert(hash, node);
        registry.record_submission(slot_id, height);

        if tip_changed {
            self.tip = hash;
            registry.observe_tip(height);
        }
        info!(
            "[pc-03] batch {} at height {} from slot {} (reward {}, tip {})",
            short_hex(&hash),
            height,
            slot_id,
            reward,
            if tip_changed { "moved" } else { "kept" }
        );

        Ok(SubmitOutcome {
            hash,
            height,
            reward,
            tip_changed,
        })
    }

    /// Per-slot counters from `ancestor` (exclusive) to `head` (inclusive).
    ///
    /// Every batch on the segment must be live.
    pub fn branch_counters(&self, ancestor: &Hash, head: &Hash) -> ChainResult<Vec<SlotCounter>> {
        let base = self
            .nodes
            .get(ancestor)
            .ok_or(ChainError::UnknownBatch(*ancestor))?;
        if !self.is_ancestor(ancestor, head) {
            return Err(ChainError::InvalidProof(format!(
                "{} does not descend from {}",
                short_hex(head),
                short_hex(ancestor)
            )));
        }

        let mut counters: BTreeMap<SlotId, SlotCounter> = BTreeMap::new();
        let mut current = self.nodes.get(head).ok_or(ChainError::UnknownBatch(*head))?;
        while current.height > base.height {
            if !current.is_live() {
                return Err(ChainError::InvalidProof(format!(
                    "batch {} on branch is not live",
                    short_hex(&current.hash)
                )));
            }
            let counter = counters.entry(current.slot_id).or_insert(SlotCounter {
                slot_id: current.slot_id,
                batches: 0,
                reward: 0,
            });
            counter.batches += 1;
            counter.reward = counter.reward.saturating_add(current.reward);
            current = self
                .nodes
                .get(&current.parent_hash)
                .ok_or(ChainError::UnknownBatch(current.parent_hash))?;
        }
        Ok(counters.into_values().collect())
    }

    /// Tombstone orphan branches below a deep canonical divergence point.
    ///
    /// Each orphan is pruned together with every live descendant; returns the
    /// number of batches tombstoned. `is_referenced` reports batches a live
    /// exit still points at, and any such batch in the subtree blocks the call.
    pub fn prune(
        &mut self,
        divergent_ancestor: &Hash,
        orphans: &[Hash],
        is_referenced: impl Fn(&Hash) -> bool,
    ) -> ChainResult<usize> {
        if !self.is_canonical(divergent_ancestor) {
            return Err(ChainError::NotCanonical(*divergent_ancestor));
        }
        let depth = self.tip_height() - self.nodes[divergent_ancestor].height;
        if depth < self.config.consensus_horizon {
            return Err(ChainError::NotYetEligible {
                depth,
                required: self.config.consensus_horizon,
            });
        }

        for orphan in orphans {
            let node = self
                .nodes
                .get(orphan)
                .ok_or(ChainError::UnknownBatch(*orphan))?;
            if !node.is_live() {
                return Err(ChainError::PruneRejected(format!(
                    "batch {} is not live",
                    short_hex(orphan)
                )));
            }
            if self.is_ancestor(orphan, &self.tip) {
                return Err(ChainError::PruneRejected(format!(
                    "batch {} is canonical",
                    short_hex(orphan)
                )));
            }
            if !self.is_ancestor(divergent_ancestor, orphan) || orphan == divergent_ancestor {
                return Err(ChainError::PruneRejected(format!(
                    "batch {} does not descend from the divergence point",
                    short_hex(orphan)
                )));
            }
        }

        // An orphan takes its whole live subtree with it, so no pruned batch
        // can end up under a later tip.
        let mut doomed: Vec<Hash> = self
            .nodes
            .values()
            .filter(|node| node.is_live() && orphans.iter().any(|orphan| self.is_ancestor(orphan, &node.hash)))
            .map(|node| node.hash)
            .collect();
        doomed.sort_unstable();
        if let Some(hash) = doomed.iter().find(|hash| is_referenced(hash)) {
            return Err(ChainError::ExitReferenced(*hash));
        }

        for hash in &doomed {
            if let Some(node) = self.nodes.get_mut(hash) {
                node.status = BatchStatus::Pruned;
            }
        }
        info!(
            "[pc-03] pruned {} batches under {} orphans below {}",
            doomed.len(),
            orphans.len(),
            short_hex(divergent_ancestor)
        );
        Ok(doomed.len())
    }

    /// Check a light-branch report without moving the tip.
    ///
    /// Returns the heavy and light branch totals.
    pub fn verify_light_branch(&self, report: &LightBranchReport) -> ChainResult<(u128, u128)> {
        let heavy = self.branch_counters(&report.ancestor, &report.heavy_head)?;
        let light = self.branch_counters(&report.ancestor, &report.light_head)?;

        if normalized(&report.heavy_counters) != heavy || normalized(&report.light_counters) != light {
            return Err(ChainError::InvalidProof(
                "branch counters do not match the graph".to_string(),
            ));
        }
        if report.light_head != self.tip {
            return Err(ChainError::NotTip);
        }

        let heavy_total = total_reward(&heavy);
        let light_total = total_reward(&light);
        if heavy_total <= light_total {
            return Err(ChainError::NotHeavier {
                heavy: heavy_total,
                light: light_total,
            });
        }

        Ok((heavy_total, light_total))
    }

    /// Move the tip to a strictly heavier branch; returns the new tip.
    pub fn report_light_branch(
        &mut self,
        report: &LightBranchReport,
        registry: &mut SlotRegistry,
    ) -> ChainResult<Hash> {
        let (heavy_total, light_total) = self.verify_light_branch(report)?;
        self.tip = report.heavy_head;
        let height = self.tip_height();
        registry.observe_tip(height);
        warn!(
            "[pc-03] light branch reported: tip moved {} -> {} ({} > {})",
            short_hex(&report.light_head),
            short_hex(&report.heavy_head),
            heavy_total,
            light_total
        );
        Ok(self.tip)
    }

    /// Mint the reward of a final canonical batch to its beneficiary.
    ///
    /// `ancestry` lists descendants of `batch_hash`, child first, ending at a
    /// canonical batch at least `finality_depth` below the tip.
    pub fn claim_reward(
        &mut self,
        batch_hash: &Hash,
        ancestry: &[Hash],
        claimant: Address,
        ledger: &mut dyn RootLedger,
    ) -> ChainResult<u128> {
        let node = self
            .nodes
            .get(batch_hash)
            .ok_or(ChainError::UnknownBatch(*batch_hash))?;
        if !self.is_canonical(batch_hash) {
            return Err(ChainError::NotCanonical(*batch_hash));
        }
        if self.claimed.contains(batch_hash) {
            return Err(ChainError::AlreadyClaimed(*batch_hash));
        }
        if *batch_hash == GENESIS_HASH || node.beneficiary != claimant {
            return Err(ChainError::NotBeneficiary(*batch_hash));
        }

        let mut anchor = node;
        for link in ancestry {
            let next = self
                .nodes
                .get(link)
                .ok_or(ChainError::UnknownBatch(*link))?;
            if next.parent_hash != anchor.hash {
                return Err(ChainError::InvalidProof(format!(
                    "{} is not a child of {}",
                    short_hex(link),
                    short_hex(&anchor.hash)
                )));
            }
            anchor = next;
        }
        if !self.is_canonical(&anchor.hash) {
            return Err(ChainError::NotCanonical(anchor.hash));
        }
        let depth = self.tip_height() - anchor.height;
        if depth < self.config.finality_depth {
            return Err(ChainError::NotYetEligible {
                depth,
                required: self.config.finality_depth,
            });
        }

        let reward = node.reward;
        ledger.mint(claimant, self.config.reward_color, reward)?;
        self.claimed.insert(*batch_hash);
        info!(
            "[pc-03] reward {} for batch {} paid to 0x{}",
            reward,
            short_hex(batch_hash),
            short_hex(&claimant)
        );
        Ok(reward)
    }

    /// Mark a batch and all its descendants Invalid.
    ///
    /// If the tip is among them it rolls back to the batch's parent.
    pub fn invalidate(&mut self, batch_hash: &Hash) -> ChainResult<Vec<Hash>> {
        let node = self
            .nodes
            .get(batch_hash)
            .ok_or(ChainError::UnknownBatch(*batch_hash))?;
        if *batch_hash == GENESIS_HASH {
            return Err(ChainError::UnknownBatch(*batch_hash));
        }
        if !node.is_live() {
            return Err(ChainError::AlreadyInvalid(*batch_hash));
        }
        let parent_hash = node.parent_hash;

        let doomed: Vec<Hash> = self
            .nodes
            .values()
            .filter(|candidate| candidate.is_live() && self.is_ancestor(batch_hash, &candidate.hash))
            .map(|candidate| candidate.hash)
            .collect();

        let tip_hit = doomed.contains(&self.tip);
        for hash in &doomed {
            if let Some(node) = self.nodes.get_mut(hash) {
                node.status = BatchStatus::Invalid;
            }
        }
        if tip_hit {
            self.tip = parent_hash;
        }

        warn!(
            "[pc-03] invalidated {} batches from {}{}",
            doomed.len(),
            short_hex(batch_hash),
            if tip_hit { ", tip rolled back" } else { "" }
        );
        debug!("[pc-03] tip now {}", short_hex(&self.tip));
        Ok(doomed)
    }
}

fn normalized(counters: &[SlotCounter]) -> Vec<SlotCounter> {
    let mut merged: BTreeMap<SlotId, SlotCounter> = BTreeMap::new();
    for counter in counters.iter().filter(|c| c.batches > 0) {
        let entry = merged.entry(counter.slot_id).or_insert(SlotCounter {
            slot_id: counter.slot_id,
            batches: 0,
            reward: 0,
        });
        entry.batches += counter.batches;
        entry.reward = entry.reward.saturating_add(counter.reward);
    }
    merged.into_values().collect()
}
