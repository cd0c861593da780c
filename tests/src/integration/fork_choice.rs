//! # Fork Choice Scenarios
//!
//! Three operators staked 4:1:3. A submits h1, B submits h2, then all three
//! race at h3 on top of h2. A's h3 arrives first and stays canonical until a
//! competing branch becomes strictly heavier.

#[cfg(test)]
mod tests {
    use crate::fixtures::Chain;
    use pc_03_chain_graph::{RewardPolicyKind, GENESIS_HASH};
    use settlement_runtime::SettlementConfig;
    use shared_types::Hash;

    const A: u32 = 0;
    const B: u32 = 1;
    const C: u32 = 2;

    #[test]
    fn test_constant_reward_flips_on_first_extension() {
        let mut chain = Chain::new(&[4, 1, 3]);
        let h1 = chain.submit(A, GENESIS_HASH, vec![]);
        let h2 = chain.submit(B, h1.hash, vec![]);
        let a3 = chain.submit(A, h2.hash, vec![]);
        let b3 = chain.submit(B, h2.hash, vec![]);
        let c3 = chain.submit(C, h2.hash, vec![]);

        assert!(a3.tip_changed);
        assert!(!b3.tip_changed);
        assert!(!c3.tip_changed);
        assert_eq!(chain.settlement.tip(), a3.hash);

        let b4 = chain.submit(B, b3.hash, vec![]);
        assert!(b4.tip_changed);
        assert_eq!(chain.settlement.tip(), b4.hash);
        assert_eq!(chain.settlement.tip_height(), 4);

        // Four blocks on B's branch in total; the tip follows every one.
        let mut head = b4.hash;
        for slot in [C, A, B] {
            let next = chain.submit(slot, head, vec![]);
            assert!(next.tip_changed);
            head = next.hash;
        }
        assert_eq!(chain.settlement.tip(), head);
        assert_eq!(chain.settlement.batch(&head).unwrap().weight, 7);
        assert!(chain.settlement.graph().is_ancestor(&b3.hash, &head));
        assert_eq!(chain.settlement.batch(&a3.hash).unwrap().weight, 3);
    }

    #[test]
    fn test_stake_weighted_ties_keep_first_seen() {
        let mut config = SettlementConfig::default();
        config.chain.reward_policy = RewardPolicyKind::StakeWeighted;
        config.chain.block_reward = 8;
        let mut chain = Chain::with_config(config, &[4, 1, 3]);

        let h1 = chain.submit(A, GENESIS_HASH, vec![]);
        let h2 = chain.submit(B, h1.hash, vec![]);
        let a3 = chain.submit(A, h2.hash, vec![]);
        let b3 = chain.submit(B, h2.hash, vec![]);
        let c3 = chain.submit(C, h2.hash, vec![]);

        let weight = |chain: &Chain, hash: Hash| chain.settlement.batch(&hash).unwrap().weight;
        assert_eq!(weight(&chain, a3.hash), 9);
        assert_eq!(weight(&chain, b3.hash), 6);
        assert_eq!(weight(&chain, c3.hash), 8);
        assert_eq!(chain.settlement.tip(), a3.hash);

        // 6 + 3 ties A's branch: the first-seen tip stays.
        let c4 = chain.submit(C, b3.hash, vec![]);
        assert_eq!(weight(&chain, c4.hash), 9);
        assert!(!c4.tip_changed);
        assert_eq!(chain.settlement.tip(), a3.hash);

        let c5 = chain.submit(C, c4.hash, vec![]);
        assert!(c5.tip_changed);
        assert_eq!(chain.settlement.tip(), c5.hash);
        assert!(chain.settlement.graph().is_ancestor(&b3.hash, &c5.hash));
        assert!(!chain.settlement.graph().is_canonical(&a3.hash));
    }
}
