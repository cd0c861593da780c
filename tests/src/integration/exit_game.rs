//! # Exit Game Scenarios
//!
//! A deposit split into two outputs, exits from both halves, a challenged
//! exit of the spent deposit, and the priority order exits finalize in.

#[cfg(test)]
mod tests {
    use crate::fixtures::{signed_transfer, user, Chain, NATIVE, TOKEN};
    use pc_03_chain_graph::GENESIS_HASH;
    use pc_05_exit_queue::{ExitError, ExitState};
    use proptest::prelude::*;
    use settlement_runtime::{ErrorCategory, SettlementError};
    use shared_types::{Outpoint, Output};

    const EXIT_DURATION: u64 = 100;
    const BOND: u128 = 10;

    #[test]
    fn test_split_deposit_pays_out_exactly_once() {
        let mut chain = Chain::new(&[100, 100]);
        let owner = user(0x41);
        let alice = user(0x42);
        let bob = user(0x43);

        let deposit = chain.deposit(owner.address(), 100);
        assert_eq!(chain.custody(TOKEN), 100);
        let d = chain.submit(0, GENESIS_HASH, vec![deposit.clone()]);

        let split = signed_transfer(
            &owner,
            Outpoint::new(deposit.hash(), 0),
            vec![
                Output::fungible(alice.address(), TOKEN, 50),
                Output::fungible(bob.address(), TOKEN, 50),
            ],
        );
        let s = chain.submit(0, d.hash, vec![split]);

        chain.fund(alice.address(), NATIVE, BOND);
        chain.fund(bob.address(), NATIVE, BOND);
        let proof = s.proof(0);
        let alice_exit = chain.settlement.start_exit(&proof, 0, alice.address()).unwrap();
        let bob_exit = chain.settlement.start_exit(&proof, 1, bob.address()).unwrap();
        assert_eq!(chain.settlement.exits().pending_len(), 2);

        chain.settlement.ledger_mut().advance_blocks(EXIT_DURATION);
        let next = chain.submit(1, s.hash, vec![]);
        assert_eq!(next.finalized.len(), 2);

        assert_eq!(chain.balance(&alice.address(), TOKEN), 50);
        assert_eq!(chain.balance(&bob.address(), TOKEN), 50);
        assert_eq!(chain.custody(TOKEN), 0);
        assert_eq!(chain.balance(&alice.address(), NATIVE), BOND);
        assert_eq!(chain.balance(&bob.address(), NATIVE), BOND);
        for utxo_id in [alice_exit, bob_exit] {
            assert_eq!(chain.settlement.exit(&utxo_id).unwrap().state, ExitState::Finalized);
        }

        // Nothing left to finalize, and the outputs cannot exit again.
        assert!(chain.settlement.finalize_top_exit(TOKEN).unwrap().is_none());
        chain.fund(alice.address(), NATIVE, BOND);
        let err = chain
            .settlement
            .start_exit(&proof, 0, alice.address())
            .unwrap_err();
        assert_eq!(err, SettlementError::Exit(ExitError::ExitExists(alice_exit)));
        assert_eq!(err.category(), ErrorCategory::State);
        assert_eq!(chain.custody(TOKEN), 0);
    }

    #[test]
    fn test_exit_of_spent_deposit_is_challenged() {
        let mut chain = Chain::new(&[100]);
        let owner = user(0x41);
        let alice = user(0x42);
        let challenger = [0xCC; 20];

        let deposit = chain.deposit(owner.address(), 100);
        let d = chain.submit(0, GENESIS_HASH, vec![deposit.clone()]);
        let split = signed_transfer(
            &owner,
            Outpoint::new(deposit.hash(), 0),
            vec![Output::fungible(alice.address(), TOKEN, 100)],
        );
        let s = chain.submit(0, d.hash, vec![split]);

        // The owner tries to exit the deposit it already spent.
        chain.fund(owner.address(), NATIVE, BOND);
        let stale = chain
            .settlement
            .start_exit(&d.proof(0), 0, owner.address())
            .unwrap();
        chain
            .settlement
            .challenge_exit(&s.proof(0), &d.proof(0), 0, 0, challenger)
            .unwrap();
        assert_eq!(chain.settlement.exit(&stale).unwrap().state, ExitState::Challenged);
        assert_eq!(chain.balance(&challenger, NATIVE), BOND);

        // The honest exit still pays out the full deposit.
        chain.fund(alice.address(), NATIVE, BOND);
        chain
            .settlement
            .start_exit(&s.proof(0), 0, alice.address())
            .unwrap();
        chain.settlement.ledger_mut().advance_blocks(EXIT_DURATION);
        let paid = chain.settlement.finalize_top_exit(TOKEN).unwrap().unwrap();
        assert_eq!(paid.paid_to, Some(alice.address()));
        assert_eq!(chain.balance(&alice.address(), TOKEN), 100);
        assert_eq!(chain.balance(&owner.address(), TOKEN), 0);
        assert_eq!(chain.custody(TOKEN), 0);
    }

    #[test]
    fn test_head_of_queue_blocks_later_priorities() {
        let mut chain = Chain::new(&[100]);
        let owner = user(0x41);
        chain.fund(owner.address(), NATIVE, 2 * BOND);

        let first = chain.deposit(owner.address(), 30);
        let second = chain.deposit(owner.address(), 20);
        let b1 = chain.submit(0, GENESIS_HASH, vec![first]);
        let b2 = chain.submit(0, b1.hash, vec![second]);

        // The lower-priority exit starts first.
        let late = chain
            .settlement
            .start_exit(&b2.proof(0), 0, owner.address())
            .unwrap();
        chain.settlement.ledger_mut().advance_blocks(10);
        let early = chain
            .settlement
            .start_exit(&b1.proof(0), 0, owner.address())
            .unwrap();

        // `late` is eligible but waits behind `early`.
        chain.settlement.ledger_mut().advance_blocks(EXIT_DURATION - 5);
        assert!(chain.settlement.finalize_top_exit(TOKEN).unwrap().is_none());
        assert_eq!(chain.settlement.exit(&late).unwrap().state, ExitState::Pending);

        chain.settlement.ledger_mut().advance_blocks(5);
        let order: Vec<_> = std::iter::from_fn(|| chain.settlement.finalize_top_exit(TOKEN).unwrap())
            .map(|exit| exit.utxo_id)
            .collect();
        assert_eq!(order, vec![early, late]);
        assert_eq!(chain.balance(&owner.address(), TOKEN), 50);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn proptest_exits_finalize_in_priority_order(
            start_order in (2usize..=6).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
        ) {
            let mut chain = Chain::new(&[100]);
            let owner = user(0x41);
            chain.fund(owner.address(), NATIVE, BOND * start_order.len() as u128);

            let mut parent = GENESIS_HASH;
            let mut batches = Vec::new();
            for i in 0..start_order.len() {
                let deposit = chain.deposit(owner.address(), 10 + i as u128);
                let batch = chain.submit(0, parent, vec![deposit]);
                parent = batch.hash;
                batches.push(batch);
            }
            for &i in &start_order {
                chain.settlement.start_exit(&batches[i].proof(0), 0, owner.address()).unwrap();
            }

            chain.settlement.ledger_mut().advance_blocks(EXIT_DURATION);
            let mut priorities = Vec::new();
            while let Some(done) = chain.settlement.finalize_top_exit(TOKEN).unwrap() {
                priorities.push(chain.settlement.exit(&done.utxo_id).unwrap().priority);
            }

            prop_assert_eq!(priorities.len(), start_order.len());
            prop_assert!(priorities.windows(2).all(|pair| pair[0] < pair[1]));
            prop_assert_eq!(chain.custody(TOKEN), 0);
        }
    }
}
