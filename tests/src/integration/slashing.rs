//! # Slashing Scenarios
//!
//! Fraud proofs and heartbeat challenges slash exactly the implicated slot.
//! Whatever the reporter is not paid stays in custody as treasury.

#[cfg(test)]
mod tests {
    use crate::fixtures::{Chain, NATIVE, TOKEN};
    use pc_01_merkle_codec::batch_signing_hash;
    use pc_03_chain_graph::GENESIS_HASH;
    use pc_04_fraud_proofs::{FraudKind, SignedHeader};
    use settlement_runtime::ErrorCategory;
    use shared_types::{Hash, Input, Outpoint, Output, Transaction};

    const REPORTER: [u8; 20] = [0xEE; 20];
    const CHALLENGER: [u8; 20] = [0xCC; 20];

    fn transfer(coin: Outpoint, to: [u8; 20]) -> Transaction {
        Transaction::Transfer {
            inputs: vec![Input::unsigned(coin)],
            outputs: vec![Output::fungible(to, TOKEN, 5)],
        }
    }

    fn header(chain: &Chain, slot: u32, parent: Hash, root: Hash) -> SignedHeader {
        let height = chain.settlement.batch(&parent).unwrap().height + 1;
        let signature = chain.operators[slot as usize]
            .sign_hash(&batch_signing_hash(&parent, height, &root))
            .unwrap();
        SignedHeader {
            parent_hash: parent,
            merkle_root: root,
            slot_id: slot,
            signature,
        }
    }

    #[test]
    fn test_double_spend_slashes_only_the_later_batch() {
        let mut chain = Chain::new(&[200, 200, 200]);
        let coin = Outpoint::new([5; 32], 0);
        let h1 = chain.submit(0, GENESIS_HASH, vec![transfer(coin, [1; 20])]);
        let h2 = chain.submit(1, h1.hash, vec![]);
        let h3 = chain.submit(2, h2.hash, vec![transfer(coin, [2; 20])]);
        let custody_before = chain.custody(NATIVE);

        let outcome = chain
            .settlement
            .report_double_spend(&h3.proof(0), &h1.proof(0), 0, 0, REPORTER)
            .unwrap();

        let penalty = chain.settlement.config().fraud.double_spend_penalty;
        assert_eq!(outcome.kind, FraudKind::DoubleSpend);
        assert_eq!(outcome.slashed, penalty);
        assert_eq!(outcome.invalidated, vec![h3.hash]);
        let stakes: Vec<_> = (0..3).map(|slot| chain.settlement.registry().stake_of(slot)).collect();
        assert_eq!(stakes, vec![200, 200, 200 - penalty]);

        assert_eq!(chain.balance(&REPORTER, NATIVE) + chain.settlement.treasury(), penalty);
        assert_eq!(chain.custody(NATIVE), custody_before - outcome.reporter_reward);
        assert_eq!(chain.settlement.tip(), h2.hash);

        // A second report against the same batch finds it already gone.
        let err = chain
            .settlement
            .report_double_spend(&h1.proof(0), &h3.proof(0), 0, 0, REPORTER)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Proof);
        assert_eq!(chain.settlement.treasury(), outcome.retained());
    }

    #[test]
    fn test_unrecorded_deposit_invalidates_batch_and_descendants() {
        let mut chain = Chain::new(&[200, 200]);
        let h1 = chain.submit(0, GENESIS_HASH, vec![]);
        let forged = Transaction::Deposit {
            deposit_id: 99,
            output: Output::fungible([7; 20], TOKEN, 1_000),
        };
        let h2 = chain.submit(1, h1.hash, vec![forged]);
        let h3 = chain.submit(0, h2.hash, vec![]);

        let outcome = chain
            .settlement
            .report_invalid_deposit(&h2.proof(0), None, REPORTER)
            .unwrap();
        assert_eq!(outcome.kind, FraudKind::InvalidDeposit);
        assert_eq!(outcome.slot_id, 1);
        assert_eq!(outcome.invalidated, vec![h2.hash, h3.hash]);
        assert_eq!(chain.settlement.registry().stake_of(0), 200);
        assert_eq!(
            chain.settlement.registry().stake_of(1),
            200 - chain.settlement.config().fraud.invalid_deposit_penalty
        );
        assert_eq!(chain.settlement.tip(), h1.hash);
    }

    #[test]
    fn test_replayed_deposit_slashes_the_replay() {
        let mut chain = Chain::new(&[200, 200]);
        let deposit = chain.deposit([0x41; 20], 40);
        let h1 = chain.submit(0, GENESIS_HASH, vec![deposit.clone()]);
        let h2 = chain.submit(1, h1.hash, vec![deposit]);

        let outcome = chain
            .settlement
            .report_invalid_deposit(&h2.proof(0), Some(&h1.proof(0)), REPORTER)
            .unwrap();
        assert_eq!(outcome.slot_id, 1);
        assert_eq!(chain.settlement.tip(), h1.hash);
        assert!(chain.settlement.batch(&h1.hash).unwrap().is_live());
    }

    #[test]
    fn test_height_conflict_is_reported_once() {
        let mut chain = Chain::new(&[200, 200]);
        let a = header(&chain, 0, GENESIS_HASH, [1; 32]);
        let b = header(&chain, 0, GENESIS_HASH, [2; 32]);

        let outcome = chain
            .settlement
            .report_height_conflict(&a, &b, REPORTER)
            .unwrap();
        assert_eq!(outcome.kind, FraudKind::HeightConflict);
        assert_eq!(outcome.slashed, 100);
        assert!(outcome.invalidated.is_empty());
        assert_eq!(chain.settlement.registry().stake_of(0), 100);
        assert_eq!(chain.settlement.registry().stake_of(1), 200);
        assert_eq!(chain.settlement.treasury(), 50);

        let err = chain
            .settlement
            .report_height_conflict(&b, &a, REPORTER)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::State);
        assert_eq!(chain.settlement.registry().stake_of(0), 100);
    }

    #[test]
    fn test_heartbeat_answered_then_missed() {
        let mut chain = Chain::new(&[200, 200, 200]);
        chain.fund(CHALLENGER, NATIVE, 20);

        // Slot 1 has no heartbeat in the tip batch.
        let h1 = chain.submit(0, GENESIS_HASH, vec![]);
        let absence = h1.batch.validator_proof(h1.hash, 1).unwrap();
        chain
            .settlement
            .challenge_heartbeat(1, CHALLENGER, &absence)
            .unwrap();

        let mut beat = Transaction::Heartbeat {
            slot_id: 1,
            nonce: 1,
            signature: [0; 65],
        };
        let signature = chain.operators[1].sign_hash(&beat.sighash()).unwrap();
        if let Transaction::Heartbeat { signature: slot, .. } = &mut beat {
            *slot = signature;
        }
        let h2 = chain.submit(1, h1.hash, vec![beat.clone()]);
        let presence = h2.batch.validator_proof(h2.hash, 1).unwrap();
        chain
            .settlement
            .respond_heartbeat(1, &h2.hash, &presence, &beat)
            .unwrap();
        assert_eq!(chain.settlement.registry().stake_of(1), 200);

        // Slot 2 is challenged at the new tip and never answers.
        let absence = h2.batch.validator_proof(h2.hash, 2).unwrap();
        let deadline = chain
            .settlement
            .challenge_heartbeat(2, CHALLENGER, &absence)
            .unwrap();
        let early = chain.settlement.timeout_heartbeat(2).unwrap_err();
        assert_eq!(early.category(), ErrorCategory::State);

        chain.settlement.ledger_mut().set_block_number(deadline);
        let penalty = chain.settlement.config().slots.heartbeat_penalty;
        assert_eq!(chain.settlement.timeout_heartbeat(2).unwrap(), penalty);
        assert_eq!(chain.settlement.registry().stake_of(2), 200 - penalty);
        assert_eq!(chain.balance(&CHALLENGER, NATIVE), 10 + penalty);
    }

    #[test]
    fn test_heartbeat_on_side_branch_does_not_answer() {
        let mut chain = Chain::new(&[200, 200]);
        chain.fund(CHALLENGER, NATIVE, 10);

        let h1 = chain.submit(0, GENESIS_HASH, vec![]);
        let absence = h1.batch.validator_proof(h1.hash, 1).unwrap();
        chain
            .settlement
            .challenge_heartbeat(1, CHALLENGER, &absence)
            .unwrap();

        let mut beat = Transaction::Heartbeat {
            slot_id: 1,
            nonce: 1,
            signature: [0; 65],
        };
        let signature = chain.operators[1].sign_hash(&beat.sighash()).unwrap();
        if let Transaction::Heartbeat { signature: slot, .. } = &mut beat {
            *slot = signature;
        }
        let h2 = chain.submit(0, h1.hash, vec![]);
        // Same weight as h2, so the first-seen tip stays and x2 is a side branch.
        let x2 = chain.submit(1, h1.hash, vec![beat.clone()]);
        assert!(!x2.tip_changed);
        assert_eq!(chain.settlement.tip(), h2.hash);

        let presence = x2.batch.validator_proof(x2.hash, 1).unwrap();
        let err = chain
            .settlement
            .respond_heartbeat(1, &x2.hash, &presence, &beat)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Proof);
        assert!(chain.settlement.registry().challenge(1).is_some());
        assert_eq!(chain.balance(&CHALLENGER, NATIVE), 0);
    }
}
