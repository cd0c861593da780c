//! Auction flows across several epochs.

use pc_02_slot_registry::{BidOutcome, SlotError, SlotRegistry, SlotRegistryConfig};
use rand::Rng;
use shared_types::{Address, Color, InMemoryLedger};

const STAKE: Color = Color(0);

fn random_address() -> Address {
    rand::thread_rng().gen()
}

#[test]
fn owner_defends_slot_by_outbidding_queued_takeover() {
    let owner = random_address();
    let challenger = random_address();
    let mut ledger = InMemoryLedger::new();
    ledger.fund(owner, STAKE, 500);
    ledger.fund(challenger, STAKE, 500);

    let mut registry = SlotRegistry::new(SlotRegistryConfig::default(), 8);
    registry.bid(2, 100, owner, owner, &mut ledger).unwrap();
    registry.observe_tip(1);

    registry.bid(2, 150, challenger, challenger, &mut ledger).unwrap();
    assert_eq!(ledger.balance(&challenger, STAKE), 350);

    // Owner raises above the queued bid: takeover is displaced and refunded.
    assert_eq!(
        registry.bid(2, 200, owner, owner, &mut ledger),
        Ok(BidOutcome::StakeAdjusted)
    );
    assert_eq!(ledger.balance(&challenger, STAKE), 500);
    assert!(registry.slot(2).unwrap().pending.is_none());

    registry.observe_tip(12);
    assert_eq!(
        registry.activate(2, &mut ledger),
        Err(SlotError::NothingPending(2))
    );
}

#[test]
fn signer_rotation_is_queued_and_blocked_by_takeover() {
    let owner = random_address();
    let new_signer = random_address();
    let bidder = random_address();
    let mut ledger = InMemoryLedger::new();
    ledger.fund(owner, STAKE, 500);
    ledger.fund(bidder, STAKE, 500);

    let mut registry = SlotRegistry::new(SlotRegistryConfig::default(), 8);
    registry.bid(0, 100, owner, owner, &mut ledger).unwrap();
    registry.observe_tip(1);
    registry.bid(0, 120, bidder, bidder, &mut ledger).unwrap();

    // Rotation while a takeover is queued and not outbid.
    assert_eq!(
        registry.bid(0, 110, owner, new_signer, &mut ledger),
        Err(SlotError::TakeoverPending(0))
    );
    assert_eq!(ledger.balance(&owner, STAKE), 400, "rejected bid moved nothing");

    registry.observe_tip(8);
    registry.activate(0, &mut ledger).unwrap();
    assert_eq!(registry.slot(0).unwrap().owner, bidder);
    assert_eq!(ledger.balance(&owner, STAKE), 400);

    // The replaced owner's stake comes back once its signer stops binding.
    registry.observe_tip(12);
    registry.activate(0, &mut ledger).unwrap();
    assert_eq!(ledger.balance(&owner, STAKE), 500);
}

#[test]
fn vacant_slot_after_start_is_queued() {
    let bidder = random_address();
    let mut ledger = InMemoryLedger::new();
    ledger.fund(bidder, STAKE, 500);

    let mut registry = SlotRegistry::new(SlotRegistryConfig::default(), 8);
    registry.observe_tip(3);

    assert_eq!(
        registry.bid(1, 10, bidder, bidder, &mut ledger),
        Ok(BidOutcome::Queued { activation_epoch: 2 })
    );
    assert_eq!(
        registry.authorize_submission(1, bidder, 4),
        Err(SlotError::InertSlot(1))
    );

    registry.observe_tip(8);
    registry.activate(1, &mut ledger).unwrap();
    // Binds from epoch 3 (heights 13..=16).
    assert!(registry.authorize_submission(1, bidder, 13).is_ok());
}
