//! Shared harness for the scenario tests.

use pc_01_merkle_codec::{BatchBuilder, BuiltBatch};
use pc_05_exit_queue::FinalizedExit;
use settlement_runtime::{Settlement, SettlementConfig};
use shared_crypto::Secp256k1KeyPair;
use shared_types::{
    Address, Asset, Color, ColorKind, Hash, InMemoryLedger, Input, Outpoint, Output, SlotId, Transaction,
};

pub const ADMIN: Address = [0xAD; 20];
/// Stake, bond and reward color.
pub const NATIVE: Color = Color(0);
/// Color user deposits are made in.
pub const TOKEN: Color = Color(1);

/// A submitted batch and what it triggered.
pub struct Submitted {
    pub hash: Hash,
    pub batch: BuiltBatch,
    pub tip_changed: bool,
    pub finalized: Vec<FinalizedExit>,
}

impl Submitted {
    pub fn proof(&self, tx_index: u64) -> pc_01_merkle_codec::InclusionProof {
        self.batch.inclusion_proof(self.hash, tx_index).unwrap()
    }
}

pub struct Chain {
    pub settlement: Settlement<InMemoryLedger>,
    pub operators: Vec<Secp256k1KeyPair>,
}

impl Chain {
    /// One operator per entry of `stakes`, each bidding for the slot of its index.
    pub fn new(stakes: &[u128]) -> Self {
        Self::with_config(SettlementConfig::default(), stakes)
    }

    pub fn with_config(mut config: SettlementConfig, stakes: &[u128]) -> Self {
        config.merkle.tree_depth = 8;
        let operators: Vec<_> = (0..stakes.len())
            .map(|i| Secp256k1KeyPair::from_bytes([i as u8 + 1; 32]).unwrap())
            .collect();
        let mut ledger = InMemoryLedger::new();
        for (key, stake) in operators.iter().zip(stakes) {
            ledger.fund(key.address(), NATIVE, stake + 1_000);
        }

        let mut settlement = Settlement::new(config, ADMIN, ledger).unwrap();
        let native = settlement
            .register_color(ADMIN, [0x01; 20], ColorKind::Fungible)
            .unwrap();
        let token = settlement
            .register_color(ADMIN, [0x02; 20], ColorKind::Fungible)
            .unwrap();
        assert_eq!((native, token), (NATIVE, TOKEN));

        for (slot, (key, stake)) in operators.iter().zip(stakes).enumerate() {
            settlement
                .bid(slot as SlotId, *stake, key.address(), key.address())
                .unwrap();
        }
        Self { settlement, operators }
    }

    /// Build, sign and submit a batch on `parent` from `slot`.
    pub fn submit(&mut self, slot: SlotId, parent: Hash, txs: Vec<Transaction>) -> Submitted {
        let mut builder = BatchBuilder::new(&self.settlement.config().merkle).unwrap();
        for tx in txs {
            builder.push(tx).unwrap();
        }
        let batch = builder.build().unwrap();
        let height = self.settlement.batch(&parent).unwrap().height + 1;
        let signature = self.operators[slot as usize]
            .sign_hash(&batch.signing_hash(&parent, height))
            .unwrap();
        let receipt = self
            .settlement
            .submit_batch(parent, batch.merkle_root(), slot, &signature)
            .unwrap();
        Submitted {
            hash: receipt.outcome.hash,
            batch,
            tip_changed: receipt.outcome.tip_changed,
            finalized: receipt.finalized,
        }
    }

    pub fn fund(&mut self, account: Address, color: Color, amount: u128) {
        self.settlement.ledger_mut().fund(account, color, amount);
    }

    /// Fund `owner`, deposit `amount` of [`TOKEN`], and return the deposit transaction.
    pub fn deposit(&mut self, owner: Address, amount: u128) -> Transaction {
        self.fund(owner, TOKEN, amount);
        let deposit_id = self
            .settlement
            .deposit(owner, TOKEN, Asset::Fungible(amount))
            .unwrap();
        Transaction::Deposit {
            deposit_id,
            output: Output::fungible(owner, TOKEN, amount),
        }
    }

    pub fn balance(&self, account: &Address, color: Color) -> u128 {
        self.settlement.ledger().balance(account, color)
    }

    pub fn custody(&self, color: Color) -> u128 {
        self.settlement.ledger().custody_balance(color)
    }
}

pub fn user(seed: u8) -> Secp256k1KeyPair {
    Secp256k1KeyPair::from_bytes([seed; 32]).unwrap()
}

/// A transfer of `spent`, signed by its owner.
pub fn signed_transfer(owner: &Secp256k1KeyPair, spent: Outpoint, outputs: Vec<Output>) -> Transaction {
    let mut tx = Transaction::Transfer {
        inputs: vec![Input::unsigned(spent)],
        outputs,
    };
    let signature = owner.sign_hash(&tx.sighash()).unwrap();
    if let Transaction::Transfer { inputs, .. } = &mut tx {
        inputs[0].signature = signature;
    }
    tx
}
