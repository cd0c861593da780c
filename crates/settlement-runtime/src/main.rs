//! # Settlement Runtime Demo
//!
//! Drives a small child chain against the in-memory ledger: one operator
//! slot, a deposit, a batch, an exit and its finalization. Prints the final
//! status as JSON.
//!
//! ```text
//! settlement-runtime [config.toml]
//! RUST_LOG=debug settlement-runtime
//! ```

use anyhow::{Context, Result};
use pc_01_merkle_codec::{BatchBuilder, BuiltBatch};
use settlement_runtime::{BatchReceipt, Settlement, SettlementConfig};
use shared_crypto::Secp256k1KeyPair;
use shared_types::{Asset, ColorKind, InMemoryLedger, Output, Transaction};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const ADMIN: [u8; 20] = [0xAD; 20];
const TOKEN: [u8; 20] = [0x70; 20];

fn load_config() -> Result<SettlementConfig> {
    match std::env::args().nth(1) {
        Some(path) => SettlementConfig::load(&path).with_context(|| format!("loading {path}")),
        None => {
            let mut config = SettlementConfig::default();
            config.apply_env().context("reading PC_* overrides")?;
            config.validate().context("validating default configuration")?;
            Ok(config)
        }
    }
}

fn submit(
    settlement: &mut Settlement<InMemoryLedger>,
    operator: &Secp256k1KeyPair,
    txs: Vec<Transaction>,
) -> Result<(BatchReceipt, BuiltBatch)> {
    let mut builder = BatchBuilder::new(&settlement.config().merkle)?;
    for tx in txs {
        builder.push(tx)?;
    }
    let built = builder.build()?;
    let parent = settlement.tip();
    let signature = operator.sign_hash(&built.signing_hash(&parent, settlement.tip_height() + 1))?;
    let receipt = settlement
        .submit_batch(parent, built.merkle_root(), 0, &signature)
        .context("submitting batch")?;
    Ok((receipt, built))
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config()?;
    let exit_duration = config.exits.exit_duration;
    let stake = config.slots.min_stake.max(100);

    let operator = Secp256k1KeyPair::from_bytes([0x01; 32])?;
    let alice = Secp256k1KeyPair::from_bytes([0x02; 32])?;

    let mut ledger = InMemoryLedger::new();
    ledger.fund(operator.address(), config.slots.stake_color, stake);
    ledger.fund(alice.address(), config.exits.bond_color, 100 + config.exits.exit_bond);

    let mut settlement = Settlement::new(config, ADMIN, ledger)?;
    let color = settlement.register_color(ADMIN, TOKEN, ColorKind::Fungible)?;
    settlement
        .bid(0, stake, operator.address(), operator.address())
        .context("bidding for slot 0")?;

    let mut deposits = Vec::new();
    for amount in [60u128, 40] {
        let deposit_id = settlement.deposit(alice.address(), color, Asset::Fungible(amount))?;
        deposits.push(Transaction::Deposit {
            deposit_id,
            output: Output::fungible(alice.address(), color, amount),
        });
    }
    let later = deposits.split_off(1);

    let (receipt, built) = submit(&mut settlement, &operator, deposits)?;
    let proof = built.inclusion_proof(receipt.outcome.hash, 0)?;
    let utxo_id = settlement.start_exit(&proof, 0, alice.address())?;
    info!("[runtime] demo exit {} started", hex::encode(utxo_id));

    settlement.ledger_mut().advance_blocks(exit_duration);
    let (receipt, _) = submit(&mut settlement, &operator, later)?;
    for exit in &receipt.finalized {
        info!(
            "[runtime] demo exit {} paid {:?} on {}",
            hex::encode(exit.utxo_id),
            exit.asset,
            exit.color
        );
    }

    println!("{}", serde_json::to_string_pretty(&settlement.status())?);
    Ok(())
}
