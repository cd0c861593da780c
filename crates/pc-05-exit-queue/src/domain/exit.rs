//! Exit records.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_crypto::{keccak256_concat, recover_signer};
use shared_types::{Address, Asset, Color, Hash, Signature};

/// Exit order within a color: older outputs leave first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExitPriority {
    pub height: u64,
    pub tx_index: u64,
    pub output_index: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitState {
    Pending,
    /// Evicted by a spend proof, or its batch was invalidated.
    Challenged,
    Finalized,
}

/// Transferable claim on an exit's payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitReceipt {
    pub holder: Address,
    pub redeemed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    pub utxo_id: Hash,
    /// Owner of the exited output.
    pub owner: Address,
    /// Who is paid: the owner, or the buyer of a bought exit.
    pub beneficiary: Address,
    pub color: Color,
    pub asset: Asset,
    pub priority: ExitPriority,
    /// Batch the exited output was included in.
    pub batch_hash: Hash,
    /// Root block number the exit started at.
    pub started_at: u64,
    pub bond: u128,
    /// Who posted the bond and gets it back on finalization.
    pub bond_payer: Address,
    pub state: ExitState,
    pub receipt: Option<ExitReceipt>,
}

impl Exit {
    /// Whether this exit still blocks a new exit of the same output.
    pub fn is_live(&self) -> bool {
        self.state != ExitState::Challenged
    }

    pub fn eligible_at(&self, exit_duration: u64) -> u64 {
        self.started_at.saturating_add(exit_duration)
    }
}

/// Owner-signed permission for `buyer` to exit an output for `price`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitSale {
    pub utxo_id: Hash,
    pub price: u128,
    pub buyer: Address,
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
}

impl ExitSale {
    /// `keccak(utxo_id || price || buyer)`
    pub fn signing_hash(utxo_id: &Hash, price: u128, buyer: &Address) -> Hash {
        keccak256_concat(&[utxo_id, &price.to_be_bytes(), buyer])
    }

    /// Address that signed the sale, if the signature is well formed.
    pub fn seller(&self) -> Option<Address> {
        let hash = Self::signing_hash(&self.utxo_id, self.price, &self.buyer);
        recover_signer(&hash, &self.signature).ok()
    }
}

/// Result of a finalized exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizedExit {
    pub utxo_id: Hash,
    pub color: Color,
    pub asset: Asset,
    /// `None` when the payout is parked for a receipt holder.
    pub paid_to: Option<Address>,
}
