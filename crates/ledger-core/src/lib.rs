use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub mod constants;
pub mod error;
pub mod ledger;
pub mod pow;

pub use constants::*;
pub use error::{LedgerError, Result};
pub use ledger::{
    chain_is_valid, AddressActivity, ConsensusOutcome, Ledger, LedgerConfig, LedgerSnapshot,
    MiningTemplate, TransactionLookup,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub amount: f64,
    pub sender: String,
    pub recipient: String,
    /// Filled with a fresh id when a submitted transaction omits it.
    #[serde(default = "new_transaction_id")]
    pub transaction_id: String,
}

impl Transaction {
    pub fn new(amount: f64, sender: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            amount,
            sender: sender.into(),
            recipient: recipient.into(),
            transaction_id: new_transaction_id(),
        }
    }
}

/// Fresh identifier: a UUID rendered as 32 hex characters without separators.
pub fn new_transaction_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// The part of a block covered by its hash. Field order is the serialization order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockData {
    pub index: u64,
    pub transactions: Vec<Transaction>,
}

impl BlockData {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
    pub hash: String,
    pub previous_block_hash: String,
}

impl Block {
    /// Sentinel first block. Carries no proof-of-work.
    pub fn genesis() -> Self {
        Self {
            index: GENESIS_INDEX,
            timestamp: now_millis(),
            transactions: vec![],
            nonce: GENESIS_NONCE,
            hash: GENESIS_HASH.to_string(),
            previous_block_hash: GENESIS_PREVIOUS_HASH.to_string(),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.nonce == GENESIS_NONCE
            && self.hash == GENESIS_HASH
            && self.previous_block_hash == GENESIS_PREVIOUS_HASH
            && self.transactions.is_empty()
    }

    pub fn data(&self) -> BlockData {
        BlockData {
            index: self.index,
            transactions: self.transactions.clone(),
        }
    }
}

/// SHA-256 over `previous_hash`, the decimal nonce and the JSON of `data`, hex encoded.
pub fn hash_block(previous_hash: &str, nonce: u64, data: &BlockData) -> Result<String> {
    let encoded = data.encode()?;
    Ok(hash_encoded(previous_hash, nonce, &encoded))
}

pub(crate) fn hash_encoded(previous_hash: &str, nonce: u64, encoded_data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(nonce.to_string().as_bytes());
    hasher.update(encoded_data.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn meets_difficulty(hash: &str) -> bool {
    hash.starts_with(POW_PREFIX)
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
