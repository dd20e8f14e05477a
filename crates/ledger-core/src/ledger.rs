//! The ledger engine: chain, pending pool and peer registry for one node.
//!
//! The engine never talks to the network. Peer snapshots are handed to
//! [`Ledger::reconcile`] by whoever fetched them, and broadcast decisions are
//! left to the caller.

use crate::{
    hash_block, meets_difficulty, now_millis, pow, Block, BlockData, LedgerError, Result,
    Transaction, REWARD_SENDER,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Base URL this node is reachable at. Never stored in the registry.
    pub node_url: String,
    /// Recipient of mining rewards.
    pub reward_address: String,
    pub mining_reward: f64,
}

/// Whole-node state as served to clients and peers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub chain: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
    #[serde(default)]
    pub node_url: String,
    #[serde(default)]
    pub network_nodes: Vec<String>,
}

/// What the next locally mined block would commit to.
#[derive(Clone, Debug, PartialEq)]
pub struct MiningTemplate {
    pub previous_hash: String,
    pub data: BlockData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionLookup {
    pub transaction: Option<Transaction>,
    pub block: Option<Block>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddressActivity {
    pub transactions: Vec<Transaction>,
    pub balance: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsensusOutcome {
    Replaced { length: usize },
    NoLongerChain,
    InvalidLongestChain { length: usize },
}

impl ConsensusOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, ConsensusOutcome::Replaced { .. })
    }
}

#[derive(Clone, Debug)]
pub struct Ledger {
    config: LedgerConfig,
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    network_nodes: Vec<String>,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            chain: vec![Block::genesis()],
            pending_transactions: vec![],
            network_nodes: vec![],
        }
    }

    pub fn node_url(&self) -> &str {
        &self.config.node_url
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn network_nodes(&self) -> &[String] {
        &self.network_nodes
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            chain: self.chain.clone(),
            pending_transactions: self.pending_transactions.clone(),
            node_url: self.config.node_url.clone(),
            network_nodes: self.network_nodes.clone(),
        }
    }

    pub fn last_block(&self) -> Result<&Block> {
        self.chain.last().ok_or(LedgerError::EmptyChain)
    }

    pub fn create_transaction(
        &self,
        amount: f64,
        sender: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Transaction {
        Transaction::new(amount, sender, recipient)
    }

    /// Reward paid to this node's address for mining a block.
    pub fn reward_transaction(&self) -> Transaction {
        Transaction::new(
            self.config.mining_reward,
            REWARD_SENDER,
            self.config.reward_address.clone(),
        )
    }

    /// Queue a transaction for the next block. Nothing is validated.
    /// Returns the index of the block expected to include it.
    pub fn add_to_pending(&mut self, transaction: Transaction) -> u64 {
        debug!(id = %transaction.transaction_id, "transaction added to pending pool");
        self.pending_transactions.push(transaction);
        self.tip_index() + 1
    }

    /// Append a block holding the whole pending pool, then empty the pool.
    pub fn create_block(&mut self, nonce: u64, hash: String, previous_hash: String) -> Block {
        let block = Block {
            index: self.chain.len() as u64 + 1,
            timestamp: now_millis(),
            transactions: std::mem::take(&mut self.pending_transactions),
            nonce,
            hash,
            previous_block_hash: previous_hash,
        };
        info!(
            index = block.index,
            nonce,
            txs = block.transactions.len(),
            "block created"
        );
        self.chain.push(block.clone());
        block
    }

    pub fn mining_template(&self) -> Result<MiningTemplate> {
        let last = self.last_block()?;
        Ok(MiningTemplate {
            previous_hash: last.hash.clone(),
            data: BlockData {
                index: last.index + 1,
                transactions: self.pending_transactions.clone(),
            },
        })
    }

    /// Run proof-of-work for the pending pool on the calling thread and append the block.
    pub fn mine_block(&mut self) -> Result<Block> {
        let template = self.mining_template()?;
        let nonce = pow::proof_of_work(&template.previous_hash, &template.data)?;
        let hash = hash_block(&template.previous_hash, nonce, &template.data)?;
        Ok(self.create_block(nonce, hash, template.previous_hash))
    }

    /// Append a peer's block if it links onto our tip. Proof-of-work is not checked.
    pub fn accept_external_block(&mut self, candidate: Block) -> bool {
        let Ok(last) = self.last_block() else {
            return false;
        };
        let correct_hash = candidate.previous_block_hash == last.hash;
        let correct_index = candidate.index == last.index + 1;
        if !(correct_hash && correct_index) {
            warn!(
                index = candidate.index,
                expected_index = last.index + 1,
                correct_hash,
                "external block rejected"
            );
            return false;
        }
        info!(index = candidate.index, hash = %candidate.hash, "external block accepted");
        self.chain.push(candidate);
        self.pending_transactions.clear();
        true
    }

    /// Longest-chain rule over peer snapshots, first one wins among equals.
    pub fn reconcile(&mut self, snapshots: Vec<LedgerSnapshot>) -> ConsensusOutcome {
        let mut max_length = self.chain.len();
        let mut longest: Option<LedgerSnapshot> = None;
        for snapshot in snapshots {
            if snapshot.chain.len() > max_length {
                max_length = snapshot.chain.len();
                longest = Some(snapshot);
            }
        }

        let Some(candidate) = longest else {
            debug!(length = self.chain.len(), "no longer chain among peers");
            return ConsensusOutcome::NoLongerChain;
        };
        if !chain_is_valid(&candidate.chain) {
            warn!(length = max_length, "longest peer chain is invalid, keeping local chain");
            return ConsensusOutcome::InvalidLongestChain { length: max_length };
        }

        info!(
            from = self.chain.len(),
            to = max_length,
            "local chain replaced by longer peer chain"
        );
        self.chain = candidate.chain;
        self.pending_transactions = candidate.pending_transactions;
        ConsensusOutcome::Replaced { length: max_length }
    }

    pub fn block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.chain.iter().find(|block| block.hash == hash)
    }

    pub fn transaction(&self, transaction_id: &str) -> TransactionLookup {
        for block in &self.chain {
            if let Some(tx) = block
                .transactions
                .iter()
                .find(|tx| tx.transaction_id == transaction_id)
            {
                return TransactionLookup {
                    transaction: Some(tx.clone()),
                    block: Some(block.clone()),
                };
            }
        }
        TransactionLookup {
            transaction: None,
            block: None,
        }
    }

    pub fn address_activity(&self, address: &str) -> AddressActivity {
        let mut transactions = Vec::new();
        let mut balance = 0.0;
        for tx in self.chain.iter().flat_map(|block| &block.transactions) {
            if tx.sender != address && tx.recipient != address {
                continue;
            }
            if tx.sender == address {
                balance -= tx.amount;
            }
            if tx.recipient == address {
                balance += tx.amount;
            }
            transactions.push(tx.clone());
        }
        AddressActivity {
            transactions,
            balance,
        }
    }

    /// Add a peer URL unless it is already known or is this node.
    pub fn register_node(&mut self, url: &str) -> bool {
        if url == self.config.node_url || self.network_nodes.iter().any(|n| n == url) {
            return false;
        }
        debug!(%url, "peer registered");
        self.network_nodes.push(url.to_string());
        true
    }

    /// Returns how many of `urls` were new.
    pub fn register_nodes<'a>(&mut self, urls: impl IntoIterator<Item = &'a str>) -> usize {
        urls.into_iter()
            .filter(|url| self.register_node(url))
            .count()
    }

    fn tip_index(&self) -> u64 {
        self.chain.last().map_or(0, |block| block.index)
    }
}

/// Genesis must be the sentinel, and every later block must link to its
/// predecessor and carry a hash meeting the difficulty prefix.
pub fn chain_is_valid(chain: &[Block]) -> bool {
    let Some(genesis) = chain.first() else {
        return false;
    };
    let mut valid = genesis.is_genesis();
    for pair in chain.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let proof_ok = hash_block(&prev.hash, cur.nonce, &cur.data())
            .map(|hash| meets_difficulty(&hash))
            .unwrap_or(false);
        let link_ok = cur.previous_block_hash == prev.hash;
        valid &= proof_ok && link_ok;
    }
    valid
}
