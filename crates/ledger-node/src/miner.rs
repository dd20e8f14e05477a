use crate::constants::MINING_RESTART_LIMIT;
use ledger_core::{hash_block, pow, Block, Ledger, LedgerError, MiningTemplate};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use thiserror::Error;
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinError,
};
use tracing::{debug, info};

pub type SharedLedger = Arc<RwLock<Ledger>>;

#[derive(Debug, Error)]
pub enum MineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("mining worker failed: {0}")]
    Worker(#[from] JoinError),
}

/// Runs proof-of-work off the async executor, one search at a time.
#[derive(Clone, Debug)]
pub struct Miner {
    cancel: Arc<AtomicBool>,
    running: Arc<Mutex<()>>,
    restart_limit: usize,
}

impl Default for Miner {
    fn default() -> Self {
        Self::with_restart_limit(MINING_RESTART_LIMIT)
    }
}

impl Miner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_restart_limit(restart_limit: usize) -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            running: Arc::new(Mutex::new(())),
            restart_limit,
        }
    }

    /// Stop any in-flight search and refuse new ones. Used on shutdown.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Mine the current pending pool into a new block.
    ///
    /// The ledger lock is released while searching. If the tip or the pending
    /// pool changed in the meantime the found nonce no longer fits, so the
    /// search restarts from a fresh template. After `restart_limit` restarts
    /// the last search runs under the write lock, holding off admissions until
    /// the block is committed. Returns `None` once cancelled.
    pub async fn mine(&self, ledger: &SharedLedger) -> Result<Option<Block>, MineError> {
        let _running = self.running.lock().await;
        for _ in 0..self.restart_limit {
            let template = ledger.read().await.mining_template()?;
            let Some((nonce, hash)) = self.search(&template).await? else {
                return Ok(None);
            };

            let mut ledger = ledger.write().await;
            if ledger.mining_template()? == template {
                let block = ledger.create_block(nonce, hash, template.previous_hash);
                return Ok(Some(block));
            }
            debug!(index = template.data.index, "ledger changed while mining, restarting search");
        }

        let mut ledger = ledger.write().await;
        debug!("mining with admissions held off");
        let template = ledger.mining_template()?;
        let Some((nonce, hash)) = self.search(&template).await? else {
            return Ok(None);
        };
        Ok(Some(ledger.create_block(nonce, hash, template.previous_hash)))
    }

    async fn search(&self, template: &MiningTemplate) -> Result<Option<(u64, String)>, MineError> {
        let cancel = Arc::clone(&self.cancel);
        let search = template.clone();
        let found = tokio::task::spawn_blocking(move || {
            pow::proof_of_work_until(&search.previous_hash, &search.data, &cancel)
        })
        .await??;
        let Some(nonce) = found else {
            info!(index = template.data.index, "mining cancelled");
            return Ok(None);
        };
        let hash = hash_block(&template.previous_hash, nonce, &template.data)?;
        Ok(Some((nonce, hash)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{chain_is_valid, LedgerConfig, Transaction};

    fn shared_ledger() -> SharedLedger {
        Arc::new(RwLock::new(Ledger::new(LedgerConfig {
            node_url: "http://localhost:3001".into(),
            reward_address: "miner".into(),
            mining_reward: 12.5,
        })))
    }

    #[tokio::test]
    async fn mines_pending_pool_into_block() {
        let ledger = shared_ledger();
        let tx = Transaction::new(5.0, "X", "Y");
        ledger.write().await.add_to_pending(tx.clone());

        let block = Miner::new().mine(&ledger).await.unwrap().unwrap();
        assert_eq!(block.index, 2);
        assert_eq!(block.transactions, vec![tx]);

        let ledger = ledger.read().await;
        assert!(ledger.pending_transactions().is_empty());
        assert!(chain_is_valid(ledger.chain()));
    }

    #[tokio::test]
    async fn cancelled_miner_leaves_ledger_untouched() {
        let ledger = shared_ledger();
        let miner = Miner::new();
        miner.cancel();

        assert_eq!(miner.mine(&ledger).await.unwrap(), None);
        assert_eq!(ledger.read().await.chain().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn steady_admissions_cannot_starve_the_miner() {
        let ledger = shared_ledger();
        let feeder = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                loop {
                    ledger
                        .write()
                        .await
                        .add_to_pending(Transaction::new(1.0, "A", "B"));
                    tokio::task::yield_now().await;
                }
            })
        };

        let block = Miner::with_restart_limit(1).mine(&ledger).await.unwrap().unwrap();
        feeder.abort();

        assert_eq!(block.index, 2);
        let ledger = ledger.read().await;
        assert_eq!(ledger.chain().len(), 2);
        assert!(chain_is_valid(ledger.chain()));
    }
}
