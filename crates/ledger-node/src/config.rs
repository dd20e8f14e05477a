use crate::constants::{DEFAULT_LISTEN, DEFAULT_PEER_TIMEOUT_SECS};
use clap::Parser;
use ledger_core::{new_transaction_id, LedgerConfig, DEFAULT_MINING_REWARD};
use std::{net::SocketAddr, time::Duration};

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node")]
#[command(about = "Peer-replicated proof-of-work ledger node")]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:3001
    #[arg(long, default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// URL peers use to reach this node (defaults to http://<listen>)
    #[arg(long)]
    pub node_url: Option<String>,

    /// Address credited with mining rewards (defaults to a fresh random id)
    #[arg(long)]
    pub reward_address: Option<String>,

    /// Amount paid to the reward address per mined block
    #[arg(long, default_value_t = DEFAULT_MINING_REWARD)]
    pub mining_reward: f64,

    /// Timeout for each call to a peer, in seconds
    #[arg(long, default_value_t = DEFAULT_PEER_TIMEOUT_SECS)]
    pub peer_timeout_secs: u64,
}

impl Args {
    pub fn node_url(&self) -> String {
        self.node_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.listen))
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            node_url: self.node_url(),
            reward_address: self
                .reward_address
                .clone()
                .unwrap_or_else(new_transaction_id),
            mining_reward: self.mining_reward,
        }
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout_secs)
    }
}
