pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Leading hex characters a block hash must carry to satisfy proof-of-work.
pub const POW_PREFIX: &str = "0000";

/// Nonces tried between two checks of the cancellation flag.
pub const POW_CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Sender address reserved for mining rewards.
pub const REWARD_SENDER: &str = "00";
pub const DEFAULT_MINING_REWARD: f64 = 12.5;

pub const GENESIS_INDEX: u64 = 1;
pub const GENESIS_NONCE: u64 = 0;
pub const GENESIS_HASH: &str = "0";
pub const GENESIS_PREVIOUS_HASH: &str = "0";
