pub(crate) const DEFAULT_LISTEN: &str = "127.0.0.1:3001";
pub(crate) const DEFAULT_PEER_TIMEOUT_SECS: u64 = 30;
/// Optimistic mining attempts before the miner locks out admissions.
pub(crate) const MINING_RESTART_LIMIT: usize = 3;
