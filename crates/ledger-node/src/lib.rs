//! Ledger node: HTTP transport, peer coordination and mining around a
//! `ledger_core::Ledger`.

pub mod api;
pub mod config;
mod constants;
pub mod messages;
pub mod miner;
pub mod peers;

pub use api::{build_router, ApiError, AppState};
pub use config::Args;
pub use miner::{MineError, Miner, SharedLedger};
pub use peers::{PeerClient, PeerError};
