use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("chain is empty")]
    EmptyChain,
    #[error("failed to encode block data: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
