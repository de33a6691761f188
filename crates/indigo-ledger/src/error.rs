/// Ledger client and service errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("pool not configured: {0}")]
    PoolNotConfigured(String),

    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),

    #[error("ledger network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("ledger request timed out")]
    Timeout,

    #[error("transaction rejected: {0}")]
    RejectedTransaction(String),

    #[error("ledger request cancelled")]
    Cancelled,

    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),

    #[error("not found on ledger: {0}")]
    NotFound(String),

    #[error("invalid genesis transactions: {0}")]
    InvalidGenesis(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wallet error: {0}")]
    Wallet(#[from] indigo_wallet::WalletError),

    #[error("core error: {0}")]
    Core(#[from] indigo_core::CoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] indigo_crypto::CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    /// Transient failures that the client retries with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_))
    }
}
