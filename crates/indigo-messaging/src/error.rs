/// Secure channel errors.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("message has no recipients")]
    NoRecipients,

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("wallet error: {0}")]
    Wallet(#[from] indigo_wallet::WalletError),

    #[error("crypto error: {0}")]
    Crypto(#[from] indigo_crypto::CryptoError),

    #[error("core error: {0}")]
    Core(#[from] indigo_core::CoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
