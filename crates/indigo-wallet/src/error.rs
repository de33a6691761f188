/// Keyring and wallet errors.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("identity already exists: {0}")]
    DuplicateIdentity(String),

    #[error("no key for verkey: {0}")]
    UnknownVerkey(String),

    #[error("key rotation already pending for {0}")]
    RotationAlreadyPending(String),

    #[error("no pending key rotation for {0}")]
    NoPendingRotation(String),

    #[error("link secret already exists: {0}")]
    DuplicateLinkSecret(String),

    #[error("secret already exists: {0}")]
    DuplicateSecret(String),

    #[error("unknown secret: {0}")]
    UnknownSecret(String),

    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),

    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("wallet already open: {0}")]
    WalletAlreadyOpen(String),

    #[error("access denied to wallet {0}")]
    AccessDenied(String),

    #[error("record not found: {record_type}/{id}")]
    RecordNotFound { record_type: String, id: String },

    #[error("record already exists: {record_type}/{id}")]
    DuplicateRecord { record_type: String, id: String },

    #[error("crypto error: {0}")]
    Crypto(#[from] indigo_crypto::CryptoError),

    #[error("core error: {0}")]
    Core(#[from] indigo_core::CoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
