use indigo_core::CoreError;

/// Credential issuance, storage, proof and verification errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("attribute mismatch: {0}")]
    AttributeMismatch(String),

    #[error("unknown schema: {0}")]
    UnknownSchema(String),

    #[error("unknown credential definition: {0}")]
    UnknownCredDef(String),

    #[error("credential definition already exists: {0}")]
    DuplicateCredDef(String),

    #[error("unknown or already used offer: {0}")]
    UnknownOffer(String),

    #[error("invalid credential request: {0}")]
    InvalidCredentialRequest(String),

    #[error("invalid credential signature: {0}")]
    InvalidCredentialSignature(String),

    #[error("unknown credential: {0}")]
    UnknownCredential(String),

    #[error("unknown revocation registry: {0}")]
    UnknownRevocationRegistry(String),

    #[error("revocation registry full: {0}")]
    RevocationRegistryFull(String),

    #[error("invalid revocation status: {0}")]
    InvalidRevocationStatus(String),

    #[error("credential revoked: {0}")]
    CredentialRevoked(String),

    #[error("invalid proof request: {0}")]
    InvalidProofRequest(String),

    #[error("invalid requested credentials: {0}")]
    InvalidRequestedCredentials(String),

    #[error("predicate not satisfied: {0}")]
    PredicateNotSatisfied(String),

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("core error: {0}")]
    Core(CoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] indigo_crypto::CryptoError),

    #[error("wallet error: {0}")]
    Wallet(#[from] indigo_wallet::WalletError),

    #[error("ledger error: {0}")]
    Ledger(#[from] indigo_ledger::LedgerError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CoreError> for CredentialError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::InvalidSchema(message) => CredentialError::InvalidSchema(message),
            other => CredentialError::Core(other),
        }
    }
}
