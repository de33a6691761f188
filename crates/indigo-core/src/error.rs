use crate::rotation::RotationState;

/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid rotation transition from {from} to {to}")]
    InvalidStateTransition {
        from: RotationState,
        to: RotationState,
    },

    #[error("invalid DID: {0}")]
    InvalidDid(String),

    #[error("invalid verkey: {0}")]
    InvalidVerkey(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid nonce: {0}")]
    InvalidNonce(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
