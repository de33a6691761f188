//! Indigo Core: identifiers, ledger object model, key-rotation states and
//! client configuration shared by every Indigo crate.

pub mod config;
pub mod error;
pub mod objects;
pub mod rotation;
pub mod types;

pub use config::{ClientConfig, LoggingConfig, PoolSection, RetryPolicy};
pub use error::CoreError;
pub use objects::{
    CredentialDefinition, CredentialDefinitionValue, PrimaryKey, RevocationConfig, Schema,
};
pub use rotation::{RotationEvent, RotationState, RotationStateMachine};
pub use types::{CredDefId, Did, Nonce, Role, SchemaId, Verkey};
