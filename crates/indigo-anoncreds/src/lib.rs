//! Indigo AnonCreds: credential issuance bound to a holder's link secret,
//! and proofs that reveal chosen attributes, hide others and prove
//! numeric predicates without disclosing the value. Signatures are
//! re-randomized for every proof, so proofs cannot be linked to each other
//! or to issuance.

pub mod credential;
pub mod encoding;
pub mod error;
pub mod holder;
pub mod issuer;
pub mod offer;
pub mod proof;
pub mod proof_request;
pub mod revocation;
pub mod scheme;
pub mod verifier;

pub use credential::{Credential, CredentialSignature, MessageLayout};
pub use encoding::{credential_values, encode_attribute, AttributeValue, CredentialValues};
pub use error::CredentialError;
pub use holder::{
    CredentialHolder, CredentialInfo, CredentialsForProofRequest, RequestedAttribute,
    RequestedCredentials,
};
pub use issuer::CredentialIssuer;
pub use offer::{CredentialOffer, CredentialRequest, CredentialRequestMetadata};
pub use proof::{
    NonRevocationProof, PredicateProof, PredicateResult, Proof, ProofData, RevealedAttribute,
    SubProof, UnrevealedAttribute,
};
pub use proof_request::{AttributeInfo, PredicateInfo, PredicateType, ProofRequest, Restriction};
pub use revocation::{RevocationHandle, RevocationRegistry, RevocationStatusList};
pub use scheme::{scheme_for, CredentialScheme, RevocableScheme, StaticScheme};
pub use verifier::ProofVerifier;
