//! Indigo Crypto: signing keys, sealed boxes, password hashing and the
//! BN254 signature, commitment and sigma-proof toolkit behind anonymous
//! credentials.

pub mod encryption;
pub mod error;
pub mod group;
pub mod hashing;
pub mod kdf;
pub mod keys;
pub mod pedersen;
pub mod ps;
pub mod range;
pub mod schnorr;
pub mod signing;
pub mod transcript;

pub use encryption::{
    aead_open, aead_seal, key_agreement, open_sealed, seal, x25519_public_key, SealedBox,
};
pub use error::CryptoError;
pub use group::{Point, Point2, Scalar, Secret};
pub use hashing::{hash, hash_parts, Hash};
pub use keys::{KeyPair, PublicKey};
pub use pedersen::{Commitment, Opening};
pub use ps::{SignatureProof, SignatureProver};
pub use range::RangeProof;
pub use schnorr::RepresentationProof;
pub use signing::{sign, verify, Signature};
pub use transcript::Transcript;
