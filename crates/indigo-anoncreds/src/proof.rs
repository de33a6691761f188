//! Proof structures shared by holder and verifier.
//!
//! A proof holds one sub-proof per credential used. Each sub-proof carries
//! a freshly re-randomized issuer signature with a proof of knowledge of
//! every message it does not reveal. Predicates on hidden attributes come
//! as a fresh commitment tied to the hidden message plus a range proof on
//! the distance to the bound. Revocable credentials add a fresh commitment
//! to the registry index with proofs that it is none of the revoked ones.
//! The link-secret response is identical in every sub-proof, which ties
//! them to one holder without exposing anything stable.
//!
//! Holder and verifier walk one transcript in the same order: the request
//! nonce, then per sub-proof its signature commitment, predicate
//! commitments by referent and the index commitment. The shared challenge
//! is drawn there, and range and exclusion proofs follow on the same
//! transcript, sub-proof by sub-proof.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use indigo_core::{CredDefId, Nonce, SchemaId};
use indigo_crypto::group::{g1, h1, Gt, Scalar, G1};
use indigo_crypto::ps::{Signature, SignatureProof};
use indigo_crypto::range::RangeProof;
use indigo_crypto::{Point, RepresentationProof, Secret, Transcript};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedAttribute {
    pub sub_proof_index: usize,
    pub raw: String,
    pub encoded: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnrevealedAttribute {
    pub sub_proof_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredicateResult {
    pub sub_proof_index: usize,
    pub satisfied: bool,
}

/// Predicate over a hidden attribute `m`: `commitment = m·g1 + ρ·h1`, the
/// response for `ρ`, and a range proof on the distance to the bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredicateProof {
    pub commitment: Point,
    pub z_blinding: Secret,
    pub range: RangeProof,
}

/// The hidden registry index is none of the revoked ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonRevocationProof {
    pub rev_reg_id: String,
    /// `index·g1 + ρ·h1`.
    pub commitment: Point,
    pub z_blinding: Secret,
    /// Revoked index → proof the commitment does not open to it.
    #[serde(default)]
    pub exclusions: BTreeMap<u32, RepresentationProof>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubProof {
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    /// Attribute name → encoded value, for revealed attributes only.
    #[serde(default)]
    pub revealed: BTreeMap<String, String>,
    pub signature_proof: SignatureProof,
    /// Predicate referent → proof, for predicates on hidden attributes.
    #[serde(default)]
    pub predicate_proofs: BTreeMap<String, PredicateProof>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revocation: Option<NonRevocationProof>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofData {
    pub sub_proofs: Vec<SubProof>,
    /// Shared challenge. Absent only when no credential is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<Secret>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    pub nonce: Nonce,
    #[serde(default)]
    pub revealed_attributes: BTreeMap<String, RevealedAttribute>,
    #[serde(default)]
    pub unrevealed_attributes: BTreeMap<String, UnrevealedAttribute>,
    #[serde(default)]
    pub self_attested_attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub predicate_results: BTreeMap<String, PredicateResult>,
    pub proof_data: ProofData,
}

pub(crate) const CHALLENGE_LABEL: &[u8] = b"presentation";

pub(crate) fn presentation_transcript(nonce: &Nonce, sub_proofs: usize) -> Transcript {
    let mut transcript = Transcript::new(b"indigo presentation v2");
    transcript.append_message(b"nonce", nonce.as_str().as_bytes());
    transcript.append_u64(b"sub-proofs", sub_proofs as u64);
    transcript
}

pub(crate) fn bind_signature(
    transcript: &mut Transcript,
    index: usize,
    schema_id: &SchemaId,
    cred_def_id: &CredDefId,
    signature: &Signature,
    revealed: &BTreeMap<String, String>,
    commitment: &Gt,
) {
    transcript.append_u64(b"sub-proof", index as u64);
    transcript.append_message(b"schema-id", schema_id.as_str().as_bytes());
    transcript.append_message(b"cred-def-id", cred_def_id.as_str().as_bytes());
    transcript.append_element(b"sigma1", &signature.sigma1.0);
    transcript.append_element(b"sigma2", &signature.sigma2.0);
    for (name, encoded) in revealed {
        transcript.append_message(b"revealed", name.as_bytes());
        transcript.append_message(b"encoded", encoded.as_bytes());
    }
    transcript.append_element(b"signature-commitment", commitment);
}

/// Bind a commitment `m·g1 + ρ·h1` whose `m` is a hidden signed message,
/// together with its nonce commitment.
pub(crate) fn bind_linked(
    transcript: &mut Transcript,
    label: &[u8],
    tag: &str,
    commitment: &G1,
    nonce_commitment: &G1,
) {
    transcript.append_message(label, tag.as_bytes());
    transcript.append_element(b"commitment", commitment);
    transcript.append_element(b"nonce-commitment", nonce_commitment);
}

/// Nonce commitment the responses imply for a linked commitment.
pub(crate) fn implied_link(commitment: &G1, z_message: Scalar, z_blinding: Scalar, challenge: Scalar) -> G1 {
    g1() * z_message + h1() * z_blinding - *commitment * challenge
}

pub(crate) fn bind_range(transcript: &mut Transcript, index: usize, referent: &str) {
    transcript.append_u64(b"range-sub-proof", index as u64);
    transcript.append_message(b"range", referent.as_bytes());
}
