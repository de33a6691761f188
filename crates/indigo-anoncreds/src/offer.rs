//! Credential offers and requests.

use serde::{Deserialize, Serialize};

use indigo_core::{CredDefId, Did, Nonce, SchemaId};
use indigo_crypto::group::{g1, G1};
use indigo_crypto::ps::VerifyingKey;
use indigo_crypto::{Point, RepresentationProof, Secret, Transcript};

use crate::credential::MessageLayout;

/// Issuer's single-use invitation to request a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialOffer {
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    pub nonce: Nonce,
}

/// Holder's answer to an offer: `L = t·g1 + s·Y_0`, hiding its link secret
/// `s` under the credential key's link-secret base, with a proof of
/// knowledge of `(t, s)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    pub prover_did: Did,
    pub cred_def_id: CredDefId,
    pub blinded_link_secret: Point,
    pub blinded_link_secret_proof: RepresentationProof,
    /// Echo of the offer nonce.
    pub nonce: Nonce,
}

impl CredentialRequest {
    pub(crate) fn transcript(prover_did: &Did, cred_def_id: &CredDefId, nonce: &Nonce) -> Transcript {
        let mut transcript = Transcript::new(b"indigo credential request v2");
        transcript.append_message(b"prover-did", prover_did.as_str().as_bytes());
        transcript.append_message(b"cred-def-id", cred_def_id.as_str().as_bytes());
        transcript.append_message(b"nonce", nonce.as_str().as_bytes());
        transcript
    }

    pub(crate) fn bases(key: &VerifyingKey) -> Option<[G1; 2]> {
        Some([g1(), key.commitment_base(MessageLayout::LINK_SECRET)?])
    }

    /// Check the proof of knowledge of the blinded link secret.
    pub fn verify_proof(&self, key: &VerifyingKey) -> bool {
        let Some(bases) = Self::bases(key) else {
            return false;
        };
        let mut transcript = Self::transcript(&self.prover_did, &self.cred_def_id, &self.nonce);
        self.blinded_link_secret_proof
            .verify(&mut transcript, &bases, &self.blinded_link_secret.0)
    }
}

/// Holder-local data needed to accept the credential. Never sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequestMetadata {
    pub link_secret_id: String,
    pub blinding: Secret,
    pub nonce: Nonce,
}
