//! Revocation registries, signed status lists and proofs that a hidden
//! registry index is not revoked.
//!
//! A credential signs its registry index as a hidden message. To show it
//! is still valid the holder commits to the index, `C = i·g1 + ρ·h1`, and
//! for every revoked `v` proves knowledge of `(a, b)` with
//! `g1 = a·(C - v·g1) + b·h1`. Such `a` exists only when `i ≠ v`.

use ark_ff::Field;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use indigo_core::{CredDefId, CredentialDefinition};
use indigo_crypto::group::{g1, h1, Scalar, G1};
use indigo_crypto::{PublicKey, RepresentationProof, Signature, Transcript};

use crate::error::CredentialError;

/// Position of a credential in a revocation registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationHandle {
    pub rev_reg_id: String,
    pub index: u32,
}

/// Issuer-side registry of revocation handles for one credential definition.
#[derive(Debug, Clone)]
pub struct RevocationRegistry {
    id: String,
    cred_def_id: CredDefId,
    max_cred_num: u32,
    issued: u32,
    revoked: BTreeSet<u32>,
}

impl RevocationRegistry {
    pub fn new(cred_def_id: &CredDefId, max_cred_num: u32) -> Self {
        Self {
            id: format!("{}:4:{}:CL_ACCUM:1", cred_def_id.issuer_did(), cred_def_id),
            cred_def_id: cred_def_id.clone(),
            max_cred_num,
            issued: 0,
            revoked: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cred_def_id(&self) -> &CredDefId {
        &self.cred_def_id
    }

    pub fn issued(&self) -> u32 {
        self.issued
    }

    /// Next free handle. Fails once `max_cred_num` handles are out.
    pub fn allocate(&mut self) -> Result<RevocationHandle, CredentialError> {
        if self.issued >= self.max_cred_num {
            return Err(CredentialError::RevocationRegistryFull(self.id.clone()));
        }
        self.issued += 1;
        Ok(RevocationHandle {
            rev_reg_id: self.id.clone(),
            index: self.issued,
        })
    }

    pub fn revoke(&mut self, index: u32) -> Result<(), CredentialError> {
        if index == 0 || index > self.issued {
            return Err(CredentialError::UnknownCredential(format!(
                "{} index {}",
                self.id, index
            )));
        }
        self.revoked.insert(index);
        Ok(())
    }

    pub fn revoked(&self) -> Vec<u32> {
        self.revoked.iter().copied().collect()
    }
}

/// Revoked indices of a registry at a point in time, signed with the
/// credential definition key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationStatusList {
    pub rev_reg_id: String,
    pub cred_def_id: CredDefId,
    pub revoked: Vec<u32>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub signature: String,
}

impl RevocationStatusList {
    pub fn signing_bytes(&self) -> Vec<u8> {
        let revoked: Vec<u8> = self.revoked.iter().flat_map(|i| i.to_be_bytes()).collect();
        let timestamp = self.timestamp.timestamp_micros().to_be_bytes();
        indigo_crypto::hash_parts(
            "indigo revocation status list v1",
            &[
                self.rev_reg_id.as_bytes(),
                self.cred_def_id.as_str().as_bytes(),
                &revoked,
                &timestamp,
            ],
        )
        .to_vec()
    }

    /// Signature check against the credential definition's key.
    pub fn verify(&self, cred_def: &CredentialDefinition) -> bool {
        if self.cred_def_id != cred_def.id {
            return false;
        }
        let Ok(signature) = Signature::from_bs58(&self.signature) else {
            return false;
        };
        let Ok(key) = PublicKey::from_verkey(cred_def.verkey()) else {
            return false;
        };
        indigo_crypto::verify(&self.signing_bytes(), &signature, &key).is_ok()
    }

    pub fn is_revoked(&self, index: u32) -> bool {
        self.revoked.contains(&index)
    }

    pub fn revoked_set(&self) -> BTreeSet<u32> {
        self.revoked.iter().copied().collect()
    }
}

fn excluded_base(commitment: &G1, revoked: u32) -> G1 {
    *commitment - g1() * Scalar::from(u64::from(revoked))
}

/// One proof per revoked index that `commitment = index·g1 + blinding·h1`
/// opens to something else.
pub(crate) fn prove_exclusions(
    transcript: &mut Transcript,
    commitment: &G1,
    index: u32,
    blinding: &Scalar,
    revoked: &BTreeSet<u32>,
) -> Result<BTreeMap<u32, RepresentationProof>, CredentialError> {
    let mut proofs = BTreeMap::new();
    for &value in revoked {
        let difference = Scalar::from(u64::from(index)) - Scalar::from(u64::from(value));
        let a = difference
            .inverse()
            .ok_or_else(|| CredentialError::CredentialRevoked(format!("index {}", index)))?;
        transcript.append_u64(b"excluded", u64::from(value));
        let proof = RepresentationProof::prove(
            transcript,
            &[excluded_base(commitment, value), h1()],
            &[a, -(a * blinding)],
            &g1(),
        )?;
        proofs.insert(value, proof);
    }
    Ok(proofs)
}

/// Exactly the `revoked` indices are excluded, each by a valid proof.
pub(crate) fn verify_exclusions(
    transcript: &mut Transcript,
    commitment: &G1,
    revoked: &BTreeSet<u32>,
    proofs: &BTreeMap<u32, RepresentationProof>,
) -> bool {
    if !proofs.keys().eq(revoked.iter()) {
        return false;
    }
    proofs.iter().all(|(&value, proof)| {
        transcript.append_u64(b"excluded", u64::from(value));
        proof.verify(transcript, &[excluded_base(commitment, value), h1()], &g1())
    })
}
