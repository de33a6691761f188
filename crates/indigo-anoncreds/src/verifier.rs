use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};

use indigo_core::{CredDefId, CredentialDefinition, Schema, SchemaId};
use indigo_crypto::ps::VerifyingKey;
use indigo_crypto::Scalar;

use crate::credential::{self, MessageLayout};
use crate::encoding::{encode_attribute, encoded_to_scalar, AttributeValue};
use crate::error::CredentialError;
use crate::proof::{
    bind_linked, bind_range, bind_signature, implied_link, presentation_transcript, Proof,
    SubProof, CHALLENGE_LABEL,
};
use crate::proof_request::{restrictions_match, ProofRequest, Restriction};
use crate::revocation::{verify_exclusions, RevocationStatusList};
use crate::scheme::scheme_for;

/// Why a proof was rejected.
type Verdict = Result<(), String>;

macro_rules! reject {
    ($($arg:tt)*) => {
        return Ok(Err(format!($($arg)*)))
    };
}

/// What one sub-proof is checked against.
struct SubProofContext {
    key: VerifyingKey,
    layout: MessageLayout,
    revealed: BTreeMap<usize, Scalar>,
    status: Option<RevocationStatusList>,
}

/// Checks proofs against proof requests.
///
/// Proofs using revocable credentials verify only when a status list for
/// their revocation registry has been supplied.
#[derive(Default)]
pub struct ProofVerifier {
    revocation: DashMap<String, RevocationStatusList>,
}

impl ProofVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_revocation_status(self, status: RevocationStatusList) -> Self {
        self.add_revocation_status(status);
        self
    }

    /// Replace the status list held for `status.rev_reg_id`.
    pub fn add_revocation_status(&self, status: RevocationStatusList) {
        tracing::debug!(
            rev_reg_id = %status.rev_reg_id,
            revoked = status.revoked.len(),
            "revocation status updated"
        );
        self.revocation.insert(status.rev_reg_id.clone(), status);
    }

    /// `Ok(false)` when the proof does not answer the request; `Err` only
    /// when the request is malformed or a referenced schema or credential
    /// definition is missing from the maps.
    pub fn verify(
        &self,
        request: &ProofRequest,
        proof: &Proof,
        schemas: &HashMap<SchemaId, Schema>,
        cred_defs: &HashMap<CredDefId, CredentialDefinition>,
    ) -> Result<bool, CredentialError> {
        request.validate()?;
        match self.evaluate(request, proof, schemas, cred_defs)? {
            Ok(()) => {
                tracing::info!(
                    proof_request = %request.name,
                    sub_proofs = proof.proof_data.sub_proofs.len(),
                    "proof verified"
                );
                Ok(true)
            }
            Err(reason) => {
                tracing::warn!(proof_request = %request.name, reason = %reason, "proof rejected");
                Ok(false)
            }
        }
    }

    /// [`verify`](Self::verify) for a proof received as JSON.
    pub fn verify_json(
        &self,
        request: &ProofRequest,
        proof_json: &str,
        schemas: &HashMap<SchemaId, Schema>,
        cred_defs: &HashMap<CredDefId, CredentialDefinition>,
    ) -> Result<bool, CredentialError> {
        let proof: Proof = serde_json::from_str(proof_json)
            .map_err(|e| CredentialError::MalformedProof(e.to_string()))?;
        self.verify(request, &proof, schemas, cred_defs)
    }

    fn evaluate(
        &self,
        request: &ProofRequest,
        proof: &Proof,
        schemas: &HashMap<SchemaId, Schema>,
        cred_defs: &HashMap<CredDefId, CredentialDefinition>,
    ) -> Result<Verdict, CredentialError> {
        if proof.nonce != request.nonce {
            reject!("nonce does not match the request");
        }
        if let Err(reason) = check_referents(request, proof) {
            return Ok(Err(reason));
        }

        let sub_proofs = &proof.proof_data.sub_proofs;
        let mut contexts = Vec::with_capacity(sub_proofs.len());
        for (index, sub_proof) in sub_proofs.iter().enumerate() {
            let schema = schemas
                .get(&sub_proof.schema_id)
                .ok_or_else(|| CredentialError::UnknownSchema(sub_proof.schema_id.to_string()))?;
            let cred_def = cred_defs
                .get(&sub_proof.cred_def_id)
                .ok_or_else(|| CredentialError::UnknownCredDef(sub_proof.cred_def_id.to_string()))?;
            match self.context(sub_proof, schema, cred_def)? {
                Ok(context) => contexts.push(context),
                Err(reason) => reject!("sub-proof {}: {}", index, reason),
            }
        }

        for (referent, attribute) in &proof.revealed_attributes {
            let info = &request.requested_attributes[referent];
            let Some(sub_proof) = sub_proofs.get(attribute.sub_proof_index) else {
                reject!("{} points at a missing sub-proof", referent);
            };
            if !restrictions_hold(&info.restrictions, sub_proof) {
                reject!("{} violates its restrictions", referent);
            }
            if encode_attribute(&attribute.raw) != attribute.encoded {
                reject!("{} is not encoded canonically", referent);
            }
            if sub_proof.revealed.get(&info.name) != Some(&attribute.encoded) {
                reject!("{} is not revealed by its sub-proof", referent);
            }
        }
        for (index, sub_proof) in sub_proofs.iter().enumerate() {
            for name in sub_proof.revealed.keys() {
                let claimed = proof.revealed_attributes.iter().any(|(referent, attribute)| {
                    attribute.sub_proof_index == index
                        && request.requested_attributes[referent].name == *name
                });
                if !claimed {
                    reject!("sub-proof {} reveals unrequested attribute {}", index, name);
                }
            }
        }

        for (referent, attribute) in &proof.unrevealed_attributes {
            let info = &request.requested_attributes[referent];
            let (Some(sub_proof), Some(context)) = (
                sub_proofs.get(attribute.sub_proof_index),
                contexts.get(attribute.sub_proof_index),
            ) else {
                reject!("{} points at a missing sub-proof", referent);
            };
            if !restrictions_hold(&info.restrictions, sub_proof) {
                reject!("{} violates its restrictions", referent);
            }
            if context.layout.attribute_index(&info.name).is_none() {
                reject!("{} is not an attribute of its credential", referent);
            }
        }

        for (referent, result) in &proof.predicate_results {
            let info = &request.requested_predicates[referent];
            if !result.satisfied {
                reject!("{} is marked unsatisfied", referent);
            }
            let (Some(sub_proof), Some(context)) = (
                sub_proofs.get(result.sub_proof_index),
                contexts.get(result.sub_proof_index),
            ) else {
                reject!("{} points at a missing sub-proof", referent);
            };
            if !restrictions_hold(&info.restrictions, sub_proof) {
                reject!("{} violates its restrictions", referent);
            }
            if context.layout.attribute_index(&info.name).is_none() {
                reject!("{} is not an attribute of its credential", referent);
            }
            if sub_proof.revealed.contains_key(&info.name) {
                // Revealed values are compared in the clear.
                let raw = proof
                    .revealed_attributes
                    .iter()
                    .find(|(r, a)| {
                        a.sub_proof_index == result.sub_proof_index
                            && request.requested_attributes[*r].name == info.name
                    })
                    .map(|(_, a)| a.raw.clone());
                let value = raw.and_then(|raw| AttributeValue::new(raw).as_integer());
                if !value.map(|v| info.is_satisfied_by(v)).unwrap_or(false) {
                    reject!("revealed value does not satisfy {}", referent);
                }
                if sub_proof.predicate_proofs.contains_key(referent) {
                    reject!("{} carries a range proof for a revealed value", referent);
                }
            } else if !sub_proof.predicate_proofs.contains_key(referent) {
                reject!("{} has no range proof", referent);
            }
        }
        for (index, sub_proof) in sub_proofs.iter().enumerate() {
            for referent in sub_proof.predicate_proofs.keys() {
                let claimed = proof.predicate_results.get(referent).map(|r| r.sub_proof_index);
                if claimed != Some(index) {
                    reject!("range proof {} in sub-proof {} is not claimed", referent, index);
                }
            }
        }

        let challenge = match (&proof.proof_data.challenge, sub_proofs.is_empty()) {
            (None, true) => return Ok(Ok(())),
            (Some(challenge), false) => challenge.0,
            _ => reject!("challenge does not match the sub-proofs"),
        };

        let mut transcript = presentation_transcript(&proof.nonce, sub_proofs.len());
        let mut link_response = None;
        for (index, (sub_proof, context)) in sub_proofs.iter().zip(&contexts).enumerate() {
            let signature = &sub_proof.signature_proof;
            let Some(implied) = signature.implied_commitment(&context.key, &context.revealed, &challenge)
            else {
                reject!("sub-proof {} does not cover its messages", index);
            };
            bind_signature(
                &mut transcript,
                index,
                &sub_proof.schema_id,
                &sub_proof.cred_def_id,
                &signature.signature,
                &sub_proof.revealed,
                &implied,
            );

            let Some(z_link) = signature.response(MessageLayout::LINK_SECRET) else {
                reject!("sub-proof {} reveals the link secret", index);
            };
            if *link_response.get_or_insert(z_link) != z_link {
                reject!("credentials are not bound to one link secret");
            }

            for (referent, predicate) in &sub_proof.predicate_proofs {
                let info = &request.requested_predicates[referent];
                let Some(z_message) = context
                    .layout
                    .attribute_index(&info.name)
                    .and_then(|i| signature.response(i))
                else {
                    reject!("predicate {} is not on a hidden attribute", referent);
                };
                let commitment = predicate.commitment.0;
                let nonce = implied_link(&commitment, z_message, predicate.z_blinding.0, challenge);
                bind_linked(&mut transcript, b"predicate", referent, &commitment, &nonce);
            }
            if let Some(non_revocation) = &sub_proof.non_revocation {
                let Some(z_index) = context
                    .layout
                    .revocation_index()
                    .and_then(|i| signature.response(i))
                else {
                    reject!("sub-proof {} does not hide its revocation index", index);
                };
                let commitment = non_revocation.commitment.0;
                let nonce = implied_link(&commitment, z_index, non_revocation.z_blinding.0, challenge);
                bind_linked(
                    &mut transcript,
                    b"non-revocation",
                    &non_revocation.rev_reg_id,
                    &commitment,
                    &nonce,
                );
            }
        }
        if transcript.challenge_scalar(CHALLENGE_LABEL) != challenge {
            reject!("signature proofs do not verify");
        }

        for (index, (sub_proof, context)) in sub_proofs.iter().zip(&contexts).enumerate() {
            for (referent, predicate) in &sub_proof.predicate_proofs {
                let info = &request.requested_predicates[referent];
                bind_range(&mut transcript, index, referent);
                let distance = info.distance_commitment(&predicate.commitment.0);
                if !predicate.range.verify(&mut transcript, &distance) {
                    reject!("range proof for {} does not verify", referent);
                }
            }
            if let (Some(non_revocation), Some(status)) = (&sub_proof.non_revocation, &context.status) {
                if !verify_exclusions(
                    &mut transcript,
                    &non_revocation.commitment.0,
                    &status.revoked_set(),
                    &non_revocation.exclusions,
                ) {
                    reject!("credential {} is revoked", index);
                }
            }
        }
        Ok(Ok(()))
    }

    /// Key, message layout, revealed messages and revocation status for one
    /// sub-proof. The outer `Err` is reserved for a credential definition
    /// without a usable key.
    fn context(
        &self,
        sub_proof: &SubProof,
        schema: &Schema,
        cred_def: &CredentialDefinition,
    ) -> Result<Result<SubProofContext, String>, CredentialError> {
        if cred_def.schema_id != sub_proof.schema_id || schema.id != sub_proof.schema_id {
            return Ok(Err("credential definition is for another schema".to_string()));
        }
        let scheme = scheme_for(cred_def);
        let key = credential::verifying_key(cred_def)?;
        let layout = MessageLayout::new(
            schema.attr_names.iter().map(String::as_str),
            scheme.has_revocation_index(),
        );
        if key.len() != layout.len() {
            return Ok(Err("credential key does not match the schema".to_string()));
        }

        let mut revealed = BTreeMap::new();
        for (name, encoded) in &sub_proof.revealed {
            let Some(index) = layout.attribute_index(name) else {
                return Ok(Err(format!("{} is not a schema attribute", name)));
            };
            let Ok(value) = encoded_to_scalar(encoded) else {
                return Ok(Err(format!("{} has a malformed encoding", name)));
            };
            revealed.insert(index, value);
        }

        let rev_reg_id = sub_proof.non_revocation.as_ref().map(|n| n.rev_reg_id.as_str());
        let held = rev_reg_id
            .and_then(|id| self.revocation.get(id))
            .map(|entry| entry.value().clone());
        let status = match scheme.required_status(cred_def, rev_reg_id, held.as_ref()) {
            Ok(status) => status.cloned(),
            Err(reason) => return Ok(Err(reason)),
        };
        Ok(Ok(SubProofContext {
            key,
            layout,
            revealed,
            status,
        }))
    }
}

fn restrictions_hold(restrictions: &[Restriction], sub_proof: &SubProof) -> bool {
    restrictions_match(restrictions, &sub_proof.schema_id, &sub_proof.cred_def_id)
}

/// Each requested attribute is answered once, self-attested only when
/// unrestricted; each predicate is answered; nothing else is.
fn check_referents(request: &ProofRequest, proof: &Proof) -> Verdict {
    for (referent, info) in &request.requested_attributes {
        let answers = [
            proof.revealed_attributes.contains_key(referent),
            proof.unrevealed_attributes.contains_key(referent),
            proof.self_attested_attributes.contains_key(referent),
        ];
        if answers.iter().filter(|a| **a).count() != 1 {
            return Err(format!("attribute referent {} is not answered exactly once", referent));
        }
        if proof.self_attested_attributes.contains_key(referent) && !info.restrictions.is_empty() {
            return Err(format!("restricted referent {} is self-attested", referent));
        }
    }
    for referent in request.requested_predicates.keys() {
        if !proof.predicate_results.contains_key(referent) {
            return Err(format!("predicate referent {} is not answered", referent));
        }
    }

    let unknown = proof
        .revealed_attributes
        .keys()
        .chain(proof.unrevealed_attributes.keys())
        .chain(proof.self_attested_attributes.keys())
        .find(|r| !request.requested_attributes.contains_key(*r))
        .or_else(|| {
            proof
                .predicate_results
                .keys()
                .find(|r| !request.requested_predicates.contains_key(*r))
        });
    match unknown {
        Some(referent) => Err(format!("referent {} is not in the request", referent)),
        None => Ok(()),
    }
}
