use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use indigo_core::{CredDefId, CredentialDefinition, Did, Schema, SchemaId};
use indigo_crypto::group::{g1, h1, random_scalar, scalar_from_secret, Scalar, G1};
use indigo_crypto::ps::SignatureProver;
use indigo_crypto::{Opening, Point, RangeProof, RepresentationProof, Secret, Transcript};
use indigo_wallet::Keyring;

use crate::credential::{self, Credential, MessageLayout};
use crate::error::CredentialError;
use crate::offer::{CredentialOffer, CredentialRequest, CredentialRequestMetadata};
use crate::proof::{
    bind_linked, bind_range, bind_signature, presentation_transcript, NonRevocationProof,
    PredicateProof, PredicateResult, Proof, ProofData, RevealedAttribute, SubProof,
    UnrevealedAttribute, CHALLENGE_LABEL,
};
use crate::proof_request::{restrictions_match, PredicateInfo, ProofRequest, Restriction};
use crate::revocation::{prove_exclusions, RevocationStatusList};
use crate::scheme::scheme_for;

/// Public view of a stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialInfo {
    pub referent: String,
    pub attrs: BTreeMap<String, String>,
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_rev_id: Option<u32>,
}

/// Stored credentials able to answer each referent of a proof request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsForProofRequest {
    pub attributes: BTreeMap<String, Vec<CredentialInfo>>,
    pub predicates: BTreeMap<String, Vec<CredentialInfo>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedAttribute {
    pub cred_id: String,
    pub revealed: bool,
}

/// Holder's choice of credential per referent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedCredentials {
    #[serde(default)]
    pub self_attested_attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, RequestedAttribute>,
    /// Predicate referent → credential id.
    #[serde(default)]
    pub requested_predicates: BTreeMap<String, String>,
}

impl RequestedCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn self_attest(mut self, referent: impl Into<String>, value: impl Into<String>) -> Self {
        self.self_attested_attributes
            .insert(referent.into(), value.into());
        self
    }

    pub fn reveal(mut self, referent: impl Into<String>, cred_id: impl Into<String>) -> Self {
        self.requested_attributes.insert(
            referent.into(),
            RequestedAttribute {
                cred_id: cred_id.into(),
                revealed: true,
            },
        );
        self
    }

    pub fn hide(mut self, referent: impl Into<String>, cred_id: impl Into<String>) -> Self {
        self.requested_attributes.insert(
            referent.into(),
            RequestedAttribute {
                cred_id: cred_id.into(),
                revealed: false,
            },
        );
        self
    }

    pub fn predicate(mut self, referent: impl Into<String>, cred_id: impl Into<String>) -> Self {
        self.requested_predicates
            .insert(referent.into(), cred_id.into());
        self
    }
}

/// A credential whose signature has been unblinded and checked.
#[derive(Debug, Clone)]
struct StoredCredential {
    credential: Credential,
    link_secret_id: String,
}

impl StoredCredential {
    fn info(&self, referent: &str) -> CredentialInfo {
        let credential = &self.credential;
        CredentialInfo {
            referent: referent.to_string(),
            attrs: credential
                .values
                .iter()
                .map(|(name, value)| (name.clone(), value.raw.clone()))
                .collect(),
            schema_id: credential.schema_id.clone(),
            cred_def_id: credential.cred_def_id.clone(),
            rev_reg_id: credential.rev_reg_id().map(str::to_string),
            cred_rev_id: credential.signature.revocation.as_ref().map(|h| h.index),
        }
    }

    fn matches(&self, name: &str, restrictions: &[Restriction]) -> bool {
        self.credential.values.contains_key(name)
            && restrictions_match(
                restrictions,
                &self.credential.schema_id,
                &self.credential.cred_def_id,
            )
    }

    fn integer(&self, name: &str) -> Option<u64> {
        self.credential.values.get(name).and_then(|v| v.as_integer())
    }
}

/// What one credential contributes to a proof.
struct SubProofPlan {
    cred_id: String,
    stored: StoredCredential,
    revealed: BTreeSet<String>,
    predicates: BTreeMap<String, PredicateInfo>,
}

/// Commitment `m·g1 + ρ·h1` to a hidden message, waiting for the challenge.
struct LinkedCommitment {
    opening: Opening,
    blinding_nonce: Scalar,
}

impl LinkedCommitment {
    fn new(message: Scalar) -> Self {
        Self {
            opening: Opening::random(message),
            blinding_nonce: random_scalar(),
        }
    }

    fn point(&self) -> Point {
        self.opening.commit().0
    }

    fn nonce_commitment(&self, message_nonce: Scalar) -> G1 {
        g1() * message_nonce + h1() * self.blinding_nonce
    }

    fn z_blinding(&self, challenge: &Scalar) -> Secret {
        Secret(self.blinding_nonce + *challenge * self.opening.blinding.0)
    }
}

struct PendingPredicate {
    referent: String,
    info: PredicateInfo,
    distance: u64,
    link: LinkedCommitment,
}

struct PendingRevocation {
    rev_reg_id: String,
    index: u32,
    revoked: BTreeSet<u32>,
    link: LinkedCommitment,
}

/// A sub-proof between the shared commitment phase and the challenge.
struct PendingSubProof {
    schema_id: SchemaId,
    cred_def_id: CredDefId,
    revealed: BTreeMap<String, String>,
    signature: SignatureProver,
    predicates: Vec<PendingPredicate>,
    revocation: Option<PendingRevocation>,
}

/// Holds link secrets (in the keyring) and credentials, and builds proofs.
///
/// Revocable credentials can only be used once a signed status list for
/// their registry has been added with
/// [`add_revocation_status`](Self::add_revocation_status).
pub struct CredentialHolder {
    did: Did,
    keyring: Arc<Keyring>,
    credentials: DashMap<String, StoredCredential>,
    revocation: DashMap<String, RevocationStatusList>,
}

impl CredentialHolder {
    pub fn new(did: Did, keyring: Arc<Keyring>) -> Self {
        Self {
            did,
            keyring,
            credentials: DashMap::new(),
            revocation: DashMap::new(),
        }
    }

    pub fn did(&self) -> &Did {
        &self.did
    }

    /// Create a link secret under `label` and return the label as its id.
    pub fn create_link_secret(&self, label: &str) -> Result<String, CredentialError> {
        self.keyring.create_link_secret(label)?;
        Ok(label.to_string())
    }

    fn link_secret(&self, link_secret_id: &str) -> Result<Scalar, CredentialError> {
        Ok(self.keyring.with_secret(link_secret_id, scalar_from_secret)?)
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
            "holder revocation status updated"
        );
        self.revocation.insert(status.rev_reg_id.clone(), status);
    }

    /// Answer `offer` with a blinded commitment to the link secret.
    pub fn create_credential_request(
        &self,
        offer: &CredentialOffer,
        cred_def: &CredentialDefinition,
        link_secret_id: &str,
    ) -> Result<(CredentialRequest, CredentialRequestMetadata), CredentialError> {
        if offer.cred_def_id != cred_def.id {
            return Err(CredentialError::InvalidCredentialRequest(format!(
                "offer is for {}, not {}",
                offer.cred_def_id, cred_def.id
            )));
        }
        let key = credential::verifying_key(cred_def)?;
        let bases = CredentialRequest::bases(&key).ok_or_else(|| {
            CredentialError::InvalidCredentialRequest(format!("{} signs no messages", cred_def.id))
        })?;
        let secret = self.link_secret(link_secret_id)?;
        let blinding = random_scalar();
        let blinded = bases[0] * blinding + bases[1] * secret;

        let mut transcript = CredentialRequest::transcript(&self.did, &cred_def.id, &offer.nonce);
        let proof =
            RepresentationProof::prove(&mut transcript, &bases, &[blinding, secret], &blinded)?;

        let request = CredentialRequest {
            prover_did: self.did.clone(),
            cred_def_id: cred_def.id.clone(),
            blinded_link_secret: Point(blinded),
            blinded_link_secret_proof: proof,
            nonce: offer.nonce.clone(),
        };
        let metadata = CredentialRequestMetadata {
            link_secret_id: link_secret_id.to_string(),
            blinding: Secret(blinding),
            nonce: offer.nonce.clone(),
        };
        tracing::debug!(cred_def_id = %cred_def.id, "credential request created");
        Ok((request, metadata))
    }

    /// Unblind an issued credential, check it against the credential key and
    /// store it. Returns its id.
    pub fn store_credential(
        &self,
        mut credential: Credential,
        metadata: &CredentialRequestMetadata,
        cred_def: &CredentialDefinition,
    ) -> Result<String, CredentialError> {
        if credential.cred_def_id != cred_def.id || credential.schema_id != cred_def.schema_id {
            return Err(CredentialError::InvalidCredentialSignature(format!(
                "credential does not belong to {}",
                cred_def.id
            )));
        }
        let scheme = scheme_for(cred_def);
        if scheme.has_revocation_index() != credential.signature.revocation.is_some() {
            return Err(CredentialError::InvalidCredentialSignature(
                "revocation handle does not match the credential definition".to_string(),
            ));
        }
        if let Some((name, _)) = credential.values.iter().find(|(_, v)| !v.is_canonical()) {
            return Err(CredentialError::InvalidCredentialSignature(format!(
                "value of {} is not canonically encoded",
                name
            )));
        }
        let key = credential::verifying_key(cred_def)?;
        if key.len() != credential.layout().len() {
            return Err(CredentialError::InvalidCredentialSignature(
                "attributes do not match the credential key".to_string(),
            ));
        }

        let secret = self.link_secret(&metadata.link_secret_id)?;
        let signature = credential.signature.signature.unblind(&metadata.blinding.0);
        if !key.verify(&signature, &credential.messages(secret)?) {
            return Err(CredentialError::InvalidCredentialSignature(
                "signature does not verify over these values and link secret".to_string(),
            ));
        }
        credential.signature.signature = signature;

        let id = uuid::Uuid::now_v7().to_string();
        tracing::info!(cred_id = %id, cred_def_id = %credential.cred_def_id, "credential stored");
        self.credentials.insert(
            id.clone(),
            StoredCredential {
                credential,
                link_secret_id: metadata.link_secret_id.clone(),
            },
        );
        Ok(id)
    }

    pub fn get_credential(&self, cred_id: &str) -> Result<CredentialInfo, CredentialError> {
        self.credentials
            .get(cred_id)
            .map(|stored| stored.info(cred_id))
            .ok_or_else(|| CredentialError::UnknownCredential(cred_id.to_string()))
    }

    /// All stored credentials, oldest first.
    pub fn list_credentials(&self) -> Vec<CredentialInfo> {
        let mut infos: Vec<CredentialInfo> = self
            .credentials
            .iter()
            .map(|entry| entry.info(entry.key()))
            .collect();
        infos.sort_by(|a, b| a.referent.cmp(&b.referent));
        infos
    }

    pub fn delete_credential(&self, cred_id: &str) -> Result<(), CredentialError> {
        self.credentials
            .remove(cred_id)
            .map(|_| tracing::info!(cred_id, "credential deleted"))
            .ok_or_else(|| CredentialError::UnknownCredential(cred_id.to_string()))
    }

    /// Candidates per referent. Predicate candidates must hold an integer
    /// value that satisfies the predicate.
    pub fn find_credentials_for(
        &self,
        request: &ProofRequest,
    ) -> Result<CredentialsForProofRequest, CredentialError> {
        request.validate()?;
        let mut found = CredentialsForProofRequest::default();

        for (referent, info) in &request.requested_attributes {
            let mut candidates: Vec<CredentialInfo> = self
                .credentials
                .iter()
                .filter(|entry| entry.matches(&info.name, &info.restrictions))
                .map(|entry| entry.info(entry.key()))
                .collect();
            candidates.sort_by(|a, b| a.referent.cmp(&b.referent));
            found.attributes.insert(referent.clone(), candidates);
        }
        for (referent, info) in &request.requested_predicates {
            let mut candidates: Vec<CredentialInfo> = self
                .credentials
                .iter()
                .filter(|entry| entry.matches(&info.name, &info.restrictions))
                .filter(|entry| {
                    entry
                        .integer(&info.name)
                        .map(|v| info.is_satisfied_by(v))
                        .unwrap_or(false)
                })
                .map(|entry| entry.info(entry.key()))
                .collect();
            candidates.sort_by(|a, b| a.referent.cmp(&b.referent));
            found.predicates.insert(referent.clone(), candidates);
        }
        Ok(found)
    }

    fn stored(&self, cred_id: &str) -> Result<StoredCredential, CredentialError> {
        self.credentials
            .get(cred_id)
            .map(|stored| stored.value().clone())
            .ok_or_else(|| CredentialError::UnknownCredential(cred_id.to_string()))
    }

    /// Build a proof answering `request` with the chosen credentials.
    ///
    /// Every credential used must be bound to `link_secret_id` and must
    /// refer to a schema and credential definition in the given maps. Only
    /// the requested attributes are revealed, and every signature, commitment
    /// and response in the proof is freshly randomized.
    pub fn create_proof(
        &self,
        request: &ProofRequest,
        requested: &RequestedCredentials,
        link_secret_id: &str,
        schemas: &HashMap<SchemaId, Schema>,
        cred_defs: &HashMap<CredDefId, CredentialDefinition>,
    ) -> Result<Proof, CredentialError> {
        request.validate()?;
        check_coverage(request, requested)?;

        let mut plans: Vec<SubProofPlan> = Vec::new();
        let plan_index = |cred_id: &str, plans: &mut Vec<SubProofPlan>| -> Result<usize, CredentialError> {
            if let Some(index) = plans.iter().position(|p| p.cred_id == cred_id) {
                return Ok(index);
            }
            let stored = self.stored(cred_id)?;
            if stored.link_secret_id != link_secret_id {
                return Err(CredentialError::InvalidRequestedCredentials(format!(
                    "credential {} is bound to another link secret",
                    cred_id
                )));
            }
            if !schemas.contains_key(&stored.credential.schema_id) {
                return Err(CredentialError::UnknownSchema(
                    stored.credential.schema_id.to_string(),
                ));
            }
            if !cred_defs.contains_key(&stored.credential.cred_def_id) {
                return Err(CredentialError::UnknownCredDef(
                    stored.credential.cred_def_id.to_string(),
                ));
            }
            plans.push(SubProofPlan {
                cred_id: cred_id.to_string(),
                stored,
                revealed: BTreeSet::new(),
                predicates: BTreeMap::new(),
            });
            Ok(plans.len() - 1)
        };

        let mut revealed_attributes = BTreeMap::new();
        let mut unrevealed_attributes = BTreeMap::new();
        for (referent, info) in &request.requested_attributes {
            let Some(choice) = requested.requested_attributes.get(referent) else {
                continue;
            };
            let index = plan_index(&choice.cred_id, &mut plans)?;
            let plan = &mut plans[index];
            if !plan.stored.matches(&info.name, &info.restrictions) {
                return Err(CredentialError::InvalidRequestedCredentials(format!(
                    "credential {} does not satisfy attribute referent {}",
                    choice.cred_id, referent
                )));
            }
            if choice.revealed {
                let value = plan.stored.credential.values.get(&info.name).ok_or_else(|| {
                    CredentialError::AttributeMismatch(format!("no attribute {}", info.name))
                })?;
                revealed_attributes.insert(
                    referent.clone(),
                    RevealedAttribute {
                        sub_proof_index: index,
                        raw: value.raw.clone(),
                        encoded: value.encoded.clone(),
                    },
                );
                plan.revealed.insert(info.name.clone());
            } else {
                unrevealed_attributes
                    .insert(referent.clone(), UnrevealedAttribute { sub_proof_index: index });
            }
        }

        let mut predicate_results = BTreeMap::new();
        for (referent, info) in &request.requested_predicates {
            let Some(cred_id) = requested.requested_predicates.get(referent) else {
                continue;
            };
            let index = plan_index(cred_id, &mut plans)?;
            let plan = &mut plans[index];
            if !plan.stored.matches(&info.name, &info.restrictions) {
                return Err(CredentialError::InvalidRequestedCredentials(format!(
                    "credential {} does not satisfy predicate referent {}",
                    cred_id, referent
                )));
            }
            let satisfied = plan
                .stored
                .integer(&info.name)
                .map(|v| info.is_satisfied_by(v))
                .unwrap_or(false);
            if !satisfied {
                return Err(CredentialError::PredicateNotSatisfied(format!(
                    "{} {} {}",
                    info.name, info.p_type, info.p_value
                )));
            }
            predicate_results.insert(
                referent.clone(),
                PredicateResult {
                    sub_proof_index: index,
                    satisfied: true,
                },
            );
            plan.predicates.insert(referent.clone(), info.clone());
        }

        let mut transcript = presentation_transcript(&request.nonce, plans.len());
        let mut pending = Vec::with_capacity(plans.len());
        if !plans.is_empty() {
            let secret = self.link_secret(link_secret_id)?;
            // One link-secret nonce for every sub-proof: equal responses show
            // the credentials share a holder.
            let link_secret_nonce =
                BTreeMap::from([(MessageLayout::LINK_SECRET, random_scalar())]);
            for (index, plan) in plans.iter().enumerate() {
                let sub_proof = self.commit_sub_proof(plan, secret, &link_secret_nonce, cred_defs)?;
                bind_signature(
                    &mut transcript,
                    index,
                    &sub_proof.schema_id,
                    &sub_proof.cred_def_id,
                    sub_proof.signature.signature(),
                    &sub_proof.revealed,
                    sub_proof.signature.commitment(),
                );
                for predicate in &sub_proof.predicates {
                    let nonce = message_nonce(
                        &sub_proof.signature,
                        &plan.stored.credential.layout(),
                        &predicate.info.name,
                    )?;
                    bind_linked(
                        &mut transcript,
                        b"predicate",
                        &predicate.referent,
                        &predicate.link.point().0,
                        &predicate.link.nonce_commitment(nonce),
                    );
                }
                if let Some(revocation) = &sub_proof.revocation {
                    let nonce = plan
                        .stored
                        .credential
                        .layout()
                        .revocation_index()
                        .and_then(|i| sub_proof.signature.nonce(i))
                        .ok_or_else(|| {
                            CredentialError::MalformedProof("revocation index is not hidden".into())
                        })?;
                    bind_linked(
                        &mut transcript,
                        b"non-revocation",
                        &revocation.rev_reg_id,
                        &revocation.link.point().0,
                        &revocation.link.nonce_commitment(nonce),
                    );
                }
                pending.push(sub_proof);
            }
        }

        let challenge = (!pending.is_empty()).then(|| transcript.challenge_scalar(CHALLENGE_LABEL));
        let mut sub_proofs = Vec::with_capacity(pending.len());
        if let Some(c) = challenge {
            for (index, sub_proof) in pending.into_iter().enumerate() {
                sub_proofs.push(respond(&mut transcript, index, sub_proof, &c)?);
            }
        }

        tracing::info!(
            proof_request = %request.name,
            credentials = sub_proofs.len(),
            revealed = revealed_attributes.len(),
            predicates = predicate_results.len(),
            "proof created"
        );
        Ok(Proof {
            nonce: request.nonce.clone(),
            revealed_attributes,
            unrevealed_attributes,
            self_attested_attributes: requested.self_attested_attributes.clone(),
            predicate_results,
            proof_data: ProofData {
                sub_proofs,
                challenge: challenge.map(Secret),
            },
        })
    }

    /// Re-randomize the credential signature and commit to everything the
    /// sub-proof keeps hidden.
    fn commit_sub_proof(
        &self,
        plan: &SubProofPlan,
        secret: Scalar,
        link_secret_nonce: &BTreeMap<usize, Scalar>,
        cred_defs: &HashMap<CredDefId, CredentialDefinition>,
    ) -> Result<PendingSubProof, CredentialError> {
        let credential = &plan.stored.credential;
        let cred_def = cred_defs
            .get(&credential.cred_def_id)
            .ok_or_else(|| CredentialError::UnknownCredDef(credential.cred_def_id.to_string()))?;
        let key = credential::verifying_key(cred_def)?;
        let layout = credential.layout();
        let messages = credential.messages(secret)?;

        let mut revealed = BTreeMap::new();
        let mut revealed_indices = BTreeSet::new();
        for name in &plan.revealed {
            let (Some(index), Some(value)) =
                (layout.attribute_index(name), credential.values.get(name))
            else {
                return Err(CredentialError::AttributeMismatch(format!("no attribute {}", name)));
            };
            revealed.insert(name.clone(), value.encoded.clone());
            revealed_indices.insert(index);
        }
        let signature = SignatureProver::commit(
            &key,
            &credential.signature.signature,
            &messages,
            &revealed_indices,
            link_secret_nonce,
        )?;

        let mut predicates = Vec::new();
        for (referent, info) in &plan.predicates {
            // A revealed value is checked in the clear.
            if plan.revealed.contains(&info.name) {
                continue;
            }
            let message = layout
                .attribute_index(&info.name)
                .and_then(|i| messages.get(i))
                .ok_or_else(|| {
                    CredentialError::AttributeMismatch(format!("no attribute {}", info.name))
                })?;
            let distance = plan
                .stored
                .integer(&info.name)
                .and_then(|v| info.witness(v))
                .ok_or_else(|| CredentialError::PredicateNotSatisfied(referent.clone()))?;
            predicates.push(PendingPredicate {
                referent: referent.clone(),
                info: info.clone(),
                distance,
                link: LinkedCommitment::new(*message),
            });
        }

        let handle = credential.signature.revocation.as_ref();
        let status = handle
            .and_then(|h| self.revocation.get(&h.rev_reg_id))
            .map(|status| status.value().clone());
        let revocation = match (
            scheme_for(cred_def).usable_status(cred_def, handle, status.as_ref())?,
            handle,
        ) {
            (Some(status), Some(handle)) => Some(PendingRevocation {
                rev_reg_id: handle.rev_reg_id.clone(),
                index: handle.index,
                revoked: status.revoked_set(),
                link: LinkedCommitment::new(Scalar::from(u64::from(handle.index))),
            }),
            _ => None,
        };

        Ok(PendingSubProof {
            schema_id: credential.schema_id.clone(),
            cred_def_id: credential.cred_def_id.clone(),
            revealed,
            signature,
            predicates,
            revocation,
        })
    }
}

fn message_nonce(
    signature: &SignatureProver,
    layout: &MessageLayout,
    name: &str,
) -> Result<Scalar, CredentialError> {
    layout
        .attribute_index(name)
        .and_then(|i| signature.nonce(i))
        .ok_or_else(|| CredentialError::AttributeMismatch(format!("{} is not hidden", name)))
}

/// Responses for the shared challenge, then the range and exclusion proofs
/// that follow it on the transcript.
fn respond(
    transcript: &mut Transcript,
    index: usize,
    sub_proof: PendingSubProof,
    challenge: &Scalar,
) -> Result<SubProof, CredentialError> {
    let mut predicate_proofs = BTreeMap::new();
    for predicate in sub_proof.predicates {
        let commitment = predicate.link.point();
        bind_range(transcript, index, &predicate.referent);
        let range = RangeProof::prove(
            transcript,
            predicate.distance,
            &predicate.info.distance_blinding(&predicate.link.opening.blinding.0),
            &predicate.info.distance_commitment(&commitment.0),
        )?;
        predicate_proofs.insert(
            predicate.referent,
            PredicateProof {
                commitment,
                z_blinding: predicate.link.z_blinding(challenge),
                range,
            },
        );
    }

    let non_revocation = match sub_proof.revocation {
        Some(revocation) => {
            let commitment = revocation.link.point();
            let exclusions = prove_exclusions(
                transcript,
                &commitment.0,
                revocation.index,
                &revocation.link.opening.blinding.0,
                &revocation.revoked,
            )?;
            Some(NonRevocationProof {
                rev_reg_id: revocation.rev_reg_id,
                commitment,
                z_blinding: revocation.link.z_blinding(challenge),
                exclusions,
            })
        }
        None => None,
    };

    Ok(SubProof {
        schema_id: sub_proof.schema_id,
        cred_def_id: sub_proof.cred_def_id,
        revealed: sub_proof.revealed,
        signature_proof: sub_proof.signature.respond(challenge),
        predicate_proofs,
        non_revocation,
    })
}

/// Every referent is answered exactly once and nothing unrequested is
/// answered. Self-attested values only answer unrestricted attributes.
fn check_coverage(
    request: &ProofRequest,
    requested: &RequestedCredentials,
) -> Result<(), CredentialError> {
    for (referent, info) in &request.requested_attributes {
        let attested = requested.self_attested_attributes.contains_key(referent);
        let chosen = requested.requested_attributes.contains_key(referent);
        match (attested, chosen) {
            (true, true) => {
                return Err(CredentialError::InvalidRequestedCredentials(format!(
                    "attribute referent {} answered twice",
                    referent
                )))
            }
            (false, false) => {
                return Err(CredentialError::InvalidRequestedCredentials(format!(
                    "attribute referent {} not answered",
                    referent
                )))
            }
            (true, false) if !info.restrictions.is_empty() => {
                return Err(CredentialError::InvalidRequestedCredentials(format!(
                    "attribute referent {} is restricted and cannot be self-attested",
                    referent
                )))
            }
            _ => {}
        }
    }
    for referent in request.requested_predicates.keys() {
        if !requested.requested_predicates.contains_key(referent) {
            return Err(CredentialError::InvalidRequestedCredentials(format!(
                "predicate referent {} not answered",
                referent
            )));
        }
    }

    let unknown = requested
        .self_attested_attributes
        .keys()
        .chain(requested.requested_attributes.keys())
        .find(|r| !request.requested_attributes.contains_key(*r))
        .or_else(|| {
            requested
                .requested_predicates
                .keys()
                .find(|r| !request.requested_predicates.contains_key(*r))
        });
    if let Some(referent) = unknown {
        return Err(CredentialError::InvalidRequestedCredentials(format!(
            "referent {} is not in the proof request",
            referent
        )));
    }
    Ok(())
}
