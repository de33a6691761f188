use chrono::Utc;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use indigo_core::{
    CredDefId, CredentialDefinition, Did, Nonce, RevocationConfig, Schema, SchemaId,
};
use indigo_crypto::ps::SigningKey;
use indigo_ledger::LedgerClient;
use indigo_wallet::Keyring;

use crate::credential::{self, Credential, CredentialSignature, MessageLayout};
use crate::encoding::CredentialValues;
use crate::error::CredentialError;
use crate::offer::{CredentialOffer, CredentialRequest};
use crate::revocation::{RevocationRegistry, RevocationStatusList};
use crate::scheme::scheme_for;

/// Capacity of a revocation registry when none is given.
pub const DEFAULT_MAX_CRED_NUM: u32 = 100;

/// Creates schemas and credential definitions and issues credentials.
///
/// Each credential definition has two keys in the shared keyring, both under
/// its id: the seed of the credential signing key and an Ed25519 key that
/// signs revocation status lists.
pub struct CredentialIssuer {
    did: Did,
    keyring: Arc<Keyring>,
    schemas: DashMap<SchemaId, Schema>,
    cred_defs: DashMap<CredDefId, CredentialDefinition>,
    /// Outstanding offers by nonce.
    offers: DashMap<String, CredentialOffer>,
    /// Revocation registries by credential definition.
    registries: DashMap<CredDefId, RevocationRegistry>,
}

impl CredentialIssuer {
    pub fn new(did: Did, keyring: Arc<Keyring>) -> Self {
        Self {
            did,
            keyring,
            schemas: DashMap::new(),
            cred_defs: DashMap::new(),
            offers: DashMap::new(),
            registries: DashMap::new(),
        }
    }

    pub fn did(&self) -> &Did {
        &self.did
    }

    /// Build a schema owned by this issuer.
    pub fn create_schema(
        &self,
        name: &str,
        version: &str,
        attr_names: &[&str],
    ) -> Result<Schema, CredentialError> {
        let schema = Schema::new(
            &self.did,
            name,
            version,
            attr_names.iter().map(|a| a.to_string()).collect(),
        )?;
        self.schemas.insert(schema.id.clone(), schema.clone());
        tracing::info!(schema_id = %schema.id, attributes = schema.attr_names.len(), "schema created");
        Ok(schema)
    }

    /// Make a schema published by someone else available for issuance.
    pub fn register_schema(&self, schema: Schema) -> Result<(), CredentialError> {
        schema.validate()?;
        self.schemas.insert(schema.id.clone(), schema);
        Ok(())
    }

    pub fn schema(&self, id: &SchemaId) -> Result<Schema, CredentialError> {
        self.schemas
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| CredentialError::UnknownSchema(id.to_string()))
    }

    /// Credential definition for `schema` with fresh keys.
    /// Revocable definitions get a registry of [`DEFAULT_MAX_CRED_NUM`].
    pub fn create_credential_definition(
        &self,
        schema: &Schema,
        tag: &str,
        support_revocation: bool,
    ) -> Result<CredentialDefinition, CredentialError> {
        let revocation = support_revocation.then_some(RevocationConfig {
            max_cred_num: DEFAULT_MAX_CRED_NUM,
        });
        self.create_credential_definition_with(schema, tag, revocation)
    }

    pub fn create_credential_definition_with(
        &self,
        schema: &Schema,
        tag: &str,
        revocation: Option<RevocationConfig>,
    ) -> Result<CredentialDefinition, CredentialError> {
        schema.validate()?;
        let id = CredDefId::new(&self.did, &schema.id, tag);
        if self.cred_defs.contains_key(&id) {
            return Err(CredentialError::DuplicateCredDef(id.to_string()));
        }
        let duplicate = |e: indigo_wallet::WalletError| match e {
            indigo_wallet::WalletError::DuplicateSecret(_) => {
                CredentialError::DuplicateCredDef(id.to_string())
            }
            other => other.into(),
        };
        let verkey = self.keyring.create_signing_key(id.as_str()).map_err(duplicate)?;
        self.keyring.create_credential_key(id.as_str()).map_err(duplicate)?;

        let layout = MessageLayout::new(
            schema.attr_names.iter().map(String::as_str),
            revocation.is_some(),
        );
        let credential_key = self.signing_key(&id, &layout)?.verifying_key();
        let cred_def = CredentialDefinition::new(&self.did, schema, tag, verkey, revocation)?
            .with_credential_key(credential_key.to_hex());

        self.schemas
            .entry(schema.id.clone())
            .or_insert_with(|| schema.clone());
        if let Some(config) = revocation {
            let registry = RevocationRegistry::new(&cred_def.id, config.max_cred_num);
            tracing::info!(
                rev_reg_id = registry.id(),
                max_cred_num = config.max_cred_num,
                "revocation registry created"
            );
            self.registries.insert(cred_def.id.clone(), registry);
        }
        self.cred_defs.insert(cred_def.id.clone(), cred_def.clone());

        tracing::info!(
            cred_def_id = %cred_def.id,
            revocable = cred_def.supports_revocation(),
            "credential definition created"
        );
        Ok(cred_def)
    }

    fn signing_key(&self, id: &CredDefId, layout: &MessageLayout) -> Result<SigningKey, CredentialError> {
        Ok(self
            .keyring
            .with_secret(id.as_str(), |seed| SigningKey::from_seed(seed, layout.len()))?)
    }

    pub fn credential_definition(
        &self,
        id: &CredDefId,
    ) -> Result<CredentialDefinition, CredentialError> {
        self.cred_defs
            .get(id)
            .map(|c| c.value().clone())
            .ok_or_else(|| CredentialError::UnknownCredDef(id.to_string()))
    }

    /// Offer a credential of `cred_def_id` with a fresh nonce.
    pub fn create_offer(&self, cred_def_id: &CredDefId) -> Result<CredentialOffer, CredentialError> {
        let cred_def = self.credential_definition(cred_def_id)?;
        let offer = CredentialOffer {
            schema_id: cred_def.schema_id,
            cred_def_id: cred_def.id,
            nonce: Nonce::new(),
        };
        self.offers
            .insert(offer.nonce.as_str().to_string(), offer.clone());
        tracing::debug!(cred_def_id = %offer.cred_def_id, "credential offer created");
        Ok(offer)
    }

    /// Number of offers not yet used.
    pub fn outstanding_offers(&self) -> usize {
        self.offers.len()
    }

    /// Issue a credential answering `request` for `offer`.
    ///
    /// The offer is taken out of the outstanding set for the duration of
    /// the call, so it can back at most one credential. It is put back when
    /// issuance fails on the request or the values.
    pub fn issue_credential(
        &self,
        offer: &CredentialOffer,
        request: &CredentialRequest,
        values: &CredentialValues,
    ) -> Result<Credential, CredentialError> {
        let (key, outstanding) = self
            .offers
            .remove(offer.nonce.as_str())
            .filter(|(_, outstanding)| outstanding == offer)
            .ok_or_else(|| CredentialError::UnknownOffer(offer.nonce.to_string()))?;

        match self.sign_credential(offer, request, values) {
            Ok(credential) => {
                tracing::info!(
                    cred_def_id = %credential.cred_def_id,
                    prover = %request.prover_did,
                    revocation_index = credential.signature.revocation.as_ref().map(|h| h.index),
                    "credential issued"
                );
                Ok(credential)
            }
            Err(e) => {
                tracing::warn!(cred_def_id = %offer.cred_def_id, error = %e, "credential issuance failed");
                self.offers.insert(key, outstanding);
                Err(e)
            }
        }
    }

    fn sign_credential(
        &self,
        offer: &CredentialOffer,
        request: &CredentialRequest,
        values: &CredentialValues,
    ) -> Result<Credential, CredentialError> {
        if request.cred_def_id != offer.cred_def_id || request.nonce != offer.nonce {
            return Err(CredentialError::InvalidCredentialRequest(
                "request does not answer this offer".to_string(),
            ));
        }
        let cred_def = self.credential_definition(&offer.cred_def_id)?;
        let credential_key = credential::verifying_key(&cred_def)?;
        if !request.verify_proof(&credential_key) {
            return Err(CredentialError::InvalidCredentialRequest(
                "blinded link secret proof does not verify".to_string(),
            ));
        }

        let schema = self.schema(&cred_def.schema_id)?;
        check_values(&schema, values)?;

        let scheme = scheme_for(&cred_def);
        let layout = MessageLayout::new(
            schema.attr_names.iter().map(String::as_str),
            scheme.has_revocation_index(),
        );
        let mut known = BTreeMap::new();
        for (name, value) in values {
            let index = layout.attribute_index(name).ok_or_else(|| {
                CredentialError::AttributeMismatch(format!("attribute {} not in schema", name))
            })?;
            known.insert(index, value.to_scalar()?);
        }

        let revocation = match self.registries.get_mut(&cred_def.id) {
            Some(mut registry) => scheme.allocate_handle(&cred_def, Some(&mut *registry))?,
            None => scheme.allocate_handle(&cred_def, None)?,
        };
        if let (Some(handle), Some(index)) = (&revocation, layout.revocation_index()) {
            known.insert(index, indigo_crypto::Scalar::from(u64::from(handle.index)));
        }

        let signature = self
            .signing_key(&cred_def.id, &layout)?
            .sign_committed(&request.blinded_link_secret.0, &known)?;

        Ok(Credential {
            schema_id: offer.schema_id.clone(),
            cred_def_id: cred_def.id.clone(),
            values: values.clone(),
            signature: CredentialSignature {
                signature,
                revocation,
            },
        })
    }

    /// Revocation registry id of a revocable credential definition.
    pub fn revocation_registry_id(&self, cred_def_id: &CredDefId) -> Option<String> {
        self.registries.get(cred_def_id).map(|r| r.id().to_string())
    }

    fn registry_for(&self, rev_reg_id: &str) -> Result<CredDefId, CredentialError> {
        self.registries
            .iter()
            .find(|entry| entry.id() == rev_reg_id)
            .map(|entry| entry.key().clone())
            .ok_or_else(|| CredentialError::UnknownRevocationRegistry(rev_reg_id.to_string()))
    }

    pub fn revoke_credential(&self, rev_reg_id: &str, index: u32) -> Result<(), CredentialError> {
        let cred_def_id = self.registry_for(rev_reg_id)?;
        let mut registry = self
            .registries
            .get_mut(&cred_def_id)
            .ok_or_else(|| CredentialError::UnknownRevocationRegistry(rev_reg_id.to_string()))?;
        registry.revoke(index)?;
        tracing::info!(rev_reg_id, index, "credential revoked");
        Ok(())
    }

    /// Current revoked set of a registry, signed for verifiers.
    pub fn revocation_status(&self, rev_reg_id: &str) -> Result<RevocationStatusList, CredentialError> {
        let cred_def_id = self.registry_for(rev_reg_id)?;
        let revoked = self
            .registries
            .get(&cred_def_id)
            .map(|r| r.revoked())
            .ok_or_else(|| CredentialError::UnknownRevocationRegistry(rev_reg_id.to_string()))?;
        let cred_def = self.credential_definition(&cred_def_id)?;

        let mut status = RevocationStatusList {
            rev_reg_id: rev_reg_id.to_string(),
            cred_def_id,
            revoked,
            timestamp: Utc::now(),
            signature: String::new(),
        };
        status.signature = self
            .keyring
            .sign_with_label(cred_def.id.as_str(), &status.signing_bytes())?
            .to_bs58();
        Ok(status)
    }

    /// Write `schema` to the ledger as this issuer.
    pub async fn publish_schema(
        &self,
        ledger: &LedgerClient,
        schema: &Schema,
    ) -> Result<SchemaId, CredentialError> {
        Ok(ledger.submit_schema(&self.did, schema).await?)
    }

    pub async fn publish_credential_definition(
        &self,
        ledger: &LedgerClient,
        cred_def: &CredentialDefinition,
    ) -> Result<CredDefId, CredentialError> {
        Ok(ledger.submit_cred_def(&self.did, cred_def).await?)
    }
}

/// Values must name exactly the schema's attributes, canonically encoded.
fn check_values(schema: &Schema, values: &CredentialValues) -> Result<(), CredentialError> {
    let expected: BTreeSet<&str> = schema.attr_names.iter().map(String::as_str).collect();
    let supplied: BTreeSet<&str> = values.keys().map(String::as_str).collect();

    let missing: Vec<&str> = expected.difference(&supplied).copied().collect();
    if !missing.is_empty() {
        return Err(CredentialError::AttributeMismatch(format!(
            "missing attributes: {}",
            missing.join(", ")
        )));
    }
    let extra: Vec<&str> = supplied.difference(&expected).copied().collect();
    if !extra.is_empty() {
        return Err(CredentialError::AttributeMismatch(format!(
            "attributes not in schema: {}",
            extra.join(", ")
        )));
    }
    if let Some((name, _)) = values.iter().find(|(_, value)| !value.is_canonical()) {
        return Err(CredentialError::AttributeMismatch(format!(
            "encoded value of {} does not match its raw value",
            name
        )));
    }
    Ok(())
}
