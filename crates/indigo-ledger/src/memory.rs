//! In-process ledger.
//!
//! Enforces the same write rules a validator pool would: signatures are
//! checked against the submitter's current verkey on the ledger, NYM role
//! grants follow the role hierarchy, only a DID's owner may change its
//! verkey, and published object ids must belong to the submitter. The state
//! lock is never held across an `.await`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use indigo_core::{CredDefId, CredentialDefinition, Did, Role, Schema, SchemaId, Verkey};
use indigo_crypto::{PublicKey, Signature};

use crate::error::LedgerError;
use crate::genesis::GenesisNym;
use crate::service::LedgerService;
use crate::transaction::{
    LedgerReply, LedgerTransaction, NymData, NymPayload, ReadQuery, ReadReply, TxnResult, TxnType,
};

#[derive(Debug, Clone)]
struct NymRecord {
    verkey: Verkey,
    role: Option<Role>,
    seq_no: u64,
}

#[derive(Default)]
struct LedgerState {
    log: Vec<TxnResult>,
    nyms: HashMap<Did, NymRecord>,
    schemas: HashMap<SchemaId, Schema>,
    cred_defs: HashMap<CredDefId, (CredentialDefinition, u64)>,
    /// Content hash → accepted reply, for idempotent resubmission.
    accepted: HashMap<String, LedgerReply>,
    /// Highest genesis sequence number; log entries continue after it.
    genesis_len: u64,
}

impl LedgerState {
    fn next_seq_no(&self) -> u64 {
        self.genesis_len + self.log.len() as u64 + 1
    }
}

/// Validated effect of a write, applied only after every check passed.
enum Effect {
    Nym { dest: Did, verkey: Verkey, role: Option<Role> },
    Schema(Schema),
    CredDef(CredentialDefinition),
}

pub struct InMemoryLedger {
    id: String,
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    /// Empty ledger. Nothing can be written until a NYM exists, so this is
    /// mostly useful together with [`InMemoryLedger::from_genesis`].
    pub fn new() -> Self {
        Self {
            id: "in-memory".to_string(),
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Ledger seeded with the given genesis NYMs.
    pub fn from_genesis(genesis: &[GenesisNym]) -> Self {
        let ledger = Self::new();
        {
            let mut state = ledger.write_state();
            for nym in genesis {
                state.nyms.insert(
                    nym.dest.clone(),
                    NymRecord {
                        verkey: nym.verkey.clone(),
                        role: nym.role,
                        seq_no: nym.seq_no,
                    },
                );
                state.genesis_len = state.genesis_len.max(nym.seq_no);
            }
        }
        tracing::info!(nyms = genesis.len(), "in-memory ledger initialized from genesis");
        ledger
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of transactions written after genesis.
    pub fn len(&self) -> usize {
        self.read_state().log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest sequence number on the ledger, genesis included.
    pub fn last_seq_no(&self) -> u64 {
        self.read_state().next_seq_no() - 1
    }

    /// Apply a write transaction.
    pub fn apply(&self, txn: &LedgerTransaction) -> Result<LedgerReply, LedgerError> {
        let hash = txn.content_hash()?;
        let mut state = self.write_state();

        if let Some(reply) = state.accepted.get(&hash) {
            tracing::debug!(req_id = txn.req_id, "duplicate transaction, returning stored reply");
            return Ok(reply.clone());
        }

        let effect = match Self::check(&state, txn) {
            Ok(effect) => effect,
            Err(reason) => {
                tracing::warn!(
                    txn_type = %txn.txn_type,
                    submitter = %txn.submitter_did,
                    reason = %reason,
                    "transaction rejected"
                );
                return Ok(LedgerReply::reject(txn.req_id, reason));
            }
        };

        let seq_no = state.next_seq_no();
        match effect {
            Effect::Nym { dest, verkey, role } => {
                state.nyms.insert(dest, NymRecord { verkey, role, seq_no });
            }
            Effect::Schema(mut schema) => {
                schema.seq_no = Some(seq_no);
                state.schemas.insert(schema.id.clone(), schema);
            }
            Effect::CredDef(cred_def) => {
                state.cred_defs.insert(cred_def.id.clone(), (cred_def, seq_no));
            }
        }

        let result = TxnResult {
            txn: txn.clone(),
            req_signature: txn.signature.clone().unwrap_or_default(),
            seq_no,
            txn_time: Utc::now(),
        };
        state.log.push(result.clone());
        let reply = LedgerReply::reply(result);
        state.accepted.insert(hash, reply.clone());

        tracing::info!(
            txn_type = %txn.txn_type,
            submitter = %txn.submitter_did,
            seq_no,
            "transaction written"
        );
        Ok(reply)
    }

    fn check(state: &LedgerState, txn: &LedgerTransaction) -> Result<Effect, String> {
        let submitter = state
            .nyms
            .get(&txn.submitter_did)
            .ok_or_else(|| format!("submitter {} is not on the ledger", txn.submitter_did))?;

        let signature = txn
            .signature
            .as_deref()
            .ok_or_else(|| "missing signature".to_string())?;
        let signature = Signature::from_bs58(signature).map_err(|e| e.to_string())?;
        let public_key = PublicKey::from_verkey(&submitter.verkey).map_err(|e| e.to_string())?;
        let bytes = txn.signing_bytes().map_err(|e| e.to_string())?;
        indigo_crypto::verify(&bytes, &signature, &public_key).map_err(|_| {
            format!(
                "signature does not verify against the current verkey of {}",
                txn.submitter_did
            )
        })?;

        match txn.txn_type {
            TxnType::Nym => Self::check_nym(state, txn, submitter),
            TxnType::Schema => Self::check_schema(state, txn, submitter),
            TxnType::CredDef => Self::check_cred_def(state, txn, submitter),
        }
    }

    fn check_nym(
        state: &LedgerState,
        txn: &LedgerTransaction,
        submitter: &NymRecord,
    ) -> Result<Effect, String> {
        let payload: NymPayload =
            serde_json::from_value(txn.payload.clone()).map_err(|e| e.to_string())?;

        match state.nyms.get(&payload.dest) {
            Some(existing) => {
                if payload.dest != txn.submitter_did {
                    return Err(format!(
                        "only {} may update its own NYM",
                        payload.dest
                    ));
                }
                if payload.role.is_some() && payload.role != existing.role {
                    return Err("a NYM cannot change its own role".to_string());
                }
                Ok(Effect::Nym {
                    dest: payload.dest,
                    verkey: payload.verkey.unwrap_or_else(|| existing.verkey.clone()),
                    role: existing.role,
                })
            }
            None => {
                if !Role::may_assign(submitter.role, payload.role) {
                    let target = payload
                        .role
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "no role".to_string());
                    let held = submitter
                        .role
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "no role".to_string());
                    return Err(format!("a submitter with {} cannot create a NYM with {}", held, target));
                }
                let verkey = payload
                    .verkey
                    .ok_or_else(|| format!("new NYM {} needs a verkey", payload.dest))?;
                Ok(Effect::Nym {
                    dest: payload.dest,
                    verkey,
                    role: payload.role,
                })
            }
        }
    }

    fn check_schema(
        state: &LedgerState,
        txn: &LedgerTransaction,
        submitter: &NymRecord,
    ) -> Result<Effect, String> {
        if !Role::may_publish(submitter.role) {
            return Err(format!("{} may not publish schemas", txn.submitter_did));
        }
        let schema: Schema =
            serde_json::from_value(txn.payload.clone()).map_err(|e| e.to_string())?;
        schema.validate().map_err(|e| e.to_string())?;
        if schema.issuer_did() != txn.submitter_did {
            return Err(format!("schema {} is not owned by the submitter", schema.id));
        }
        if state.schemas.contains_key(&schema.id) {
            return Err(format!("schema {} already exists", schema.id));
        }
        Ok(Effect::Schema(schema))
    }

    fn check_cred_def(
        state: &LedgerState,
        txn: &LedgerTransaction,
        submitter: &NymRecord,
    ) -> Result<Effect, String> {
        if !Role::may_publish(submitter.role) {
            return Err(format!(
                "{} may not publish credential definitions",
                txn.submitter_did
            ));
        }
        let cred_def: CredentialDefinition =
            serde_json::from_value(txn.payload.clone()).map_err(|e| e.to_string())?;
        if cred_def.issuer_did() != txn.submitter_did {
            return Err(format!(
                "credential definition {} is not owned by the submitter",
                cred_def.id
            ));
        }
        if cred_def.id.schema_id() != cred_def.schema_id {
            return Err(format!(
                "credential definition {} does not match schema {}",
                cred_def.id, cred_def.schema_id
            ));
        }
        if !state.schemas.contains_key(&cred_def.schema_id) {
            return Err(format!("schema {} is not on the ledger", cred_def.schema_id));
        }
        if state.cred_defs.contains_key(&cred_def.id) {
            return Err(format!("credential definition {} already exists", cred_def.id));
        }
        Ok(Effect::CredDef(cred_def))
    }

    /// Answer a read query.
    pub fn query(&self, query: &ReadQuery) -> Result<ReadReply, LedgerError> {
        let state = self.read_state();
        let reply = match query {
            ReadQuery::GetNym { dest } => match state.nyms.get(dest) {
                Some(record) => {
                    let data = NymData {
                        did: dest.clone(),
                        verkey: record.verkey.clone(),
                        role: record.role,
                        seq_no: record.seq_no,
                    };
                    ReadReply::found(serde_json::to_value(data)?, record.seq_no)
                }
                None => ReadReply::not_found(),
            },
            ReadQuery::GetSchema { id } => match state.schemas.get(id) {
                Some(schema) => {
                    ReadReply::found(serde_json::to_value(schema)?, schema.seq_no.unwrap_or_default())
                }
                None => ReadReply::not_found(),
            },
            ReadQuery::GetCredDef { id } => match state.cred_defs.get(id) {
                Some((cred_def, seq_no)) => ReadReply::found(serde_json::to_value(cred_def)?, *seq_no),
                None => ReadReply::not_found(),
            },
        };
        tracing::debug!(query = %query, found = reply.data.is_some(), "ledger read");
        Ok(reply)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerService for InMemoryLedger {
    async fn submit(&self, txn: &LedgerTransaction) -> Result<LedgerReply, LedgerError> {
        self.apply(txn)
    }

    async fn read(&self, query: &ReadQuery) -> Result<ReadReply, LedgerError> {
        self.query(query)
    }

    fn service_id(&self) -> &str {
        &self.id
    }
}
