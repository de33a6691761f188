//! Ledger wire model: write transactions, read queries and replies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indigo_core::{CredDefId, Did, Role, SchemaId, Verkey};

use crate::error::LedgerError;

/// Write transaction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxnType {
    #[serde(rename = "NYM")]
    Nym,
    #[serde(rename = "SCHEMA")]
    Schema,
    #[serde(rename = "CRED_DEF")]
    CredDef,
}

impl fmt::Display for TxnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnType::Nym => write!(f, "NYM"),
            TxnType::Schema => write!(f, "SCHEMA"),
            TxnType::CredDef => write!(f, "CRED_DEF"),
        }
    }
}

/// A write transaction. Immutable once signed: resubmitting the same value is
/// idempotent on the ledger side because its content hash does not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTransaction {
    #[serde(rename = "type")]
    pub txn_type: TxnType,
    pub submitter_did: Did,
    pub req_id: u64,
    pub payload: serde_json::Value,
    /// Base58 Ed25519 signature over [`LedgerTransaction::signing_bytes`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl LedgerTransaction {
    /// Unsigned transaction with a fresh request id.
    pub fn new(txn_type: TxnType, submitter_did: Did, payload: serde_json::Value) -> Self {
        Self {
            txn_type,
            submitter_did,
            req_id: next_req_id(),
            payload,
            signature: None,
        }
    }

    /// Canonical bytes covered by the signature: compact JSON with sorted
    /// keys, signature field excluded.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        let mut value = serde_json::to_value(self)?;
        if let serde_json::Value::Object(map) = &mut value {
            map.remove("signature");
        }
        Ok(serde_json::to_vec(&value)?)
    }

    /// Hex BLAKE3 digest of the signing bytes.
    pub fn content_hash(&self) -> Result<String, LedgerError> {
        Ok(hex::encode(indigo_crypto::hash(&self.signing_bytes()?)))
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

static LAST_REQ_ID: AtomicU64 = AtomicU64::new(0);

/// Strictly increasing request id seeded from the wall clock in microseconds.
pub fn next_req_id() -> u64 {
    let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or_default();
    let previous = LAST_REQ_ID
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(previous + 1)
}

/// NYM payload. `verkey: None` on an existing DID keeps its key; `role: None`
/// on an existing DID keeps its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NymPayload {
    pub dest: Did,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verkey: Option<Verkey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Read queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReadQuery {
    #[serde(rename = "GET_NYM")]
    GetNym { dest: Did },
    #[serde(rename = "GET_SCHEMA")]
    GetSchema { id: SchemaId },
    #[serde(rename = "GET_CRED_DEF")]
    GetCredDef { id: CredDefId },
}

impl fmt::Display for ReadQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadQuery::GetNym { dest } => write!(f, "GET_NYM {}", dest),
            ReadQuery::GetSchema { id } => write!(f, "GET_SCHEMA {}", id),
            ReadQuery::GetCredDef { id } => write!(f, "GET_CRED_DEF {}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyOp {
    #[serde(rename = "REPLY")]
    Reply,
    #[serde(rename = "REJECT")]
    Reject,
}

/// A transaction accepted into the ledger log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxnResult {
    pub txn: LedgerTransaction,
    pub req_signature: String,
    pub seq_no: u64,
    pub txn_time: DateTime<Utc>,
}

/// Answer to a write transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReply {
    pub op: ReplyOp,
    pub req_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TxnResult>,
}

impl LedgerReply {
    pub fn reply(result: TxnResult) -> Self {
        Self {
            op: ReplyOp::Reply,
            req_id: result.txn.req_id,
            reason: None,
            result: Some(result),
        }
    }

    pub fn reject(req_id: u64, reason: impl Into<String>) -> Self {
        Self {
            op: ReplyOp::Reject,
            req_id,
            reason: Some(reason.into()),
            result: None,
        }
    }
}

/// Answer to a read query. `data: None` with `op: REPLY` means not found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReply {
    pub op: ReplyOp,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReadReply {
    pub fn found(data: serde_json::Value, seq_no: u64) -> Self {
        Self {
            op: ReplyOp::Reply,
            data: Some(data),
            seq_no: Some(seq_no),
            reason: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            op: ReplyOp::Reply,
            data: None,
            seq_no: None,
            reason: None,
        }
    }
}

/// Current ledger state of a DID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NymData {
    pub did: Did,
    pub verkey: Verkey,
    #[serde(default)]
    pub role: Option<Role>,
    pub seq_no: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indigo_crypto::KeyPair;

    fn did() -> Did {
        Did::from_verkey(&KeyPair::from_seed(&[1u8; 32]).verkey())
    }

    #[test]
    fn test_req_ids_strictly_increase() {
        let mut last = 0;
        for _ in 0..1_000 {
            let id = next_req_id();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn test_signing_bytes_exclude_signature() {
        let mut txn = LedgerTransaction::new(
            TxnType::Nym,
            did(),
            serde_json::json!({ "dest": did(), "role": "STEWARD" }),
        );
        let unsigned = txn.signing_bytes().unwrap();
        let hash = txn.content_hash().unwrap();
        txn.signature = Some("sig".into());
        assert_eq!(txn.signing_bytes().unwrap(), unsigned);
        assert_eq!(txn.content_hash().unwrap(), hash);
        assert!(!String::from_utf8(unsigned).unwrap().contains("signature"));
    }

    #[test]
    fn test_content_hash_tracks_payload_and_req_id() {
        let a = LedgerTransaction::new(TxnType::Nym, did(), serde_json::json!({ "dest": did() }));
        let mut b = a.clone();
        b.req_id += 1;
        assert_ne!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }

    #[test]
    fn test_wire_names() {
        let txn = LedgerTransaction::new(TxnType::CredDef, did(), serde_json::json!({}));
        let json = serde_json::to_value(&txn).unwrap();
        assert_eq!(json["type"], "CRED_DEF");
        assert!(json.get("submitterDid").is_some());
        assert!(json.get("reqId").is_some());
        assert!(json.get("signature").is_none());

        let query = ReadQuery::GetNym { dest: did() };
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["type"], "GET_NYM");
        let back: ReadQuery = serde_json::from_value(json).unwrap();
        assert_eq!(back, query);
    }

    #[test]
    fn test_reject_reply_shape() {
        let reply = LedgerReply::reject(7, "role not allowed");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["op"], "REJECT");
        assert_eq!(json["reqId"], 7);
        assert_eq!(json["reason"], "role not allowed");
        assert!(json.get("result").is_none());
    }
}
