//! Ledger client: builds and signs transactions with keys from a
//! [`Keyring`], sends them through an open [`Pool`] and interprets replies.

use std::future::Future;
use std::sync::Arc;

use indigo_core::{
    CredDefId, CredentialDefinition, Did, RetryPolicy, Role, Schema, SchemaId, Verkey,
};
use indigo_wallet::Keyring;

use crate::error::LedgerError;
use crate::pool::Pool;
use crate::transaction::{
    LedgerReply, LedgerTransaction, NymData, NymPayload, ReadQuery, ReadReply, ReplyOp, TxnResult,
    TxnType,
};

pub struct LedgerClient {
    pool: Arc<Pool>,
    keyring: Arc<Keyring>,
    retry: RetryPolicy,
}

impl LedgerClient {
    pub fn new(pool: Arc<Pool>, keyring: Arc<Keyring>) -> Self {
        Self {
            pool,
            keyring,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    pub fn keyring(&self) -> &Arc<Keyring> {
        &self.keyring
    }

    // --- Building ---

    fn sign(&self, mut txn: LedgerTransaction) -> Result<LedgerTransaction, LedgerError> {
        let bytes = txn.signing_bytes()?;
        let signature = self.keyring.sign(&txn.submitter_did, &bytes)?;
        txn.signature = Some(signature.to_bs58());
        Ok(txn)
    }

    /// Signed NYM creating `target`, or updating it when `target` is the
    /// submitter itself.
    pub fn prepare_nym(
        &self,
        submitter: &Did,
        target: &Did,
        verkey: Option<&Verkey>,
        role: Option<Role>,
    ) -> Result<LedgerTransaction, LedgerError> {
        let payload = NymPayload {
            dest: target.clone(),
            verkey: verkey.cloned(),
            role,
        };
        self.sign(LedgerTransaction::new(
            TxnType::Nym,
            submitter.clone(),
            serde_json::to_value(payload)?,
        ))
    }

    pub fn prepare_schema(
        &self,
        submitter: &Did,
        schema: &Schema,
    ) -> Result<LedgerTransaction, LedgerError> {
        schema.validate()?;
        self.sign(LedgerTransaction::new(
            TxnType::Schema,
            submitter.clone(),
            serde_json::to_value(schema)?,
        ))
    }

    pub fn prepare_cred_def(
        &self,
        submitter: &Did,
        cred_def: &CredentialDefinition,
    ) -> Result<LedgerTransaction, LedgerError> {
        self.sign(LedgerTransaction::new(
            TxnType::CredDef,
            submitter.clone(),
            serde_json::to_value(cred_def)?,
        ))
    }

    // --- Sending ---

    /// Run `call` under the per-attempt deadline, retrying transport
    /// failures with backoff. A deadline miss is returned immediately since
    /// the request may still have been applied.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(self.retry.request_timeout(), call()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(
                        request = what,
                        attempt,
                        timeout_ms = self.retry.request_timeout_ms,
                        "ledger request timed out"
                    );
                    return Err(LedgerError::Timeout);
                }
            };
            match outcome {
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        request = what,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "ledger unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Submit a signed transaction and wait for the ledger's verdict.
    ///
    /// Safe to call again with the same `txn` after `Timeout`, `Cancelled`
    /// or `NetworkUnavailable`: the ledger deduplicates by content hash.
    pub async fn submit_prepared(&self, txn: &LedgerTransaction) -> Result<TxnResult, LedgerError> {
        let pool = self.pool.as_ref();
        let reply = self
            .with_retry("submit", move || pool.submit(txn))
            .await?;
        Self::accept(txn, reply)
    }

    /// As [`LedgerClient::submit_prepared`], abandoning the request when
    /// `cancel` completes first. A cancelled submission is not confirmed.
    pub async fn submit_prepared_until<C>(
        &self,
        txn: &LedgerTransaction,
        cancel: C,
    ) -> Result<TxnResult, LedgerError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                tracing::warn!(req_id = txn.req_id, txn_type = %txn.txn_type, "submission cancelled");
                Err(LedgerError::Cancelled)
            }
            result = self.submit_prepared(txn) => result,
        }
    }

    fn accept(txn: &LedgerTransaction, reply: LedgerReply) -> Result<TxnResult, LedgerError> {
        if reply.req_id != txn.req_id {
            return Err(LedgerError::InvalidResponse(format!(
                "reply for request {} while waiting for {}",
                reply.req_id, txn.req_id
            )));
        }
        match reply.op {
            ReplyOp::Reply => {
                let result = reply.result.ok_or_else(|| {
                    LedgerError::InvalidResponse("REPLY without a result".to_string())
                })?;
                tracing::info!(
                    txn_type = %txn.txn_type,
                    submitter = %txn.submitter_did,
                    seq_no = result.seq_no,
                    "transaction confirmed"
                );
                Ok(result)
            }
            ReplyOp::Reject => {
                let reason = reply.reason.unwrap_or_default();
                tracing::warn!(
                    txn_type = %txn.txn_type,
                    submitter = %txn.submitter_did,
                    reason = %reason,
                    "transaction rejected"
                );
                Err(LedgerError::RejectedTransaction(reason))
            }
        }
    }

    /// Write a NYM for `target`, signed by `submitter`.
    pub async fn submit_nym(
        &self,
        submitter: &Did,
        target: &Did,
        verkey: Option<&Verkey>,
        role: Option<Role>,
    ) -> Result<TxnResult, LedgerError> {
        let txn = self.prepare_nym(submitter, target, verkey, role)?;
        self.submit_prepared(&txn).await
    }

    pub async fn submit_schema(
        &self,
        submitter: &Did,
        schema: &Schema,
    ) -> Result<SchemaId, LedgerError> {
        let txn = self.prepare_schema(submitter, schema)?;
        self.submit_prepared(&txn).await?;
        Ok(schema.id.clone())
    }

    pub async fn submit_cred_def(
        &self,
        submitter: &Did,
        cred_def: &CredentialDefinition,
    ) -> Result<CredDefId, LedgerError> {
        let txn = self.prepare_cred_def(submitter, cred_def)?;
        self.submit_prepared(&txn).await?;
        Ok(cred_def.id.clone())
    }

    // --- Reading ---

    async fn read(&self, query: &ReadQuery) -> Result<serde_json::Value, LedgerError> {
        let pool = self.pool.as_ref();
        let reply: ReadReply = self.with_retry("read", move || pool.read(query)).await?;
        match (reply.op, reply.data) {
            (ReplyOp::Reject, _) => Err(LedgerError::RejectedTransaction(
                reply.reason.unwrap_or_default(),
            )),
            (ReplyOp::Reply, None) => Err(LedgerError::NotFound(query.to_string())),
            (ReplyOp::Reply, Some(data)) => Ok(data),
        }
    }

    /// Current ledger state of `did`.
    pub async fn get_nym(&self, did: &Did) -> Result<NymData, LedgerError> {
        let data = self.read(&ReadQuery::GetNym { dest: did.clone() }).await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn get_schema(&self, id: &SchemaId) -> Result<Schema, LedgerError> {
        let data = self.read(&ReadQuery::GetSchema { id: id.clone() }).await?;
        let schema: Schema = serde_json::from_value(data)?;
        schema.validate()?;
        Ok(schema)
    }

    pub async fn get_cred_def(&self, id: &CredDefId) -> Result<CredentialDefinition, LedgerError> {
        let data = self.read(&ReadQuery::GetCredDef { id: id.clone() }).await?;
        Ok(serde_json::from_value(data)?)
    }

    // --- Key rotation ---

    /// Rotate the verkey of `did`.
    ///
    /// A pending key is created in the keyring and announced with a NYM
    /// signed by the current key. The keyring commits once the ledger
    /// confirms and discards on rejection. On any other failure the outcome
    /// is unknown and the rotation stays pending; resolve it later with
    /// [`LedgerClient::reconcile_rotation`].
    pub async fn rotate_key(&self, did: &Did) -> Result<Verkey, LedgerError> {
        let pending = self.keyring.rotate_key(did)?;
        let txn = match self.prepare_nym(did, did, Some(&pending), None) {
            Ok(txn) => txn,
            Err(e) => {
                self.keyring.discard_pending_rotation(did)?;
                return Err(e);
            }
        };

        match self.submit_prepared(&txn).await {
            Ok(result) => {
                let verkey = self.keyring.commit_rotation(did)?;
                tracing::info!(did = %did, seq_no = result.seq_no, "key rotation committed");
                Ok(verkey)
            }
            Err(LedgerError::RejectedTransaction(reason)) => {
                self.keyring.discard_pending_rotation(did)?;
                tracing::warn!(did = %did, reason = %reason, "key rotation rejected, discarded");
                Err(LedgerError::RejectedTransaction(reason))
            }
            Err(e) => {
                tracing::warn!(did = %did, error = %e, "key rotation outcome unknown, left pending");
                Err(e)
            }
        }
    }

    /// Settle a pending rotation against the ledger: commit if the ledger
    /// holds the pending verkey, discard otherwise. Returns the verkey that
    /// is current afterwards.
    pub async fn reconcile_rotation(&self, did: &Did) -> Result<Verkey, LedgerError> {
        let Some(pending) = self.keyring.pending_verkey(did)? else {
            return Ok(self.keyring.verkey(did)?);
        };
        let on_ledger = self.get_nym(did).await?;
        if on_ledger.verkey == pending {
            let verkey = self.keyring.commit_rotation(did)?;
            tracing::info!(did = %did, "pending rotation found on ledger, committed");
            Ok(verkey)
        } else {
            self.keyring.discard_pending_rotation(did)?;
            tracing::info!(did = %did, "pending rotation absent from ledger, discarded");
            Ok(self.keyring.verkey(did)?)
        }
    }
}
