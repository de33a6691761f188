use async_trait::async_trait;

use crate::error::LedgerError;
use crate::transaction::{LedgerReply, LedgerTransaction, ReadQuery, ReadReply};

/// A ledger that accepts signed write transactions and answers reads.
///
/// A `REJECT` is a normal reply, not an `Err`: errors are reserved for
/// transport failures where the outcome of the request is unknown.
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Submit a signed write transaction.
    async fn submit(&self, txn: &LedgerTransaction) -> Result<LedgerReply, LedgerError>;

    /// Run a read query.
    async fn read(&self, query: &ReadQuery) -> Result<ReadReply, LedgerError>;

    /// Identifier for logs (e.g. "in-memory", or the node URL).
    fn service_id(&self) -> &str;
}
