//! Shared node state for the HTTP handlers.

use std::sync::Arc;
use std::time::Instant;

use indigo_ledger::InMemoryLedger;

pub struct NodeState {
    pub ledger: Arc<InMemoryLedger>,
    /// When the node started.
    pub start_time: Instant,
}

impl NodeState {
    pub fn new(ledger: Arc<InMemoryLedger>) -> Self {
        Self {
            ledger,
            start_time: Instant::now(),
        }
    }
}
