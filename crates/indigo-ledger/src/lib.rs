//! Indigo Ledger: builds, signs and submits NYM, SCHEMA and CRED_DEF
//! transactions and reads them back, against any [`LedgerService`].

pub mod client;
pub mod error;
pub mod genesis;
pub mod http;
pub mod memory;
pub mod pool;
pub mod service;
pub mod transaction;

pub use client::LedgerClient;
pub use error::LedgerError;
pub use genesis::{load_genesis, parse_genesis, GenesisNym};
pub use http::HttpLedgerService;
pub use memory::InMemoryLedger;
pub use pool::{Pool, PoolConfig, PoolRegistry};
pub use service::LedgerService;
pub use transaction::{
    LedgerReply, LedgerTransaction, NymData, NymPayload, ReadQuery, ReadReply, ReplyOp, TxnResult,
    TxnType,
};
