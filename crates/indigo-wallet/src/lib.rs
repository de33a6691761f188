//! Indigo Wallet: the keyring that owns every private key and secret, the
//! wallet lifecycle around it, and a tagged record store.

pub mod error;
pub mod keyring;
pub mod manager;
pub mod records;

pub use error::WalletError;
pub use keyring::{Identity, Keyring};
pub use manager::{Wallet, WalletConfig, WalletCredentials, WalletHandle, WalletManager};
pub use records::RecordStore;
