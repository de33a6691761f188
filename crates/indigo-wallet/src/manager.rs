//! Wallet lifecycle: create, open (scoped), close, delete.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::WalletError;
use crate::keyring::Keyring;
use crate::records::RecordStore;

/// Wallet identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    pub id: String,
}

impl WalletConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Secret that unlocks a wallet.
#[derive(Clone, Serialize, Deserialize)]
pub struct WalletCredentials {
    pub key: String,
}

impl WalletCredentials {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl std::fmt::Debug for WalletCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletCredentials").finish_non_exhaustive()
    }
}

/// Keyring plus records of one wallet.
pub struct Wallet {
    id: String,
    keyring: Arc<Keyring>,
    records: RecordStore,
}

impl Wallet {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Keyring of the open wallet, borrowed through its handle.
    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// Owned keyring for services that sign or decrypt on the wallet's
    /// behalf. The wallet stays in use until every shared clone is dropped:
    /// `delete_wallet` refuses it even after the handle closes.
    pub fn share_keyring(&self) -> Arc<Keyring> {
        self.keyring.clone()
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }
}

struct WalletSlot {
    key_hash: String,
    wallet: Arc<Wallet>,
    open: Arc<AtomicBool>,
}

/// Registry of wallets known to this process.
pub struct WalletManager {
    wallets: DashMap<String, WalletSlot>,
}

impl WalletManager {
    pub fn new() -> Self {
        Self {
            wallets: DashMap::new(),
        }
    }

    /// Create a wallet. Fails with `ConfigurationConflict` if the id is taken.
    pub fn create_wallet(
        &self,
        config: &WalletConfig,
        credentials: &WalletCredentials,
    ) -> Result<(), WalletError> {
        if self.wallets.contains_key(&config.id) {
            return Err(WalletError::ConfigurationConflict(config.id.clone()));
        }
        let key_hash = indigo_crypto::kdf::hash_password(credentials.key.as_bytes())?;

        match self.wallets.entry(config.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(WalletError::ConfigurationConflict(config.id.clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(WalletSlot {
                    key_hash,
                    wallet: Arc::new(Wallet {
                        id: config.id.clone(),
                        keyring: Arc::new(Keyring::new()),
                        records: RecordStore::new(),
                    }),
                    open: Arc::new(AtomicBool::new(false)),
                });
                tracing::info!(wallet = %config.id, "wallet created");
                Ok(())
            }
        }
    }

    fn check_key(
        &self,
        config: &WalletConfig,
        credentials: &WalletCredentials,
    ) -> Result<(Arc<Wallet>, Arc<AtomicBool>), WalletError> {
        let (key_hash, wallet, open) = {
            let slot = self
                .wallets
                .get(&config.id)
                .ok_or_else(|| WalletError::WalletNotFound(config.id.clone()))?;
            (slot.key_hash.clone(), slot.wallet.clone(), slot.open.clone())
        };
        if !indigo_crypto::kdf::verify_password(credentials.key.as_bytes(), &key_hash)? {
            tracing::warn!(wallet = %config.id, "wallet key rejected");
            return Err(WalletError::AccessDenied(config.id.clone()));
        }
        Ok((wallet, open))
    }

    /// Open a wallet. The returned handle closes it when dropped.
    pub fn open_wallet(
        &self,
        config: &WalletConfig,
        credentials: &WalletCredentials,
    ) -> Result<WalletHandle, WalletError> {
        let (wallet, open) = self.check_key(config, credentials)?;
        if open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WalletError::WalletAlreadyOpen(config.id.clone()));
        }
        tracing::info!(wallet = %config.id, "wallet opened");
        Ok(WalletHandle { wallet, open })
    }

    /// Delete a closed wallet and everything in it.
    pub fn delete_wallet(
        &self,
        config: &WalletConfig,
        credentials: &WalletCredentials,
    ) -> Result<(), WalletError> {
        let (wallet, _) = self.check_key(config, credentials)?;
        let mut replaced = false;
        // The open flag is claimed under the shard lock and never released, so
        // an open racing this delete either wins first or fails afterwards.
        let removed = self.wallets.remove_if(&config.id, |_, slot| {
            if !Arc::ptr_eq(&slot.wallet, &wallet) {
                replaced = true;
                return false;
            }
            Arc::strong_count(&slot.wallet.keyring) == 1
                && slot
                    .open
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
        });
        match removed {
            Some(_) => {
                tracing::info!(wallet = %config.id, "wallet deleted");
                Ok(())
            }
            None if replaced => Err(WalletError::WalletNotFound(config.id.clone())),
            None => Err(WalletError::WalletAlreadyOpen(config.id.clone())),
        }
    }

    pub fn exists(&self, id: &str) -> bool {
        self.wallets.contains_key(id)
    }
}

impl Default for WalletManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped access to an open wallet.
pub struct WalletHandle {
    wallet: Arc<Wallet>,
    open: Arc<AtomicBool>,
}

impl WalletHandle {
    /// Close explicitly. Equivalent to dropping the handle.
    pub fn close(self) {}
}

impl Deref for WalletHandle {
    type Target = Wallet;

    fn deref(&self) -> &Wallet {
        &self.wallet
    }
}

impl Drop for WalletHandle {
    fn drop(&mut self) {
        self.open.store(false, Ordering::Release);
        tracing::info!(wallet = %self.wallet.id, "wallet closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (WalletManager, WalletConfig, WalletCredentials) {
        let manager = WalletManager::new();
        let config = WalletConfig::new("alice_wallet");
        let credentials = WalletCredentials::new("alice_wallet_key");
        manager.create_wallet(&config, &credentials).unwrap();
        (manager, config, credentials)
    }

    #[test]
    fn test_create_conflict() {
        let (manager, config, credentials) = setup();
        assert!(matches!(
            manager.create_wallet(&config, &credentials),
            Err(WalletError::ConfigurationConflict(_))
        ));
    }

    #[test]
    fn test_open_wrong_key() {
        let (manager, config, _) = setup();
        let result = manager.open_wallet(&config, &WalletCredentials::new("nope"));
        assert!(matches!(result, Err(WalletError::AccessDenied(_))));
    }

    #[test]
    fn test_open_unknown_wallet() {
        let manager = WalletManager::new();
        let result =
            manager.open_wallet(&WalletConfig::new("ghost"), &WalletCredentials::new("k"));
        assert!(matches!(result, Err(WalletError::WalletNotFound(_))));
    }

    #[test]
    fn test_handle_scope_closes_wallet() {
        let (manager, config, credentials) = setup();
        {
            let handle = manager.open_wallet(&config, &credentials).unwrap();
            assert_eq!(handle.id(), "alice_wallet");
            assert!(matches!(
                manager.open_wallet(&config, &credentials),
                Err(WalletError::WalletAlreadyOpen(_))
            ));
        }
        let handle = manager.open_wallet(&config, &credentials).unwrap();
        handle.close();
    }

    #[test]
    fn test_contents_survive_reopen() {
        let (manager, config, credentials) = setup();
        let did = {
            let handle = manager.open_wallet(&config, &credentials).unwrap();
            handle.keyring().create_identity().unwrap().did
        };
        let handle = manager.open_wallet(&config, &credentials).unwrap();
        assert!(handle.keyring().identity(&did).is_ok());
    }

    #[test]
    fn test_delete_requires_closed_wallet() {
        let (manager, config, credentials) = setup();
        let handle = manager.open_wallet(&config, &credentials).unwrap();
        assert!(matches!(
            manager.delete_wallet(&config, &credentials),
            Err(WalletError::WalletAlreadyOpen(_))
        ));
        drop(handle);
        manager.delete_wallet(&config, &credentials).unwrap();
        assert!(!manager.exists("alice_wallet"));
        manager.create_wallet(&config, &credentials).unwrap();
    }

    #[test]
    fn test_shared_keyring_keeps_wallet_in_use() {
        let (manager, config, credentials) = setup();
        let shared = {
            let handle = manager.open_wallet(&config, &credentials).unwrap();
            handle.share_keyring()
        };
        assert!(matches!(
            manager.delete_wallet(&config, &credentials),
            Err(WalletError::WalletAlreadyOpen(_))
        ));
        drop(shared);
        manager.delete_wallet(&config, &credentials).unwrap();
    }

    #[test]
    fn test_delete_and_open_never_both_win() {
        for round in 0..8 {
            let manager = WalletManager::new();
            let config = WalletConfig::new(format!("race_{}", round));
            let credentials = WalletCredentials::new("k");
            manager.create_wallet(&config, &credentials).unwrap();

            let (opened, deleted) = std::thread::scope(|scope| {
                let opener = scope.spawn(|| manager.open_wallet(&config, &credentials));
                let deleter = scope.spawn(|| manager.delete_wallet(&config, &credentials));
                (opener.join().unwrap(), deleter.join().unwrap())
            });
            assert!(
                !(opened.is_ok() && deleted.is_ok()),
                "round {}: wallet opened and deleted at once",
                round
            );
        }
    }

    #[test]
    fn test_credentials_debug_hides_key() {
        let rendered = format!("{:?}", WalletCredentials::new("secret-key"));
        assert!(!rendered.contains("secret-key"));
    }
}
