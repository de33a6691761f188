//! In-memory keyring.
//!
//! Private keys never leave this module: callers ask the keyring to sign,
//! agree on a key, or open a sealed box, and get results back. Each DID lives
//! in its own `DashMap` entry, so readers run concurrently and writers to the
//! same DID are serialized. No guard is held across an `.await`.

use dashmap::DashMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use indigo_core::{CoreError, Did, RotationEvent, RotationState, RotationStateMachine, Verkey};
use indigo_crypto::{KeyPair, PublicKey, SealedBox, Signature};

use crate::error::WalletError;

/// Public view of an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub did: Did,
    pub verkey: Verkey,
}

struct IdentityEntry {
    current: KeyPair,
    pending: Option<KeyPair>,
    retired: Vec<Verkey>,
    state: RotationState,
    metadata: Option<String>,
}

impl IdentityEntry {
    fn key_for(&self, verkey: &Verkey) -> Option<&KeyPair> {
        if self.current.verkey() == *verkey {
            return Some(&self.current);
        }
        self.pending.as_ref().filter(|kp| kp.verkey() == *verkey)
    }
}

/// Owns identity keys, label-bound signing keys and raw secrets.
pub struct Keyring {
    identities: DashMap<Did, IdentityEntry>,
    /// Every live verkey (current or pending) → owning DID.
    verkeys: DashMap<Verkey, Did>,
    /// Signing keys addressed by label, e.g. credential definition keys.
    signers: DashMap<String, KeyPair>,
    /// Link secrets and other raw 32-byte secrets.
    secrets: DashMap<String, Zeroizing<[u8; 32]>>,
}

impl Keyring {
    pub fn new() -> Self {
        Self {
            identities: DashMap::new(),
            verkeys: DashMap::new(),
            signers: DashMap::new(),
            secrets: DashMap::new(),
        }
    }

    /// Create an identity from fresh randomness.
    pub fn create_identity(&self) -> Result<Identity, WalletError> {
        self.insert_identity(KeyPair::generate())
    }

    /// Create an identity deterministically from a 32-byte seed.
    #[cfg(any(test, feature = "seeded-identities"))]
    pub fn create_identity_from_seed(&self, seed: &[u8; 32]) -> Result<Identity, WalletError> {
        self.insert_identity(KeyPair::from_seed(seed))
    }

    fn insert_identity(&self, keypair: KeyPair) -> Result<Identity, WalletError> {
        let verkey = keypair.verkey();
        let did = Did::from_verkey(&verkey);

        match self.identities.entry(did.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(WalletError::DuplicateIdentity(did.to_string()));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(IdentityEntry {
                    current: keypair,
                    pending: None,
                    retired: Vec::new(),
                    state: RotationState::Active,
                    metadata: None,
                });
            }
        }
        self.verkeys.insert(verkey.clone(), did.clone());

        tracing::info!(did = %did, verkey = %verkey, "identity created");
        Ok(Identity { did, verkey })
    }

    pub fn identity(&self, did: &Did) -> Result<Identity, WalletError> {
        let entry = self
            .identities
            .get(did)
            .ok_or_else(|| WalletError::UnknownIdentity(did.to_string()))?;
        Ok(Identity {
            did: did.clone(),
            verkey: entry.current.verkey(),
        })
    }

    /// Current verkey of a DID.
    pub fn verkey(&self, did: &Did) -> Result<Verkey, WalletError> {
        self.identity(did).map(|identity| identity.verkey)
    }

    pub fn list_identities(&self) -> Vec<Identity> {
        self.identities
            .iter()
            .map(|entry| Identity {
                did: entry.key().clone(),
                verkey: entry.current.verkey(),
            })
            .collect()
    }

    pub fn did_for_verkey(&self, verkey: &Verkey) -> Option<Did> {
        self.verkeys.get(verkey).map(|did| did.clone())
    }

    pub fn set_metadata(&self, did: &Did, metadata: impl Into<String>) -> Result<(), WalletError> {
        let mut entry = self
            .identities
            .get_mut(did)
            .ok_or_else(|| WalletError::UnknownIdentity(did.to_string()))?;
        entry.metadata = Some(metadata.into());
        Ok(())
    }

    pub fn metadata(&self, did: &Did) -> Result<Option<String>, WalletError> {
        self.identities
            .get(did)
            .map(|entry| entry.metadata.clone())
            .ok_or_else(|| WalletError::UnknownIdentity(did.to_string()))
    }

    /// Sign with the DID's current key. A pending rotation does not change
    /// which key signs until it is committed.
    pub fn sign(&self, did: &Did, data: &[u8]) -> Result<Signature, WalletError> {
        let entry = self
            .identities
            .get(did)
            .ok_or_else(|| WalletError::UnknownIdentity(did.to_string()))?;
        Ok(indigo_crypto::sign(data, &entry.current))
    }

    /// Sign with the pending key. Used to prove control of the new key.
    pub fn sign_with_pending(&self, did: &Did, data: &[u8]) -> Result<Signature, WalletError> {
        let entry = self
            .identities
            .get(did)
            .ok_or_else(|| WalletError::UnknownIdentity(did.to_string()))?;
        let pending = entry
            .pending
            .as_ref()
            .ok_or_else(|| WalletError::NoPendingRotation(did.to_string()))?;
        Ok(indigo_crypto::sign(data, pending))
    }

    pub fn rotation_state(&self, did: &Did) -> Result<RotationState, WalletError> {
        self.identities
            .get(did)
            .map(|entry| entry.state)
            .ok_or_else(|| WalletError::UnknownIdentity(did.to_string()))
    }

    fn advance(did: &Did, entry: &mut IdentityEntry, event: RotationEvent) -> Result<(), WalletError> {
        entry.state = RotationStateMachine::transition(entry.state, event).map_err(|e| match e {
            CoreError::InvalidStateTransition {
                from: RotationState::RotationPending,
                ..
            } => WalletError::RotationAlreadyPending(did.to_string()),
            CoreError::InvalidStateTransition { .. } => {
                WalletError::NoPendingRotation(did.to_string())
            }
            other => WalletError::Core(other),
        })?;
        Ok(())
    }

    /// Generate a replacement key. It stays pending until `commit_rotation`.
    pub fn rotate_key(&self, did: &Did) -> Result<Verkey, WalletError> {
        let mut entry = self
            .identities
            .get_mut(did)
            .ok_or_else(|| WalletError::UnknownIdentity(did.to_string()))?;
        Self::advance(did, &mut entry, RotationEvent::Begin)?;

        let pending = KeyPair::generate();
        let verkey = pending.verkey();
        entry.pending = Some(pending);
        drop(entry);

        self.verkeys.insert(verkey.clone(), did.clone());
        tracing::info!(did = %did, pending_verkey = %verkey, "key rotation started");
        Ok(verkey)
    }

    pub fn pending_verkey(&self, did: &Did) -> Result<Option<Verkey>, WalletError> {
        self.identities
            .get(did)
            .map(|entry| entry.pending.as_ref().map(KeyPair::verkey))
            .ok_or_else(|| WalletError::UnknownIdentity(did.to_string()))
    }

    /// Promote the pending key to current; the old verkey becomes historical.
    pub fn commit_rotation(&self, did: &Did) -> Result<Verkey, WalletError> {
        let mut entry = self
            .identities
            .get_mut(did)
            .ok_or_else(|| WalletError::UnknownIdentity(did.to_string()))?;
        Self::advance(did, &mut entry, RotationEvent::Commit)?;

        let pending = entry
            .pending
            .take()
            .ok_or_else(|| WalletError::NoPendingRotation(did.to_string()))?;
        let new_verkey = pending.verkey();
        let old = std::mem::replace(&mut entry.current, pending);
        let old_verkey = old.verkey();
        entry.retired.push(old_verkey.clone());
        drop(entry);

        self.verkeys.remove(&old_verkey);
        tracing::info!(did = %did, old_verkey = %old_verkey, verkey = %new_verkey, "key rotation committed");
        Ok(new_verkey)
    }

    /// Drop the pending key and keep signing with the current one.
    pub fn discard_pending_rotation(&self, did: &Did) -> Result<(), WalletError> {
        let mut entry = self
            .identities
            .get_mut(did)
            .ok_or_else(|| WalletError::UnknownIdentity(did.to_string()))?;
        Self::advance(did, &mut entry, RotationEvent::Discard)?;
        let discarded = entry.pending.take().map(|kp| kp.verkey());
        drop(entry);

        if let Some(verkey) = discarded {
            self.verkeys.remove(&verkey);
            tracing::warn!(did = %did, verkey = %verkey, "pending key rotation discarded");
        }
        Ok(())
    }

    /// Verkeys this DID used before its latest committed rotation, oldest first.
    pub fn retired_verkeys(&self, did: &Did) -> Result<Vec<Verkey>, WalletError> {
        self.identities
            .get(did)
            .map(|entry| entry.retired.clone())
            .ok_or_else(|| WalletError::UnknownIdentity(did.to_string()))
    }

    fn with_key<R>(
        &self,
        verkey: &Verkey,
        f: impl FnOnce(&KeyPair) -> Result<R, WalletError>,
    ) -> Result<R, WalletError> {
        let did = self
            .did_for_verkey(verkey)
            .ok_or_else(|| WalletError::UnknownVerkey(verkey.to_string()))?;
        let entry = self
            .identities
            .get(&did)
            .ok_or_else(|| WalletError::UnknownIdentity(did.to_string()))?;
        let keypair = entry
            .key_for(verkey)
            .ok_or_else(|| WalletError::UnknownVerkey(verkey.to_string()))?;
        f(keypair)
    }

    /// Whether this keyring holds the private key for `verkey`.
    pub fn owns_verkey(&self, verkey: &Verkey) -> bool {
        self.with_key(verkey, |_| Ok(())).is_ok()
    }

    /// Symmetric key shared between a local verkey and a peer verkey.
    pub fn key_agreement(
        &self,
        local: &Verkey,
        peer: &Verkey,
    ) -> Result<Zeroizing<[u8; 32]>, WalletError> {
        let peer_key = PublicKey::from_verkey(peer)?;
        self.with_key(local, |kp| Ok(indigo_crypto::key_agreement(kp, &peer_key)?))
    }

    /// Open an anonymous sealed box addressed to `verkey`.
    pub fn open_sealed(&self, verkey: &Verkey, sealed: &SealedBox) -> Result<Vec<u8>, WalletError> {
        self.with_key(verkey, |kp| Ok(indigo_crypto::open_sealed(sealed, kp)?))
    }

    /// Generate a signing key addressed by label and return its verkey.
    pub fn create_signing_key(&self, label: &str) -> Result<Verkey, WalletError> {
        match self.signers.entry(label.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(WalletError::DuplicateSecret(label.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let keypair = KeyPair::generate();
                let verkey = keypair.verkey();
                slot.insert(keypair);
                tracing::debug!(label, verkey = %verkey, "signing key created");
                Ok(verkey)
            }
        }
    }

    pub fn sign_with_label(&self, label: &str, data: &[u8]) -> Result<Signature, WalletError> {
        let keypair = self
            .signers
            .get(label)
            .ok_or_else(|| WalletError::UnknownSecret(label.to_string()))?;
        Ok(indigo_crypto::sign(data, &keypair))
    }

    /// Create a random 32-byte link secret. At most one per label.
    pub fn create_link_secret(&self, label: &str) -> Result<(), WalletError> {
        self.insert_random_secret(label)
            .ok_or_else(|| WalletError::DuplicateLinkSecret(label.to_string()))?;
        tracing::info!(label, "link secret created");
        Ok(())
    }

    /// Create the random seed a credential signing key is derived from.
    pub fn create_credential_key(&self, label: &str) -> Result<(), WalletError> {
        self.insert_random_secret(label)
            .ok_or_else(|| WalletError::DuplicateSecret(label.to_string()))?;
        tracing::debug!(label, "credential key created");
        Ok(())
    }

    fn insert_random_secret(&self, label: &str) -> Option<()> {
        match self.secrets.entry(label.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let mut secret = Zeroizing::new([0u8; 32]);
                rand::rngs::OsRng.fill_bytes(&mut secret[..]);
                slot.insert(secret);
                Some(())
            }
        }
    }

    pub fn has_secret(&self, label: &str) -> bool {
        self.secrets.contains_key(label)
    }

    /// Run `f` with read access to a stored secret.
    pub fn with_secret<R>(
        &self,
        label: &str,
        f: impl FnOnce(&[u8; 32]) -> R,
    ) -> Result<R, WalletError> {
        let secret = self
            .secrets
            .get(label)
            .ok_or_else(|| WalletError::UnknownSecret(label.to_string()))?;
        Ok(f(&secret))
    }
}

impl Default for Keyring {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indigo_crypto::verify;

    const STEWARD_SEED: &[u8; 32] = b"000000000000000000000000Steward1";

    fn verify_with(verkey: &Verkey, data: &[u8], sig: &Signature) -> bool {
        verify(data, sig, &PublicKey::from_verkey(verkey).unwrap()).is_ok()
    }

    #[test]
    fn test_create_identity() {
        let keyring = Keyring::new();
        let id = keyring.create_identity().unwrap();
        assert_eq!(Did::from_verkey(&id.verkey), id.did);
        assert_eq!(keyring.identity(&id.did).unwrap(), id);
        assert_eq!(keyring.list_identities().len(), 1);
    }

    #[test]
    fn test_seeded_identity_deterministic() {
        let a = Keyring::new().create_identity_from_seed(STEWARD_SEED).unwrap();
        let b = Keyring::new().create_identity_from_seed(STEWARD_SEED).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_seed_rejected() {
        let keyring = Keyring::new();
        keyring.create_identity_from_seed(STEWARD_SEED).unwrap();
        assert!(matches!(
            keyring.create_identity_from_seed(STEWARD_SEED),
            Err(WalletError::DuplicateIdentity(_))
        ));
    }

    #[test]
    fn test_sign_unknown_identity() {
        let keyring = Keyring::new();
        let stranger = Did::from_verkey(&Verkey::from_bytes([1u8; 32]));
        assert!(matches!(
            keyring.sign(&stranger, b"data"),
            Err(WalletError::UnknownIdentity(_))
        ));
    }

    #[test]
    fn test_sign_uses_current_key_while_pending() {
        let keyring = Keyring::new();
        let id = keyring.create_identity().unwrap();
        let new_verkey = keyring.rotate_key(&id.did).unwrap();
        assert_eq!(keyring.rotation_state(&id.did).unwrap(), RotationState::RotationPending);

        let sig = keyring.sign(&id.did, b"during rotation").unwrap();
        assert!(verify_with(&id.verkey, b"during rotation", &sig));
        assert!(!verify_with(&new_verkey, b"during rotation", &sig));
    }

    #[test]
    fn test_commit_rotation() {
        let keyring = Keyring::new();
        let id = keyring.create_identity().unwrap();
        let new_verkey = keyring.rotate_key(&id.did).unwrap();
        assert_eq!(keyring.commit_rotation(&id.did).unwrap(), new_verkey);

        assert_eq!(keyring.verkey(&id.did).unwrap(), new_verkey);
        assert_eq!(keyring.retired_verkeys(&id.did).unwrap(), vec![id.verkey.clone()]);
        assert!(keyring.did_for_verkey(&id.verkey).is_none());
        assert_eq!(keyring.did_for_verkey(&new_verkey), Some(id.did.clone()));

        let sig = keyring.sign(&id.did, b"after").unwrap();
        assert!(verify_with(&new_verkey, b"after", &sig));
    }

    #[test]
    fn test_discard_rotation() {
        let keyring = Keyring::new();
        let id = keyring.create_identity().unwrap();
        let pending = keyring.rotate_key(&id.did).unwrap();
        keyring.discard_pending_rotation(&id.did).unwrap();

        assert_eq!(keyring.verkey(&id.did).unwrap(), id.verkey);
        assert!(keyring.pending_verkey(&id.did).unwrap().is_none());
        assert!(!keyring.owns_verkey(&pending));
        assert_eq!(keyring.rotation_state(&id.did).unwrap(), RotationState::Active);
    }

    #[test]
    fn test_rotation_errors() {
        let keyring = Keyring::new();
        let id = keyring.create_identity().unwrap();
        assert!(matches!(
            keyring.commit_rotation(&id.did),
            Err(WalletError::NoPendingRotation(_))
        ));
        assert!(matches!(
            keyring.discard_pending_rotation(&id.did),
            Err(WalletError::NoPendingRotation(_))
        ));
        keyring.rotate_key(&id.did).unwrap();
        assert!(matches!(
            keyring.rotate_key(&id.did),
            Err(WalletError::RotationAlreadyPending(_))
        ));
    }

    #[test]
    fn test_key_agreement_between_keyrings() {
        let alice = Keyring::new();
        let bob = Keyring::new();
        let a = alice.create_identity().unwrap();
        let b = bob.create_identity().unwrap();
        let k1 = alice.key_agreement(&a.verkey, &b.verkey).unwrap();
        let k2 = bob.key_agreement(&b.verkey, &a.verkey).unwrap();
        assert_eq!(*k1, *k2);
        assert!(matches!(
            alice.key_agreement(&b.verkey, &a.verkey),
            Err(WalletError::UnknownVerkey(_))
        ));
    }

    #[test]
    fn test_open_sealed() {
        let keyring = Keyring::new();
        let id = keyring.create_identity().unwrap();
        let pk = PublicKey::from_verkey(&id.verkey).unwrap();
        let sealed = indigo_crypto::seal(b"hi", &pk).unwrap();
        assert_eq!(keyring.open_sealed(&id.verkey, &sealed).unwrap(), b"hi");
    }

    #[test]
    fn test_link_secret_once_per_label() {
        let keyring = Keyring::new();
        keyring.create_link_secret("main").unwrap();
        assert!(matches!(
            keyring.create_link_secret("main"),
            Err(WalletError::DuplicateLinkSecret(_))
        ));
        let first = keyring.with_secret("main", |s| *s).unwrap();
        let again = keyring.with_secret("main", |s| *s).unwrap();
        assert_eq!(first, again);
        assert!(keyring.with_secret("other", |_| ()).is_err());
    }

    #[test]
    fn test_credential_key_seed() {
        let keyring = Keyring::new();
        keyring.create_credential_key("cred-def").unwrap();
        assert!(keyring.has_secret("cred-def"));
        assert!(matches!(
            keyring.create_credential_key("cred-def"),
            Err(WalletError::DuplicateSecret(_))
        ));
        let seed = keyring.with_secret("cred-def", |s| *s).unwrap();
        assert_ne!(seed, [0u8; 32]);
    }

    #[test]
    fn test_label_signing_key() {
        let keyring = Keyring::new();
        let verkey = keyring.create_signing_key("creddef").unwrap();
        let sig = keyring.sign_with_label("creddef", b"body").unwrap();
        assert!(verify_with(&verkey, b"body", &sig));
        assert!(keyring.create_signing_key("creddef").is_err());
    }

    #[test]
    fn test_metadata() {
        let keyring = Keyring::new();
        let id = keyring.create_identity().unwrap();
        assert_eq!(keyring.metadata(&id.did).unwrap(), None);
        keyring.set_metadata(&id.did, "Faber").unwrap();
        assert_eq!(keyring.metadata(&id.did).unwrap().as_deref(), Some("Faber"));
    }

    #[tokio::test]
    async fn test_concurrent_signing() {
        let keyring = std::sync::Arc::new(Keyring::new());
        let id = keyring.create_identity().unwrap();
        let mut tasks = Vec::new();
        for i in 0..8u8 {
            let keyring = keyring.clone();
            let did = id.did.clone();
            tasks.push(tokio::spawn(async move { keyring.sign(&did, &[i]).unwrap() }));
        }
        for (i, task) in tasks.into_iter().enumerate() {
            let sig = task.await.unwrap();
            assert!(verify_with(&id.verkey, &[i as u8], &sig));
        }
    }
}
