//! Integration test: wallet lifecycle around ledger identities.
//!
//! A wallet's keyring backs a ledger identity, its record store keeps what
//! the agent learned about peers, and both survive close and reopen.

use std::collections::HashMap;

use indigo_core::Did;
use indigo_integration_tests::Network;
use indigo_wallet::{WalletConfig, WalletCredentials, WalletError, WalletManager};

#[tokio::test]
async fn test_wallet_backs_ledger_identity_across_reopen() {
    let (network, trustee) = Network::with_trustee().unwrap();
    let manager = WalletManager::new();
    let config = WalletConfig::new("alice_wallet");
    let credentials = WalletCredentials::new("alice_wallet_key");
    manager.create_wallet(&config, &credentials).unwrap();

    let did = {
        let wallet = manager.open_wallet(&config, &credentials).unwrap();
        let identity = wallet.keyring().create_identity().unwrap();
        wallet
            .keyring()
            .set_metadata(&identity.did, "alice's public DID")
            .unwrap();
        trustee
            .ledger
            .submit_nym(&trustee.did, &identity.did, Some(&identity.verkey), None)
            .await
            .unwrap();

        wallet
            .records()
            .add(
                "pairwise",
                trustee.did.as_str(),
                &trustee.did,
                HashMap::from([("role".to_string(), "TRUSTEE".to_string())]),
            )
            .unwrap();
        identity.did
    };

    // Reopened, the same keyring still signs for the ledger identity.
    let wallet = manager.open_wallet(&config, &credentials).unwrap();
    assert_eq!(
        wallet.keyring().metadata(&did).unwrap().as_deref(),
        Some("alice's public DID")
    );
    let alice = network.agent(did.clone(), wallet.share_keyring()).unwrap();
    let on_ledger = alice.ledger.get_nym(&did).await.unwrap();
    assert_eq!(on_ledger.verkey, wallet.keyring().verkey(&did).unwrap());
    alice.ledger.rotate_key(&did).await.unwrap();

    let peers: Vec<(String, Did)> = wallet
        .records()
        .search("pairwise", &[("role", "TRUSTEE")])
        .unwrap();
    assert_eq!(peers, vec![(trustee.did.to_string(), trustee.did.clone())]);
    wallet.close();
}

#[test]
fn test_wallet_access_rules() {
    let manager = WalletManager::new();
    let config = WalletConfig::new("bob_wallet");
    let credentials = WalletCredentials::new("bob_wallet_key");
    manager.create_wallet(&config, &credentials).unwrap();

    assert!(matches!(
        manager.create_wallet(&config, &credentials),
        Err(WalletError::ConfigurationConflict(_))
    ));
    assert!(matches!(
        manager.open_wallet(&config, &WalletCredentials::new("guess")),
        Err(WalletError::AccessDenied(_))
    ));

    let handle = manager.open_wallet(&config, &credentials).unwrap();
    assert!(matches!(
        manager.open_wallet(&config, &credentials),
        Err(WalletError::WalletAlreadyOpen(_))
    ));
    assert!(matches!(
        manager.delete_wallet(&config, &credentials),
        Err(WalletError::WalletAlreadyOpen(_))
    ));

    drop(handle);
    manager.delete_wallet(&config, &credentials).unwrap();
    assert!(!manager.exists("bob_wallet"));
    assert!(matches!(
        manager.open_wallet(&config, &credentials),
        Err(WalletError::WalletNotFound(_))
    ));
}
