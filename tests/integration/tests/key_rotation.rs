//! Integration test: two-phase key rotation between the keyring and the
//! ledger.

use indigo_core::{Role, RotationState};
use indigo_crypto::{verify, PublicKey, Signature};
use indigo_integration_tests::{steward_and_endorser, Network};
use indigo_ledger::LedgerError;

#[tokio::test]
async fn test_rotation_commits_on_ledger_confirmation() {
    let (_network, steward, endorser) = steward_and_endorser().await.unwrap();
    let old_verkey = endorser.keyring.verkey(&endorser.did).unwrap();

    let new_verkey = endorser.ledger.rotate_key(&endorser.did).await.unwrap();

    assert_eq!(endorser.keyring.verkey(&endorser.did).unwrap(), new_verkey);
    assert_eq!(
        endorser.keyring.rotation_state(&endorser.did).unwrap(),
        RotationState::Active
    );
    assert_eq!(
        endorser.keyring.retired_verkeys(&endorser.did).unwrap(),
        vec![old_verkey]
    );

    // Role survives the rotation.
    let nym = steward.ledger.get_nym(&endorser.did).await.unwrap();
    assert_eq!(nym.verkey, new_verkey);
    assert_eq!(nym.role, Some(Role::Endorser));
}

#[tokio::test]
async fn test_ledger_rejects_old_key_after_rotation() {
    let (network, _, endorser) = steward_and_endorser().await.unwrap();
    let target = network.onboard(&endorser, None).await.unwrap();
    let newcomer = target.keyring.create_identity().unwrap();

    // Signed with the key that is about to be retired.
    let stale = endorser
        .ledger
        .prepare_nym(&endorser.did, &newcomer.did, Some(&newcomer.verkey), None)
        .unwrap();
    endorser.ledger.rotate_key(&endorser.did).await.unwrap();

    let err = endorser.ledger.submit_prepared(&stale).await.unwrap_err();
    assert!(matches!(err, LedgerError::RejectedTransaction(_)), "{:?}", err);

    // The same request signed with the new key goes through.
    endorser
        .ledger
        .submit_nym(&endorser.did, &newcomer.did, Some(&newcomer.verkey), None)
        .await
        .unwrap();
    assert_eq!(
        endorser.ledger.get_nym(&newcomer.did).await.unwrap().verkey,
        newcomer.verkey
    );
}

#[tokio::test]
async fn test_signature_before_rotation_still_checks_against_old_key() {
    let (_network, _, endorser) = steward_and_endorser().await.unwrap();
    let old_verkey = endorser.keyring.verkey(&endorser.did).unwrap();
    let signature: Signature = endorser.keyring.sign(&endorser.did, b"contract").unwrap();

    let new_verkey = endorser.ledger.rotate_key(&endorser.did).await.unwrap();

    let old_key = PublicKey::from_verkey(&old_verkey).unwrap();
    let new_key = PublicKey::from_verkey(&new_verkey).unwrap();
    assert!(verify(b"contract", &signature, &old_key).is_ok());
    assert!(verify(b"contract", &signature, &new_key).is_err());
}

#[tokio::test]
async fn test_reconcile_commits_rotation_found_on_ledger() {
    let (_network, _, endorser) = steward_and_endorser().await.unwrap();

    // The NYM reached the ledger but the client never saw the reply.
    let pending = endorser.keyring.rotate_key(&endorser.did).unwrap();
    let txn = endorser
        .ledger
        .prepare_nym(&endorser.did, &endorser.did, Some(&pending), None)
        .unwrap();
    endorser.ledger.pool().submit(&txn).await.unwrap();
    assert_eq!(
        endorser.keyring.rotation_state(&endorser.did).unwrap(),
        RotationState::RotationPending
    );

    let current = endorser.ledger.reconcile_rotation(&endorser.did).await.unwrap();
    assert_eq!(current, pending);
    assert_eq!(endorser.keyring.verkey(&endorser.did).unwrap(), pending);
}

#[tokio::test]
async fn test_reconcile_discards_rotation_missing_from_ledger() {
    let (network, trustee) = Network::with_trustee().unwrap();
    let agent = network.onboard(&trustee, None).await.unwrap();
    let original = agent.keyring.verkey(&agent.did).unwrap();

    agent.keyring.rotate_key(&agent.did).unwrap();
    let current = agent.ledger.reconcile_rotation(&agent.did).await.unwrap();

    assert_eq!(current, original);
    assert_eq!(agent.keyring.pending_verkey(&agent.did).unwrap(), None);
    assert_eq!(
        agent.keyring.rotation_state(&agent.did).unwrap(),
        RotationState::Active
    );
}
