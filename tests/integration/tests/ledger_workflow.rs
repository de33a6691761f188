//! Integration test: identities, schemas and credential definitions on the
//! ledger, using indigo-ledger, indigo-wallet and indigo-anoncreds together.

use indigo_anoncreds::{CredentialError, CredentialIssuer};
use indigo_core::Role;
use indigo_integration_tests::{steward_and_endorser, Network, STEWARD_SEED};
use indigo_ledger::LedgerError;
use indigo_wallet::Keyring;

// =========================================================================
// NYM
// =========================================================================

#[tokio::test]
async fn test_role_chain_trustee_steward_endorser() {
    let (network, steward, endorser) = steward_and_endorser().await.unwrap();

    let nym = steward.ledger.get_nym(&endorser.did).await.unwrap();
    assert_eq!(nym.role, Some(Role::Endorser));
    assert_eq!(nym.verkey, endorser.keyring.verkey(&endorser.did).unwrap());

    // Genesis trustee, steward, endorser.
    assert_eq!(network.ledger().last_seq_no(), 3);
    assert_eq!(network.ledger().len(), 2);
}

#[tokio::test]
async fn test_steward_identity_is_seed_derived() {
    let (_network, steward, _) = steward_and_endorser().await.unwrap();

    let expected = Keyring::new().create_identity_from_seed(&STEWARD_SEED).unwrap();
    assert_eq!(steward.did, expected.did);
    let nym = steward.ledger.get_nym(&steward.did).await.unwrap();
    assert_eq!(nym.verkey, expected.verkey);
    assert_eq!(nym.role, Some(Role::Steward));
}

#[tokio::test]
async fn test_endorser_cannot_create_steward() {
    let (_network, _, endorser) = steward_and_endorser().await.unwrap();

    let target = endorser.keyring.create_identity().unwrap();
    let err = endorser
        .ledger
        .submit_nym(&endorser.did, &target.did, Some(&target.verkey), Some(Role::Steward))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::RejectedTransaction(_)), "{:?}", err);
}

#[tokio::test]
async fn test_unknown_did_not_found() {
    let (network, trustee) = Network::with_trustee().unwrap();
    let stranger = Keyring::new().create_identity().unwrap();

    let err = trustee.ledger.get_nym(&stranger.did).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)), "{:?}", err);
    assert_eq!(network.ledger().len(), 0);
}

// =========================================================================
// SCHEMA and CRED_DEF
// =========================================================================

#[tokio::test]
async fn test_publish_and_fetch_schema_and_cred_def() {
    let (_network, steward, endorser) = steward_and_endorser().await.unwrap();
    let issuer = CredentialIssuer::new(endorser.did.clone(), endorser.keyring.clone());

    let schema = issuer
        .create_schema("gvt", "1.0", &["age", "sex", "height", "name"])
        .unwrap();
    let schema_id = issuer.publish_schema(&endorser.ledger, &schema).await.unwrap();
    assert_eq!(schema_id, schema.id);

    // Anyone can read it back.
    let fetched = steward.ledger.get_schema(&schema_id).await.unwrap();
    assert_eq!(fetched.attr_names, schema.attr_names);
    assert!(fetched.seq_no.is_some());

    let cred_def = issuer
        .create_credential_definition(&fetched, "tag1", false)
        .unwrap();
    let cred_def_id = issuer
        .publish_credential_definition(&endorser.ledger, &cred_def)
        .await
        .unwrap();
    let fetched_def = steward.ledger.get_cred_def(&cred_def_id).await.unwrap();
    assert_eq!(fetched_def, cred_def);
}

#[tokio::test]
async fn test_schema_published_twice_is_rejected() {
    let (_network, _, endorser) = steward_and_endorser().await.unwrap();
    let issuer = CredentialIssuer::new(endorser.did.clone(), endorser.keyring.clone());

    let schema = issuer.create_schema("gvt", "1.0", &["age", "name"]).unwrap();
    issuer.publish_schema(&endorser.ledger, &schema).await.unwrap();
    let err = issuer
        .publish_schema(&endorser.ledger, &schema)
        .await
        .unwrap_err();
    assert!(
        matches!(err, CredentialError::Ledger(LedgerError::RejectedTransaction(_))),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn test_plain_identity_cannot_publish() {
    let (network, _, endorser) = steward_and_endorser().await.unwrap();
    let prover = network.onboard(&endorser, None).await.unwrap();
    let issuer = CredentialIssuer::new(prover.did.clone(), prover.keyring.clone());

    let schema = issuer.create_schema("gvt", "1.0", &["age", "name"]).unwrap();
    let err = issuer
        .publish_schema(&prover.ledger, &schema)
        .await
        .unwrap_err();
    assert!(
        matches!(err, CredentialError::Ledger(LedgerError::RejectedTransaction(_))),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn test_cred_def_requires_schema_on_ledger() {
    let (_network, _, endorser) = steward_and_endorser().await.unwrap();
    let issuer = CredentialIssuer::new(endorser.did.clone(), endorser.keyring.clone());

    let schema = issuer.create_schema("gvt", "1.0", &["age", "name"]).unwrap();
    let cred_def = issuer
        .create_credential_definition(&schema, "tag1", false)
        .unwrap();
    let err = issuer
        .publish_credential_definition(&endorser.ledger, &cred_def)
        .await
        .unwrap_err();
    assert!(
        matches!(err, CredentialError::Ledger(LedgerError::RejectedTransaction(_))),
        "{:?}",
        err
    );
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test]
async fn test_concurrent_nyms_from_one_keyring() {
    let (network, trustee) = Network::with_trustee().unwrap();
    let targets: Vec<_> = (0..8)
        .map(|_| trustee.keyring.create_identity().unwrap())
        .collect();

    let writes = targets.iter().map(|target| {
        trustee
            .ledger
            .submit_nym(&trustee.did, &target.did, Some(&target.verkey), None)
    });
    let results = futures::future::join_all(writes).await;

    let mut seq_nos: Vec<u64> = results.into_iter().map(|r| r.unwrap().seq_no).collect();
    seq_nos.sort_unstable();
    assert_eq!(seq_nos, (2..10).collect::<Vec<u64>>());
    assert_eq!(network.ledger().len(), 8);
    for target in &targets {
        assert_eq!(trustee.ledger.get_nym(&target.did).await.unwrap().verkey, target.verkey);
    }
}
