//! Integration test: secure messaging between agents that find each
//! other's verkeys on the ledger.

use indigo_integration_tests::{steward_and_endorser, Agent};
use indigo_messaging::{Envelope, MessagingError, PackAlgorithm, SecureChannel};

fn channel(agent: &Agent) -> SecureChannel {
    SecureChannel::new(agent.keyring.clone())
}

#[tokio::test]
async fn test_authcrypt_between_ledger_identities() {
    let (network, steward, endorser) = steward_and_endorser().await.unwrap();
    let alice = network.onboard(&endorser, None).await.unwrap();
    let bob = network.onboard(&steward, None).await.unwrap();

    let bob_verkey = alice.ledger.get_nym(&bob.did).await.unwrap().verkey;
    let envelope = channel(&alice)
        .pack(Some(&alice.did), &[bob_verkey.clone()], b"{\"hello\":\"bob\"}")
        .unwrap();
    assert_eq!(envelope.header().unwrap().alg, PackAlgorithm::Authcrypt);

    // Over the wire and back.
    let received = Envelope::from_json(&envelope.to_json().unwrap()).unwrap();
    let message = channel(&bob).unpack(&bob.did, &received).unwrap();
    assert_eq!(message.plaintext, b"{\"hello\":\"bob\"}");
    assert_eq!(message.recipient_verkey, bob_verkey);

    // Bob authenticates the sender against the ledger.
    let alice_on_ledger = bob.ledger.get_nym(&alice.did).await.unwrap();
    assert_eq!(message.sender_verkey, Some(alice_on_ledger.verkey));
}

#[tokio::test]
async fn test_anoncrypt_to_several_recipients() {
    let (network, _, endorser) = steward_and_endorser().await.unwrap();
    let bob = network.onboard(&endorser, None).await.unwrap();
    let carol = network.onboard(&endorser, None).await.unwrap();
    let eve = network.onboard(&endorser, None).await.unwrap();

    let recipients = [
        endorser.ledger.get_nym(&bob.did).await.unwrap().verkey,
        endorser.ledger.get_nym(&carol.did).await.unwrap().verkey,
    ];
    let envelope = channel(&endorser)
        .pack(None, &recipients, b"broadcast")
        .unwrap();
    assert_eq!(envelope.header().unwrap().recipients.len(), 2);

    for agent in [&bob, &carol] {
        let message = channel(agent).unpack(&agent.did, &envelope).unwrap();
        assert_eq!(message.plaintext, b"broadcast");
        assert_eq!(message.sender_verkey, None);
    }
    assert!(matches!(
        channel(&eve).unpack(&eve.did, &envelope),
        Err(MessagingError::DecryptionFailed(_))
    ));
}

#[tokio::test]
async fn test_messages_follow_key_rotation() {
    let (network, _, endorser) = steward_and_endorser().await.unwrap();
    let alice = network.onboard(&endorser, None).await.unwrap();
    let bob = network.onboard(&endorser, None).await.unwrap();

    let old_verkey = alice.ledger.get_nym(&bob.did).await.unwrap().verkey;
    let stale = channel(&alice)
        .pack(Some(&alice.did), &[old_verkey.clone()], b"to the old key")
        .unwrap();

    let new_verkey = bob.ledger.rotate_key(&bob.did).await.unwrap();
    assert_ne!(new_verkey, old_verkey);

    // Alice re-reads the NYM and reaches the new key.
    let current = alice.ledger.get_nym(&bob.did).await.unwrap().verkey;
    assert_eq!(current, new_verkey);
    let fresh = channel(&alice)
        .pack(Some(&alice.did), &[current], b"to the new key")
        .unwrap();
    let message = channel(&bob).unpack(&bob.did, &fresh).unwrap();
    assert_eq!(message.plaintext, b"to the new key");

    // The retired key no longer decrypts.
    assert!(matches!(
        channel(&bob).unpack(&bob.did, &stale),
        Err(MessagingError::DecryptionFailed(_))
    ));
}
