//! Integration test: full credential lifecycle across crates.
//!
//! An endorser publishes a schema and credential definition, issues a
//! credential to a prover, and a verifier checks the prover's proof using
//! only what it reads from the ledger.

use std::collections::HashMap;

use indigo_anoncreds::{
    credential_values, CredentialError, CredentialHolder, CredentialIssuer, PredicateType, Proof,
    ProofRequest, ProofVerifier, RequestedCredentials, Restriction,
};
use indigo_core::{CredDefId, CredentialDefinition, Nonce, Schema, SchemaId};
use indigo_integration_tests::{steward_and_endorser, Agent, Network};

const GVT: [(&str, &str); 4] = [("name", "Alex"), ("age", "28"), ("sex", "male"), ("height", "175")];

struct Scenario {
    network: Network,
    verifier_agent: Agent,
    issuer: CredentialIssuer,
    issuer_agent: Agent,
    holder: CredentialHolder,
    schema_id: SchemaId,
    cred_def_id: CredDefId,
}

/// Helper: publish gvt, issue it to a fresh prover, and return everything
/// the proof exchange needs.
async fn setup(revocable: bool) -> (Scenario, String) {
    let (network, steward, endorser) = steward_and_endorser().await.unwrap();
    let issuer = CredentialIssuer::new(endorser.did.clone(), endorser.keyring.clone());

    let schema = issuer
        .create_schema("gvt", "1.0", &["age", "sex", "height", "name"])
        .unwrap();
    let schema_id = issuer.publish_schema(&endorser.ledger, &schema).await.unwrap();
    let cred_def = issuer
        .create_credential_definition(&schema, "tag1", revocable)
        .unwrap();
    let cred_def_id = issuer
        .publish_credential_definition(&endorser.ledger, &cred_def)
        .await
        .unwrap();

    // The prover only knows the credential definition from the ledger.
    let prover = network.onboard(&endorser, None).await.unwrap();
    let holder = CredentialHolder::new(prover.did.clone(), prover.keyring.clone());
    holder.create_link_secret("main").unwrap();
    let ledger_def = prover.ledger.get_cred_def(&cred_def_id).await.unwrap();

    let offer = issuer.create_offer(&cred_def_id).unwrap();
    let (request, metadata) = holder
        .create_credential_request(&offer, &ledger_def, "main")
        .unwrap();
    let credential = issuer
        .issue_credential(&offer, &request, &credential_values(GVT))
        .unwrap();
    let cred_id = holder
        .store_credential(credential, &metadata, &ledger_def)
        .unwrap();

    let scenario = Scenario {
        network,
        verifier_agent: steward,
        issuer,
        issuer_agent: endorser,
        holder,
        schema_id,
        cred_def_id,
    };
    (scenario, cred_id)
}

/// Helper: what the verifier (and the prover) fetch from the ledger.
async fn ledger_objects(
    agent: &Agent,
    schema_id: &SchemaId,
    cred_def_id: &CredDefId,
) -> (
    HashMap<SchemaId, Schema>,
    HashMap<CredDefId, CredentialDefinition>,
) {
    let schema = agent.ledger.get_schema(schema_id).await.unwrap();
    let cred_def = agent.ledger.get_cred_def(cred_def_id).await.unwrap();
    (
        HashMap::from([(schema_id.clone(), schema)]),
        HashMap::from([(cred_def_id.clone(), cred_def)]),
    )
}

fn gvt_request(cred_def_id: &CredDefId) -> ProofRequest {
    ProofRequest::with_nonce("proof_req_1", "0.1", Nonce::from_decimal("123432421212").unwrap())
        .request_attribute("attr1_referent", "name", vec![Restriction::cred_def(cred_def_id)])
        .request_attribute("attr2_referent", "sex", vec![])
        .request_attribute("attr3_referent", "phone", vec![])
        .request_predicate(
            "predicate1_referent",
            "age",
            PredicateType::GreaterOrEqual,
            18,
            vec![Restriction::cred_def(cred_def_id)],
        )
}

async fn prove(s: &Scenario, cred_id: &str, request: &ProofRequest) -> Proof {
    let (schemas, cred_defs) = ledger_objects(&s.verifier_agent, &s.schema_id, &s.cred_def_id).await;
    let requested = RequestedCredentials::new()
        .reveal("attr1_referent", cred_id)
        .hide("attr2_referent", cred_id)
        .self_attest("attr3_referent", "8-800-300")
        .predicate("predicate1_referent", cred_id);
    s.holder
        .create_proof(request, &requested, "main", &schemas, &cred_defs)
        .unwrap()
}

// =========================================================================
// Issuance
// =========================================================================

#[tokio::test]
async fn test_issue_and_store_from_ledger_definition() {
    let (s, cred_id) = setup(false).await;

    let info = s.holder.get_credential(&cred_id).unwrap();
    assert_eq!(info.schema_id, s.schema_id);
    assert_eq!(info.cred_def_id, s.cred_def_id);
    assert_eq!(info.attrs.get("name").map(String::as_str), Some("Alex"));
    assert_eq!(info.attrs.get("age").map(String::as_str), Some("28"));
    assert_eq!(s.holder.list_credentials().len(), 1);
    assert_eq!(s.issuer.outstanding_offers(), 0);
}

#[tokio::test]
async fn test_credential_for_another_holder_is_refused() {
    let (s, _) = setup(false).await;
    let cred_def = s.issuer.credential_definition(&s.cred_def_id).unwrap();

    // Alice requests, Bob tries to store what Alice was issued.
    let alice_agent = s.network.onboard(&s.issuer_agent, None).await.unwrap();
    let alice = CredentialHolder::new(alice_agent.did.clone(), alice_agent.keyring.clone());
    alice.create_link_secret("main").unwrap();
    let bob_agent = s.network.onboard(&s.issuer_agent, None).await.unwrap();
    let bob = CredentialHolder::new(bob_agent.did.clone(), bob_agent.keyring.clone());
    bob.create_link_secret("main").unwrap();

    let offer = s.issuer.create_offer(&s.cred_def_id).unwrap();
    let (request, _) = alice
        .create_credential_request(&offer, &cred_def, "main")
        .unwrap();
    let credential = s
        .issuer
        .issue_credential(&offer, &request, &credential_values(GVT))
        .unwrap();

    // Bob's own request metadata for a different offer.
    let bob_offer = s.issuer.create_offer(&s.cred_def_id).unwrap();
    let (_, bob_metadata) = bob
        .create_credential_request(&bob_offer, &cred_def, "main")
        .unwrap();
    let err = bob
        .store_credential(credential, &bob_metadata, &cred_def)
        .unwrap_err();
    assert!(matches!(err, CredentialError::InvalidCredentialSignature(_)), "{:?}", err);
}

// =========================================================================
// Proof negotiation
// =========================================================================

#[tokio::test]
async fn test_proof_verifies_with_ledger_objects() {
    let (s, cred_id) = setup(false).await;
    let request = gvt_request(&s.cred_def_id);
    let proof = prove(&s, &cred_id, &request).await;

    assert_eq!(proof.revealed_attributes["attr1_referent"].raw, "Alex");
    assert!(proof.unrevealed_attributes.contains_key("attr2_referent"));
    assert_eq!(proof.self_attested_attributes["attr3_referent"], "8-800-300");
    assert!(proof.predicate_results["predicate1_referent"].satisfied);

    // The verifier reads the same objects independently and checks the wire form.
    let (schemas, cred_defs) = ledger_objects(&s.verifier_agent, &s.schema_id, &s.cred_def_id).await;
    let json = serde_json::to_string(&proof).unwrap();
    assert!(!json.contains("\"28\""), "hidden age leaked into the proof");
    let verifier = ProofVerifier::new();
    assert!(verifier.verify_json(&request, &json, &schemas, &cred_defs).unwrap());
}

#[tokio::test]
async fn test_tampered_proof_is_rejected() {
    let (s, cred_id) = setup(false).await;
    let request = gvt_request(&s.cred_def_id);
    let mut proof = prove(&s, &cred_id, &request).await;
    let (schemas, cred_defs) = ledger_objects(&s.verifier_agent, &s.schema_id, &s.cred_def_id).await;

    let revealed = proof.revealed_attributes.get_mut("attr1_referent").unwrap();
    revealed.raw = "Mallory".into();
    revealed.encoded = indigo_anoncreds::encode_attribute("Mallory");
    assert!(!ProofVerifier::new()
        .verify(&request, &proof, &schemas, &cred_defs)
        .unwrap());
}

#[tokio::test]
async fn test_proof_for_another_nonce_is_rejected() {
    let (s, cred_id) = setup(false).await;
    let request = gvt_request(&s.cred_def_id);
    let proof = prove(&s, &cred_id, &request).await;
    let (schemas, cred_defs) = ledger_objects(&s.verifier_agent, &s.schema_id, &s.cred_def_id).await;

    let mut replayed = request.clone();
    replayed.nonce = Nonce::new();
    assert!(!ProofVerifier::new()
        .verify(&replayed, &proof, &schemas, &cred_defs)
        .unwrap());
}

#[tokio::test]
async fn test_unsatisfiable_predicate_cannot_be_proven() {
    let (s, cred_id) = setup(false).await;
    let (schemas, cred_defs) = ledger_objects(&s.verifier_agent, &s.schema_id, &s.cred_def_id).await;
    let request = ProofRequest::new("senior", "1.0").request_predicate(
        "predicate1_referent",
        "age",
        PredicateType::GreaterOrEqual,
        65,
        vec![],
    );

    let found = s.holder.find_credentials_for(&request).unwrap();
    assert!(found.predicates["predicate1_referent"].is_empty());

    let requested = RequestedCredentials::new().predicate("predicate1_referent", &cred_id);
    let err = s
        .holder
        .create_proof(&request, &requested, "main", &schemas, &cred_defs)
        .unwrap_err();
    assert!(matches!(err, CredentialError::PredicateNotSatisfied(_)), "{:?}", err);
}

#[tokio::test]
async fn test_revoked_credential_stops_verifying() {
    let (s, cred_id) = setup(true).await;
    let rev_reg_id = s.holder.get_credential(&cred_id).unwrap().rev_reg_id.unwrap();
    let request = gvt_request(&s.cred_def_id);
    let status = s.issuer.revocation_status(&rev_reg_id).unwrap();
    s.holder.add_revocation_status(status.clone());
    let proof = prove(&s, &cred_id, &request).await;
    let (schemas, cred_defs) = ledger_objects(&s.verifier_agent, &s.schema_id, &s.cred_def_id).await;

    let verifier = ProofVerifier::new().with_revocation_status(status);
    assert!(verifier.verify(&request, &proof, &schemas, &cred_defs).unwrap());

    let index = s.holder.get_credential(&cred_id).unwrap().cred_rev_id.unwrap();
    s.issuer.revoke_credential(&rev_reg_id, index).unwrap();
    let revoked = s.issuer.revocation_status(&rev_reg_id).unwrap();
    verifier.add_revocation_status(revoked.clone());
    assert!(!verifier.verify(&request, &proof, &schemas, &cred_defs).unwrap());

    // The holder cannot prove once it learns of the revocation.
    s.holder.add_revocation_status(revoked);
    let requested = RequestedCredentials::new()
        .reveal("attr1_referent", &cred_id)
        .hide("attr2_referent", &cred_id)
        .self_attest("attr3_referent", "8-800-300")
        .predicate("predicate1_referent", &cred_id);
    let err = s
        .holder
        .create_proof(&request, &requested, "main", &schemas, &cred_defs)
        .unwrap_err();
    assert!(matches!(err, CredentialError::CredentialRevoked(_)), "{:?}", err);
}

#[tokio::test]
async fn test_proofs_to_two_verifiers_cannot_be_correlated() {
    let (s, cred_id) = setup(false).await;
    let (schemas, cred_defs) = ledger_objects(&s.verifier_agent, &s.schema_id, &s.cred_def_id).await;
    let first_request = gvt_request(&s.cred_def_id);
    let second_request = ProofRequest::new("proof_req_2", "0.1")
        .request_attribute("attr1_referent", "name", vec![Restriction::cred_def(&s.cred_def_id)])
        .request_attribute("attr2_referent", "sex", vec![])
        .request_attribute("attr3_referent", "phone", vec![])
        .request_predicate("predicate1_referent", "age", PredicateType::GreaterOrEqual, 18, vec![]);
    let first = prove(&s, &cred_id, &first_request).await;
    let second = prove(&s, &cred_id, &second_request).await;

    let verifier = ProofVerifier::new();
    assert!(verifier.verify(&first_request, &first, &schemas, &cred_defs).unwrap());
    assert!(verifier.verify(&second_request, &second, &schemas, &cred_defs).unwrap());

    // Apart from the revealed name and public identifiers, no value repeats.
    let values = |proof: &Proof| -> Vec<String> {
        let sub_proof = serde_json::to_value(&proof.proof_data.sub_proofs[0]).unwrap();
        let mut found = Vec::new();
        collect_hex(&sub_proof, &mut found);
        found
    };
    let first_values = values(&first);
    let shared: Vec<String> = values(&second)
        .into_iter()
        .filter(|v| first_values.contains(v))
        .collect();
    assert!(shared.is_empty(), "shared values {:?}", shared);
}

/// Every long hex string in a JSON value.
fn collect_hex(value: &serde_json::Value, found: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) if s.len() >= 64 && s.bytes().all(|b| b.is_ascii_hexdigit()) => {
            found.push(s.clone())
        }
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_hex(v, found)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_hex(v, found)),
        _ => {}
    }
}
