//! Proof requests: what a verifier asks a holder to reveal or prove.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use indigo_core::{CredDefId, Did, Nonce, SchemaId};
use indigo_crypto::group::{g1, scalar_from_i128, Scalar, G1};

use crate::error::CredentialError;

/// Conditions on the credential that may satisfy a referent. All set fields
/// must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restriction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<SchemaId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_issuer_did: Option<Did>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_did: Option<Did>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_def_id: Option<CredDefId>,
}

impl Restriction {
    pub fn cred_def(id: &CredDefId) -> Self {
        Self {
            cred_def_id: Some(id.clone()),
            ..Self::default()
        }
    }

    pub fn issuer(did: &Did) -> Self {
        Self {
            issuer_did: Some(did.clone()),
            ..Self::default()
        }
    }

    pub fn schema_name(name: impl Into<String>) -> Self {
        Self {
            schema_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, schema_id: &SchemaId, cred_def_id: &CredDefId) -> bool {
        let (schema_issuer, schema_name, schema_version) = schema_id.parts();
        self.schema_id.as_ref().map_or(true, |id| id == schema_id)
            && self
                .schema_issuer_did
                .as_ref()
                .map_or(true, |did| *did == schema_issuer)
            && self.schema_name.as_deref().map_or(true, |n| n == schema_name)
            && self
                .schema_version
                .as_deref()
                .map_or(true, |v| v == schema_version)
            && self
                .issuer_did
                .as_ref()
                .map_or(true, |did| *did == cred_def_id.issuer_did())
            && self.cred_def_id.as_ref().map_or(true, |id| id == cred_def_id)
    }
}

/// An empty list accepts any credential; otherwise any one restriction must match.
pub fn restrictions_match(
    restrictions: &[Restriction],
    schema_id: &SchemaId,
    cred_def_id: &CredDefId,
) -> bool {
    restrictions.is_empty() || restrictions.iter().any(|r| r.matches(schema_id, cred_def_id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<Restriction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredicateType {
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "<")]
    Less,
}

impl fmt::Display for PredicateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            PredicateType::GreaterOrEqual => ">=",
            PredicateType::Greater => ">",
            PredicateType::LessOrEqual => "<=",
            PredicateType::Less => "<",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredicateInfo {
    pub name: String,
    pub p_type: PredicateType,
    pub p_value: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<Restriction>,
}

impl PredicateInfo {
    /// Strict comparisons become inclusive ones against an adjusted bound:
    /// returns `(lower_bound_form, bound)`.
    fn normalized(&self) -> (bool, i128) {
        let value = i128::from(self.p_value);
        match self.p_type {
            PredicateType::GreaterOrEqual => (true, value),
            PredicateType::Greater => (true, value + 1),
            PredicateType::LessOrEqual => (false, value),
            PredicateType::Less => (false, value - 1),
        }
    }

    pub fn is_satisfied_by(&self, value: u64) -> bool {
        self.witness(value).is_some()
    }

    /// Non-negative distance between `value` and the bound, if the
    /// predicate holds and the distance fits the range proof.
    pub fn witness(&self, value: u64) -> Option<u64> {
        let (lower, bound) = self.normalized();
        let value = i128::from(value);
        let distance = if lower { value - bound } else { bound - value };
        u64::try_from(distance).ok()
    }

    /// Commitment to the distance, derived from the attribute commitment
    /// `C = a·g1 + r·h1`: `C - bound·g1` for lower bounds, `bound·g1 - C`
    /// for upper bounds.
    pub fn distance_commitment(&self, attribute_commitment: &G1) -> G1 {
        let (lower, bound) = self.normalized();
        let bound = g1() * scalar_from_i128(bound);
        if lower {
            *attribute_commitment - bound
        } else {
            bound - *attribute_commitment
        }
    }

    /// Blinding of the distance commitment given the attribute blinding.
    pub fn distance_blinding(&self, attribute_blinding: &Scalar) -> Scalar {
        let (lower, _) = self.normalized();
        if lower {
            *attribute_blinding
        } else {
            -*attribute_blinding
        }
    }
}

/// Verifier's request. Every challenge in the resulting proof is bound to
/// `nonce`, so a proof cannot be replayed against another request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    pub name: String,
    pub version: String,
    pub nonce: Nonce,
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, AttributeInfo>,
    #[serde(default)]
    pub requested_predicates: BTreeMap<String, PredicateInfo>,
}

impl ProofRequest {
    /// Empty request with a fresh nonce.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::with_nonce(name, version, Nonce::new())
    }

    pub fn with_nonce(name: impl Into<String>, version: impl Into<String>, nonce: Nonce) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            nonce,
            requested_attributes: BTreeMap::new(),
            requested_predicates: BTreeMap::new(),
        }
    }

    pub fn request_attribute(
        mut self,
        referent: impl Into<String>,
        name: impl Into<String>,
        restrictions: Vec<Restriction>,
    ) -> Self {
        self.requested_attributes.insert(
            referent.into(),
            AttributeInfo {
                name: name.into(),
                restrictions,
            },
        );
        self
    }

    pub fn request_predicate(
        mut self,
        referent: impl Into<String>,
        name: impl Into<String>,
        p_type: PredicateType,
        p_value: i64,
        restrictions: Vec<Restriction>,
    ) -> Self {
        self.requested_predicates.insert(
            referent.into(),
            PredicateInfo {
                name: name.into(),
                p_type,
                p_value,
                restrictions,
            },
        );
        self
    }

    /// Structural checks: something is requested, names are non-empty, and
    /// no referent is used for both an attribute and a predicate.
    pub fn validate(&self) -> Result<(), CredentialError> {
        if self.requested_attributes.is_empty() && self.requested_predicates.is_empty() {
            return Err(CredentialError::InvalidProofRequest(
                "nothing requested".to_string(),
            ));
        }
        for (referent, info) in &self.requested_attributes {
            if info.name.trim().is_empty() {
                return Err(CredentialError::InvalidProofRequest(format!(
                    "attribute referent {} has no name",
                    referent
                )));
            }
            if self.requested_predicates.contains_key(referent) {
                return Err(CredentialError::InvalidProofRequest(format!(
                    "referent {} names both an attribute and a predicate",
                    referent
                )));
            }
        }
        if let Some((referent, _)) = self
            .requested_predicates
            .iter()
            .find(|(_, info)| info.name.trim().is_empty())
        {
            return Err(CredentialError::InvalidProofRequest(format!(
                "predicate referent {} has no name",
                referent
            )));
        }
        Ok(())
    }
}
