//! Attribute encoding.
//!
//! Every raw attribute value has exactly one encoded form: a canonical
//! unsigned 64-bit decimal encodes to itself, so numeric attributes can be
//! compared in predicates; anything else encodes to the big-endian integer
//! of the first 16 bytes of its BLAKE3 digest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use indigo_crypto::Scalar;

use crate::error::CredentialError;

/// Raw and encoded form of one attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub raw: String,
    pub encoded: String,
}

impl AttributeValue {
    /// Value with its canonical encoding.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let encoded = encode_attribute(&raw);
        Self { raw, encoded }
    }

    pub fn is_canonical(&self) -> bool {
        self.encoded == encode_attribute(&self.raw)
    }

    /// Encoded value as a field element.
    pub fn to_scalar(&self) -> Result<Scalar, CredentialError> {
        encoded_to_scalar(&self.encoded)
    }

    /// Integer value usable in predicates, if the raw value is numeric.
    pub fn as_integer(&self) -> Option<u64> {
        canonical_u64(&self.raw)
    }
}

/// Attribute name → value.
pub type CredentialValues = BTreeMap<String, AttributeValue>;

/// Build [`CredentialValues`] from `(name, raw)` pairs.
pub fn credential_values<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> CredentialValues {
    pairs
        .into_iter()
        .map(|(name, raw)| (name.to_string(), AttributeValue::new(raw)))
        .collect()
}

fn canonical_u64(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if raw.len() > 1 && raw.starts_with('0') {
        return None;
    }
    raw.parse().ok()
}

pub fn encode_attribute(raw: &str) -> String {
    if let Some(value) = canonical_u64(raw) {
        return value.to_string();
    }
    let digest = blake3::hash(raw.as_bytes());
    let mut prefix = [0u8; 16];
    prefix.copy_from_slice(&digest.as_bytes()[..16]);
    u128::from_be_bytes(prefix).to_string()
}

pub fn encoded_to_scalar(encoded: &str) -> Result<Scalar, CredentialError> {
    encoded
        .parse::<u128>()
        .map(Scalar::from)
        .map_err(|_| CredentialError::AttributeMismatch(format!("invalid encoded value: {}", encoded)))
}
