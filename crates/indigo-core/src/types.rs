use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Length in bytes of an Ed25519 verification key.
pub const VERKEY_LEN: usize = 32;

/// Number of verkey bytes that make up a DID.
pub const DID_LEN: usize = 16;

/// Decentralized Identifier: base58 of the first 16 bytes of the verkey it
/// was created with. Stays stable across key rotations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Parse and validate a base58 DID.
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        let bytes = bs58::decode(&value)
            .into_vec()
            .map_err(|e| CoreError::InvalidDid(format!("{}: {}", value, e)))?;
        if bytes.len() != DID_LEN {
            return Err(CoreError::InvalidDid(format!(
                "DID must encode {} bytes, got {}",
                DID_LEN,
                bytes.len()
            )));
        }
        Ok(Self(value))
    }

    /// Derive the DID for a freshly created verkey.
    pub fn from_verkey(verkey: &Verkey) -> Self {
        Self(bs58::encode(&verkey.bytes[..DID_LEN]).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Did {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}

impl FromStr for Did {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Base58-encoded Ed25519 verification key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Verkey {
    encoded: String,
    bytes: [u8; VERKEY_LEN],
}

impl Verkey {
    /// Parse a base58 verkey.
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let encoded = value.into();
        let raw = bs58::decode(&encoded)
            .into_vec()
            .map_err(|e| CoreError::InvalidVerkey(format!("{}: {}", encoded, e)))?;
        let bytes: [u8; VERKEY_LEN] =
            raw.as_slice()
                .try_into()
                .map_err(|_| CoreError::InvalidVerkey(format!(
                    "verkey must be {} bytes, got {}",
                    VERKEY_LEN,
                    raw.len()
                )))?;
        Ok(Self { encoded, bytes })
    }

    pub fn from_bytes(bytes: [u8; VERKEY_LEN]) -> Self {
        Self {
            encoded: bs58::encode(bytes).into_string(),
            bytes,
        }
    }

    pub fn as_bytes(&self) -> &[u8; VERKEY_LEN] {
        &self.bytes
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for Verkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encoded)
    }
}

impl TryFrom<String> for Verkey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Verkey> for String {
    fn from(verkey: Verkey) -> Self {
        verkey.encoded
    }
}

/// Ledger role attached to a NYM. `None` on a NYM means an ordinary identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "TRUSTEE", alias = "0")]
    Trustee,
    #[serde(rename = "STEWARD", alias = "2")]
    Steward,
    #[serde(rename = "TRUST_ANCHOR", alias = "ENDORSER", alias = "101")]
    Endorser,
}

impl Role {
    /// Whether a submitter holding `submitter` may create a NYM carrying `target`.
    ///
    /// Trustees may grant any role, stewards may create endorsers and plain
    /// identities, endorsers may only create plain identities.
    pub fn may_assign(submitter: Option<Role>, target: Option<Role>) -> bool {
        match (submitter, target) {
            (Some(Role::Trustee), _) => true,
            (Some(Role::Steward), Some(Role::Endorser) | None) => true,
            (Some(Role::Endorser), None) => true,
            _ => false,
        }
    }

    /// Whether the role may publish schemas and credential definitions.
    pub fn may_publish(role: Option<Role>) -> bool {
        role.is_some()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trustee => write!(f, "TRUSTEE"),
            Self::Steward => write!(f, "STEWARD"),
            Self::Endorser => write!(f, "TRUST_ANCHOR"),
        }
    }
}

/// Decimal nonce used by offers, credential requests and proof requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nonce(String);

impl Nonce {
    /// Generate a fresh 80-bit nonce.
    pub fn new() -> Self {
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes[6..]);
        Self(u128::from_be_bytes(bytes).to_string())
    }

    pub fn from_decimal(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidNonce(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Nonce {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Nonce {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_decimal(value)
    }
}

impl From<Nonce> for String {
    fn from(nonce: Nonce) -> Self {
        nonce.0
    }
}

/// Schema identifier: `<issuerDid>:2:<name>:<version>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaId(String);

impl SchemaId {
    pub const MARKER: &'static str = "2";

    pub fn new(issuer: &Did, name: &str, version: &str) -> Self {
        Self(format!("{}:{}:{}:{}", issuer, Self::MARKER, name, version))
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        let parts: Vec<&str> = value.split(':').collect();
        if parts.len() != 4 || parts[1] != Self::MARKER {
            return Err(CoreError::InvalidIdentifier(format!(
                "schema id must be '<did>:2:<name>:<version>', got: {}",
                value
            )));
        }
        Did::new(parts[0])?;
        Ok(Self(value))
    }

    /// (issuer DID, name, version)
    pub fn parts(&self) -> (Did, &str, &str) {
        let mut it = self.0.splitn(4, ':');
        let did = it.next().unwrap_or_default();
        let _ = it.next();
        let name = it.next().unwrap_or_default();
        let version = it.next().unwrap_or_default();
        (Did(did.to_string()), name, version)
    }

    pub fn issuer_did(&self) -> Did {
        self.parts().0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SchemaId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SchemaId> for String {
    fn from(id: SchemaId) -> Self {
        id.0
    }
}

/// Credential definition identifier: `<issuerDid>:3:CL:<schemaId>:<tag>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CredDefId(String);

impl CredDefId {
    pub const MARKER: &'static str = "3";
    pub const SIGNATURE_TYPE: &'static str = "CL";

    pub fn new(issuer: &Did, schema_id: &SchemaId, tag: &str) -> Self {
        Self(format!(
            "{}:{}:{}:{}:{}",
            issuer,
            Self::MARKER,
            Self::SIGNATURE_TYPE,
            schema_id,
            tag
        ))
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        let parts: Vec<&str> = value.split(':').collect();
        if parts.len() != 8 || parts[1] != Self::MARKER || parts[2] != Self::SIGNATURE_TYPE {
            return Err(CoreError::InvalidIdentifier(format!(
                "cred def id must be '<did>:3:CL:<schemaId>:<tag>', got: {}",
                value
            )));
        }
        Did::new(parts[0])?;
        SchemaId::parse(parts[3..7].join(":"))?;
        Ok(Self(value))
    }

    pub fn issuer_did(&self) -> Did {
        let did = self.0.split(':').next().unwrap_or_default();
        Did(did.to_string())
    }

    pub fn schema_id(&self) -> SchemaId {
        let parts: Vec<&str> = self.0.split(':').collect();
        SchemaId(parts.get(3..7).map(|p| p.join(":")).unwrap_or_default())
    }

    pub fn tag(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredDefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CredDefId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<CredDefId> for String {
    fn from(id: CredDefId) -> Self {
        id.0
    }
}
