//! Wire format of a packed message.
//!
//! ```json
//! {
//!   "protected": "<base64url(ProtectedHeader JSON)>",
//!   "iv": "<base64url>",
//!   "ciphertext": "<base64url>",
//!   "tag": "<base64url>"
//! }
//! ```
//!
//! The protected header lists every recipient with its wrapped content key
//! and is the additional authenticated data of the payload encryption.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::MessagingError;

pub const ENCRYPTION: &str = "chacha20poly1305_ietf";
pub const MESSAGE_TYPE: &str = "JWM/1.0";
pub const TAG_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackAlgorithm {
    /// Sender authenticated to each recipient.
    Authcrypt,
    /// Sender not disclosed.
    Anoncrypt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientHeader {
    /// Recipient verkey.
    pub kid: String,
    /// Sender verkey sealed to the recipient. Authcrypt only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Nonce of the key wrap. Authcrypt only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub encrypted_key: String,
    pub header: RecipientHeader,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedHeader {
    pub enc: String,
    pub typ: String,
    pub alg: PackAlgorithm,
    pub recipients: Vec<Recipient>,
}

impl ProtectedHeader {
    pub fn encode(&self) -> Result<String, MessagingError> {
        Ok(encode(&serde_json::to_vec(self)?))
    }

    pub fn decode(protected: &str) -> Result<Self, MessagingError> {
        let bytes = decode(protected, "protected header")?;
        let header: Self = serde_json::from_slice(&bytes)
            .map_err(|e| MessagingError::DecryptionFailed(format!("protected header: {}", e)))?;
        if header.enc != ENCRYPTION {
            return Err(MessagingError::DecryptionFailed(format!(
                "unsupported encryption {}",
                header.enc
            )));
        }
        Ok(header)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub protected: String,
    pub iv: String,
    pub ciphertext: String,
    pub tag: String,
}

impl Envelope {
    pub fn to_json(&self) -> Result<String, MessagingError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a received envelope. Anything unreadable counts as corrupt.
    pub fn from_json(json: &str) -> Result<Self, MessagingError> {
        serde_json::from_str(json)
            .map_err(|e| MessagingError::DecryptionFailed(format!("envelope: {}", e)))
    }

    pub fn header(&self) -> Result<ProtectedHeader, MessagingError> {
        ProtectedHeader::decode(&self.protected)
    }

    /// Payload nonce and `ciphertext || tag`.
    pub(crate) fn sealed_payload(&self) -> Result<([u8; 12], Vec<u8>), MessagingError> {
        let iv = decode_nonce(&self.iv, "iv")?;
        let mut payload = decode(&self.ciphertext, "ciphertext")?;
        let tag = decode(&self.tag, "tag")?;
        if tag.len() != TAG_LEN {
            return Err(MessagingError::DecryptionFailed("bad tag length".into()));
        }
        payload.extend_from_slice(&tag);
        Ok((iv, payload))
    }
}

pub(crate) fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn decode(value: &str, what: &str) -> Result<Vec<u8>, MessagingError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| MessagingError::DecryptionFailed(format!("{}: {}", what, e)))
}

pub(crate) fn decode_nonce(value: &str, what: &str) -> Result<[u8; 12], MessagingError> {
    decode(value, what)?
        .try_into()
        .map_err(|_| MessagingError::DecryptionFailed(format!("{}: bad nonce length", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_wire_names() {
        let header = ProtectedHeader {
            enc: ENCRYPTION.into(),
            typ: MESSAGE_TYPE.into(),
            alg: PackAlgorithm::Anoncrypt,
            recipients: vec![Recipient {
                encrypted_key: "a2V5".into(),
                header: RecipientHeader {
                    kid: "verkey".into(),
                    sender: None,
                    iv: None,
                },
            }],
        };
        let json = serde_json::to_value(&header).unwrap();
        assert_eq!(json["alg"], "Anoncrypt");
        assert_eq!(json["recipients"][0]["header"]["kid"], "verkey");
        assert!(json["recipients"][0]["header"].get("sender").is_none());

        let decoded = ProtectedHeader::decode(&header.encode().unwrap()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_corrupt_input_is_decryption_failure() {
        assert!(matches!(
            Envelope::from_json("not json"),
            Err(MessagingError::DecryptionFailed(_))
        ));
        assert!(matches!(
            ProtectedHeader::decode("%%%"),
            Err(MessagingError::DecryptionFailed(_))
        ));
        let envelope = Envelope {
            protected: String::new(),
            iv: encode(&[0u8; 5]),
            ciphertext: String::new(),
            tag: String::new(),
        };
        assert!(matches!(
            envelope.sealed_payload(),
            Err(MessagingError::DecryptionFailed(_))
        ));
    }
}
