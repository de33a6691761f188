use serde::{Deserialize, Serialize};

use indigo_core::{CredDefId, CredentialDefinition, SchemaId};
use indigo_crypto::ps::{Signature, VerifyingKey};
use indigo_crypto::Scalar;

use crate::encoding::CredentialValues;
use crate::error::CredentialError;
use crate::revocation::RevocationHandle;

/// Issuer signature over the link secret, every attribute and, for
/// revocable credentials, the registry index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSignature {
    pub signature: Signature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation: Option<RevocationHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    pub values: CredentialValues,
    pub signature: CredentialSignature,
}

impl Credential {
    pub fn rev_reg_id(&self) -> Option<&str> {
        self.signature.revocation.as_ref().map(|h| h.rev_reg_id.as_str())
    }

    pub fn layout(&self) -> MessageLayout {
        MessageLayout::new(
            self.values.keys().map(String::as_str),
            self.signature.revocation.is_some(),
        )
    }

    /// Signed messages in layout order, with `link_secret` in slot 0.
    pub fn messages(&self, link_secret: Scalar) -> Result<Vec<Scalar>, CredentialError> {
        let mut messages = Vec::with_capacity(self.layout().len());
        messages.push(link_secret);
        for value in self.values.values() {
            messages.push(value.to_scalar()?);
        }
        if let Some(handle) = &self.signature.revocation {
            messages.push(Scalar::from(u64::from(handle.index)));
        }
        Ok(messages)
    }
}

/// Which signed message holds what: the link secret first, then the
/// attributes by name, then the revocation index if there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLayout {
    attributes: Vec<String>,
    revocable: bool,
}

impl MessageLayout {
    pub const LINK_SECRET: usize = 0;

    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>, revocable: bool) -> Self {
        let mut attributes: Vec<String> = names.into_iter().map(str::to_string).collect();
        attributes.sort();
        attributes.dedup();
        Self {
            attributes,
            revocable,
        }
    }

    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.attributes
            .binary_search_by(|a| a.as_str().cmp(name))
            .ok()
            .map(|i| i + 1)
    }

    pub fn revocation_index(&self) -> Option<usize> {
        self.revocable.then_some(self.attributes.len() + 1)
    }

    pub fn len(&self) -> usize {
        self.attributes.len() + 1 + usize::from(self.revocable)
    }

    /// Never: slot 0 always holds the link secret.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Credential verifying key published in `cred_def`.
pub fn verifying_key(cred_def: &CredentialDefinition) -> Result<VerifyingKey, CredentialError> {
    if cred_def.credential_key().is_empty() {
        return Err(CredentialError::UnknownCredDef(format!(
            "{} has no credential key",
            cred_def.id
        )));
    }
    Ok(VerifyingKey::from_hex(cred_def.credential_key())?)
}
