use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::CoreError;
use crate::types::{CredDefId, Did, SchemaId, Verkey};

/// Characters that would break identifier parsing.
fn check_component(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::InvalidSchema(format!("{} must not be empty", field)));
    }
    if value.contains(':') {
        return Err(CoreError::InvalidSchema(format!(
            "{} must not contain ':', got: {}",
            field, value
        )));
    }
    Ok(())
}

/// Published description of a credential's attribute names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: SchemaId,
    pub name: String,
    pub version: String,
    /// Ordered, unique, non-empty.
    pub attr_names: Vec<String>,
    /// Ledger sequence number once written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<u64>,
}

impl Schema {
    /// Build a schema owned by `issuer`, validating name, version and attributes.
    pub fn new(
        issuer: &Did,
        name: &str,
        version: &str,
        attr_names: Vec<String>,
    ) -> Result<Self, CoreError> {
        check_component("schema name", name)?;
        check_component("schema version", version)?;
        if attr_names.is_empty() {
            return Err(CoreError::InvalidSchema(
                "schema must declare at least one attribute".into(),
            ));
        }
        let mut seen = HashSet::new();
        for attr in &attr_names {
            if attr.trim().is_empty() {
                return Err(CoreError::InvalidSchema("attribute name must not be empty".into()));
            }
            if !seen.insert(attr.as_str()) {
                return Err(CoreError::InvalidSchema(format!(
                    "duplicate attribute name: {}",
                    attr
                )));
            }
        }

        Ok(Self {
            id: SchemaId::new(issuer, name, version),
            name: name.to_string(),
            version: version.to_string(),
            attr_names,
            seq_no: None,
        })
    }

    /// Re-check the invariants of a schema that arrived over the wire.
    pub fn validate(&self) -> Result<(), CoreError> {
        let rebuilt = Self::new(
            &self.id.issuer_did(),
            &self.name,
            &self.version,
            self.attr_names.clone(),
        )?;
        if rebuilt.id != self.id {
            return Err(CoreError::InvalidSchema(format!(
                "schema id {} does not match name and version",
                self.id
            )));
        }
        Ok(())
    }

    pub fn issuer_did(&self) -> Did {
        self.id.issuer_did()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attr_names.iter().any(|a| a == name)
    }
}

/// Public keys of a credential definition. `verkey` signs revocation status
/// lists; `credential_key` is the hex credential verifying key holders and
/// verifiers check credentials against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKey {
    pub verkey: Verkey,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub credential_key: String,
}

/// Revocation parameters of a revocable credential definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationConfig {
    pub max_cred_num: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDefinitionValue {
    pub primary: PrimaryKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation: Option<RevocationConfig>,
}

/// Issuer's public key material for one schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDefinition {
    pub id: CredDefId,
    pub schema_id: SchemaId,
    #[serde(rename = "type")]
    pub signature_type: String,
    pub tag: String,
    pub value: CredentialDefinitionValue,
}

impl CredentialDefinition {
    pub fn new(
        issuer: &Did,
        schema: &Schema,
        tag: &str,
        verkey: Verkey,
        revocation: Option<RevocationConfig>,
    ) -> Result<Self, CoreError> {
        check_component("credential definition tag", tag)?;
        Ok(Self {
            id: CredDefId::new(issuer, &schema.id, tag),
            schema_id: schema.id.clone(),
            signature_type: CredDefId::SIGNATURE_TYPE.to_string(),
            tag: tag.to_string(),
            value: CredentialDefinitionValue {
                primary: PrimaryKey {
                    verkey,
                    credential_key: String::new(),
                },
                revocation,
            },
        })
    }

    pub fn issuer_did(&self) -> Did {
        self.id.issuer_did()
    }

    pub fn with_credential_key(mut self, key: impl Into<String>) -> Self {
        self.value.primary.credential_key = key.into();
        self
    }

    pub fn verkey(&self) -> &Verkey {
        &self.value.primary.verkey
    }

    pub fn credential_key(&self) -> &str {
        &self.value.primary.credential_key
    }

    pub fn supports_revocation(&self) -> bool {
        self.value.revocation.is_some()
    }
}
