//! Credential scheme capability behind issuance, storage, proving and
//! verification.
//!
//! Issuer, holder and verifier never branch on whether a credential
//! definition supports revocation; they ask the scheme picked by
//! [`scheme_for`].

use indigo_core::CredentialDefinition;

use crate::error::CredentialError;
use crate::revocation::{RevocationHandle, RevocationRegistry, RevocationStatusList};

pub trait CredentialScheme: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether credentials sign a registry index after their attributes.
    fn has_revocation_index(&self) -> bool;

    /// Handle for a newly issued credential, if the scheme tracks revocation.
    fn allocate_handle(
        &self,
        cred_def: &CredentialDefinition,
        registry: Option<&mut RevocationRegistry>,
    ) -> Result<Option<RevocationHandle>, CredentialError>;

    /// Status list a holder proves non-revocation against, checked before
    /// anything is proven.
    fn usable_status<'a>(
        &self,
        cred_def: &CredentialDefinition,
        handle: Option<&RevocationHandle>,
        status: Option<&'a RevocationStatusList>,
    ) -> Result<Option<&'a RevocationStatusList>, CredentialError>;

    /// Status list a verifier checks a sub-proof's non-revocation part
    /// against. `rev_reg_id` is the registry the sub-proof names.
    fn required_status<'a>(
        &self,
        cred_def: &CredentialDefinition,
        rev_reg_id: Option<&str>,
        status: Option<&'a RevocationStatusList>,
    ) -> Result<Option<&'a RevocationStatusList>, String>;
}

/// Credentials that stay valid forever.
pub struct StaticScheme;

impl CredentialScheme for StaticScheme {
    fn name(&self) -> &'static str {
        "static"
    }

    fn has_revocation_index(&self) -> bool {
        false
    }

    fn allocate_handle(
        &self,
        _cred_def: &CredentialDefinition,
        _registry: Option<&mut RevocationRegistry>,
    ) -> Result<Option<RevocationHandle>, CredentialError> {
        Ok(None)
    }

    fn usable_status<'a>(
        &self,
        cred_def: &CredentialDefinition,
        handle: Option<&RevocationHandle>,
        _status: Option<&'a RevocationStatusList>,
    ) -> Result<Option<&'a RevocationStatusList>, CredentialError> {
        match handle {
            Some(_) => Err(CredentialError::InvalidCredentialSignature(format!(
                "{} does not support revocation",
                cred_def.id
            ))),
            None => Ok(None),
        }
    }

    fn required_status<'a>(
        &self,
        _cred_def: &CredentialDefinition,
        rev_reg_id: Option<&str>,
        _status: Option<&'a RevocationStatusList>,
    ) -> Result<Option<&'a RevocationStatusList>, String> {
        match rev_reg_id {
            Some(_) => Err("non-revocation proof for a credential that cannot be revoked".into()),
            None => Ok(None),
        }
    }
}

/// Credentials indexed in a revocation registry. Proving and verifying both
/// need a status list signed by the credential definition key.
pub struct RevocableScheme;

impl CredentialScheme for RevocableScheme {
    fn name(&self) -> &'static str {
        "revocable"
    }

    fn has_revocation_index(&self) -> bool {
        true
    }

    fn allocate_handle(
        &self,
        cred_def: &CredentialDefinition,
        registry: Option<&mut RevocationRegistry>,
    ) -> Result<Option<RevocationHandle>, CredentialError> {
        let registry = registry
            .ok_or_else(|| CredentialError::UnknownRevocationRegistry(cred_def.id.to_string()))?;
        registry.allocate().map(Some)
    }

    fn usable_status<'a>(
        &self,
        cred_def: &CredentialDefinition,
        handle: Option<&RevocationHandle>,
        status: Option<&'a RevocationStatusList>,
    ) -> Result<Option<&'a RevocationStatusList>, CredentialError> {
        let handle = handle.ok_or_else(|| {
            CredentialError::InvalidCredentialSignature(format!(
                "credential of {} has no revocation handle",
                cred_def.id
            ))
        })?;
        let status = status
            .ok_or_else(|| CredentialError::UnknownRevocationRegistry(handle.rev_reg_id.clone()))?;
        if status.rev_reg_id != handle.rev_reg_id || !status.verify(cred_def) {
            return Err(CredentialError::InvalidRevocationStatus(handle.rev_reg_id.clone()));
        }
        if status.is_revoked(handle.index) {
            return Err(CredentialError::CredentialRevoked(format!(
                "{} index {}",
                handle.rev_reg_id, handle.index
            )));
        }
        Ok(Some(status))
    }

    fn required_status<'a>(
        &self,
        cred_def: &CredentialDefinition,
        rev_reg_id: Option<&str>,
        status: Option<&'a RevocationStatusList>,
    ) -> Result<Option<&'a RevocationStatusList>, String> {
        let rev_reg_id = rev_reg_id.ok_or("missing non-revocation proof")?;
        let status = status.ok_or_else(|| format!("no revocation status for {}", rev_reg_id))?;
        if status.rev_reg_id != rev_reg_id || !status.verify(cred_def) {
            return Err(format!("revocation status for {} is not signed by the issuer", rev_reg_id));
        }
        Ok(Some(status))
    }
}

pub fn scheme_for(cred_def: &CredentialDefinition) -> &'static dyn CredentialScheme {
    if cred_def.supports_revocation() {
        &RevocableScheme
    } else {
        &StaticScheme
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use indigo_core::{RevocationConfig, Schema};
    use indigo_wallet::Keyring;

    fn cred_def(keyring: &Keyring, revocable: bool) -> CredentialDefinition {
        let issuer = keyring.create_identity().unwrap().did;
        let schema = Schema::new(&issuer, "gvt", "1.0", vec!["age".into()]).unwrap();
        let id = indigo_core::CredDefId::new(&issuer, &schema.id, "tag1");
        let verkey = keyring.create_signing_key(id.as_str()).unwrap();
        let revocation = revocable.then_some(RevocationConfig { max_cred_num: 5 });
        CredentialDefinition::new(&issuer, &schema, "tag1", verkey, revocation).unwrap()
    }

    fn signed(keyring: &Keyring, cd: &CredentialDefinition, mut status: RevocationStatusList) -> RevocationStatusList {
        status.signature = keyring
            .sign_with_label(cd.id.as_str(), &status.signing_bytes())
            .unwrap()
            .to_bs58();
        status
    }

    #[test]
    fn test_scheme_selection() {
        let keyring = Keyring::new();
        let fixed = scheme_for(&cred_def(&keyring, false));
        let revocable = scheme_for(&cred_def(&keyring, true));
        assert_eq!(fixed.name(), "static");
        assert!(!fixed.has_revocation_index());
        assert_eq!(revocable.name(), "revocable");
        assert!(revocable.has_revocation_index());
    }

    #[test]
    fn test_static_refuses_revocation_data() {
        let keyring = Keyring::new();
        let cd = cred_def(&keyring, false);
        let scheme = scheme_for(&cd);
        assert!(scheme.usable_status(&cd, None, None).unwrap().is_none());
        assert!(scheme.required_status(&cd, None, None).unwrap().is_none());
        assert!(scheme.required_status(&cd, Some("reg"), None).is_err());
        let handle = RevocationHandle {
            rev_reg_id: "reg".into(),
            index: 1,
        };
        assert!(scheme.usable_status(&cd, Some(&handle), None).is_err());
    }

    #[test]
    fn test_revocable_requires_signed_status() {
        let keyring = Keyring::new();
        let cd = cred_def(&keyring, true);
        let scheme = scheme_for(&cd);
        let mut registry = RevocationRegistry::new(&cd.id, 5);
        let handle = scheme.allocate_handle(&cd, Some(&mut registry)).unwrap().unwrap();
        assert!(scheme.allocate_handle(&cd, None).is_err());

        let unsigned = RevocationStatusList {
            rev_reg_id: registry.id().to_string(),
            cred_def_id: cd.id.clone(),
            revoked: vec![],
            timestamp: Utc::now(),
            signature: String::new(),
        };
        assert!(matches!(
            scheme.usable_status(&cd, Some(&handle), None),
            Err(CredentialError::UnknownRevocationRegistry(_))
        ));
        assert!(matches!(
            scheme.usable_status(&cd, Some(&handle), Some(&unsigned)),
            Err(CredentialError::InvalidRevocationStatus(_))
        ));
        assert!(scheme.required_status(&cd, Some(registry.id()), Some(&unsigned)).is_err());
        assert!(scheme.required_status(&cd, None, Some(&unsigned)).is_err());

        let status = signed(&keyring, &cd, unsigned.clone());
        assert!(scheme.usable_status(&cd, Some(&handle), Some(&status)).unwrap().is_some());
        assert!(scheme.required_status(&cd, Some(registry.id()), Some(&status)).unwrap().is_some());

        let mut revoked = unsigned;
        revoked.revoked = vec![handle.index];
        let revoked = signed(&keyring, &cd, revoked);
        assert!(matches!(
            scheme.usable_status(&cd, Some(&handle), Some(&revoked)),
            Err(CredentialError::CredentialRevoked(_))
        ));
    }
}
