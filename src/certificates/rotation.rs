//! Certificate rotation.
//!
//! A certificate credential has one current version (the newest one not
//! flagged transitional) and at most one transitional version kept valid
//! next to it. Rotating a CA goes one of two ways:
//!
//! - self-regeneration: the old current version is flagged transitional
//!   and the new one becomes current;
//! - staged: the new version is appended already flagged transitional,
//!   leaves are re-signed with it, then `promote` swaps the roles.
//!
//! Either way the signing CA version is the newest of the two.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::credential::{
    CertificateMetadata, CredentialType, CredentialValue, CredentialVersion, GenerationParameters,
};
use crate::errors::{CredVaultError, Result};
use crate::generate::{CredentialGenerator, GenerateRequest, SigningAuthority};
use crate::keys::EncryptionKeySet;
use crate::regenerate::RegenerationStrategy;
use crate::store::CredentialVersionStore;

/// Outcome of a bulk regeneration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkRegenerationResult {
    pub regenerated_credentials: BTreeSet<String>,
    /// Credential name → error message, for items that failed.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<String, String>,
    /// Set when the cancellation flag stopped the batch early.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

pub struct CertificateRotationOrchestrator<'a> {
    store: &'a dyn CredentialVersionStore,
    key_set: &'a EncryptionKeySet,
    generator: &'a dyn CredentialGenerator,
}

impl<'a> CertificateRotationOrchestrator<'a> {
    pub fn new(
        store: &'a dyn CredentialVersionStore,
        key_set: &'a EncryptionKeySet,
        generator: &'a dyn CredentialGenerator,
    ) -> Self {
        Self {
            store,
            key_set,
            generator,
        }
    }

    // ── Transitional flag ───────────────────────────────────────────────

    /// All versions of a certificate credential, newest first.
    fn certificate_versions(&self, name: &str) -> Result<Vec<CredentialVersion>> {
        let versions = self.store.find_versions(name)?;
        let newest = versions
            .first()
            .ok_or_else(|| CredVaultError::EntryNotFound(name.to_string()))?;
        if newest.kind() != Some(CredentialType::Certificate) {
            return Err(CredVaultError::NotACertificate(name.to_string()));
        }
        Ok(versions)
    }

    pub fn set_transitional_version(&self, name: &str, version_id: Uuid) -> Result<()> {
        let versions = self.certificate_versions(name)?;
        if !versions.iter().any(|v| v.version_id == version_id) {
            return Err(CredVaultError::EntryNotFound(format!(
                "version {version_id} of '{name}'"
            )));
        }
        // Versions are never removed, so this cannot change under us.
        let current_remains = versions
            .iter()
            .any(|v| v.version_id != version_id && !v.is_transitional());
        if !current_remains {
            return Err(CredVaultError::InvalidTransitionalVersion(format!(
                "'{name}' would have no current version"
            )));
        }

        self.store
            .set_transitional(versions[0].credential_id, version_id)?;
        info!(credential = name, %version_id, "transitional version set");
        Ok(())
    }

    pub fn unset_transitional_version(&self, name: &str) -> Result<()> {
        let versions = self.certificate_versions(name)?;
        if self.store.clear_transitional(versions[0].credential_id)? {
            info!(credential = name, "transitional version cleared");
        }
        Ok(())
    }

    /// Make a staged (newer) transitional version current, keeping the old
    /// current version valid as transitional. Returns the new current.
    pub fn promote_transitional_version(&self, name: &str) -> Result<CredentialVersion> {
        let versions = self.certificate_versions(name)?;
        let staged = versions.iter().position(|v| v.is_transitional()).ok_or_else(|| {
            CredVaultError::InvalidTransitionalVersion(format!(
                "'{name}' has no transitional version"
            ))
        })?;
        let current = versions
            .iter()
            .position(|v| !v.is_transitional())
            .ok_or_else(|| {
                CredVaultError::InvalidTransitionalVersion(format!(
                    "'{name}' has no current version"
                ))
            })?;
        if staged > current {
            return Err(CredVaultError::InvalidTransitionalVersion(format!(
                "the transitional version of '{name}' is older than the current one"
            )));
        }

        let promoted = versions[staged].version_id;
        self.store.swap_transitional(
            versions[0].credential_id,
            promoted,
            versions[current].version_id,
        )?;
        info!(credential = name, version_id = %promoted, "transitional version promoted");

        self.store
            .find_version(promoted)?
            .ok_or_else(|| CredVaultError::EntryNotFound(format!("version {promoted}")))
    }

    // ── Regeneration ────────────────────────────────────────────────────

    /// Regenerate `name` from its stored parameters and append the result.
    ///
    /// With `staged` set the credential must be a CA and the new version
    /// is appended flagged transitional.
    pub fn regenerate(&self, name: &str, staged: bool) -> Result<CredentialVersion> {
        let current = self
            .store
            .find_current_version(name)?
            .ok_or_else(|| CredVaultError::EntryNotFound(name.to_string()))?;
        self.regenerate_from(&current, staged)
    }

    fn regenerate_from(
        &self,
        current: &CredentialVersion,
        staged: bool,
    ) -> Result<CredentialVersion> {
        let request = RegenerationStrategy::for_type(&current.credential_type)
            .create_generate_request(current)?;

        let is_ca = current.is_certificate_authority();
        if staged {
            if current.kind() != Some(CredentialType::Certificate) {
                return Err(CredVaultError::NotACertificate(current.name.clone()));
            }
            if !is_ca {
                return Err(CredVaultError::InvalidTransitionalVersion(format!(
                    "only certificate authorities can be regenerated as transitional ('{}')",
                    current.name
                )));
            }
        }

        if is_ca && !staged {
            return self.rotate_ca(current, &request);
        }

        let version = self.issue(current.credential_id, &request, staged)?;
        self.store.append_version(&version)?;
        info!(
            credential = %version.name,
            version_id = %version.version_id,
            staged,
            "credential regenerated"
        );
        Ok(version)
    }

    /// CA self-regeneration: the store flags `current` transitional and
    /// appends the new version in one step, so a concurrent rotation of
    /// the same CA fails instead of leaving an orphaned version.
    fn rotate_ca(
        &self,
        current: &CredentialVersion,
        request: &GenerateRequest,
    ) -> Result<CredentialVersion> {
        let version = self.issue(current.credential_id, request, false)?;
        self.store
            .append_replacing_current(current.version_id, &version)?;

        info!(
            credential = %current.name,
            version_id = %version.version_id,
            transitional = %current.version_id,
            "certificate authority regenerated"
        );
        Ok(version)
    }

    /// Regenerate every certificate signed by `signer_name`, descending
    /// into intermediate CAs that get regenerated along the way.
    ///
    /// Item failures are recorded and the batch carries on; `cancel` stops
    /// it between items. Nothing already committed is undone.
    pub fn bulk_regenerate(
        &self,
        signer_name: &str,
        cancel: &AtomicBool,
    ) -> Result<BulkRegenerationResult> {
        let signer = self
            .store
            .find_current_version(signer_name)?
            .ok_or_else(|| CredVaultError::EntryNotFound(signer_name.to_string()))?;
        if signer.kind() != Some(CredentialType::Certificate) {
            return Err(CredVaultError::NotACertificate(signer_name.to_string()));
        }

        let mut result = BulkRegenerationResult::default();
        let mut visited: HashSet<String> = HashSet::from([signer_name.to_string()]);
        let mut signers: VecDeque<String> = VecDeque::from([signer_name.to_string()]);

        'signers: while let Some(ca) = signers.pop_front() {
            for child in self.store.find_versions_signed_by(&ca)? {
                if cancel.load(Ordering::SeqCst) {
                    result.cancelled = true;
                    break 'signers;
                }
                if !visited.insert(child.name.clone()) {
                    continue;
                }

                match self.regenerate_from(&child, false) {
                    Ok(version) => {
                        if version.is_certificate_authority() {
                            signers.push_back(child.name.clone());
                        }
                        result.regenerated_credentials.insert(child.name);
                    }
                    Err(e) => {
                        warn!(credential = %child.name, error = %e, "bulk regeneration item failed");
                        result.failures.insert(child.name, e.to_string());
                    }
                }
            }
        }

        info!(
            signer = signer_name,
            regenerated = result.regenerated_credentials.len(),
            failed = result.failures.len(),
            cancelled = result.cancelled,
            "bulk regeneration finished"
        );
        Ok(result)
    }

    // ── Issuing ─────────────────────────────────────────────────────────

    /// Generate and seal a new version of `credential_id` without storing it.
    pub(crate) fn issue(
        &self,
        credential_id: Uuid,
        request: &GenerateRequest,
        staged: bool,
    ) -> Result<CredentialVersion> {
        let signer = match &request.parameters {
            GenerationParameters::Certificate(params) => params
                .ca
                .as_deref()
                .map(|ca| self.resolve_signer(ca))
                .transpose()?,
            _ => None,
        };

        let generated = self.generator.generate(request, signer.as_ref())?;

        let certificate = match (&generated.value, &generated.parameters) {
            (CredentialValue::Certificate(value), GenerationParameters::Certificate(params)) => {
                let expiry_date = generated.expiry_date.ok_or_else(|| {
                    CredVaultError::GenerationFailed("certificate has no expiry date".into())
                })?;
                Some(CertificateMetadata {
                    transitional: staged,
                    ca_name: params.ca.clone(),
                    certificate: value.certificate.clone(),
                    expiry_date,
                    self_signed: params.is_self_signed(),
                    certificate_authority: params.is_ca,
                })
            }
            _ => None,
        };

        CredentialVersion::seal(
            self.key_set,
            credential_id,
            &request.name,
            &generated.value,
            Some(generated.parameters),
            certificate,
        )
    }

    /// Resolve the CA used to sign for `ca_name`: the newest of its
    /// current and transitional versions, which is simply its newest
    /// version.
    pub fn resolve_signer(&self, ca_name: &str) -> Result<SigningAuthority> {
        let missing = || CredVaultError::SigningCaMissing(ca_name.to_string());

        let versions = self.store.find_versions(ca_name)?;
        let signing = versions
            .first()
            .filter(|v| v.is_certificate_authority())
            .ok_or_else(missing)?;

        match signing.open(self.key_set)? {
            CredentialValue::Certificate(value) => Ok(SigningAuthority {
                name: ca_name.to_string(),
                certificate: value.certificate,
                private_key: value.private_key,
            }),
            _ => Err(missing()),
        }
    }
}
