//! `CredentialService` — the upward API.
//!
//! Wires the immutable key set, a store and a generator together. Every
//! read decrypts on demand and fills in the CA chain for certificates;
//! nothing decrypted is cached.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::certificates::{
    BulkRegenerationResult, CertificateChainBuilder, CertificateRotationOrchestrator,
};
use crate::config::Settings;
use crate::credential::{
    validate_name, CertificateMetadata, CredentialValue, CredentialVersion, CredentialView,
    VersionSummary,
};
use crate::errors::{CredVaultError, Result};
use crate::generate::{CredentialGenerator, GenerateRequest};
use crate::keys::{
    classify, verify_canaries, EncryptionKeyRotator, EncryptionKeySet, KeyUsageReport,
    RotationSummary,
};
use crate::store::CredentialVersionStore;

pub struct CredentialService {
    key_set: Arc<EncryptionKeySet>,
    store: Arc<dyn CredentialVersionStore>,
    generator: Arc<dyn CredentialGenerator>,
    concatenate_cas: bool,
    rotation_batch_size: usize,
}

impl CredentialService {
    /// Build the service, checking every key against its canary first.
    pub fn new(
        settings: &Settings,
        key_set: Arc<EncryptionKeySet>,
        store: Arc<dyn CredentialVersionStore>,
        generator: Arc<dyn CredentialGenerator>,
    ) -> Result<Self> {
        verify_canaries(&key_set, store.as_ref())?;
        Ok(Self {
            key_set,
            store,
            generator,
            concatenate_cas: settings.concatenate_cas,
            rotation_batch_size: settings.rotation_batch_size,
        })
    }

    /// Open the SQLite-backed service under `base_dir` with the standard
    /// generator.
    #[cfg(feature = "sqlite-store")]
    pub fn open(settings: &Settings, base_dir: &std::path::Path) -> Result<Self> {
        let key_set = Arc::new(EncryptionKeySet::from_settings(settings)?);
        let store = crate::store::SqliteStore::open(&settings.data_path(base_dir))?;
        Self::new(
            settings,
            key_set,
            Arc::new(store),
            Arc::new(crate::generate::StandardGenerator),
        )
    }

    fn orchestrator(&self) -> CertificateRotationOrchestrator<'_> {
        CertificateRotationOrchestrator::new(
            self.store.as_ref(),
            &self.key_set,
            self.generator.as_ref(),
        )
    }

    pub fn key_set(&self) -> &EncryptionKeySet {
        &self.key_set
    }

    // ── Keys ────────────────────────────────────────────────────────────

    pub fn get_key_usage(&self) -> Result<KeyUsageReport> {
        let counts = self.store.count_versions_by_encryption_key()?;
        Ok(classify(&self.key_set, &counts))
    }

    pub fn rotate_encryption_keys(&self) -> Result<RotationSummary> {
        EncryptionKeyRotator::new(self.store.as_ref(), &self.key_set, self.rotation_batch_size)
            .rotate()
    }

    // ── Writes ──────────────────────────────────────────────────────────

    /// Resolve the credential id for `name`, refusing a type change.
    fn credential_id_for(&self, name: &str, credential_type: &str) -> Result<Uuid> {
        validate_name(name)?;
        match self.store.find_versions(name)?.first() {
            Some(existing) if existing.credential_type != credential_type => {
                Err(CredVaultError::CommandFailed(format!(
                    "'{name}' is a {} credential, not {credential_type}",
                    existing.credential_type
                )))
            }
            Some(existing) => Ok(existing.credential_id),
            None => Ok(Uuid::new_v4()),
        }
    }

    /// Generate a new version of `request.name`.
    pub fn generate(&self, request: &GenerateRequest) -> Result<CredentialView> {
        let credential_id =
            self.credential_id_for(&request.name, request.credential_type().as_str())?;
        let version = self.orchestrator().issue(credential_id, request, false)?;
        self.store.append_version(&version)?;
        info!(credential = %version.name, kind = %version.credential_type, "credential generated");
        self.view(&version)
    }

    /// Store a caller-supplied value as a new version.
    ///
    /// Set values carry no generation parameters, so they can't be
    /// regenerated later.
    pub fn set_value(&self, name: &str, value: CredentialValue) -> Result<CredentialView> {
        let credential_type = value.credential_type();
        let credential_id = self.credential_id_for(name, credential_type.as_str())?;

        let certificate = match &value {
            CredentialValue::Certificate(cert) => Some(certificate_metadata(&cert.certificate)?),
            _ => None,
        };
        let version =
            CredentialVersion::seal(&self.key_set, credential_id, name, &value, None, certificate)?;
        self.store.append_version(&version)?;
        info!(credential = name, kind = %credential_type, "credential set");
        self.view(&version)
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Current version of `name`.
    pub fn get(&self, name: &str) -> Result<CredentialView> {
        let version = self
            .store
            .find_current_version(name)?
            .ok_or_else(|| CredVaultError::EntryNotFound(name.to_string()))?;
        self.view(&version)
    }

    pub fn get_version(&self, version_id: Uuid) -> Result<CredentialView> {
        let version = self
            .store
            .find_version(version_id)?
            .ok_or_else(|| CredVaultError::EntryNotFound(format!("version {version_id}")))?;
        self.view(&version)
    }

    /// Version history of `name`, newest first, without decrypting.
    pub fn versions(&self, name: &str) -> Result<Vec<VersionSummary>> {
        let versions = self.store.find_versions(name)?;
        if versions.is_empty() {
            return Err(CredVaultError::EntryNotFound(name.to_string()));
        }
        Ok(versions.iter().map(VersionSummary::from).collect())
    }

    fn view(&self, version: &CredentialVersion) -> Result<CredentialView> {
        let mut value = version.open(&self.key_set)?;
        if let CredentialValue::Certificate(cert) = &mut value {
            // A set certificate may carry its own CA; generated ones never do.
            if cert.ca.is_none() {
                cert.ca = CertificateChainBuilder::new(self.concatenate_cas)
                    .ca_for(self.store.as_ref(), version)?;
            }
        }
        Ok(CredentialView {
            id: version.version_id,
            name: version.name.clone(),
            version_created_at: version.created_at,
            transitional: version.is_transitional(),
            value,
        })
    }

    // ── Regeneration and rotation ───────────────────────────────────────

    pub fn regenerate(&self, name: &str) -> Result<CredentialView> {
        let version = self.orchestrator().regenerate(name, false)?;
        self.view(&version)
    }

    /// Staged CA rotation: the new version starts out transitional.
    pub fn regenerate_transitional(&self, name: &str) -> Result<CredentialView> {
        let version = self.orchestrator().regenerate(name, true)?;
        self.view(&version)
    }

    pub fn bulk_regenerate(
        &self,
        signed_by: &str,
        cancel: &AtomicBool,
    ) -> Result<BulkRegenerationResult> {
        self.orchestrator().bulk_regenerate(signed_by, cancel)
    }

    pub fn set_transitional_version(&self, name: &str, version_id: Uuid) -> Result<()> {
        self.orchestrator().set_transitional_version(name, version_id)
    }

    pub fn unset_transitional_version(&self, name: &str) -> Result<()> {
        self.orchestrator().unset_transitional_version(name)
    }

    pub fn promote_transitional_version(&self, name: &str) -> Result<CredentialView> {
        let version = self.orchestrator().promote_transitional_version(name)?;
        self.view(&version)
    }
}

/// Metadata for a caller-supplied certificate, read from its PEM.
fn certificate_metadata(pem: &str) -> Result<CertificateMetadata> {
    let params = rcgen::CertificateParams::from_ca_cert_pem(pem)
        .map_err(|e| CredVaultError::CommandFailed(format!("invalid certificate: {e}")))?;
    let expiry_date = DateTime::<Utc>::from_timestamp(params.not_after.unix_timestamp(), 0)
        .ok_or_else(|| CredVaultError::CommandFailed("certificate expiry out of range".into()))?;

    Ok(CertificateMetadata {
        transitional: false,
        ca_name: None,
        certificate: pem.to_string(),
        expiry_date,
        self_signed: false,
        certificate_authority: matches!(params.is_ca, rcgen::IsCa::Ca(_)),
    })
}
