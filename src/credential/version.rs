//! Stored credential versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::parameters::GenerationParameters;
use super::value::CredentialValue;
use super::CredentialType;
use crate::errors::Result;
use crate::keys::{EncryptedValue, EncryptionKeySet};

/// Certificate-only metadata, kept in plaintext next to the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMetadata {
    /// Valid next to the current version during a rotation.
    #[serde(default)]
    pub transitional: bool,
    /// Name of the signing CA credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_name: Option<String>,
    /// Public certificate body (PEM).
    pub certificate: String,
    pub expiry_date: DateTime<Utc>,
    #[serde(default)]
    pub self_signed: bool,
    #[serde(default)]
    pub certificate_authority: bool,
}

/// One immutable version of a named credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialVersion {
    pub credential_id: Uuid,
    pub name: String,
    pub version_id: Uuid,
    /// Type string as written; unrecognized types are kept verbatim.
    pub credential_type: String,
    pub encrypted_value: EncryptedValue,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_parameters: Option<GenerationParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateMetadata>,
}

impl CredentialVersion {
    /// Build a new version of `credential_id`, encrypting `value` under the
    /// active key with the fresh version id bound as associated data.
    pub fn seal(
        key_set: &EncryptionKeySet,
        credential_id: Uuid,
        name: &str,
        value: &CredentialValue,
        generation_parameters: Option<GenerationParameters>,
        certificate: Option<CertificateMetadata>,
    ) -> Result<Self> {
        let version_id = Uuid::new_v4();
        let plaintext = zeroize::Zeroizing::new(value.to_plaintext()?);
        let encrypted_value = key_set.encrypt(&plaintext, version_id)?;

        Ok(Self {
            credential_id,
            name: name.to_string(),
            version_id,
            credential_type: value.credential_type().as_str().to_string(),
            encrypted_value,
            created_at: Utc::now(),
            generation_parameters,
            certificate,
        })
    }

    /// Decrypt the stored value.
    pub fn open(&self, key_set: &EncryptionKeySet) -> Result<CredentialValue> {
        let plaintext = key_set.decrypt(&self.encrypted_value, self.version_id)?;
        CredentialValue::from_plaintext(plaintext)
    }

    pub fn encryption_key_id(&self) -> Uuid {
        self.encrypted_value.encryption_key_id
    }

    pub fn kind(&self) -> Option<CredentialType> {
        self.credential_type.parse().ok()
    }

    pub fn is_transitional(&self) -> bool {
        self.certificate.as_ref().is_some_and(|c| c.transitional)
    }

    pub fn is_certificate_authority(&self) -> bool {
        self.certificate
            .as_ref()
            .is_some_and(|c| c.certificate_authority)
    }

    pub fn ca_name(&self) -> Option<&str> {
        self.certificate.as_ref().and_then(|c| c.ca_name.as_deref())
    }
}

/// Lightweight metadata about a version (no ciphertext).
///
/// Returned for listings so callers can show history without decrypting.
#[derive(Debug, Clone, Serialize)]
pub struct VersionSummary {
    pub version_id: Uuid,
    pub credential_type: String,
    pub created_at: DateTime<Utc>,
    pub encryption_key_id: Uuid,
    pub transitional: bool,
}

impl From<&CredentialVersion> for VersionSummary {
    fn from(version: &CredentialVersion) -> Self {
        Self {
            version_id: version.version_id,
            credential_type: version.credential_type.clone(),
            created_at: version.created_at,
            encryption_key_id: version.encryption_key_id(),
            transitional: version.is_transitional(),
        }
    }
}
