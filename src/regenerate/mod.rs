//! Regeneration dispatch.
//!
//! A stored version's type string picks a [`RegenerationStrategy`]; the
//! strategy rebuilds a [`GenerateRequest`] from the version's stored
//! generation parameters. Nothing here decrypts.

use crate::credential::{CredentialType, CredentialVersion, GenerationParameters};
use crate::errors::{CredVaultError, Result};
use crate::generate::GenerateRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenerationStrategy {
    Password,
    User,
    Ssh,
    Rsa,
    Certificate,
    /// Set-only types (`value`, `json`) and anything unrecognized.
    NotRegeneratable(String),
}

impl RegenerationStrategy {
    /// Pick the strategy for a stored type string. Never fails.
    pub fn for_type(credential_type: &str) -> Self {
        match credential_type.parse::<CredentialType>() {
            Ok(CredentialType::Password) => Self::Password,
            Ok(CredentialType::User) => Self::User,
            Ok(CredentialType::Ssh) => Self::Ssh,
            Ok(CredentialType::Rsa) => Self::Rsa,
            Ok(CredentialType::Certificate) => Self::Certificate,
            Ok(CredentialType::Value | CredentialType::Json) | Err(_) => {
                Self::NotRegeneratable(credential_type.to_string())
            }
        }
    }

    pub fn is_regeneratable(&self) -> bool {
        !matches!(self, Self::NotRegeneratable(_))
    }

    /// Rebuild the request that produced `version`.
    pub fn create_generate_request(&self, version: &CredentialVersion) -> Result<GenerateRequest> {
        if let Self::NotRegeneratable(kind) = self {
            return Err(CredVaultError::UnsupportedRegeneration(kind.clone()));
        }

        let parameters = version
            .generation_parameters
            .as_ref()
            .ok_or_else(|| CredVaultError::NonGeneratedCredential(version.name.clone()))?;

        let matches = matches!(
            (self, parameters),
            (Self::Password, GenerationParameters::Password(_))
                | (Self::User, GenerationParameters::User(_))
                | (Self::Ssh, GenerationParameters::Ssh(_))
                | (Self::Rsa, GenerationParameters::Rsa(_))
                | (Self::Certificate, GenerationParameters::Certificate(_))
        );
        if !matches {
            return Err(CredVaultError::StoreError(format!(
                "stored generation parameters of '{}' do not match its type '{}'",
                version.name, version.credential_type
            )));
        }

        Ok(GenerateRequest::new(version.name.clone(), parameters.clone()))
    }
}
